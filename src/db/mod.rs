pub mod memory;
pub mod notices;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::models::notice::{Notice, NoticeDraft, NoticeFilter, NoticePage};

pub use memory::MemoryNoticeStore;
pub use notices::PgNoticeStore;

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the migrations embedded in ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for notices. Writes only happen through a [`NoticeTx`].
#[async_trait]
pub trait NoticeStore: Send + Sync {
    /// Short name reported by the health check.
    fn backend(&self) -> &'static str;

    /// Cheap round trip proving the store can serve requests.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn begin(&self) -> Result<Box<dyn NoticeTx>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Notice>, StoreError>;

    async fn list(&self, filter: &NoticeFilter) -> Result<NoticePage, StoreError>;

    /// Published notices whose publish window contains `now`, newest first.
    async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Notice>, StoreError>;

    async fn find_by_title(&self, title: &str) -> Result<Vec<Notice>, StoreError>;
}

/// An open write transaction. Dropping it without calling `commit` rolls back
/// every write made through it.
#[async_trait]
pub trait NoticeTx: Send {
    async fn insert(&mut self, draft: &NoticeDraft) -> Result<Notice, StoreError>;

    /// Replace every editable field of notice `id`. `None` if it does not exist.
    async fn update(&mut self, id: i64, draft: &NoticeDraft) -> Result<Option<Notice>, StoreError>;

    /// Hard delete. Returns the removed row, or `None` if it did not exist.
    async fn delete(&mut self, id: i64) -> Result<Option<Notice>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
