use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{NoticeStore, NoticeTx, StoreError};
use crate::models::notice::{Notice, NoticeDraft, NoticeFilter, NoticePage, NoticeStatus};

const NOTICE_COLS: &str = "id, created_at, updated_at, title, notice_type, publish_start_at,
     publish_end_at, status, push_notification_scheduled_at, push_notification_icon_url,
     list_image_url, detail_image_url, short_description, description, redirect_url";

/// Optional filters are passed as NULLs so that one statement covers every combination.
const FILTER_WHERE: &str = "($1::SMALLINT IS NULL OR notice_type = $1)
     AND ($2::SMALLINT IS NULL OR status = $2)
     AND ($3::TEXT IS NULL OR title ILIKE $3 OR short_description ILIKE $3 OR description ILIKE $3)";

#[derive(Clone)]
pub struct PgNoticeStore {
    pool: PgPool,
}

impl PgNoticeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoticeStore for PgNoticeStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn NoticeTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgNoticeTx { tx }))
    }

    async fn get(&self, id: i64) -> Result<Option<Notice>, StoreError> {
        let notice = sqlx::query_as::<_, Notice>(&format!(
            "SELECT {NOTICE_COLS} FROM notices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(notice)
    }

    async fn list(&self, filter: &NoticeFilter) -> Result<NoticePage, StoreError> {
        let notice_type = filter.notice_type.map(|t| t.code());
        let status = filter.status.map(|s| s.code());
        let pattern = filter.search().map(|q| format!("%{}%", escape_like(q)));

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM notices WHERE {FILTER_WHERE}"
        ))
        .bind(notice_type)
        .bind(status)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Notice>(&format!(
            "SELECT {NOTICE_COLS} FROM notices WHERE {FILTER_WHERE}
             ORDER BY created_at DESC, id DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(notice_type)
        .bind(status)
        .bind(&pattern)
        .bind(filter.per_page())
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(NoticePage {
            items,
            total,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Notice>, StoreError> {
        let items = sqlx::query_as::<_, Notice>(&format!(
            "SELECT {NOTICE_COLS} FROM notices
             WHERE status = $1
               AND (publish_start_at IS NULL OR publish_start_at <= $2)
               AND (publish_end_at IS NULL OR publish_end_at >= $2)
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(NoticeStatus::Published.code())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn find_by_title(&self, title: &str) -> Result<Vec<Notice>, StoreError> {
        let items = sqlx::query_as::<_, Notice>(&format!(
            "SELECT {NOTICE_COLS} FROM notices WHERE title = $1 ORDER BY id"
        ))
        .bind(title)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

pub struct PgNoticeTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl NoticeTx for PgNoticeTx {
    async fn insert(&mut self, draft: &NoticeDraft) -> Result<Notice, StoreError> {
        let notice = sqlx::query_as::<_, Notice>(&format!(
            "INSERT INTO notices
             (title, notice_type, status, publish_start_at, publish_end_at,
              push_notification_scheduled_at, push_notification_icon_url,
              list_image_url, detail_image_url, short_description, description, redirect_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {NOTICE_COLS}"
        ))
        .bind(&draft.title)
        .bind(draft.notice_type.code())
        .bind(draft.status.code())
        .bind(draft.publish_start_at)
        .bind(draft.publish_end_at)
        .bind(draft.push_notification_scheduled_at)
        .bind(&draft.push_notification_icon_url)
        .bind(&draft.list_image_url)
        .bind(&draft.detail_image_url)
        .bind(&draft.short_description)
        .bind(&draft.description)
        .bind(&draft.redirect_url)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(notice)
    }

    async fn update(&mut self, id: i64, draft: &NoticeDraft) -> Result<Option<Notice>, StoreError> {
        let notice = sqlx::query_as::<_, Notice>(&format!(
            "UPDATE notices SET
                title = $2, notice_type = $3, status = $4,
                publish_start_at = $5, publish_end_at = $6,
                push_notification_scheduled_at = $7, push_notification_icon_url = $8,
                list_image_url = $9, detail_image_url = $10,
                short_description = $11, description = $12, redirect_url = $13,
                updated_at = NOW()
             WHERE id = $1
             RETURNING {NOTICE_COLS}"
        ))
        .bind(id)
        .bind(&draft.title)
        .bind(draft.notice_type.code())
        .bind(draft.status.code())
        .bind(draft.publish_start_at)
        .bind(draft.publish_end_at)
        .bind(draft.push_notification_scheduled_at)
        .bind(&draft.push_notification_icon_url)
        .bind(&draft.list_image_url)
        .bind(&draft.detail_image_url)
        .bind(&draft.short_description)
        .bind(&draft.description)
        .bind(&draft.redirect_url)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(notice)
    }

    async fn delete(&mut self, id: i64) -> Result<Option<Notice>, StoreError> {
        let notice = sqlx::query_as::<_, Notice>(&format!(
            "DELETE FROM notices WHERE id = $1 RETURNING {NOTICE_COLS}"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(notice)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn escape_like(q: &str) -> String {
    q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}
