//! In-process notice store. Used by the test suites and for running the API
//! without PostgreSQL.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{NoticeStore, NoticeTx, StoreError};
use crate::models::notice::{Notice, NoticeDraft, NoticeFilter, NoticePage};

#[derive(Clone, Default)]
pub struct MemoryNoticeStore {
    rows: Arc<Mutex<BTreeMap<i64, Notice>>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryNoticeStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn snapshot(&self) -> Vec<Notice> {
        self.rows.lock().await.values().cloned().collect()
    }
}

fn newest_first(items: &mut [Notice]) {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn matches(notice: &Notice, filter: &NoticeFilter) -> bool {
    if filter.notice_type.is_some_and(|t| t != notice.notice_type) {
        return false;
    }
    if filter.status.is_some_and(|s| s != notice.status) {
        return false;
    }
    match filter.search() {
        Some(q) => {
            let q = q.to_lowercase();
            notice.title.to_lowercase().contains(&q)
                || notice.short_description.to_lowercase().contains(&q)
                || notice.description.to_lowercase().contains(&q)
        }
        None => true,
    }
}

#[async_trait]
impl NoticeStore for MemoryNoticeStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn NoticeTx>, StoreError> {
        let working = self.rows.lock().await.clone();
        Ok(Box::new(MemoryNoticeTx {
            store: self.clone(),
            working,
            writes: Vec::new(),
        }))
    }

    async fn get(&self, id: i64) -> Result<Option<Notice>, StoreError> {
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn list(&self, filter: &NoticeFilter) -> Result<NoticePage, StoreError> {
        let mut items: Vec<Notice> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|n| matches(n, filter))
            .collect();
        newest_first(&mut items);
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page() as usize)
            .collect();
        Ok(NoticePage {
            items,
            total,
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Notice>, StoreError> {
        let mut items: Vec<Notice> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|n| n.is_live(now))
            .collect();
        newest_first(&mut items);
        Ok(items)
    }

    async fn find_by_title(&self, title: &str) -> Result<Vec<Notice>, StoreError> {
        Ok(self
            .snapshot()
            .await
            .into_iter()
            .filter(|n| n.title == title)
            .collect())
    }
}

enum Staged {
    Put(Notice),
    Remove(i64),
}

/// Writes go to a private copy and are replayed onto the shared map on commit.
pub struct MemoryNoticeTx {
    store: MemoryNoticeStore,
    working: BTreeMap<i64, Notice>,
    writes: Vec<Staged>,
}

fn apply(notice: &mut Notice, draft: &NoticeDraft) {
    notice.title = draft.title.clone();
    notice.notice_type = draft.notice_type;
    notice.status = draft.status;
    notice.publish_start_at = draft.publish_start_at;
    notice.publish_end_at = draft.publish_end_at;
    notice.push_notification_scheduled_at = draft.push_notification_scheduled_at;
    notice.push_notification_icon_url = draft.push_notification_icon_url.clone();
    notice.list_image_url = draft.list_image_url.clone();
    notice.detail_image_url = draft.detail_image_url.clone();
    notice.short_description = draft.short_description.clone();
    notice.description = draft.description.clone();
    notice.redirect_url = draft.redirect_url.clone();
}

#[async_trait]
impl NoticeTx for MemoryNoticeTx {
    async fn insert(&mut self, draft: &NoticeDraft) -> Result<Notice, StoreError> {
        // ids are never reused, even when the transaction is rolled back
        let id = self.store.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let mut notice = Notice {
            id,
            created_at: now,
            updated_at: now,
            title: String::new(),
            notice_type: draft.notice_type,
            publish_start_at: None,
            publish_end_at: None,
            status: draft.status,
            push_notification_scheduled_at: None,
            push_notification_icon_url: None,
            list_image_url: String::new(),
            detail_image_url: String::new(),
            short_description: String::new(),
            description: String::new(),
            redirect_url: String::new(),
        };
        apply(&mut notice, draft);
        self.working.insert(id, notice.clone());
        self.writes.push(Staged::Put(notice.clone()));
        Ok(notice)
    }

    async fn update(&mut self, id: i64, draft: &NoticeDraft) -> Result<Option<Notice>, StoreError> {
        let Some(notice) = self.working.get_mut(&id) else {
            return Ok(None);
        };
        apply(notice, draft);
        notice.updated_at = Utc::now();
        let notice = notice.clone();
        self.writes.push(Staged::Put(notice.clone()));
        Ok(Some(notice))
    }

    async fn delete(&mut self, id: i64) -> Result<Option<Notice>, StoreError> {
        let removed = self.working.remove(&id);
        if removed.is_some() {
            self.writes.push(Staged::Remove(id));
        }
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut rows = this.store.rows.lock().await;
        for write in this.writes {
            match write {
                Staged::Put(notice) => {
                    rows.insert(notice.id, notice);
                }
                Staged::Remove(id) => {
                    rows.remove(&id);
                }
            }
        }
        Ok(())
    }
}
