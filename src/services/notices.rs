//! Admin save/delete actions for notices.
//!
//! Saving writes the row and creates the push schedule inside one store
//! transaction: the transaction only commits once the scheduler accepted the
//! schedule. Deleting commits the row removal first and then cleans up the
//! schedule on a best-effort basis. An update that clears the push time
//! removes the previous schedule the same way.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::{NoticeStore, StoreError};
use crate::models::notice::{FieldErrors, Notice, NoticeFilter, NoticePage, NoticeRequest};
use crate::services::metrics::ORPHANED_SCHEDULES_COUNTER;
use crate::services::scheduler::{
    schedule_name, ScheduleCoordinator, ScheduleDescriptor, ScheduleError, ScheduleOutcome,
};

#[derive(Debug, thiserror::Error)]
pub enum NoticeError {
    #[error("invalid notice: {0}")]
    Validation(FieldErrors),
    #[error("notice not found")]
    NotFound,
    #[error("push notification could not be scheduled: {0}")]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedNotice {
    pub notice: Notice,
    pub schedule: ScheduleOutcome,
    pub message: String,
}

impl SavedNotice {
    fn new(notice: Notice, schedule: ScheduleOutcome, verb: &str) -> Self {
        let message = match schedule {
            ScheduleOutcome::Skipped => format!("Notice \"{}\" {verb}.", notice.title),
            ScheduleOutcome::Created | ScheduleOutcome::Replaced => format!(
                "Notice \"{}\" {verb}. Push notification scheduled as {}.",
                notice.title,
                schedule_name(notice.id)
            ),
        };
        Self { notice, schedule, message }
    }
}

pub struct NoticeService;

impl NoticeService {
    pub async fn get(store: &dyn NoticeStore, id: i64) -> Result<Notice, NoticeError> {
        store.get(id).await?.ok_or(NoticeError::NotFound)
    }

    pub async fn list(store: &dyn NoticeStore, filter: &NoticeFilter) -> Result<NoticePage, NoticeError> {
        Ok(store.list(filter).await?)
    }

    pub async fn list_published(
        store: &dyn NoticeStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notice>, NoticeError> {
        Ok(store.list_published(now).await?)
    }

    pub async fn create(
        store: &dyn NoticeStore,
        scheduler: &ScheduleCoordinator,
        req: &NoticeRequest,
        now: DateTime<Utc>,
    ) -> Result<SavedNotice, NoticeError> {
        let draft = req.validate(now).map_err(NoticeError::Validation)?;

        let mut tx = store.begin().await?;
        let notice = tx.insert(&draft).await?;
        // On error the transaction is dropped here, which rolls the insert back.
        let outcome = scheduler
            .on_save(notice.id, notice.push_notification_scheduled_at)
            .await?;
        tx.commit().await?;

        info!("Notice {} created", notice.id);
        Ok(SavedNotice::new(notice, outcome, "created"))
    }

    pub async fn update(
        store: &dyn NoticeStore,
        scheduler: &ScheduleCoordinator,
        id: i64,
        req: &NoticeRequest,
        now: DateTime<Utc>,
    ) -> Result<SavedNotice, NoticeError> {
        let draft = req.validate(now).map_err(NoticeError::Validation)?;
        let previous = store.get(id).await?.ok_or(NoticeError::NotFound)?;

        let mut tx = store.begin().await?;
        let notice = tx.update(id, &draft).await?.ok_or(NoticeError::NotFound)?;
        let outcome = scheduler
            .on_save(notice.id, notice.push_notification_scheduled_at)
            .await?;
        tx.commit().await?;
        info!("Notice {} updated", notice.id);

        if previous.push_notification_scheduled_at.is_some()
            && notice.push_notification_scheduled_at.is_none()
        {
            Self::remove_schedule(scheduler, id, true).await;
        }
        Ok(SavedNotice::new(notice, outcome, "updated"))
    }

    /// Remove the notice. The removal is committed whatever happens to the
    /// remote schedule afterwards.
    pub async fn delete(
        store: &dyn NoticeStore,
        scheduler: &ScheduleCoordinator,
        id: i64,
    ) -> Result<Notice, NoticeError> {
        let mut tx = store.begin().await?;
        let notice = tx.delete(id).await?.ok_or(NoticeError::NotFound)?;
        tx.commit().await?;
        info!("Notice {} deleted", id);

        Self::remove_schedule(scheduler, id, notice.push_notification_scheduled_at.is_some()).await;
        Ok(notice)
    }

    /// Best-effort removal of a schedule whose notice no longer wants it.
    /// Failures are logged and counted, never returned.
    async fn remove_schedule(scheduler: &ScheduleCoordinator, id: i64, had_push_time: bool) {
        match scheduler.on_delete(id).await {
            Ok(()) => {}
            Err(ScheduleError::NotConfigured) => {
                if had_push_time {
                    ORPHANED_SCHEDULES_COUNTER.inc();
                    warn!(
                        "Scheduler not configured, schedule {} may remain for notice {}",
                        schedule_name(id),
                        id
                    );
                }
            }
            Err(e) => {
                ORPHANED_SCHEDULES_COUNTER.inc();
                warn!(
                    "Could not delete schedule {} for notice {}, remove it manually: {}",
                    schedule_name(id),
                    id,
                    e
                );
            }
        }
    }

    pub async fn schedule_info(
        store: &dyn NoticeStore,
        scheduler: &ScheduleCoordinator,
        id: i64,
    ) -> Result<Option<ScheduleDescriptor>, NoticeError> {
        Self::get(store, id).await?;
        Ok(scheduler.schedule_info(id).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::db::MemoryNoticeStore;
    use crate::models::notice::{NoticeStatus, NoticeType};
    use crate::services::scheduler::testing::{target, Call, RecordingClient};
    use crate::services::scheduler::{at_expression, ScheduleRequest};

    fn request(title: &str, push_at: Option<DateTime<Utc>>) -> NoticeRequest {
        NoticeRequest {
            title: title.into(),
            notice_type: NoticeType::Urgent,
            status: NoticeStatus::Published,
            publish_start_at: None,
            publish_end_at: None,
            push_notification_scheduled_at: push_at,
            push_notification_icon_url: None,
            list_image_url: String::new(),
            detail_image_url: String::new(),
            short_description: String::new(),
            description: String::new(),
            redirect_url: String::new(),
        }
    }

    fn setup(client: RecordingClient) -> (MemoryNoticeStore, Arc<RecordingClient>, ScheduleCoordinator) {
        let client = Arc::new(client);
        let coordinator = ScheduleCoordinator::with_client(client.clone(), target());
        (MemoryNoticeStore::new(), client, coordinator)
    }

    #[tokio::test]
    async fn test_create_schedules_push_once() {
        let (store, client, scheduler) = setup(RecordingClient::default());
        let now = Utc::now();
        let at = now + Duration::minutes(10);

        let saved = NoticeService::create(&store, &scheduler, &request("Final", Some(at)), now)
            .await
            .unwrap();

        assert_eq!(saved.schedule, ScheduleOutcome::Created);
        assert_eq!(
            client.calls(),
            vec![Call::Create(ScheduleRequest {
                name: format!("notice_{}", saved.notice.id),
                expression: at_expression(at),
                target: target(),
                input: format!(r#"{{"notice_id":{}}}"#, saved.notice.id),
            })]
        );
        assert!(store.get(saved.notice.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_too_soon_is_rejected_without_call() {
        let (store, client, scheduler) = setup(RecordingClient::default());
        let now = Utc::now();

        let err = NoticeService::create(
            &store,
            &scheduler,
            &request("Soon", Some(now + Duration::minutes(2))),
            now,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, NoticeError::Validation(_)));
        assert!(client.calls().is_empty());
        assert!(store.find_by_title("Soon").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_rolls_back_on_schedule_failure() {
        let (store, _client, scheduler) = setup(RecordingClient::failing_create(ScheduleError::Remote {
            code: "AccessDeniedException".into(),
            message: "not authorized".into(),
        }));
        let now = Utc::now();

        let err = NoticeService::create(
            &store,
            &scheduler,
            &request("Rolled back", Some(now + Duration::hours(1))),
            now,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("not authorized"));
        assert!(store.find_by_title("Rolled back").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_unconfigured_with_push_time_rolls_back() {
        let store = MemoryNoticeStore::new();
        let scheduler = ScheduleCoordinator::Unconfigured { missing: vec!["AWS_SQS_QUEUE_ARN"] };
        let now = Utc::now();

        let err = NoticeService::create(
            &store,
            &scheduler,
            &request("No AWS", Some(now + Duration::hours(1))),
            now,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, NoticeError::Schedule(ScheduleError::NotConfigured)));
        assert!(store.find_by_title("No AWS").await.unwrap().is_empty());

        let saved = NoticeService::create(&store, &scheduler, &request("No push", None), now)
            .await
            .unwrap();
        assert_eq!(saved.schedule, ScheduleOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_update_failure_keeps_previous_row() {
        let (store, client, scheduler) = setup(RecordingClient::default());
        let now = Utc::now();
        let saved = NoticeService::create(&store, &scheduler, &request("Before", None), now)
            .await
            .unwrap();

        *client.create_error.lock().unwrap() = Some(ScheduleError::Transport("timeout".into()));
        let result = NoticeService::update(
            &store,
            &scheduler,
            saved.notice.id,
            &request("After", Some(now + Duration::hours(2))),
            now,
        )
        .await;

        assert!(matches!(result, Err(NoticeError::Schedule(ScheduleError::Transport(_)))));
        let row = store.get(saved.notice.id).await.unwrap().unwrap();
        assert_eq!(row.title, "Before");
        assert_eq!(row.push_notification_scheduled_at, None);
    }

    #[tokio::test]
    async fn test_update_resave_replaces_schedule() {
        let (store, client, scheduler) = setup(RecordingClient::default());
        let now = Utc::now();
        let saved = NoticeService::create(
            &store,
            &scheduler,
            &request("Twice", Some(now + Duration::hours(1))),
            now,
        )
        .await
        .unwrap();

        let updated = NoticeService::update(
            &store,
            &scheduler,
            saved.notice.id,
            &request("Twice", Some(now + Duration::hours(3))),
            now,
        )
        .await
        .unwrap();

        assert_eq!(updated.schedule, ScheduleOutcome::Replaced);
        assert!(matches!(client.calls().last(), Some(Call::Update(_))));
    }

    #[tokio::test]
    async fn test_update_clearing_push_time_removes_schedule() {
        let (store, client, scheduler) = setup(RecordingClient::default());
        let now = Utc::now();
        let saved = NoticeService::create(
            &store,
            &scheduler,
            &request("Called off", Some(now + Duration::hours(1))),
            now,
        )
        .await
        .unwrap();
        let name = format!("notice_{}", saved.notice.id);

        let updated = NoticeService::update(&store, &scheduler, saved.notice.id, &request("Called off", None), now)
            .await
            .unwrap();

        assert_eq!(updated.schedule, ScheduleOutcome::Skipped);
        assert_eq!(client.calls().last(), Some(&Call::Delete(name)));
        assert!(client.existing.lock().unwrap().is_empty());

        // no push time before or after: nothing to remove
        NoticeService::update(&store, &scheduler, saved.notice.id, &request("Still off", None), now)
            .await
            .unwrap();
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_update_clearing_push_time_survives_remote_failure() {
        let (store, _client, scheduler) = setup(RecordingClient::failing_delete(ScheduleError::Transport(
            "connection reset".into(),
        )));
        let now = Utc::now();
        let saved = NoticeService::create(
            &store,
            &scheduler,
            &request("Quiet", Some(now + Duration::hours(1))),
            now,
        )
        .await
        .unwrap();
        let before = ORPHANED_SCHEDULES_COUNTER.get();

        NoticeService::update(&store, &scheduler, saved.notice.id, &request("Quiet", None), now)
            .await
            .unwrap();

        let row = store.get(saved.notice.id).await.unwrap().unwrap();
        assert_eq!(row.push_notification_scheduled_at, None);
        assert!(ORPHANED_SCHEDULES_COUNTER.get() >= before + 1.0);
    }

    #[tokio::test]
    async fn test_update_missing_notice() {
        let (store, _client, scheduler) = setup(RecordingClient::default());
        let result = NoticeService::update(&store, &scheduler, 999, &request("x", None), Utc::now()).await;
        assert!(matches!(result, Err(NoticeError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_survives_remote_failure() {
        let (store, _client, scheduler) = setup(RecordingClient::failing_delete(ScheduleError::Remote {
            code: "InternalServerException".into(),
            message: "boom".into(),
        }));
        let now = Utc::now();
        let saved = NoticeService::create(
            &store,
            &scheduler,
            &request("Doomed", Some(now + Duration::hours(1))),
            now,
        )
        .await
        .unwrap();

        NoticeService::delete(&store, &scheduler, saved.notice.id).await.unwrap();
        assert!(store.get(saved.notice.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_without_schedule_succeeds() {
        let (store, client, scheduler) = setup(RecordingClient::default());
        let saved = NoticeService::create(&store, &scheduler, &request("Plain", None), Utc::now())
            .await
            .unwrap();

        NoticeService::delete(&store, &scheduler, saved.notice.id).await.unwrap();

        assert!(store.get(saved.notice.id).await.unwrap().is_none());
        assert_eq!(client.calls(), vec![Call::Delete(format!("notice_{}", saved.notice.id))]);
        assert!(matches!(
            NoticeService::delete(&store, &scheduler, saved.notice.id).await,
            Err(NoticeError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_unconfigured_with_push_time_counts_orphan() {
        let store = MemoryNoticeStore::new();
        let configured = ScheduleCoordinator::with_client(Arc::new(RecordingClient::default()), target());
        let now = Utc::now();
        let saved = NoticeService::create(
            &store,
            &configured,
            &request("Left behind", Some(now + Duration::hours(1))),
            now,
        )
        .await
        .unwrap();

        let unconfigured = ScheduleCoordinator::Unconfigured { missing: vec!["AWS_SQS_QUEUE_ARN"] };
        let before = ORPHANED_SCHEDULES_COUNTER.get();

        let deleted = NoticeService::delete(&store, &unconfigured, saved.notice.id).await.unwrap();

        assert_eq!(deleted.id, saved.notice.id);
        assert!(store.get(saved.notice.id).await.unwrap().is_none());
        assert!(ORPHANED_SCHEDULES_COUNTER.get() >= before + 1.0);
    }

    #[tokio::test]
    async fn test_delete_unconfigured_without_push_time_is_quiet() {
        let store = MemoryNoticeStore::new();
        let scheduler = ScheduleCoordinator::Unconfigured { missing: vec!["AWS_SQS_QUEUE_ARN"] };
        let saved = NoticeService::create(&store, &scheduler, &request("Plain", None), Utc::now())
            .await
            .unwrap();

        NoticeService::delete(&store, &scheduler, saved.notice.id).await.unwrap();
        assert!(store.get(saved.notice.id).await.unwrap().is_none());
    }
}
