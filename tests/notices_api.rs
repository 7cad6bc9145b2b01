use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use notices_api::{
    config::{AwsConfig, Config},
    db::{MemoryNoticeStore, NoticeStore},
    routes,
    services::{
        icons::IconStorage,
        scheduler::{
            at_expression, ScheduleClient, ScheduleCoordinator, ScheduleDescriptor, ScheduleError,
            ScheduleRequest, ScheduleTarget,
        },
    },
    AppState,
};

const ADMIN_KEY: &str = "test-admin-key";

#[derive(Default)]
struct FakeScheduler {
    created: Mutex<Vec<ScheduleRequest>>,
    deleted: Mutex<Vec<String>>,
    fail_create: bool,
    fail_delete: bool,
}

#[async_trait]
impl ScheduleClient for FakeScheduler {
    async fn create_schedule(&self, request: &ScheduleRequest) -> Result<(), ScheduleError> {
        if self.fail_create {
            return Err(ScheduleError::Remote {
                code: "ValidationException".into(),
                message: "The provided execution role is invalid".into(),
            });
        }
        self.created.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn update_schedule(&self, request: &ScheduleRequest) -> Result<(), ScheduleError> {
        self.created.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn delete_schedule(&self, name: &str) -> Result<(), ScheduleError> {
        self.deleted.lock().unwrap().push(name.to_string());
        if self.fail_delete {
            return Err(ScheduleError::Transport("connection reset".into()));
        }
        let mut created = self.created.lock().unwrap();
        let before = created.len();
        created.retain(|r| r.name != name);
        if created.len() == before {
            return Err(ScheduleError::NotFound);
        }
        Ok(())
    }

    async fn get_schedule(&self, name: &str) -> Result<ScheduleDescriptor, ScheduleError> {
        let created = self.created.lock().unwrap();
        let request = created
            .iter()
            .find(|r| r.name == name)
            .ok_or(ScheduleError::NotFound)?;
        Ok(ScheduleDescriptor {
            name: request.name.clone(),
            expression: Some(request.expression.clone()),
            state: Some("ENABLED".into()),
            target_arn: Some(request.target.queue_arn.clone()),
            input: Some(request.input.clone()),
            action_after_completion: Some("DELETE".into()),
        })
    }
}

fn app(fake: Arc<FakeScheduler>, store: MemoryNoticeStore) -> Router {
    let media_dir = std::env::temp_dir().join("notices-api-tests");
    let config = Config {
        database_url: None,
        host: "127.0.0.1".into(),
        port: 0,
        admin_api_key: ADMIN_KEY.into(),
        aws: AwsConfig::default(),
        media_dir: media_dir.to_string_lossy().into_owned(),
        media_base_url: "http://localhost/media".into(),
    };
    let target = ScheduleTarget {
        queue_arn: "arn:aws:sqs:ap-northeast-1:123456789012:push.fifo".into(),
        role_arn: "arn:aws:iam::123456789012:role/scheduler".into(),
        message_group_id: "notices".into(),
    };
    let state = AppState {
        notices: Arc::new(store),
        scheduler: Arc::new(ScheduleCoordinator::with_client(fake, target)),
        icons: Arc::new(IconStorage::from_config(&config)),
        config: Arc::new(config),
    };
    routes::router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Admin-Key", ADMIN_KEY);
    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn notice_body(title: &str, push_at: Option<DateTime<Utc>>) -> Value {
    json!({
        "title": title,
        "notice_type": "event",
        "status": "published",
        "push_notification_scheduled_at": push_at.map(|t| t.to_rfc3339()),
        "short_description": "Quarter finals",
        "description": "Livestream and analysis available after the match.",
    })
}

#[tokio::test]
async fn create_with_push_time_schedules_notification() {
    let fake = Arc::new(FakeScheduler::default());
    let app = app(fake.clone(), MemoryNoticeStore::new());
    let at = Utc::now() + Duration::minutes(10);

    let (status, body) = send(&app, "POST", "/admin/notices", Some(notice_body("Cup final", Some(at)))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["schedule"], "created");
    let id = body["notice"]["id"].as_i64().unwrap();

    let created = fake.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, format!("notice_{id}"));
    assert_eq!(created[0].expression, at_expression(at));
    assert_eq!(created[0].input, format!(r#"{{"notice_id":{id}}}"#));

    let (status, info) = send(&app, "GET", &format!("/admin/notices/{id}/schedule"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["name"], format!("notice_{id}"));
}

#[tokio::test]
async fn push_time_too_soon_is_rejected() {
    let fake = Arc::new(FakeScheduler::default());
    let store = MemoryNoticeStore::new();
    let app = app(fake.clone(), store.clone());
    let at = Utc::now() + Duration::minutes(2);

    let (status, body) = send(&app, "POST", "/admin/notices", Some(notice_body("Too soon", Some(at)))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"]["push_notification_scheduled_at"].is_string());
    assert!(fake.created.lock().unwrap().is_empty());

    let (_, page) = send(&app, "GET", "/admin/notices?q=Too%20soon", None).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn scheduler_failure_rolls_back_notice() {
    let fake = Arc::new(FakeScheduler {
        fail_create: true,
        ..Default::default()
    });
    let store = MemoryNoticeStore::new();
    let app = app(fake, store.clone());
    let at = Utc::now() + Duration::hours(1);

    let (status, body) = send(&app, "POST", "/admin/notices", Some(notice_body("Rolled back", Some(at)))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("execution role is invalid"));
    assert!(store.find_by_title("Rolled back").await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_notice_even_if_schedule_cleanup_fails() {
    let fake = Arc::new(FakeScheduler {
        fail_delete: true,
        ..Default::default()
    });
    let app = app(fake.clone(), MemoryNoticeStore::new());
    let at = Utc::now() + Duration::hours(1);

    let (_, body) = send(&app, "POST", "/admin/notices", Some(notice_body("Cancelled", Some(at)))).await;
    let id = body["notice"]["id"].as_i64().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/admin/notices/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fake.deleted.lock().unwrap().clone(), vec![format!("notice_{id}")]);

    let (status, _) = send(&app, "GET", &format!("/admin/notices/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_without_schedule_succeeds() {
    let fake = Arc::new(FakeScheduler::default());
    let app = app(fake.clone(), MemoryNoticeStore::new());

    let (_, body) = send(&app, "POST", "/admin/notices", Some(notice_body("No push", None))).await;
    assert_eq!(body["schedule"], "skipped");
    let id = body["notice"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, "DELETE", &format!("/admin/notices/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, info) = send(&app, "GET", &format!("/admin/notices/{id}/schedule"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(info["error"], "not found");
}

#[tokio::test]
async fn admin_routes_require_key() {
    let app = app(Arc::new(FakeScheduler::default()), MemoryNoticeStore::new());
    let response = app
        .oneshot(Request::builder().uri("/admin/notices").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_feed_lists_published_notices_only() {
    let app = app(Arc::new(FakeScheduler::default()), MemoryNoticeStore::new());

    send(&app, "POST", "/admin/notices", Some(notice_body("Live", None))).await;
    let mut draft = notice_body("Hidden", None);
    draft["status"] = json!("draft");
    send(&app, "POST", "/admin/notices", Some(draft)).await;

    let (status, feed) = send(&app, "GET", "/notices", None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Live"]);
}

#[tokio::test]
async fn health_reports_in_memory_store() {
    let app = app(Arc::new(FakeScheduler::default()), MemoryNoticeStore::new());

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "memory");
    assert_eq!(body["integrations"]["scheduler"], true);
    assert_eq!(body["integrations"]["icon_storage"], "local");
}

#[tokio::test]
async fn aws_status_checks_icon_storage() {
    let app = app(Arc::new(FakeScheduler::default()), MemoryNoticeStore::new());

    let (status, body) = send(&app, "GET", "/admin/aws/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage_check"]["backend"], "local");
    assert_eq!(body["storage_check"]["ok"], true);
    assert_eq!(body["settings"]["AWS_ACCESS_KEY_ID"], Value::Null);
}

#[tokio::test]
async fn malformed_redirect_url_is_rejected() {
    let fake = Arc::new(FakeScheduler::default());
    let app = app(fake.clone(), MemoryNoticeStore::new());
    let mut body = notice_body("Bad link", None);
    body["redirect_url"] = json!("https://exa mple.com/<script>");

    let (status, body) = send(&app, "POST", "/admin/notices", Some(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"]["redirect_url"].is_string());
}

#[tokio::test]
async fn huge_page_number_returns_empty_page() {
    let app = app(Arc::new(FakeScheduler::default()), MemoryNoticeStore::new());
    send(&app, "POST", "/admin/notices", Some(notice_body("Only one", None))).await;

    let (status, page) = send(&app, "GET", "/admin/notices?page=9223372036854775807", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"].as_array().unwrap().len(), 0);
}
