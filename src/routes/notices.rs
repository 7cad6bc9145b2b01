use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    middleware::admin::AdminAuth,
    models::notice::{NoticeFilter, NoticeRequest},
    services::notices::{NoticeError, NoticeService},
    AppState,
};

fn error_response(e: NoticeError) -> (StatusCode, Json<Value>) {
    match e {
        NoticeError::Validation(fields) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "Invalid notice", "fields": fields })),
        ),
        NoticeError::NotFound => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))),
        NoticeError::Schedule(_) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        ),
        NoticeError::Store(_) => {
            tracing::error!("Notice storage error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// GET /notices: public feed of published notices inside their window.
pub async fn list_published(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    NoticeService::list_published(state.notices.as_ref(), Utc::now())
        .await
        .map(|items| Json(json!(items)))
        .map_err(error_response)
}

pub async fn list_notices(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Query(filter): Query<NoticeFilter>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    NoticeService::list(state.notices.as_ref(), &filter)
        .await
        .map(|page| Json(json!(page)))
        .map_err(error_response)
}

pub async fn get_notice(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    NoticeService::get(state.notices.as_ref(), id)
        .await
        .map(|notice| Json(json!(notice)))
        .map_err(error_response)
}

pub async fn create_notice(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Json(body): Json<NoticeRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    NoticeService::create(state.notices.as_ref(), &state.scheduler, &body, Utc::now())
        .await
        .map(|saved| (StatusCode::CREATED, Json(json!(saved))))
        .map_err(error_response)
}

pub async fn update_notice(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
    Json(body): Json<NoticeRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    NoticeService::update(state.notices.as_ref(), &state.scheduler, id, &body, Utc::now())
        .await
        .map(|saved| Json(json!(saved)))
        .map_err(error_response)
}

pub async fn delete_notice(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    NoticeService::delete(state.notices.as_ref(), &state.scheduler, id)
        .await
        .map(|notice| {
            Json(json!({ "ok": true, "message": format!("Notice \"{}\" deleted.", notice.title) }))
        })
        .map_err(error_response)
}

/// GET /admin/notices/{id}/schedule: remote schedule descriptor, or null.
pub async fn get_schedule(
    State(state): State<AppState>,
    _auth: AdminAuth,
    Path(id): Path<i64>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    NoticeService::schedule_info(state.notices.as_ref(), &state.scheduler, id)
        .await
        .map(|info| Json(json!(info)))
        .map_err(error_response)
}
