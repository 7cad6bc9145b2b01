use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

/// GET /health: store ping plus which optional integrations are active.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let integrations = json!({
        "scheduler": state.scheduler.is_configured(),
        "icon_storage": state.icons.backend(),
    });
    let store = state.notices.backend();
    match state.notices.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "store": store, "integrations": integrations })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "store": store,
                "error": e.to_string(),
                "integrations": integrations,
            })),
        ),
    }
}
