use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::AppState;

pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// Extractor that validates the `X-Admin-Key` header against `config.admin_api_key`.
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Missing X-Admin-Key header" })),
            ))?;

        if key != state.config.admin_api_key {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid admin key" })),
            ));
        }

        Ok(AdminAuth)
    }
}
