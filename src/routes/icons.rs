use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{middleware::admin::AdminAuth, services::icons::IconStorageError, AppState};

/// POST /admin/notices/icon: multipart upload, field `file`. Returns the URL
/// to put into `push_notification_icon_url`.
pub async fn upload_icon(
    State(state): State<AppState>,
    _auth: AdminAuth,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let bad_request = |msg: String| (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })));

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("icon").to_string();
        let data = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;

        return match state.icons.store(&filename, data).await {
            Ok(url) => Ok((StatusCode::CREATED, Json(json!({ "url": url })))),
            Err(IconStorageError::Empty) => Err(bad_request("Uploaded file is empty".into())),
            Err(e @ IconStorageError::UnsupportedType) => Err(bad_request(e.to_string())),
            Err(e) => {
                tracing::error!("Icon upload failed: {}", e);
                Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": format!("Icon upload failed: {e}") })),
                ))
            }
        };
    }

    Err(bad_request("No file field in upload".into()))
}
