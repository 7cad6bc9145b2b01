pub mod aws;
pub mod health;
pub mod icons;
pub mod metrics;
pub mod notices;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Uploads above this size are rejected before reaching the handlers.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(&state.config.media_dir);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Public feed
        .route("/notices", get(notices::list_published))
        // Admin
        .route("/admin/notices", get(notices::list_notices).post(notices::create_notice))
        .route("/admin/notices/icon", post(icons::upload_icon))
        .route(
            "/admin/notices/{id}",
            get(notices::get_notice)
                .put(notices::update_notice)
                .delete(notices::delete_notice),
        )
        .route("/admin/notices/{id}/schedule", get(notices::get_schedule))
        .route("/admin/aws/status", get(aws::aws_status))
        .nest_service("/media", media)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
