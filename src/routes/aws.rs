use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    config::AwsConfig,
    middleware::admin::AdminAuth,
    services::aws::mask,
    AppState,
};

/// Per-setting report with secrets masked. Shared with the schedule-tool binary.
pub fn settings_report(aws: &AwsConfig) -> Vec<(&'static str, Option<String>)> {
    vec![
        ("AWS_ACCESS_KEY_ID", aws.access_key_id.clone()),
        ("AWS_SECRET_ACCESS_KEY", aws.secret_access_key.as_deref().map(mask)),
        ("AWS_S3_REGION_NAME", Some(aws.region.clone())),
        ("AWS_EVENTBRIDGE_SCHEDULER_ROLE_ARN", aws.scheduler_role_arn.clone()),
        ("AWS_SQS_QUEUE_ARN", aws.sqs_queue_arn.clone()),
        ("AWS_SQS_MESSAGE_GROUP_ID", Some(aws.sqs_message_group_id.clone())),
        ("AWS_STORAGE_BUCKET_NAME", aws.storage_bucket_name.clone()),
    ]
}

/// GET /admin/aws/status: masked settings, scheduler state and a live check
/// of the icon storage backend.
pub async fn aws_status(State(state): State<AppState>, _auth: AdminAuth) -> Json<Value> {
    let settings: serde_json::Map<String, Value> = settings_report(&state.config.aws)
        .into_iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    let storage_check = state.icons.check_access().await;

    Json(json!({
        "settings": settings,
        "scheduler": {
            "configured": state.scheduler.is_configured(),
            "missing": state.scheduler.missing_settings(),
        },
        "icon_storage": state.icons.backend(),
        "storage_check": storage_check,
    }))
}
