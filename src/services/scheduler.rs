use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::{SchedulerConfig, SchedulerSettings};
use crate::services::eventbridge::EventBridgeScheduleClient;
use crate::services::metrics::SCHEDULE_OPERATIONS_COUNTER;

/// Remote schedule name for a notice. One schedule per notice id.
pub fn schedule_name(notice_id: i64) -> String {
    format!("notice_{notice_id}")
}

/// Fire-once expression at `at`, normalised to UTC and truncated to seconds.
pub fn at_expression(at: DateTime<Utc>) -> String {
    format!("at({})", at.format("%Y-%m-%dT%H:%M:%S"))
}

/// Message delivered to the queue when the schedule fires.
pub fn payload(notice_id: i64) -> String {
    json!({ "notice_id": notice_id }).to_string()
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("EventBridge Scheduler is not configured")]
    NotConfigured,
    #[error("schedule not found")]
    NotFound,
    #[error("schedule already exists: {0}")]
    Conflict(String),
    #[error("EventBridge error: {code} - {message}")]
    Remote { code: String, message: String },
    #[error("EventBridge request failed: {0}")]
    Transport(String),
}

/// Where a schedule delivers its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleTarget {
    pub queue_arn: String,
    pub role_arn: String,
    pub message_group_id: String,
}

impl From<&SchedulerSettings> for ScheduleTarget {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            queue_arn: settings.queue_arn.clone(),
            role_arn: settings.role_arn.clone(),
            message_group_id: settings.message_group_id.clone(),
        }
    }
}

/// Parameters of a one-shot schedule. The schedule always runs at the exact
/// time (no flexible window) and removes itself after firing.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub name: String,
    pub expression: String,
    pub target: ScheduleTarget,
    pub input: String,
}

impl ScheduleRequest {
    pub fn for_notice(notice_id: i64, at: DateTime<Utc>, target: &ScheduleTarget) -> Self {
        Self {
            name: schedule_name(notice_id),
            expression: at_expression(at),
            target: target.clone(),
            input: payload(notice_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleDescriptor {
    pub name: String,
    pub expression: Option<String>,
    pub state: Option<String>,
    pub target_arn: Option<String>,
    pub input: Option<String>,
    pub action_after_completion: Option<String>,
}

#[async_trait]
pub trait ScheduleClient: Send + Sync {
    async fn create_schedule(&self, request: &ScheduleRequest) -> Result<(), ScheduleError>;

    async fn update_schedule(&self, request: &ScheduleRequest) -> Result<(), ScheduleError>;

    async fn delete_schedule(&self, name: &str) -> Result<(), ScheduleError>;

    async fn get_schedule(&self, name: &str) -> Result<ScheduleDescriptor, ScheduleError>;
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// No push time set, nothing sent to the scheduler.
    Skipped,
    Created,
    /// A schedule with the same name existed and was overwritten.
    Replaced,
}

/// Keeps the remote fire-once schedule of each notice in step with the notice.
pub enum ScheduleCoordinator {
    Active {
        client: Arc<dyn ScheduleClient>,
        target: ScheduleTarget,
    },
    Unconfigured {
        missing: Vec<&'static str>,
    },
}

impl ScheduleCoordinator {
    /// Build from configuration, creating the EventBridge client when every
    /// required setting is present.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        match config {
            SchedulerConfig::Configured(settings) => Self::Active {
                client: Arc::new(EventBridgeScheduleClient::new(settings)),
                target: ScheduleTarget::from(settings),
            },
            SchedulerConfig::Unconfigured { missing } => Self::Unconfigured {
                missing: missing.clone(),
            },
        }
    }

    pub fn with_client(client: Arc<dyn ScheduleClient>, target: ScheduleTarget) -> Self {
        Self::Active { client, target }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Names of the settings that keep the scheduler disabled.
    pub fn missing_settings(&self) -> &[&'static str] {
        match self {
            Self::Active { .. } => &[],
            Self::Unconfigured { missing } => missing,
        }
    }

    /// Create the schedule for a notice that was just written.
    ///
    /// Any error must abort the surrounding save so that no committed notice
    /// claims a push time without a matching schedule.
    pub async fn on_save(
        &self,
        notice_id: i64,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let Some(at) = scheduled_at else {
            return Ok(ScheduleOutcome::Skipped);
        };
        let (client, target) = match self {
            Self::Active { client, target } => (client, target),
            Self::Unconfigured { .. } => {
                SCHEDULE_OPERATIONS_COUNTER.with_label_values(&["create", "not_configured"]).inc();
                warn!("EventBridge Scheduler not configured, cannot schedule notice {}", notice_id);
                return Err(ScheduleError::NotConfigured);
            }
        };

        let request = ScheduleRequest::for_notice(notice_id, at, target);
        let result = match client.create_schedule(&request).await {
            Ok(()) => Ok(ScheduleOutcome::Created),
            Err(ScheduleError::Conflict(_)) => {
                info!("Schedule {} already exists, updating it", request.name);
                client
                    .update_schedule(&request)
                    .await
                    .map(|()| ScheduleOutcome::Replaced)
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                SCHEDULE_OPERATIONS_COUNTER.with_label_values(&["create", "ok"]).inc();
                info!(
                    "Push schedule {} {:?} for {} (notice {})",
                    request.name, outcome, request.expression, notice_id
                );
            }
            Err(e) => {
                SCHEDULE_OPERATIONS_COUNTER.with_label_values(&["create", "error"]).inc();
                error!("Failed to schedule push for notice {}: {}", notice_id, e);
            }
        }
        result
    }

    /// Remove the schedule of a deleted notice. A schedule that no longer
    /// exists (already fired, never created) counts as removed.
    pub async fn on_delete(&self, notice_id: i64) -> Result<(), ScheduleError> {
        let Self::Active { client, .. } = self else {
            SCHEDULE_OPERATIONS_COUNTER.with_label_values(&["delete", "not_configured"]).inc();
            return Err(ScheduleError::NotConfigured);
        };

        let name = schedule_name(notice_id);
        match client.delete_schedule(&name).await {
            Ok(()) => {
                SCHEDULE_OPERATIONS_COUNTER.with_label_values(&["delete", "ok"]).inc();
                info!("Deleted push schedule {}", name);
                Ok(())
            }
            Err(ScheduleError::NotFound) => {
                SCHEDULE_OPERATIONS_COUNTER.with_label_values(&["delete", "not_found"]).inc();
                info!("Push schedule {} does not exist, nothing to delete", name);
                Ok(())
            }
            Err(e) => {
                SCHEDULE_OPERATIONS_COUNTER.with_label_values(&["delete", "error"]).inc();
                Err(e)
            }
        }
    }

    /// Current remote schedule of a notice, if any.
    pub async fn schedule_info(&self, notice_id: i64) -> Option<ScheduleDescriptor> {
        let Self::Active { client, .. } = self else {
            debug!("EventBridge Scheduler not configured, no schedule info for notice {}", notice_id);
            return None;
        };

        match client.get_schedule(&schedule_name(notice_id)).await {
            Ok(descriptor) => Some(descriptor),
            Err(ScheduleError::NotFound) => None,
            Err(e) => {
                error!("Failed to read push schedule for notice {}: {}", notice_id, e);
                None
            }
        }
    }
}
