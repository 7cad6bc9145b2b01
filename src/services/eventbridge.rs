use async_trait::async_trait;
use aws_sdk_scheduler::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_scheduler::operation::create_schedule::builders::CreateScheduleFluentBuilder;
use aws_sdk_scheduler::operation::update_schedule::builders::UpdateScheduleFluentBuilder;
use aws_sdk_scheduler::types::{
    ActionAfterCompletion, FlexibleTimeWindow, FlexibleTimeWindowMode, SqsParameters, Target,
};

use crate::config::SchedulerSettings;
use crate::services::aws;
use crate::services::scheduler::{ScheduleClient, ScheduleDescriptor, ScheduleError, ScheduleRequest};

/// Timezone of every `at()` expression sent to the scheduler.
const EXPRESSION_TIMEZONE: &str = "UTC";

/// [`ScheduleClient`] backed by Amazon EventBridge Scheduler.
#[derive(Debug, Clone)]
pub struct EventBridgeScheduleClient {
    client: aws_sdk_scheduler::Client,
}

impl EventBridgeScheduleClient {
    pub fn new(settings: &SchedulerSettings) -> Self {
        let sdk = aws::sdk_config(
            &settings.access_key_id,
            &settings.secret_access_key,
            &settings.region,
        );
        Self {
            client: aws_sdk_scheduler::Client::new(&sdk),
        }
    }

    fn create_request(&self, request: &ScheduleRequest) -> Result<CreateScheduleFluentBuilder, ScheduleError> {
        Ok(self
            .client
            .create_schedule()
            .name(&request.name)
            .schedule_expression(&request.expression)
            .schedule_expression_timezone(EXPRESSION_TIMEZONE)
            .action_after_completion(ActionAfterCompletion::Delete)
            .flexible_time_window(exact_time()?)
            .target(build_target(request)?))
    }

    fn update_request(&self, request: &ScheduleRequest) -> Result<UpdateScheduleFluentBuilder, ScheduleError> {
        Ok(self
            .client
            .update_schedule()
            .name(&request.name)
            .schedule_expression(&request.expression)
            .schedule_expression_timezone(EXPRESSION_TIMEZONE)
            .action_after_completion(ActionAfterCompletion::Delete)
            .flexible_time_window(exact_time()?)
            .target(build_target(request)?))
    }
}

fn classify<E>(err: SdkError<E>) -> ScheduleError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(ctx) => {
            let service_err = ctx.err();
            let message = service_err.message().unwrap_or_default().to_string();
            match service_err.code() {
                Some("ResourceNotFoundException") => ScheduleError::NotFound,
                Some("ConflictException") => ScheduleError::Conflict(message),
                code => ScheduleError::Remote {
                    code: code.unwrap_or("Unknown").to_string(),
                    message,
                },
            }
        }
        _ => ScheduleError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

fn build_target(request: &ScheduleRequest) -> Result<Target, ScheduleError> {
    Target::builder()
        .arn(&request.target.queue_arn)
        .role_arn(&request.target.role_arn)
        .sqs_parameters(
            SqsParameters::builder()
                .message_group_id(&request.target.message_group_id)
                .build(),
        )
        .input(&request.input)
        .build()
        .map_err(|e| ScheduleError::Transport(e.to_string()))
}

fn exact_time() -> Result<FlexibleTimeWindow, ScheduleError> {
    FlexibleTimeWindow::builder()
        .mode(FlexibleTimeWindowMode::Off)
        .build()
        .map_err(|e| ScheduleError::Transport(e.to_string()))
}

#[async_trait]
impl ScheduleClient for EventBridgeScheduleClient {
    async fn create_schedule(&self, request: &ScheduleRequest) -> Result<(), ScheduleError> {
        self.create_request(request)?.send().await.map_err(classify)?;
        Ok(())
    }

    async fn update_schedule(&self, request: &ScheduleRequest) -> Result<(), ScheduleError> {
        self.update_request(request)?.send().await.map_err(classify)?;
        Ok(())
    }

    async fn delete_schedule(&self, name: &str) -> Result<(), ScheduleError> {
        self.client
            .delete_schedule()
            .name(name)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn get_schedule(&self, name: &str) -> Result<ScheduleDescriptor, ScheduleError> {
        let out = self
            .client
            .get_schedule()
            .name(name)
            .send()
            .await
            .map_err(classify)?;

        Ok(ScheduleDescriptor {
            name: out.name().unwrap_or(name).to_string(),
            expression: out.schedule_expression().map(str::to_string),
            state: out.state().map(|s| s.as_str().to_string()),
            target_arn: out.target().map(|t| t.arn().to_string()),
            input: out.target().and_then(|t| t.input()).map(str::to_string),
            action_after_completion: out
                .action_after_completion()
                .map(|a| a.as_str().to_string()),
        })
    }
}
