use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means notices are kept in memory and lost on restart.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub admin_api_key: String,
    pub aws: AwsConfig,
    pub media_dir: String,
    pub media_base_url: String,
}

/// Raw AWS settings. Every value is optional here; [`AwsConfig::scheduler`]
/// and [`AwsConfig::s3`] decide whether a feature is usable.
#[derive(Debug, Clone, Default)]
pub struct AwsConfig {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
    pub scheduler_role_arn: Option<String>,
    pub sqs_queue_arn: Option<String>,
    pub sqs_message_group_id: String,
    pub use_s3: bool,
    pub storage_bucket_name: Option<String>,
}

/// Everything the push-notification scheduler needs to create a schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub role_arn: String,
    pub queue_arn: String,
    pub message_group_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerConfig {
    Configured(SchedulerSettings),
    Unconfigured { missing: Vec<&'static str> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct S3Settings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub bucket: String,
}

impl AwsConfig {
    pub fn scheduler(&self) -> SchedulerConfig {
        let required = [
            ("AWS_ACCESS_KEY_ID", &self.access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &self.secret_access_key),
            ("AWS_EVENTBRIDGE_SCHEDULER_ROLE_ARN", &self.scheduler_role_arn),
            ("AWS_SQS_QUEUE_ARN", &self.sqs_queue_arn),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();

        match (
            &self.access_key_id,
            &self.secret_access_key,
            &self.scheduler_role_arn,
            &self.sqs_queue_arn,
        ) {
            (Some(access), Some(secret), Some(role), Some(queue)) => {
                SchedulerConfig::Configured(SchedulerSettings {
                    access_key_id: access.clone(),
                    secret_access_key: secret.clone(),
                    region: self.region.clone(),
                    role_arn: role.clone(),
                    queue_arn: queue.clone(),
                    message_group_id: self.sqs_message_group_id.clone(),
                })
            }
            _ => SchedulerConfig::Unconfigured { missing },
        }
    }

    /// S3 settings when `USE_S3` is on and the bucket and credentials are set.
    pub fn s3(&self) -> Option<S3Settings> {
        if !self.use_s3 {
            return None;
        }
        Some(S3Settings {
            access_key_id: self.access_key_id.clone()?,
            secret_access_key: self.secret_access_key.clone()?,
            region: self.region.clone(),
            bucket: self.storage_bucket_name.clone()?,
        })
    }

    pub fn from_env() -> Self {
        Self {
            access_key_id: optional("AWS_ACCESS_KEY_ID"),
            secret_access_key: optional("AWS_SECRET_ACCESS_KEY"),
            region: optional("AWS_S3_REGION_NAME").unwrap_or_else(|| "ap-northeast-1".into()),
            scheduler_role_arn: optional("AWS_EVENTBRIDGE_SCHEDULER_ROLE_ARN"),
            sqs_queue_arn: optional("AWS_SQS_QUEUE_ARN"),
            sqs_message_group_id: optional("AWS_SQS_MESSAGE_GROUP_ID")
                .unwrap_or_else(|| "notices".into()),
            use_s3: optional("USE_S3")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            storage_bucket_name: optional("AWS_STORAGE_BUCKET_NAME"),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: optional("DATABASE_URL"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            admin_api_key: required("ADMIN_API_KEY")?,
            aws: AwsConfig::from_env(),
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".into()),
            media_base_url: env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/media".into()),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    optional(key).ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> AwsConfig {
        AwsConfig {
            access_key_id: Some("AKIA".into()),
            secret_access_key: Some("secret".into()),
            region: "ap-northeast-1".into(),
            scheduler_role_arn: Some("arn:aws:iam::123:role/scheduler".into()),
            sqs_queue_arn: Some("arn:aws:sqs:ap-northeast-1:123:push.fifo".into()),
            sqs_message_group_id: "notices".into(),
            use_s3: true,
            storage_bucket_name: Some("bucket".into()),
        }
    }

    #[test]
    fn test_scheduler_needs_all_four_values() {
        assert!(matches!(full().scheduler(), SchedulerConfig::Configured(_)));

        let mut aws = full();
        aws.scheduler_role_arn = None;
        aws.secret_access_key = None;
        assert_eq!(
            aws.scheduler(),
            SchedulerConfig::Unconfigured {
                missing: vec!["AWS_SECRET_ACCESS_KEY", "AWS_EVENTBRIDGE_SCHEDULER_ROLE_ARN"]
            }
        );
    }

    #[test]
    fn test_s3_requires_flag_and_bucket() {
        assert!(full().s3().is_some());

        let mut aws = full();
        aws.use_s3 = false;
        assert!(aws.s3().is_none());

        let mut aws = full();
        aws.storage_bucket_name = None;
        assert!(aws.s3().is_none());
    }
}
