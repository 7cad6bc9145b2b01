use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::{Credentials, SharedCredentialsProvider};

/// SDK configuration with static credentials taken from the environment
/// settings rather than the default provider chain.
pub fn sdk_config(access_key_id: &str, secret_access_key: &str, region: &str) -> SdkConfig {
    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "NoticesApiConfig",
        )))
        .build()
}

/// Asterisks in place of a secret, capped at 20.
pub fn mask(value: &str) -> String {
    "*".repeat(value.chars().count().min(20))
}
