use std::path::{Path, PathBuf};

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{Config, S3Settings};
use crate::services::aws;
use crate::services::metrics::ICON_UPLOADS_COUNTER;

/// Key prefix shared by both backends.
pub const ICON_PREFIX: &str = "push_notification_icons";

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum IconStorageError {
    #[error("empty upload")]
    Empty,
    #[error("unsupported file type, use one of: {}", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedType,
    #[error("s3: {0}")]
    S3(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of [`IconStorage::check_access`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StorageCheck {
    pub backend: &'static str,
    pub ok: bool,
    pub message: String,
    /// Objects seen in the first listing page (S3 only, at most 5).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled_objects: Option<usize>,
}

/// Where push notification icons are kept: an S3 bucket, or the local media
/// directory served by the API.
pub enum IconStorage {
    S3 {
        client: aws_sdk_s3::Client,
        bucket: String,
        region: String,
    },
    Local {
        media_dir: PathBuf,
        base_url: String,
    },
}

impl IconStorage {
    pub fn from_config(config: &Config) -> Self {
        match config.aws.s3() {
            Some(settings) => Self::s3(&settings),
            None => Self::Local {
                media_dir: PathBuf::from(&config.media_dir),
                base_url: config.media_base_url.trim_end_matches('/').to_string(),
            },
        }
    }

    pub fn s3(settings: &S3Settings) -> Self {
        let sdk = aws::sdk_config(
            &settings.access_key_id,
            &settings.secret_access_key,
            &settings.region,
        );
        Self::S3 {
            client: aws_sdk_s3::Client::new(&sdk),
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Local { .. } => "local",
        }
    }

    /// Store an uploaded icon and return its public URL. Every upload gets a
    /// fresh object name so existing icons are never overwritten. The stored
    /// content type follows the extension, not what the client sent.
    pub async fn store(&self, original_filename: &str, data: Bytes) -> Result<String, IconStorageError> {
        if data.is_empty() {
            return Err(IconStorageError::Empty);
        }
        let ext = image_extension(original_filename).ok_or(IconStorageError::UnsupportedType)?;
        let key = format!("{ICON_PREFIX}/{}.{ext}", Uuid::new_v4());
        let content_type = mime_guess::from_ext(&ext).first_or_octet_stream();

        let url = match self {
            Self::S3 { client, bucket, region } => {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(&key)
                    .content_type(content_type.as_ref())
                    .body(ByteStream::from(data))
                    .send()
                    .await
                    .map_err(|e| IconStorageError::S3(DisplayErrorContext(&e).to_string()))?;
                format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
            }
            Self::Local { media_dir, base_url } => {
                let path = media_dir.join(&key);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, &data).await?;
                format!("{base_url}/{key}")
            }
        };

        ICON_UPLOADS_COUNTER.with_label_values(&[self.backend()]).inc();
        tracing::info!("Stored push notification icon at {}", url);
        Ok(url)
    }

    /// Verify the backend can be reached: HeadBucket then a short listing for
    /// S3, the media directory for local storage.
    pub async fn check_access(&self) -> StorageCheck {
        match self {
            Self::S3 { client, bucket, .. } => {
                if let Err(e) = client.head_bucket().bucket(bucket).send().await {
                    let status = e.raw_response().map(|r| r.status().as_u16());
                    let message = bucket_error(bucket, status, &DisplayErrorContext(&e).to_string());
                    tracing::warn!("S3 access check failed: {}", message);
                    return StorageCheck::failed(self.backend(), message);
                }
                match client.list_objects_v2().bucket(bucket).max_keys(5).send().await {
                    Ok(out) => {
                        let count = out.contents().len();
                        let message = if count == 0 {
                            format!("Bucket \"{bucket}\" is reachable and empty")
                        } else {
                            format!("Bucket \"{bucket}\" is reachable")
                        };
                        StorageCheck {
                            backend: self.backend(),
                            ok: true,
                            message,
                            sampled_objects: Some(count),
                        }
                    }
                    Err(e) => StorageCheck::failed(
                        self.backend(),
                        format!("Listing bucket \"{bucket}\" failed: {}", DisplayErrorContext(&e)),
                    ),
                }
            }
            Self::Local { media_dir, .. } => {
                let dir = media_dir.join(ICON_PREFIX);
                match tokio::fs::create_dir_all(&dir).await {
                    Ok(()) => StorageCheck {
                        backend: self.backend(),
                        ok: true,
                        message: format!("Media directory {} is usable", dir.display()),
                        sampled_objects: None,
                    },
                    Err(e) => StorageCheck::failed(
                        self.backend(),
                        format!("Media directory {} is not usable: {e}", dir.display()),
                    ),
                }
            }
        }
    }
}

impl StorageCheck {
    fn failed(backend: &'static str, message: String) -> Self {
        Self {
            backend,
            ok: false,
            message,
            sampled_objects: None,
        }
    }
}

fn bucket_error(bucket: &str, status: Option<u16>, detail: &str) -> String {
    match status {
        Some(404) => format!("Bucket \"{bucket}\" does not exist"),
        Some(403) => format!("Access to bucket \"{bucket}\" is denied for these credentials"),
        _ => format!("Bucket \"{bucket}\" is not reachable: {detail}"),
    }
}

/// Lowercased extension when it is one of [`ALLOWED_EXTENSIONS`].
fn image_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}
