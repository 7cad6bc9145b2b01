use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;

/// Minimum lead time between validation and a scheduled push notification.
pub const PUSH_LEAD_TIME_MINUTES: i64 = 5;

pub const TITLE_MAX_LEN: usize = 300;
pub const URL_MAX_LEN: usize = 2048;
pub const SHORT_DESCRIPTION_MAX_LEN: usize = 1000;

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} code: {code}")]
pub struct UnknownCode {
    kind: &'static str,
    code: i16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeType {
    Urgent,
    General,
    Event,
    Maintenance,
}

impl NoticeType {
    pub fn code(self) -> i16 {
        match self {
            NoticeType::Urgent => 1,
            NoticeType::General => 2,
            NoticeType::Event => 3,
            NoticeType::Maintenance => 4,
        }
    }
}

impl TryFrom<i16> for NoticeType {
    type Error = UnknownCode;
    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(NoticeType::Urgent),
            2 => Ok(NoticeType::General),
            3 => Ok(NoticeType::Event),
            4 => Ok(NoticeType::Maintenance),
            _ => Err(UnknownCode { kind: "notice_type", code }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeStatus {
    #[default]
    Draft,
    Published,
    Unpublished,
    /// Kept so that legacy rows still decode. Deletion is always a hard
    /// delete, so this value is rejected on save.
    Deleted,
}

impl NoticeStatus {
    pub fn code(self) -> i16 {
        match self {
            NoticeStatus::Draft => 1,
            NoticeStatus::Published => 2,
            NoticeStatus::Unpublished => 3,
            NoticeStatus::Deleted => 4,
        }
    }
}

impl TryFrom<i16> for NoticeStatus {
    type Error = UnknownCode;
    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(NoticeStatus::Draft),
            2 => Ok(NoticeStatus::Published),
            3 => Ok(NoticeStatus::Unpublished),
            4 => Ok(NoticeStatus::Deleted),
            _ => Err(UnknownCode { kind: "status", code }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Notice {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    #[sqlx(try_from = "i16")]
    pub notice_type: NoticeType,
    pub publish_start_at: Option<DateTime<Utc>>,
    pub publish_end_at: Option<DateTime<Utc>>,
    #[sqlx(try_from = "i16")]
    pub status: NoticeStatus,
    pub push_notification_scheduled_at: Option<DateTime<Utc>>,
    pub push_notification_icon_url: Option<String>,
    pub list_image_url: String,
    pub detail_image_url: String,
    pub short_description: String,
    pub description: String,
    pub redirect_url: String,
}

impl Notice {
    /// Whether the notice should be visible in the public feed at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == NoticeStatus::Published
            && self.publish_start_at.map_or(true, |start| start <= now)
            && self.publish_end_at.map_or(true, |end| end >= now)
    }
}

/// Body of the admin create/update actions. Updates replace every editable field.
#[derive(Debug, Clone, Deserialize)]
pub struct NoticeRequest {
    pub title: String,
    pub notice_type: NoticeType,
    #[serde(default)]
    pub status: NoticeStatus,
    pub publish_start_at: Option<DateTime<Utc>>,
    pub publish_end_at: Option<DateTime<Utc>>,
    pub push_notification_scheduled_at: Option<DateTime<Utc>>,
    pub push_notification_icon_url: Option<String>,
    #[serde(default)]
    pub list_image_url: String,
    #[serde(default)]
    pub detail_image_url: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub redirect_url: String,
}

/// A request that passed validation and may be written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeDraft {
    pub title: String,
    pub notice_type: NoticeType,
    pub status: NoticeStatus,
    pub publish_start_at: Option<DateTime<Utc>>,
    pub publish_end_at: Option<DateTime<Utc>>,
    pub push_notification_scheduled_at: Option<DateTime<Utc>>,
    pub push_notification_icon_url: Option<String>,
    pub list_image_url: String,
    pub detail_image_url: String,
    pub short_description: String,
    pub description: String,
    pub redirect_url: String,
}

/// Field name -> message.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FieldErrors(pub BTreeMap<&'static str, String>);

impl FieldErrors {
    fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl NoticeRequest {
    /// Check the request against the record invariants at time `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<NoticeDraft, FieldErrors> {
        let mut errors = FieldErrors::default();

        let title = self.title.trim();
        if title.is_empty() {
            errors.add("title", "This field is required.");
        } else if title.chars().count() > TITLE_MAX_LEN {
            errors.add("title", format!("Ensure this value has at most {TITLE_MAX_LEN} characters."));
        }

        if self.status == NoticeStatus::Deleted {
            errors.add("status", "Notices are removed with the delete action, not by status.");
        }

        if let (Some(start), Some(end)) = (self.publish_start_at, self.publish_end_at) {
            if end < start {
                errors.add("publish_end_at", "Publish end must not be earlier than publish start.");
            }
        }

        if let Some(at) = self.push_notification_scheduled_at {
            if at < now + Duration::minutes(PUSH_LEAD_TIME_MINUTES) {
                errors.add(
                    "push_notification_scheduled_at",
                    format!(
                        "Push notification time must be at least {PUSH_LEAD_TIME_MINUTES} minutes from now."
                    ),
                );
            }
        }

        if let Some(icon) = &self.push_notification_icon_url {
            check_url(&mut errors, "push_notification_icon_url", icon);
        }
        check_url(&mut errors, "list_image_url", &self.list_image_url);
        check_url(&mut errors, "detail_image_url", &self.detail_image_url);
        check_url(&mut errors, "redirect_url", &self.redirect_url);

        if self.short_description.chars().count() > SHORT_DESCRIPTION_MAX_LEN {
            errors.add(
                "short_description",
                format!("Ensure this value has at most {SHORT_DESCRIPTION_MAX_LEN} characters."),
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NoticeDraft {
            title: title.to_string(),
            notice_type: self.notice_type,
            status: self.status,
            publish_start_at: self.publish_start_at,
            publish_end_at: self.publish_end_at,
            push_notification_scheduled_at: self.push_notification_scheduled_at,
            push_notification_icon_url: self
                .push_notification_icon_url
                .clone()
                .filter(|s| !s.is_empty()),
            list_image_url: self.list_image_url.clone(),
            detail_image_url: self.detail_image_url.clone(),
            short_description: self.short_description.clone(),
            description: self.description.clone(),
            redirect_url: self.redirect_url.clone(),
        })
    }
}

fn check_url(errors: &mut FieldErrors, field: &'static str, value: &str) {
    if value.is_empty() {
        return;
    }
    if value.chars().count() > URL_MAX_LEN {
        errors.add(field, format!("Ensure this value has at most {URL_MAX_LEN} characters."));
    } else if !is_web_url(value) {
        errors.add(field, "Enter a valid URL.");
    }
}

/// Absolute http(s) URL with a host. The parser silently drops tabs and
/// newlines, so those are rejected before parsing.
fn is_web_url(value: &str) -> bool {
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    match Url::parse(value) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoticeFilter {
    pub notice_type: Option<NoticeType>,
    pub status: Option<NoticeStatus>,
    /// Matched case-insensitively against title and both descriptions.
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl NoticeFilter {
    pub const DEFAULT_PER_PAGE: i64 = 20;
    pub const MAX_PAGE: i64 = 1_000_000;

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(Self::DEFAULT_PER_PAGE).clamp(1, 100)
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, Self::MAX_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NoticePage {
    pub items: Vec<Notice>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
