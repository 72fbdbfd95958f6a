use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lk_core::serde::{to_rfc3339_ms, to_rfc3339_ms_opt};
use lk_vision::encoder::EncodeOptions;

/// Printed sticker edge length in millimetres.
pub const PRINT_EDGE_MM: f32 = 30.0;

/// Print resolution for sticker sheets.
pub const PRINT_DPI: u32 = 300;

/// Upper bound for per-request batch size overrides.
pub const MAX_BATCH_SIZE: usize = 50;

/// Upper bound for per-request concurrency overrides.
pub const MAX_CONCURRENCY_LIMIT: usize = 20;

/// Random bytes per access token (base64url gives 32 characters).
pub const TOKEN_BYTES: usize = 24;

/// Student row; `metadata` is the loosely-typed bag that mirrors QR state.
#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub event_id: Uuid,
    pub course_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Portal access token bound to one student.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub id: Uuid,
    pub student_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_valid(&self) -> bool {
        self.is_active && self.expires_at > Utc::now()
    }
}

/// Persisted QR record.
#[derive(Debug, Clone)]
pub struct Code {
    pub id: Uuid,
    pub event_id: Uuid,
    pub course_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub code_value: String,
    pub token: String,
    pub title: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// QR fields mirrored into `students.metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrMetadata {
    pub qr_token: String,
    pub qr_code_value: String,
    pub qr_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrVariant {
    /// 256 px, ECC `M`.
    #[default]
    Screen,
    /// 30 mm at 300 DPI, ECC `H`.
    Print,
}

impl QrVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Print => "print",
        }
    }

    pub fn encode_options(self) -> EncodeOptions {
        match self {
            Self::Screen => EncodeOptions::screen(),
            Self::Print => EncodeOptions::print(PRINT_EDGE_MM, PRINT_DPI),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrFormat {
    /// `data:image/png;base64,…`
    #[default]
    Png,
    /// Inline SVG document.
    Svg,
}

impl QrFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

/// Rendered QR held by the cache.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// PNG data URL or SVG document, depending on the requested format.
    pub image: String,
    pub token: String,
    pub code_value: String,
    pub portal_url: String,
    pub subject_name: String,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub generated_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Cache counters exposed by `GET /qr/cache/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Student identity resolved from a scanned or submitted code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedStudent {
    pub student_id: Uuid,
    pub student_name: String,
    pub event_id: Uuid,
    pub course_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub qr_type: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Outbound WhatsApp text job.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub student_id: Option<Uuid>,
    pub phone: String,
    pub body: String,
    pub status: NotificationStatus,
    pub attempts: i32,
    pub provider_message_id: Option<String>,
    pub last_error: Option<String>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "to_rfc3339_ms_opt")]
    pub failed_at: Option<DateTime<Utc>>,
}

/// One delivery attempt; every try is its own row.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationAttempt {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub attempt_number: i32,
    pub status: NotificationStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
}

/// Failure reported by the messaging provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Request refused for a reason that will not change on retry (bad number, auth).
    #[error("rejected by provider ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// Network failure, rate limit or provider outage.
    #[error("transient delivery failure: {0}")]
    Transient(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
