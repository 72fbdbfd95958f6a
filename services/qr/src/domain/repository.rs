#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{
    AccessToken, CacheEntry, Code, DeliveryError, Notification, NotificationAttempt, QrMetadata,
    Student,
};
use crate::error::QrServiceError;

pub trait StudentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>, QrServiceError>;

    /// Merge `qr` into the student's `metadata` bag, keeping unrelated keys.
    async fn update_qr_metadata(&self, id: Uuid, qr: &QrMetadata) -> Result<(), QrServiceError>;
}

/// Repository for portal access tokens.
pub trait TokenRepository: Send + Sync {
    /// Active, unexpired token for a student.
    async fn find_active_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Option<AccessToken>, QrServiceError>;

    /// Any token row with this value, valid or not.
    async fn find_by_token(&self, token: &str) -> Result<Option<AccessToken>, QrServiceError>;

    /// Insert `candidate` unless the student already holds a valid active token,
    /// then return whichever token is active. Atomic against concurrent claims.
    async fn claim_active(&self, candidate: &AccessToken) -> Result<AccessToken, QrServiceError>;

    /// Deactivate the student's tokens, unpublish every code of the student and
    /// insert `token` (same transaction), so the old sticker stops resolving.
    async fn rotate(&self, token: &AccessToken) -> Result<(), QrServiceError>;
}

/// Repository for persisted QR records.
pub trait CodeRepository: Send + Sync {
    async fn find_published_by_token(&self, token: &str) -> Result<Option<Code>, QrServiceError>;

    /// Newest published code of a student.
    async fn find_primary_for_student(
        &self,
        student_id: Uuid,
    ) -> Result<Option<Code>, QrServiceError>;

    /// Unpublish the student's published codes and insert `code` (same transaction).
    async fn replace_primary(&self, code: &Code) -> Result<(), QrServiceError>;
}

/// Repository for WhatsApp jobs and their attempt log.
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), QrServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, QrServiceError>;

    async fn list_attempts(
        &self,
        notification_id: Uuid,
    ) -> Result<Vec<NotificationAttempt>, QrServiceError>;

    /// Insert the attempt row and bump the job's attempt counter (same transaction).
    async fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<(), QrServiceError>;

    async fn mark_sent(
        &self,
        id: Uuid,
        provider_message_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), QrServiceError>;

    async fn mark_failed(&self, id: Uuid, error: &str, at: DateTime<Utc>)
    -> Result<(), QrServiceError>;
}

/// Port for the WhatsApp Business Cloud API.
pub trait WhatsAppPort: Send + Sync {
    /// Send a text message. Returns the provider's message id.
    async fn send_text(&self, to: &str, body: &str) -> Result<String, DeliveryError>;
}

/// In-process cache of rendered QR images, keyed per student and rendering.
pub trait QrCachePort: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    async fn set(&self, key: &str, entry: CacheEntry);

    /// Drop every rendering cached for one student.
    async fn invalidate_student(&self, student_id: Uuid);
}
