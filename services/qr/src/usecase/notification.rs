use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use lk_core::retry::{RetryError, RetryPolicy, retry_if};

use crate::domain::repository::{NotificationRepository, WhatsAppPort};
use crate::domain::types::{
    DeliveryError, Notification, NotificationAttempt, NotificationStatus,
};
use crate::error::QrServiceError;

/// WhatsApp text body limit.
pub const MAX_BODY_CHARS: usize = 4096;

/// E.164 allows at most 15 digits; shorter than 8 is never a mobile number.
const PHONE_DIGITS: std::ops::RangeInclusive<usize> = 8..=15;

pub struct SendWhatsAppInput {
    pub phone: String,
    pub body: String,
    pub student_id: Option<Uuid>,
}

/// Collect every problem with the request instead of stopping at the first.
pub fn validate_input(input: &SendWhatsAppInput) -> Result<(), QrServiceError> {
    let mut errors = Vec::new();

    let phone = input.phone.trim();
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')');
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !phone.chars().all(allowed) {
        errors.push("phone: only digits, spaces, '+', '-', '(' and ')' are allowed".to_owned());
    } else if !PHONE_DIGITS.contains(&digits) {
        errors.push(format!("phone: expected 8 to 15 digits, got {digits}"));
    }

    let body_len = input.body.trim().chars().count();
    if body_len == 0 {
        errors.push("body: must not be empty".to_owned());
    } else if body_len > MAX_BODY_CHARS {
        errors.push(format!("body: at most {MAX_BODY_CHARS} characters, got {body_len}"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(QrServiceError::Validation(errors))
    }
}

#[derive(Debug, thiserror::Error)]
enum AttemptFailure {
    #[error(transparent)]
    Delivery(DeliveryError),
    #[error("could not record attempt: {0}")]
    Bookkeeping(QrServiceError),
}

impl AttemptFailure {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Delivery(e) if e.is_retryable())
    }
}

/// Sends one WhatsApp text with exponential-backoff retry.
///
/// Every attempt is persisted as its own row before the next one starts. On
/// exhaustion (or a non-retryable rejection) the job is marked `failed` and
/// returned; re-sending is a new job.
pub struct SendWhatsAppUseCase<N, W>
where
    N: NotificationRepository,
    W: WhatsAppPort,
{
    pub notifications: N,
    pub whatsapp: W,
    pub policy: RetryPolicy,
}

impl<N, W> SendWhatsAppUseCase<N, W>
where
    N: NotificationRepository,
    W: WhatsAppPort,
{
    pub async fn execute(&self, input: SendWhatsAppInput) -> Result<Notification, QrServiceError> {
        validate_input(&input)?;

        let mut job = Notification {
            id: Uuid::new_v4(),
            student_id: input.student_id,
            phone: input.phone.trim().to_owned(),
            body: input.body,
            status: NotificationStatus::Pending,
            attempts: 0,
            provider_message_id: None,
            last_error: None,
            created_at: Utc::now(),
            sent_at: None,
            failed_at: None,
        };
        self.notifications.create(&job).await?;

        let notifications = &self.notifications;
        let whatsapp = &self.whatsapp;
        let pending = &job;
        let outcome = retry_if(
            &self.policy,
            |attempt| async move {
                let result = whatsapp.send_text(&pending.phone, &pending.body).await;
                let record = NotificationAttempt {
                    id: Uuid::new_v4(),
                    notification_id: pending.id,
                    attempt_number: attempt as i32,
                    status: if result.is_ok() {
                        NotificationStatus::Sent
                    } else {
                        NotificationStatus::Failed
                    },
                    provider_message_id: result.as_ref().ok().cloned(),
                    error: result.as_ref().err().map(ToString::to_string),
                    created_at: Utc::now(),
                };
                notifications
                    .record_attempt(&record)
                    .await
                    .map_err(AttemptFailure::Bookkeeping)?;
                result
                    .map(|id| (attempt, id))
                    .map_err(AttemptFailure::Delivery)
            },
            AttemptFailure::is_retryable,
        )
        .await;

        let now = Utc::now();
        match outcome {
            Ok((attempts, message_id)) => {
                self.notifications.mark_sent(job.id, &message_id, now).await?;
                info!(notification_id = %job.id, attempts, "whatsapp message sent");
                job.status = NotificationStatus::Sent;
                job.attempts = attempts as i32;
                job.provider_message_id = Some(message_id);
                job.sent_at = Some(now);
            }
            Err(RetryError {
                last: AttemptFailure::Bookkeeping(e),
                ..
            }) => return Err(e),
            Err(RetryError {
                attempts,
                last: AttemptFailure::Delivery(e),
            }) => {
                let error = e.to_string();
                self.notifications.mark_failed(job.id, &error, now).await?;
                warn!(notification_id = %job.id, attempts, error = %error, "whatsapp delivery failed");
                job.status = NotificationStatus::Failed;
                job.attempts = attempts as i32;
                job.last_error = Some(error);
                job.failed_at = Some(now);
            }
        }
        Ok(job)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationDetails {
    #[serde(flatten)]
    pub notification: Notification,
    pub attempt_log: Vec<NotificationAttempt>,
}

pub struct GetNotificationUseCase<N>
where
    N: NotificationRepository,
{
    pub notifications: N,
}

impl<N> GetNotificationUseCase<N>
where
    N: NotificationRepository,
{
    pub async fn execute(&self, id: Uuid) -> Result<NotificationDetails, QrServiceError> {
        let notification = self
            .notifications
            .find_by_id(id)
            .await?
            .ok_or(QrServiceError::NotificationNotFound)?;
        let attempt_log = self.notifications.list_attempts(id).await?;
        Ok(NotificationDetails {
            notification,
            attempt_log,
        })
    }
}
