use std::time::Duration;

use uuid::Uuid;

use lk_core::retry::RetryPolicy;
use lk_qr::domain::types::{DeliveryError, NotificationStatus};
use lk_qr::error::QrServiceError;
use lk_qr::usecase::notification::{
    GetNotificationUseCase, SendWhatsAppInput, SendWhatsAppUseCase,
};

use crate::helpers::{MockNotificationRepo, MockWhatsApp};

fn policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(500), 2)
}

fn input() -> SendWhatsAppInput {
    SendWhatsAppInput {
        phone: "+55 (11) 98765-4321".to_owned(),
        body: "Your child's photos are ready".to_owned(),
        student_id: Some(Uuid::new_v4()),
    }
}

fn transient() -> Result<String, DeliveryError> {
    Err(DeliveryError::Transient("HTTP 503".to_owned()))
}

// ── SendWhatsAppUseCase ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn should_send_message_on_first_attempt() {
    let repo = MockNotificationRepo::empty();
    let whatsapp = MockWhatsApp::scripted(vec![Ok("wamid.ok".to_owned())]);
    let usecase = SendWhatsAppUseCase {
        notifications: repo.clone(),
        whatsapp: whatsapp.clone(),
        policy: policy(),
    };

    let job = usecase.execute(input()).await.unwrap();

    assert_eq!(job.status, NotificationStatus::Sent);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.provider_message_id.as_deref(), Some("wamid.ok"));
    assert!(job.sent_at.is_some());
    assert_eq!(whatsapp.sent_handle().lock().unwrap().len(), 1);

    let stored = repo.jobs_handle().lock().unwrap()[0].clone();
    assert_eq!(stored.status, NotificationStatus::Sent);
    assert_eq!(stored.phone, "+55 (11) 98765-4321");
}

#[tokio::test(start_paused = true)]
async fn should_retry_transient_failures_and_log_every_attempt() {
    let repo = MockNotificationRepo::empty();
    let usecase = SendWhatsAppUseCase {
        notifications: repo.clone(),
        whatsapp: MockWhatsApp::scripted(vec![transient(), transient(), Ok("wamid.3".to_owned())]),
        policy: policy(),
    };

    let job = usecase.execute(input()).await.unwrap();
    assert_eq!(job.status, NotificationStatus::Sent);
    assert_eq!(job.attempts, 3);

    let attempts = repo.attempts_handle().lock().unwrap().clone();
    let numbers: Vec<_> = attempts.iter().map(|a| a.attempt_number).collect();
    let statuses: Vec<_> = attempts.iter().map(|a| a.status).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(
        statuses,
        vec![
            NotificationStatus::Failed,
            NotificationStatus::Failed,
            NotificationStatus::Sent,
        ]
    );
    assert!(attempts[0].error.as_deref().unwrap().contains("HTTP 503"));
    assert_eq!(attempts[2].provider_message_id.as_deref(), Some("wamid.3"));
}

#[tokio::test(start_paused = true)]
async fn should_mark_job_failed_after_exhausting_attempts() {
    let repo = MockNotificationRepo::empty();
    let whatsapp = MockWhatsApp::scripted(vec![transient(), transient(), transient()]);
    let usecase = SendWhatsAppUseCase {
        notifications: repo.clone(),
        whatsapp: whatsapp.clone(),
        policy: policy(),
    };

    let job = usecase.execute(input()).await.unwrap();

    assert_eq!(job.status, NotificationStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.failed_at.is_some());
    assert!(job.last_error.as_deref().unwrap().contains("HTTP 503"));
    assert_eq!(whatsapp.sent_handle().lock().unwrap().len(), 3);

    let stored = repo.jobs_handle().lock().unwrap()[0].clone();
    assert_eq!(stored.status, NotificationStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn should_not_retry_rejected_message() {
    let repo = MockNotificationRepo::empty();
    let whatsapp = MockWhatsApp::scripted(vec![Err(DeliveryError::Rejected {
        status: 400,
        message: "invalid recipient".to_owned(),
    })]);
    let usecase = SendWhatsAppUseCase {
        notifications: repo.clone(),
        whatsapp: whatsapp.clone(),
        policy: policy(),
    };

    let job = usecase.execute(input()).await.unwrap();

    assert_eq!(job.status, NotificationStatus::Failed);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.as_deref().unwrap().contains("invalid recipient"));
    assert_eq!(whatsapp.sent_handle().lock().unwrap().len(), 1);
}

#[tokio::test]
async fn should_reject_invalid_request_without_creating_job() {
    let repo = MockNotificationRepo::empty();
    let whatsapp = MockWhatsApp::default();
    let usecase = SendWhatsAppUseCase {
        notifications: repo.clone(),
        whatsapp: whatsapp.clone(),
        policy: policy(),
    };

    let result = usecase
        .execute(SendWhatsAppInput {
            phone: "12ab".to_owned(),
            body: "  ".to_owned(),
            student_id: None,
        })
        .await;

    match result {
        Err(QrServiceError::Validation(details)) => assert_eq!(details.len(), 2),
        other => panic!("expected Validation, got {other:?}"),
    }
    assert!(repo.jobs_handle().lock().unwrap().is_empty());
    assert!(whatsapp.sent_handle().lock().unwrap().is_empty());
}

// ── GetNotificationUseCase ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn should_return_job_with_attempt_log() {
    let repo = MockNotificationRepo::empty();
    let send = SendWhatsAppUseCase {
        notifications: repo.clone(),
        whatsapp: MockWhatsApp::scripted(vec![transient(), Ok("wamid.2".to_owned())]),
        policy: policy(),
    };
    let job = send.execute(input()).await.unwrap();

    let details = GetNotificationUseCase {
        notifications: repo.clone(),
    }
    .execute(job.id)
    .await
    .unwrap();

    assert_eq!(details.notification.id, job.id);
    assert_eq!(details.notification.status, NotificationStatus::Sent);
    assert_eq!(details.attempt_log.len(), 2);

    let json = serde_json::to_value(&details).unwrap();
    assert_eq!(json["status"], "sent");
    assert_eq!(json["attempt_log"][0]["status"], "failed");
}

#[tokio::test]
async fn should_return_not_found_for_unknown_job() {
    let usecase = GetNotificationUseCase {
        notifications: MockNotificationRepo::empty(),
    };
    let result = usecase.execute(Uuid::new_v4()).await;
    assert!(
        matches!(result, Err(QrServiceError::NotificationNotFound)),
        "expected NotificationNotFound, got {result:?}"
    );
}
