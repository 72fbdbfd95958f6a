use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::types::{Notification, NotificationStatus};
use crate::error::QrServiceError;
use crate::state::AppState;
use crate::usecase::notification::{
    GetNotificationUseCase, NotificationDetails, SendWhatsAppInput, SendWhatsAppUseCase,
};

// ── POST /notifications/whatsapp ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SendWhatsAppRequest {
    pub phone: String,
    pub body: String,
    pub student_id: Option<Uuid>,
}

/// 201 when delivered; 502 with the failed job when the provider gave up.
pub async fn send_whatsapp(
    State(state): State<AppState>,
    Json(body): Json<SendWhatsAppRequest>,
) -> Result<(StatusCode, Json<Notification>), QrServiceError> {
    let usecase = SendWhatsAppUseCase {
        notifications: state.notification_repo(),
        whatsapp: state.whatsapp.clone(),
        policy: state.config.notify_retry_policy(),
    };
    let job = usecase
        .execute(SendWhatsAppInput {
            phone: body.phone,
            body: body.body,
            student_id: body.student_id,
        })
        .await?;
    let status = match job.status {
        NotificationStatus::Sent => StatusCode::CREATED,
        NotificationStatus::Failed => StatusCode::BAD_GATEWAY,
        NotificationStatus::Pending => StatusCode::ACCEPTED,
    };
    Ok((status, Json(job)))
}

// ── GET /notifications/whatsapp/{id} ──────────────────────────────────────────

pub async fn get_whatsapp_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationDetails>, QrServiceError> {
    let usecase = GetNotificationUseCase {
        notifications: state.notification_repo(),
    };
    Ok(Json(usecase.execute(id).await?))
}
