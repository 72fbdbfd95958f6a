use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use lk_core::batch::BatchReport;

use crate::error::QrServiceError;
use crate::state::AppState;
use crate::usecase::detect::{DetectQrBatchUseCase, ImageUpload, PhotoDetection};

#[derive(Deserialize)]
pub struct DetectQuery {
    pub event_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct DetectResponse {
    pub detections: Vec<PhotoDetection>,
}

// ── POST /qr/detect ───────────────────────────────────────────────────────────

/// Body is the raw image (JPEG, PNG or WebP).
pub async fn detect(
    State(state): State<AppState>,
    Query(query): Query<DetectQuery>,
    body: Bytes,
) -> Result<Json<DetectResponse>, QrServiceError> {
    let detections = state
        .detect_usecase()
        .execute(body.to_vec(), query.event_id)
        .await?;
    Ok(Json(DetectResponse { detections }))
}

// ── POST /qr/detect/batch ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UploadedImage {
    pub filename: String,
    /// Base64 bytes or a `data:` URL.
    pub data: String,
}

#[derive(Deserialize)]
pub struct BatchDetectRequest {
    pub images: Vec<UploadedImage>,
    pub event_id: Option<Uuid>,
    pub batch_size: Option<usize>,
    pub concurrency_limit: Option<usize>,
}

pub async fn batch_detect(
    State(state): State<AppState>,
    Json(body): Json<BatchDetectRequest>,
) -> Result<Json<BatchReport<ImageUpload, Vec<PhotoDetection>>>, QrServiceError> {
    let images = body
        .images
        .into_iter()
        .map(|img| ImageUpload {
            filename: img.filename,
            data: Arc::from(img.data),
        })
        .collect();
    let usecase = DetectQrBatchUseCase {
        detect: state.detect_usecase(),
        processor: state.batch_processor(body.batch_size, body.concurrency_limit),
    };
    Ok(Json(usecase.execute(images, body.event_id).await?))
}
