use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lk_core::batch::{BatchProcessor, BatchReport};
use lk_vision::scanner::{BoundingBox, QrScanner};

use crate::domain::repository::{CodeRepository, StudentRepository, TokenRepository};
use crate::domain::types::DecodedStudent;
use crate::error::QrServiceError;
use crate::usecase::batch::check_batch_len;
use crate::usecase::validate::ValidateCodeUseCase;

/// A student QR found in a photo and matched to a registered student.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoDetection {
    pub qr_code: String,
    pub student: DecodedStudent,
    pub confidence: f32,
    pub position: Option<BoundingBox>,
    pub decoder: &'static str,
}

/// Scans a photo and keeps only payloads that resolve to a registered
/// student, optionally scoped to one event. Highest confidence first.
pub struct DetectQrInPhotoUseCase<S, T, C>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
{
    pub validate: ValidateCodeUseCase<S, T, C>,
    pub scanner: Arc<QrScanner>,
}

impl<S, T, C> DetectQrInPhotoUseCase<S, T, C>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
{
    pub async fn execute(
        &self,
        image: Vec<u8>,
        event_id: Option<Uuid>,
    ) -> Result<Vec<PhotoDetection>, QrServiceError> {
        if image.is_empty() {
            return Err(QrServiceError::validation("image: empty body"));
        }

        let scanner = Arc::clone(&self.scanner);
        let detections = tokio::task::spawn_blocking(move || scanner.scan_bytes(&image))
            .await
            .map_err(|e| QrServiceError::ExternalService(format!("qr scan task: {e}")))?
            .map_err(|e| QrServiceError::validation(format!("image: {e}")))?;

        let found = detections.len();
        let mut matched = Vec::with_capacity(found);
        let mut skipped = 0usize;
        for detection in detections {
            // A failed lookup costs only its own payload.
            match self.validate.execute(&detection.text, event_id).await {
                Ok(Some(student)) => matched.push(PhotoDetection {
                    qr_code: detection.text,
                    student,
                    confidence: detection.confidence,
                    position: detection.position,
                    decoder: detection.decoder,
                }),
                Ok(None) => debug!(
                    confidence = detection.confidence,
                    "discarding unregistered qr payload"
                ),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        error = ?e,
                        confidence = detection.confidence,
                        "skipping qr payload after failed lookup"
                    );
                }
            }
        }

        info!(found, matched = matched.len(), skipped, "qr detection finished");
        Ok(matched)
    }
}

/// One uploaded photo of a detection batch. Only the filename is echoed back.
#[derive(Debug, Clone, Serialize)]
pub struct ImageUpload {
    pub filename: String,
    /// Base64 image bytes, optionally as a `data:` URL.
    #[serde(skip)]
    pub data: Arc<str>,
}

/// Decode a base64 image, accepting an optional `data:<mime>;base64,` prefix.
pub fn decode_image_payload(data: &str) -> Result<Vec<u8>, QrServiceError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| QrServiceError::validation(format!("image: invalid base64: {e}")))
}

pub struct DetectQrBatchUseCase<S, T, C>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
{
    pub detect: DetectQrInPhotoUseCase<S, T, C>,
    pub processor: BatchProcessor,
}

impl<S, T, C> DetectQrBatchUseCase<S, T, C>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
{
    /// Per-filename report; undecodable images are failed items.
    pub async fn execute(
        &self,
        images: Vec<ImageUpload>,
        event_id: Option<Uuid>,
    ) -> Result<BatchReport<ImageUpload, Vec<PhotoDetection>>, QrServiceError> {
        check_batch_len("images", images.len())?;
        let detect = &self.detect;
        Ok(self
            .processor
            .run(images, move |upload: ImageUpload| async move {
                let bytes = decode_image_payload(&upload.data)?;
                detect.execute(bytes, event_id).await
            })
            .await)
    }
}
