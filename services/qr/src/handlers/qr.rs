use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use lk_core::batch::BatchReport;

use crate::domain::types::{DecodedStudent, QrFormat, QrVariant};
use crate::error::QrServiceError;
use crate::state::AppState;
use crate::usecase::batch::{BatchGenerateQrUseCase, BatchValidateCodesUseCase};
use crate::usecase::qr::{GenerateQrInput, GeneratedQr};

#[derive(Deserialize)]
pub struct RenderQuery {
    #[serde(default)]
    pub variant: QrVariant,
    #[serde(default)]
    pub format: QrFormat,
}

// ── POST /qr/students/{student_id} ────────────────────────────────────────────

pub async fn generate_student_qr(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
    Query(query): Query<RenderQuery>,
) -> Result<Json<GeneratedQr>, QrServiceError> {
    let out = state
        .generate_qr_usecase()
        .execute(GenerateQrInput {
            student_id,
            variant: query.variant,
            format: query.format,
        })
        .await?;
    Ok(Json(out))
}

// ── POST /qr/batch ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct BatchGenerateRequest {
    pub student_ids: Vec<Uuid>,
    #[serde(default)]
    pub variant: QrVariant,
    #[serde(default)]
    pub format: QrFormat,
    pub batch_size: Option<usize>,
    pub concurrency_limit: Option<usize>,
}

pub async fn batch_generate(
    State(state): State<AppState>,
    Json(body): Json<BatchGenerateRequest>,
) -> Result<Json<BatchReport<Uuid, GeneratedQr>>, QrServiceError> {
    let usecase = BatchGenerateQrUseCase {
        generate: state.generate_qr_usecase(),
        processor: state.batch_processor(body.batch_size, body.concurrency_limit),
    };
    let report = usecase
        .execute(body.student_ids, body.variant, body.format)
        .await?;
    Ok(Json(report))
}

// ── POST /qr/validate ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub code: String,
    pub event_id: Option<Uuid>,
}

pub async fn validate_code(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<DecodedStudent>, QrServiceError> {
    if body.code.trim().is_empty() {
        return Err(QrServiceError::validation("code: must not be empty"));
    }
    let student = state
        .validate_code_usecase()
        .execute(&body.code, body.event_id)
        .await?
        .ok_or(QrServiceError::CodeNotFound)?;
    Ok(Json(student))
}

// ── POST /qr/validate/batch ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct BatchValidateRequest {
    pub codes: Vec<String>,
    pub event_id: Option<Uuid>,
    pub batch_size: Option<usize>,
    pub concurrency_limit: Option<usize>,
}

pub async fn batch_validate(
    State(state): State<AppState>,
    Json(body): Json<BatchValidateRequest>,
) -> Result<Json<BatchReport<String, DecodedStudent>>, QrServiceError> {
    let usecase = BatchValidateCodesUseCase {
        validate: state.validate_code_usecase(),
        processor: state.batch_processor(body.batch_size, body.concurrency_limit),
    };
    Ok(Json(usecase.execute(body.codes, body.event_id).await?))
}
