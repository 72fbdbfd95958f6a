use std::collections::HashSet;

use uuid::Uuid;

use lk_core::batch::{BatchProcessor, BatchReport};

use crate::domain::repository::{
    CodeRepository, QrCachePort, StudentRepository, TokenRepository,
};
use crate::domain::types::{DecodedStudent, MAX_BATCH_SIZE, MAX_CONCURRENCY_LIMIT, QrFormat, QrVariant};
use crate::error::QrServiceError;
use crate::usecase::qr::{GenerateQrInput, GenerateStudentQrUseCase, GeneratedQr};
use crate::usecase::validate::ValidateCodeUseCase;

/// Largest number of items accepted by one batch request.
pub const MAX_BATCH_ITEMS: usize = 500;

/// Executor for one request: configured sizes, optionally overridden per
/// request, clamped to `1..=MAX_BATCH_SIZE` and `1..=MAX_CONCURRENCY_LIMIT`.
pub fn batch_processor(
    configured_size: usize,
    configured_concurrency: usize,
    size_override: Option<usize>,
    concurrency_override: Option<usize>,
) -> BatchProcessor {
    let size = size_override
        .unwrap_or(configured_size)
        .clamp(1, MAX_BATCH_SIZE);
    let concurrency = concurrency_override
        .unwrap_or(configured_concurrency)
        .clamp(1, MAX_CONCURRENCY_LIMIT);
    BatchProcessor::new(size, concurrency)
}

/// Reject empty or oversized batch requests. `field` names the offending list.
pub fn check_batch_len(field: &str, len: usize) -> Result<(), QrServiceError> {
    if len == 0 {
        return Err(QrServiceError::validation(format!(
            "{field}: must not be empty"
        )));
    }
    if len > MAX_BATCH_ITEMS {
        return Err(QrServiceError::validation(format!(
            "{field}: at most {MAX_BATCH_ITEMS} items per request, got {len}"
        )));
    }
    Ok(())
}

// ── Generation ────────────────────────────────────────────────────────────────

pub struct BatchGenerateQrUseCase<S, T, C, K>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
    K: QrCachePort,
{
    pub generate: GenerateStudentQrUseCase<S, T, C, K>,
    pub processor: BatchProcessor,
}

impl<S, T, C, K> BatchGenerateQrUseCase<S, T, C, K>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
    K: QrCachePort,
{
    pub async fn execute(
        &self,
        student_ids: Vec<Uuid>,
        variant: QrVariant,
        format: QrFormat,
    ) -> Result<BatchReport<Uuid, GeneratedQr>, QrServiceError> {
        check_batch_len("student_ids", student_ids.len())?;
        // Repeats would race each other for the same token; `total_requested`
        // counts unique ids.
        let mut seen = HashSet::with_capacity(student_ids.len());
        let student_ids: Vec<Uuid> = student_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();
        let generate = &self.generate;
        Ok(self
            .processor
            .run(student_ids, |student_id| {
                generate.execute(GenerateQrInput {
                    student_id,
                    variant,
                    format,
                })
            })
            .await)
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

pub struct BatchValidateCodesUseCase<S, T, C>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
{
    pub validate: ValidateCodeUseCase<S, T, C>,
    pub processor: BatchProcessor,
}

impl<S, T, C> BatchValidateCodesUseCase<S, T, C>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
{
    /// A code that does not resolve is reported as a failed item.
    pub async fn execute(
        &self,
        codes: Vec<String>,
        event_id: Option<Uuid>,
    ) -> Result<BatchReport<String, DecodedStudent>, QrServiceError> {
        check_batch_len("codes", codes.len())?;
        let validate = &self.validate;
        Ok(self
            .processor
            .run(codes, move |code: String| async move {
                validate
                    .execute(&code, event_id)
                    .await?
                    .ok_or(QrServiceError::CodeNotFound)
            })
            .await)
    }
}
