use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use lk_core::serde::to_rfc3339_ms;
use lk_domain::code_value::{CodeValue, portal_url};
use lk_vision::encoder::{encode_data_url, encode_svg};

use crate::domain::repository::{
    CodeRepository, QrCachePort, StudentRepository, TokenRepository,
};
use crate::domain::types::{CacheEntry, Code, QrFormat, QrMetadata, QrVariant};
use crate::error::QrServiceError;
use crate::infra::cache::cache_key;
use crate::usecase::token::ensure_active_token;

#[derive(Debug, Clone, Copy)]
pub struct GenerateQrInput {
    pub student_id: Uuid,
    pub variant: QrVariant,
    pub format: QrFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedQr {
    pub student_id: Uuid,
    pub student_name: String,
    pub token: String,
    pub code_value: String,
    pub portal_url: String,
    pub variant: QrVariant,
    pub format: QrFormat,
    /// PNG data URL or SVG document.
    pub image: String,
    pub cached: bool,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub generated_at: DateTime<Utc>,
}

impl GeneratedQr {
    fn from_entry(input: GenerateQrInput, entry: CacheEntry, cached: bool) -> Self {
        Self {
            student_id: input.student_id,
            student_name: entry.subject_name,
            token: entry.token,
            code_value: entry.code_value,
            portal_url: entry.portal_url,
            variant: input.variant,
            format: input.format,
            image: entry.image,
            cached,
            generated_at: entry.generated_at,
        }
    }
}

/// Render `content` with the settings of `variant`.
pub fn render(content: &str, variant: QrVariant, format: QrFormat) -> Result<String, QrServiceError> {
    let options = variant.encode_options();
    let rendered = match format {
        QrFormat::Png => encode_data_url(content, &options),
        QrFormat::Svg => encode_svg(content, &options),
    };
    rendered.map_err(|e| QrServiceError::Encoding(e.to_string()))
}

/// Produces the QR for one student: token, code record, metadata mirror, cache.
pub struct GenerateStudentQrUseCase<S, T, C, K>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
    K: QrCachePort,
{
    pub students: S,
    pub tokens: T,
    pub codes: C,
    pub cache: K,
    pub portal_base_url: String,
    pub token_ttl: Duration,
}

impl<S, T, C, K> GenerateStudentQrUseCase<S, T, C, K>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
    K: QrCachePort,
{
    pub async fn execute(&self, input: GenerateQrInput) -> Result<GeneratedQr, QrServiceError> {
        let key = cache_key(input.student_id, input.variant, input.format);
        if let Some(entry) = self.cache.get(&key).await {
            debug!(student_id = %input.student_id, "qr cache hit");
            return Ok(GeneratedQr::from_entry(input, entry, true));
        }

        let student = self
            .students
            .find_by_id(input.student_id)
            .await?
            .ok_or(QrServiceError::StudentNotFound)?;

        let (token, _) = ensure_active_token(&self.tokens, student.id, self.token_ttl).await?;
        let code = CodeValue::student(token.token.as_str());
        let code_value = code.to_string();
        let image = render(&code_value, input.variant, input.format)?;

        let primary = self.codes.find_primary_for_student(student.id).await?;
        if primary.is_none_or(|c| c.code_value != code_value) {
            let now = Utc::now();
            self.codes
                .replace_primary(&Code {
                    id: Uuid::new_v4(),
                    event_id: student.event_id,
                    course_id: student.course_id,
                    student_id: Some(student.id),
                    code_value: code_value.clone(),
                    token: token.token.clone(),
                    title: student.name.clone(),
                    is_published: true,
                    created_at: now,
                })
                .await?;
            info!(student_id = %student.id, "published new student code");
        }

        self.students
            .update_qr_metadata(
                student.id,
                &QrMetadata {
                    qr_token: token.token.clone(),
                    qr_code_value: code_value.clone(),
                    qr_type: code.qr_type().to_owned(),
                },
            )
            .await?;

        let generated_at = Utc::now();
        let entry = CacheEntry {
            image,
            portal_url: portal_url(&self.portal_base_url, &token.token),
            token: token.token,
            code_value,
            subject_name: student.name,
            generated_at,
            // Overwritten by the cache from its TTL.
            expires_at: generated_at,
            access_count: 0,
            last_accessed: None,
        };
        self.cache.set(&key, entry.clone()).await;

        Ok(GeneratedQr::from_entry(input, entry, false))
    }
}
