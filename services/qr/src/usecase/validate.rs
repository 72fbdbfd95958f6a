use tracing::debug;
use uuid::Uuid;

use lk_domain::code_value::CodeValue;
use lk_domain::id::{EventId, StudentId};

use crate::domain::repository::{CodeRepository, StudentRepository, TokenRepository};
use crate::domain::types::DecodedStudent;
use crate::error::QrServiceError;
use crate::usecase::token::names_match;

/// Resolves a scanned or submitted code value to a registered student.
///
/// Returns `Ok(None)` for anything that does not identify a student: unknown
/// formats, unknown or expired tokens, unpublished codes, legacy payloads
/// whose embedded name or event disagrees with the stored student, and
/// students outside the requested event. Only storage failures are errors.
pub struct ValidateCodeUseCase<S, T, C>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
{
    pub students: S,
    pub tokens: T,
    pub codes: C,
}

impl<S, T, C> ValidateCodeUseCase<S, T, C>
where
    S: StudentRepository,
    T: TokenRepository,
    C: CodeRepository,
{
    pub async fn execute(
        &self,
        raw: &str,
        event_id: Option<Uuid>,
    ) -> Result<Option<DecodedStudent>, QrServiceError> {
        let code = match CodeValue::from_scanned(raw) {
            Ok(code) => code,
            Err(e) => {
                debug!(error = %e, "not a student code");
                return Ok(None);
            }
        };

        let decoded = match code {
            CodeValue::Student { token } => self.resolve_token(&token).await?,
            CodeValue::Legacy {
                student_id,
                student_name,
                event_id,
            } => {
                self.resolve_legacy(student_id, &student_name, event_id)
                    .await?
            }
        };

        Ok(decoded.filter(|d| event_id.is_none_or(|scope| d.event_id == scope)))
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<DecodedStudent>, QrServiceError> {
        let access = self.tokens.find_by_token(token).await?;
        if access.as_ref().is_some_and(|t| !t.is_valid()) {
            debug!("token revoked or expired");
            return Ok(None);
        }

        let code = self.codes.find_published_by_token(token).await?;
        let student_id = match (&code, &access) {
            (Some(code), _) if code.student_id.is_some() => code.student_id,
            (_, Some(access)) => Some(access.student_id),
            _ => None,
        };
        let Some(student_id) = student_id else {
            return Ok(None);
        };
        let Some(student) = self.students.find_by_id(student_id).await? else {
            return Ok(None);
        };

        Ok(Some(DecodedStudent {
            student_id: student.id,
            student_name: student.name,
            event_id: student.event_id,
            course_id: student.course_id,
            code_id: code.map(|c| c.id),
            token: Some(token.to_owned()),
            qr_type: CodeValue::student(token).qr_type(),
        }))
    }

    async fn resolve_legacy(
        &self,
        student_id: StudentId,
        student_name: &str,
        event_id: EventId,
    ) -> Result<Option<DecodedStudent>, QrServiceError> {
        let Some(student) = self.students.find_by_id(student_id.0).await? else {
            return Ok(None);
        };
        if !names_match(&student.name, student_name) {
            debug!(%student_id, "legacy code name does not match student");
            return Ok(None);
        }
        if student.event_id != event_id.0 {
            debug!(%student_id, "legacy code event does not match student");
            return Ok(None);
        }

        Ok(Some(DecodedStudent {
            student_id: student.id,
            student_name: student.name,
            event_id: student.event_id,
            course_id: student.course_id,
            code_id: None,
            token: None,
            qr_type: "legacy_student",
        }))
    }
}
