use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::RngExt;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use lk_core::serde::to_rfc3339_ms;
use lk_domain::code_value::{CodeValue, portal_url};

use crate::domain::repository::{QrCachePort, StudentRepository, TokenRepository};
use crate::domain::types::{AccessToken, TOKEN_BYTES};
use crate::error::QrServiceError;

/// Cryptographically random, URL-safe token (base64url, no padding).
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..TOKEN_BYTES).map(|_| rng.random::<u8>()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn new_access_token(student_id: Uuid, ttl: Duration) -> AccessToken {
    let now = Utc::now();
    AccessToken {
        id: Uuid::new_v4(),
        student_id,
        token: generate_token(),
        expires_at: now + ttl,
        is_active: true,
        created_at: now,
    }
}

/// Return the student's active token, minting one when none is valid.
/// The boolean is `true` when a new token was created.
pub async fn ensure_active_token<T: TokenRepository>(
    tokens: &T,
    student_id: Uuid,
    ttl: Duration,
) -> Result<(AccessToken, bool), QrServiceError> {
    if let Some(existing) = tokens.find_active_for_student(student_id).await? {
        return Ok((existing, false));
    }
    let candidate = new_access_token(student_id, ttl);
    let token = tokens.claim_active(&candidate).await?;
    let created = token.id == candidate.id;
    if created {
        info!(%student_id, "issued access token");
    }
    Ok((token, created))
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenOutput {
    pub student_id: Uuid,
    pub token: String,
    pub portal_url: String,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
    pub created: bool,
}

fn token_output(token: AccessToken, portal_base_url: &str, created: bool) -> TokenOutput {
    TokenOutput {
        student_id: token.student_id,
        portal_url: portal_url(portal_base_url, &token.token),
        token: token.token,
        expires_at: token.expires_at,
        created,
    }
}

// ── Ensure ────────────────────────────────────────────────────────────────────

pub struct EnsureTokenUseCase<S, T>
where
    S: StudentRepository,
    T: TokenRepository,
{
    pub students: S,
    pub tokens: T,
    pub portal_base_url: String,
    pub token_ttl: Duration,
}

impl<S, T> EnsureTokenUseCase<S, T>
where
    S: StudentRepository,
    T: TokenRepository,
{
    /// Idempotent: repeated calls return the same token until it is rotated or expires.
    pub async fn execute(&self, student_id: Uuid) -> Result<TokenOutput, QrServiceError> {
        self.students
            .find_by_id(student_id)
            .await?
            .ok_or(QrServiceError::StudentNotFound)?;

        let (token, created) =
            ensure_active_token(&self.tokens, student_id, self.token_ttl).await?;
        Ok(token_output(token, &self.portal_base_url, created))
    }
}

// ── Rotate ────────────────────────────────────────────────────────────────────

pub struct RotateTokenUseCase<S, T, K>
where
    S: StudentRepository,
    T: TokenRepository,
    K: QrCachePort,
{
    pub students: S,
    pub tokens: T,
    pub cache: K,
    pub portal_base_url: String,
    pub token_ttl: Duration,
}

impl<S, T, K> RotateTokenUseCase<S, T, K>
where
    S: StudentRepository,
    T: TokenRepository,
    K: QrCachePort,
{
    /// Replace the active token and unpublish the student's codes; cached
    /// renderings of the old token are dropped.
    pub async fn execute(&self, student_id: Uuid) -> Result<TokenOutput, QrServiceError> {
        self.students
            .find_by_id(student_id)
            .await?
            .ok_or(QrServiceError::StudentNotFound)?;

        let token = new_access_token(student_id, self.token_ttl);
        self.tokens.rotate(&token).await?;
        self.cache.invalidate_student(student_id).await;
        info!(%student_id, "rotated access token");
        Ok(token_output(token, &self.portal_base_url, true))
    }
}

// ── Portal URL validation ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PortalAccess {
    pub student_id: Uuid,
    pub student_name: String,
    pub event_id: Uuid,
    pub token: String,
    pub portal_url: String,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
}

pub struct ValidatePortalUrlUseCase<S, T>
where
    S: StudentRepository,
    T: TokenRepository,
{
    pub students: S,
    pub tokens: T,
    pub portal_base_url: String,
}

impl<S, T> ValidatePortalUrlUseCase<S, T>
where
    S: StudentRepository,
    T: TokenRepository,
{
    /// Accepts a portal URL, a bare token or any code value.
    pub async fn execute(&self, input: &str) -> Result<PortalAccess, QrServiceError> {
        if input.trim().is_empty() {
            return Err(QrServiceError::validation("url: must not be empty"));
        }
        let code = CodeValue::from_scanned(input).map_err(|_| QrServiceError::TokenNotFound)?;

        let token = match &code {
            CodeValue::Student { token } => self
                .tokens
                .find_by_token(token)
                .await?
                .filter(AccessToken::is_valid),
            CodeValue::Legacy { student_id, .. } => {
                self.tokens.find_active_for_student(student_id.0).await?
            }
        }
        .ok_or(QrServiceError::TokenNotFound)?;

        let student = self
            .students
            .find_by_id(token.student_id)
            .await?
            .ok_or(QrServiceError::TokenNotFound)?;

        if let CodeValue::Legacy {
            student_name,
            event_id,
            ..
        } = &code
        {
            if !names_match(&student.name, student_name) || student.event_id != event_id.0 {
                return Err(QrServiceError::TokenNotFound);
            }
        }

        Ok(PortalAccess {
            student_id: student.id,
            student_name: student.name,
            event_id: student.event_id,
            portal_url: portal_url(&self.portal_base_url, &token.token),
            token: token.token,
            expires_at: token.expires_at,
        })
    }
}

/// Case- and whitespace-insensitive name comparison used for legacy codes.
pub fn names_match(stored: &str, embedded: &str) -> bool {
    let stored = stored.to_lowercase();
    let embedded = embedded.to_lowercase();
    stored.split_whitespace().eq(embedded.split_whitespace())
}
