use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::QrServiceError;
use crate::state::AppState;
use crate::usecase::token::{
    EnsureTokenUseCase, PortalAccess, RotateTokenUseCase, TokenOutput, ValidatePortalUrlUseCase,
};

// ── POST /tokens/students/{student_id} ────────────────────────────────────────

pub async fn ensure_token(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TokenOutput>), QrServiceError> {
    let usecase = EnsureTokenUseCase {
        students: state.student_repo(),
        tokens: state.token_repo(),
        portal_base_url: state.config.portal_base_url.clone(),
        token_ttl: state.config.token_ttl(),
    };
    let out = usecase.execute(student_id).await?;
    let status = if out.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(out)))
}

// ── POST /tokens/students/{student_id}/rotate ─────────────────────────────────

pub async fn rotate_token(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<(StatusCode, Json<TokenOutput>), QrServiceError> {
    let usecase = RotateTokenUseCase {
        students: state.student_repo(),
        tokens: state.token_repo(),
        cache: state.cache.clone(),
        portal_base_url: state.config.portal_base_url.clone(),
        token_ttl: state.config.token_ttl(),
    };
    let out = usecase.execute(student_id).await?;
    Ok((StatusCode::CREATED, Json(out)))
}

// ── GET /portal/validate ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ValidatePortalQuery {
    pub url: String,
}

pub async fn validate_portal_url(
    State(state): State<AppState>,
    Query(query): Query<ValidatePortalQuery>,
) -> Result<Json<PortalAccess>, QrServiceError> {
    let usecase = ValidatePortalUrlUseCase {
        students: state.student_repo(),
        tokens: state.token_repo(),
        portal_base_url: state.config.portal_base_url.clone(),
    };
    Ok(Json(usecase.execute(&query.url).await?))
}
