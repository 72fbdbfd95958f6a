use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// QR service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum QrServiceError {
    #[error("student not found")]
    StudentNotFound,
    #[error("code not found")]
    CodeNotFound,
    #[error("token not found")]
    TokenNotFound,
    #[error("notification not found")]
    NotificationNotFound,
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("encoding failed: {0}")]
    Encoding(String),
    #[error("external service failed: {0}")]
    ExternalService(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl QrServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StudentNotFound => "STUDENT_NOT_FOUND",
            Self::CodeNotFound => "CODE_NOT_FOUND",
            Self::TokenNotFound => "TOKEN_NOT_FOUND",
            Self::NotificationNotFound => "NOTIFICATION_NOT_FOUND",
            Self::Validation(_) => "VALIDATION",
            Self::Encoding(_) => "ENCODING",
            Self::ExternalService(_) => "EXTERNAL_SERVICE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for QrServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::StudentNotFound
            | Self::CodeNotFound
            | Self::TokenNotFound
            | Self::NotificationNotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Encoding(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if let Self::Internal(ref e) = self {
            tracing::error!(error = ?e, kind = "INTERNAL", "internal error");
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::Validation(details) = &self {
            body["details"] = serde_json::json!(details);
        }
        (status, axum::Json(body)).into_response()
    }
}
