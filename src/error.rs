//! Application error type shared by services, extractors and handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    ArticleNotFound(i64),

    #[error("unexpected user")]
    UserNotFound,

    /// Principal is not the author of the article being mutated.
    #[error("not authorized")]
    NotAuthorized,

    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid or expired token")]
    InvalidToken,

    /// Well-formed refresh token that is not the one stored for its user.
    #[error("unexpected token")]
    UnknownToken,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("email already registered")]
    EmailTaken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ArticleNotFound(_) | AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::NotAuthorized | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated
            | AppError::InvalidToken
            | AppError::UnknownToken
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::EmailTaken => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ArticleNotFound(_) => "NOT_FOUND",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::NotAuthorized => "NOT_AUTHORIZED",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::UnknownToken => "UNKNOWN_TOKEN",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Validation(_) => "VALIDATION",
            AppError::EmailTaken => "EMAIL_TAKEN",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    fn log(&self) {
        match self {
            AppError::Internal(e) => tracing::error!(error = %e, "internal error"),
            AppError::InvalidToken | AppError::UnknownToken | AppError::InvalidCredentials => {
                tracing::warn!(error = %self, "rejected credentials")
            }
            AppError::NotAuthorized => tracing::warn!("author mismatch"),
            _ => tracing::debug!(error = %self, "request failed"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        // Internal details stay in the log.
        let message = match &self {
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        }));
        (self.status_code(), body).into_response()
    }
}
