use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{service}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Catalog errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    ServiceUnavailable,
    BadRequest,
    PayloadTooLarge,

    // Auth (E1xxx)
    TokenExpired,
    TokenInvalid,
    RefreshTokenRevoked,
    MagicLinkInvalid,
    MagicLinkExpired,
    EmailRateLimited,
    InvalidEmail,
    EmailDeliveryFailed,
    CredentialNotFound,

    // Catalog (E2xxx)
    SkillNotFound,
    IdeaNotFound,
    IdeaTitleInvalid,
    ActionInProgress,
    NotIdeaAuthor,
    AvatarUploadFailed,
    DrillNotFound,
    DrillAnswersMismatch,
    InvalidDrillSlug,
    AccountDeleted,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::ServiceUnavailable => "E0007",
            Self::BadRequest => "E0008",
            Self::PayloadTooLarge => "E0009",

            // Auth
            Self::TokenExpired => "E1001",
            Self::TokenInvalid => "E1002",
            Self::RefreshTokenRevoked => "E1003",
            Self::MagicLinkInvalid => "E1004",
            Self::MagicLinkExpired => "E1005",
            Self::EmailRateLimited => "E1006",
            Self::InvalidEmail => "E1007",
            Self::EmailDeliveryFailed => "E1008",
            Self::CredentialNotFound => "E1009",

            // Catalog
            Self::SkillNotFound => "E2001",
            Self::IdeaNotFound => "E2002",
            Self::IdeaTitleInvalid => "E2003",
            Self::ActionInProgress => "E2004",
            Self::NotIdeaAuthor => "E2005",
            Self::AvatarUploadFailed => "E2006",
            Self::DrillNotFound => "E2007",
            Self::DrillAnswersMismatch => "E2008",
            Self::InvalidDrillSlug => "E2009",
            Self::AccountDeleted => "E2010",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable | Self::EmailDeliveryFailed => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest | Self::InvalidEmail
            | Self::IdeaTitleInvalid | Self::AvatarUploadFailed | Self::DrillAnswersMismatch
            | Self::InvalidDrillSlug => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound | Self::CredentialNotFound | Self::SkillNotFound
            | Self::IdeaNotFound | Self::DrillNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid
            | Self::RefreshTokenRevoked | Self::MagicLinkInvalid
            | Self::MagicLinkExpired | Self::AccountDeleted => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotIdeaAuthor => StatusCode::FORBIDDEN,
            Self::RateLimited | Self::EmailRateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ActionInProgress => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The stable code reported to clients for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::InternalError,
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn known_error_envelope() {
        let value = body_json(AppError::new(ErrorCode::SkillNotFound, "skill not found")).await;

        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E2001");
        assert_eq!(value["error"]["message"], "skill not found");
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn details_are_forwarded() {
        let err = AppError::with_details(
            ErrorCode::DrillAnswersMismatch,
            "wrong number of answers",
            serde_json::json!({ "expected": 4, "received": 2 }),
        );
        let value = body_json(err).await;

        assert_eq!(value["error"]["details"]["expected"], 4);
        assert_eq!(value["error"]["details"]["received"], 2);
    }

    #[tokio::test]
    async fn in_progress_is_conflict() {
        let response = AppError::new(ErrorCode::ActionInProgress, "busy").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn diesel_not_found_maps_to_404() {
        let response = AppError::from(diesel::result::Error::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let err = AppError::from(anyhow::anyhow!("connection refused on 10.0.0.3"));
        let value = body_json(err).await;

        assert_eq!(value["error"]["code"], "E0001");
        assert_eq!(value["error"]["message"], "internal server error");
    }

    #[test]
    fn code_reflects_variant() {
        assert_eq!(AppError::Validation("x".into()).code(), ErrorCode::ValidationError);
        assert_eq!(AppError::unauthorized("x").code(), ErrorCode::Unauthorized);
        assert_eq!(
            AppError::from(diesel::result::Error::NotFound).code(),
            ErrorCode::NotFound
        );
    }

    #[test]
    fn magic_link_failures_are_unauthorized() {
        assert_eq!(ErrorCode::MagicLinkExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::MagicLinkInvalid.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::EmailDeliveryFailed.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn deleted_account_is_unauthorized() {
        assert_eq!(ErrorCode::AccountDeleted.code(), "E2010");
        assert_eq!(ErrorCode::AccountDeleted.status_code(), StatusCode::UNAUTHORIZED);
    }
}
