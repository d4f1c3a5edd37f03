//! Shared error type for API handlers.
//!
//! Every handler returns `Result<_, ApiError>`; the response body carries a
//! stable machine readable `error` code next to the human readable message so
//! clients can branch without parsing text.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid or expired verification code")]
    InvalidOtp,
    #[error("authentication required")]
    Unauthenticated,
    #[error("permission denied")]
    Forbidden,
    #[error("email not verified")]
    Unverified,
    #[error("resource not found")]
    NotFound,
    #[error("email already registered")]
    EmailTaken,
    #[error("an admin account already exists")]
    AdminExists,
    #[error("{0}")]
    Conflict(&'static str),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidOtp => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::Unverified => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::EmailTaken | Self::AdminExists | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidOtp => "invalid_or_expired_otp",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::Unverified => "unverified",
            Self::NotFound => "not_found",
            Self::EmailTaken => "email_taken",
            Self::AdminExists => "admin_exists",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "server_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("Failed to handle request: {err:#}");
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use axum::body::to_bytes;

    #[test]
    fn status_codes_per_variant() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::InvalidOtp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Unverified.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::EmailTaken.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::AdminExists.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Internal(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn body_carries_code_and_message() -> Result<()> {
        let response = ApiError::EmailTaken.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;

        assert_eq!(json["error"], "email_taken");
        assert_eq!(json["message"], "email already registered");
        Ok(())
    }

    #[tokio::test]
    async fn internal_error_hides_details() -> Result<()> {
        let response = ApiError::Internal(anyhow!("db connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;

        assert_eq!(json["error"], "server_error");
        assert_eq!(json["message"], "internal server error");
        Ok(())
    }

    #[test]
    fn validation_message_passthrough() {
        let err = ApiError::Validation("name must be at least 5 characters".into());
        assert_eq!(err.to_string(), "name must be at least 5 characters");
        assert_eq!(err.code(), "validation_error");
    }
}
