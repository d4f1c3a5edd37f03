//! Email OTP endpoints: request a code, then confirm it.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use std::sync::Arc;
use tracing::{error, info};

use super::state::AuthState;
use super::types::{GenerateOtpRequest, MessageResponse, VerifyOtpRequest};
use super::utils::{generate_otp_code, normalize_email, valid_email};
use crate::api::email::{EmailMessage, EmailSender};
use crate::api::error::ApiError;

/// Issue a fresh OTP and email it. A repeat request replaces the old code.
#[utoipa::path(
    post,
    path = "/users/generate-otp",
    request_body = GenerateOtpRequest,
    responses(
        (status = 200, description = "Code emailed", body = MessageResponse),
        (status = 400, description = "Invalid email address", body = crate::api::error::ErrorBody),
        (status = 500, description = "Code email could not be sent", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn generate_otp(
    auth_state: Extension<Arc<AuthState>>,
    sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<GenerateOtpRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    let code = generate_otp_code()?;
    auth_state.tickets().issue(&email, code.clone()).await;

    // The code only travels by email; the response never carries it.
    let message = EmailMessage {
        to_email: email.clone(),
        template: "otp_code".to_string(),
        payload_json: serde_json::json!({ "email": email, "otp": code }).to_string(),
    };
    if let Err(err) = sender.send(&message) {
        // A code the user can never receive is useless; drop the ticket so
        // the state matches what actually happened.
        auth_state.tickets().revoke(&email).await;
        error!("Failed to send OTP email: {err}");
        return Err(ApiError::Internal(err));
    }

    info!(email = %email, "issued verification code");
    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "OTP sent to your email".to_string(),
        }),
    ))
}

/// Confirm a previously issued OTP, flipping the ticket to verified.
#[utoipa::path(
    post,
    path = "/users/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired code", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn verify_otp(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if auth_state.tickets().verify(&email, &request.code).await {
        Ok((
            StatusCode::OK,
            Json(MessageResponse {
                message: "Email verified successfully".to_string(),
            }),
        ))
    } else {
        Err(ApiError::InvalidOtp)
    }
}

#[cfg(test)]
mod tests {
    use super::super::state::AuthConfig;
    use super::*;
    use anyhow::{Result, anyhow};
    use std::sync::Mutex;

    /// Records every message; optionally fails after recording.
    #[derive(Default)]
    struct CapturingSender {
        messages: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    impl CapturingSender {
        fn failing() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn last_otp(&self) -> Option<String> {
            let messages = self.messages.lock().unwrap();
            let message = messages.last()?;
            let payload: serde_json::Value = serde_json::from_str(&message.payload_json).ok()?;
            payload.get("otp")?.as_str().map(str::to_string)
        }
    }

    impl EmailSender for CapturingSender {
        fn send(&self, message: &EmailMessage) -> Result<()> {
            self.messages.lock().unwrap().push(message.clone());
            if self.fail {
                return Err(anyhow!("smtp down"));
            }
            Ok(())
        }
    }

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new(),
            secrecy::SecretString::from("otp-test-secret"),
        ))
    }

    #[tokio::test]
    async fn generate_otp_missing_payload() {
        let sender: Arc<dyn EmailSender> = Arc::new(CapturingSender::default());
        let response = generate_otp(Extension(auth_state()), Extension(sender), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn generate_otp_rejects_invalid_email() {
        let sender: Arc<dyn EmailSender> = Arc::new(CapturingSender::default());
        let response = generate_otp(
            Extension(auth_state()),
            Extension(sender),
            Some(Json(GenerateOtpRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn otp_round_trip() {
        let state = auth_state();
        let capturing = Arc::new(CapturingSender::default());
        let sender: Arc<dyn EmailSender> = capturing.clone();

        let response = generate_otp(
            Extension(state.clone()),
            Extension(sender),
            Some(Json(GenerateOtpRequest {
                email: " A@B.com ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let code = capturing.last_otp().unwrap();
        assert_eq!(code.len(), 6);

        // Normalized email plus the emailed code verifies.
        let response = verify_otp(
            Extension(state.clone()),
            Some(Json(VerifyOtpRequest {
                email: "a@b.com".to_string(),
                code: format!(" {code} "),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        // The code cannot be replayed once verified.
        let response = verify_otp(
            Extension(state),
            Some(Json(VerifyOtpRequest {
                email: "a@b.com".to_string(),
                code: code,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_otp_rejects_wrong_code() {
        let state = auth_state();
        let capturing = Arc::new(CapturingSender::default());
        let sender: Arc<dyn EmailSender> = capturing.clone();

        generate_otp(
            Extension(state.clone()),
            Extension(sender),
            Some(Json(GenerateOtpRequest {
                email: "a@b.com".to_string(),
            })),
        )
        .await
        .into_response();

        let code = capturing.last_otp().unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let response = verify_otp(
            Extension(state),
            Some(Json(VerifyOtpRequest {
                email: "a@b.com".to_string(),
                code: wrong.to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failed_send_revokes_the_ticket() {
        let state = auth_state();
        let capturing = Arc::new(CapturingSender::failing());
        let sender: Arc<dyn EmailSender> = capturing.clone();

        let response = generate_otp(
            Extension(state.clone()),
            Extension(sender),
            Some(Json(GenerateOtpRequest {
                email: "a@b.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // Even the code that was about to go out no longer verifies.
        let code = capturing.last_otp().unwrap();
        let response = verify_otp(
            Extension(state),
            Some(Json(VerifyOtpRequest {
                email: "a@b.com".to_string(),
                code: code,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
