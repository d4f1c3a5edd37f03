//! Sign-in endpoint.

use anyhow::Context;
use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::state::AuthState;
use super::storage::lookup_user_by_email;
use super::types::{AuthResponse, SigninRequest, UserProfile};
use super::utils::{normalize_email, valid_email, verify_password};
use crate::api::error::ApiError;

/// Exchange email and password for a session token.
///
/// Shape failures are 400s like everywhere else; unknown email and wrong
/// password both answer 401, so the endpoint cannot be used to probe which
/// addresses have accounts.
#[utoipa::path(
    post,
    path = "/users/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Missing payload or malformed credentials", body = crate::api::error::ErrorBody),
        (status = 401, description = "Unknown email or wrong password", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn signin(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SigninRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }
    if request.password.is_empty() {
        return Err(ApiError::Validation("Password is required".to_string()));
    }

    let Some(record) = lookup_user_by_email(&pool, &email).await? else {
        return Err(ApiError::Unauthenticated);
    };

    let password = request.password;
    let stored_hash = record.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .context("password verification task failed")??;
    if !matches {
        return Err(ApiError::Unauthenticated);
    }

    let token = auth_state
        .signer()
        .issue(
            &record.user_id.to_string(),
            record.role.as_wire(),
            chrono::Utc::now().timestamp(),
        )
        .map_err(anyhow::Error::from)?;

    info!(user_id = %record.user_id, "signed in");
    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            token,
            user: UserProfile {
                id: record.user_id.to_string(),
                name: record.name,
                email: record.email,
                role: record.role,
            },
        }),
    ))
}
