//! Signup endpoint and the admin-availability probe.

use anyhow::Context;
use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::state::AuthState;
use super::storage::{SignupOutcome, count_admins, insert_user};
use super::types::{AuthResponse, CheckAdminResponse, SignupRequest, UserProfile, UserRole};
use super::utils::{hash_password, normalize_email, valid_email};
use crate::api::error::ApiError;

const MIN_NAME_CHARS: usize = 5;
const MIN_PASSWORD_CHARS: usize = 6;

/// Create an account for a verified email.
///
/// The verified marker is checked up front but only consumed once the
/// account row exists, so a signup that fails (email taken, admin slot
/// closed, store trouble) leaves the marker intact and the user can retry
/// without a fresh OTP. Duplicate accounts are stopped by the unique email
/// index. Role `ADMIN` is only accepted while no admin account exists.
#[utoipa::path(
    post,
    path = "/users/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation failed", body = crate::api::error::ErrorBody),
        (status = 403, description = "Email not verified", body = crate::api::error::ErrorBody),
        (status = 409, description = "Email or admin slot already taken", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn signup(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    let name = request.name.trim().to_string();
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(ApiError::Validation(format!(
            "Name must be at least {MIN_NAME_CHARS} characters"
        )));
    }

    if request.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    let role = match request.role.as_deref() {
        None => UserRole::Student,
        Some(value) => UserRole::parse(value).ok_or_else(|| {
            ApiError::Validation("Role must be ADMIN or STUDENT".to_string())
        })?,
    };

    if !auth_state.tickets().is_verified(&email).await {
        return Err(ApiError::Unverified);
    }

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")??;

    match insert_user(&pool, &email, &name, &password_hash, role).await? {
        SignupOutcome::Created(user_id) => {
            auth_state.tickets().consume_verified(&email).await;
            info!(user_id = %user_id, role = role.as_wire(), "account created");
            let token = auth_state
                .signer()
                .issue(
                    &user_id.to_string(),
                    role.as_wire(),
                    chrono::Utc::now().timestamp(),
                )
                .map_err(anyhow::Error::from)?;
            Ok((
                StatusCode::CREATED,
                Json(AuthResponse {
                    token,
                    user: UserProfile {
                        id: user_id.to_string(),
                        name,
                        email,
                        role,
                    },
                }),
            ))
        }
        SignupOutcome::EmailTaken => Err(ApiError::EmailTaken),
        SignupOutcome::AdminTaken => Err(ApiError::AdminExists),
    }
}

/// Report whether an admin account already exists (drives the signup form).
#[utoipa::path(
    get,
    path = "/users/check-admin",
    responses(
        (status = 200, description = "Admin availability", body = CheckAdminResponse)
    ),
    tag = "users"
)]
pub async fn check_admin(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let admin_count = count_admins(&pool).await?;
    Ok((
        StatusCode::OK,
        Json(CheckAdminResponse {
            admin_exists: admin_count > 0,
            admin_count,
        }),
    ))
}
