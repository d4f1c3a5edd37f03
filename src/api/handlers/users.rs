//! Admin user management: list accounts, delete an account.
//!
//! Deleting a user cascades to their notes, tips, files and feedback.
//! Rows with role `admin` are never deletable; removing the only admin
//! would leave the system without a moderator.

use anyhow::{Context as _, Result};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use tracing::{Instrument, info};
use utoipa::ToSchema;
use uuid::Uuid;

use super::activity::record_activity;
use super::auth::principal::require_admin;
use super::auth::{AuthState, MessageResponse, UserRole};
use super::parse_content_id;
use crate::api::error::ApiError;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    pub user_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: String,
}

fn summary_from_row(row: &PgRow) -> Result<UserSummary> {
    let role_text: String = row.get("role");
    let role = UserRole::parse(&role_text)
        .ok_or_else(|| anyhow::anyhow!("unknown role in users table: {role_text}"))?;
    Ok(UserSummary {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role,
        created_at: row.get("created_at"),
    })
}

async fn fetch_users(pool: &PgPool) -> Result<Vec<UserSummary>> {
    let query = r#"
        SELECT
            id::text AS id,
            name,
            email,
            role::text AS role,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM users
        ORDER BY created_at ASC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;

    rows.iter().map(summary_from_row).collect()
}

#[derive(Debug)]
enum DeleteUserOutcome {
    Deleted,
    IsAdmin,
    NotFound,
}

/// Delete inside one transaction so the role check and the delete see the
/// same row.
async fn remove_user(pool: &PgPool, user_id: Uuid) -> Result<DeleteUserOutcome> {
    let mut tx = pool.begin().await.context("begin delete-user transaction")?;

    let query = "SELECT role::text AS role FROM users WHERE id = $1 FOR UPDATE";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup user for delete")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(DeleteUserOutcome::NotFound);
    };
    let role: String = row.get("role");
    if role == "admin" {
        let _ = tx.rollback().await;
        return Ok(DeleteUserOutcome::IsAdmin);
    }

    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete user")?;

    tx.commit().await.context("commit delete-user transaction")?;

    Ok(DeleteUserOutcome::Deleted)
}

/// All accounts, public fields only.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Accounts", body = [UserSummary]),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&headers, &auth_state, &pool).await?;
    let users = fetch_users(&pool).await?;
    Ok((StatusCode::OK, Json(users)))
}

/// Delete a student account and everything they posted.
#[utoipa::path(
    delete,
    path = "/users/user",
    request_body = DeleteUserRequest,
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin accounts cannot be deleted", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown user id", body = crate::api::error::ErrorBody)
    ),
    tag = "users"
)]
pub async fn delete_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<DeleteUserRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let user_id = parse_content_id(&request.user_id)?;

    match remove_user(&pool, user_id).await? {
        DeleteUserOutcome::NotFound => Err(ApiError::NotFound),
        DeleteUserOutcome::IsAdmin => Err(ApiError::Forbidden),
        DeleteUserOutcome::Deleted => {
            info!(user_id = %user_id, "user deleted");
            record_activity(
                &pool,
                Some(principal.user_id),
                "user.deleted",
                &format!("user {user_id}"),
            )
            .await;
            Ok((
                StatusCode::OK,
                Json(MessageResponse {
                    message: "User deleted".to_string(),
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::AuthConfig;
    use anyhow::Result;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn test_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new(),
            SecretString::from("users-test"),
        ))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn list_users_requires_token() -> Result<()> {
        let err = list_users(HeaderMap::new(), Extension(lazy_pool()?), Extension(test_state()))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[tokio::test]
    async fn delete_user_requires_token() -> Result<()> {
        let err = delete_user(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(test_state()),
            Some(Json(DeleteUserRequest {
                user_id: "1b7c4d2e-0000-4000-8000-000000000001".to_string(),
            })),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[test]
    fn user_summary_serializes_wire_role() -> Result<()> {
        let summary = UserSummary {
            id: "u-1".to_string(),
            name: "Alice Doe".to_string(),
            email: "alice@example.edu".to_string(),
            role: UserRole::Student,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&summary)?;
        assert_eq!(value["role"], "STUDENT");
        assert!(value.get("createdAt").is_some());
        Ok(())
    }
}
