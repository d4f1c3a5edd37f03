//! Announcements: admin-posted notices, newest first.

use anyhow::{Context as _, Result};
use axum::{
    Json,
    extract::{Extension, Path},
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
use super::auth::{AuthState, MessageResponse};
use super::parse_content_id;
use crate::api::error::ApiError;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
}

fn response_from_row(row: &PgRow) -> AnnouncementResponse {
    AnnouncementResponse {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

async fn insert_announcement(
    pool: &PgPool,
    title: &str,
    content: &str,
    created_by: Uuid,
) -> Result<AnnouncementResponse> {
    let query = r#"
        INSERT INTO announcements (title, content, created_by)
        VALUES ($1, $2, $3)
        RETURNING
            id::text AS id,
            title,
            content,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(title)
        .bind(content)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert announcement")?;

    Ok(response_from_row(&row))
}

async fn fetch_announcements(pool: &PgPool) -> Result<Vec<AnnouncementResponse>> {
    let query = r#"
        SELECT
            id::text AS id,
            title,
            content,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM announcements
        ORDER BY created_at DESC
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
        .context("failed to list announcements")?;

    Ok(rows.iter().map(response_from_row).collect())
}

async fn remove_announcement(pool: &PgPool, announcement_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM announcements WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(announcement_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete announcement")?;

    Ok(result.rows_affected() > 0)
}

/// Post an announcement.
#[utoipa::path(
    post,
    path = "/announcements/announcement",
    request_body = CreateAnnouncementRequest,
    responses(
        (status = 201, description = "Announcement posted", body = AnnouncementResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "announcements"
)]
pub async fn create_announcement(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateAnnouncementRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }
    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("Content is required".to_string()));
    }

    let announcement = insert_announcement(&pool, title, content, principal.user_id).await?;
    info!(announcement_id = %announcement.id, "announcement posted");
    record_activity(
        &pool,
        Some(principal.user_id),
        "announcement.created",
        &format!("announcement {}", announcement.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(announcement)))
}

/// Announcements, newest first.
#[utoipa::path(
    get,
    path = "/announcements/announcements",
    responses(
        (status = 200, description = "Announcements", body = [AnnouncementResponse])
    ),
    tag = "announcements"
)]
pub async fn list_announcements(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let announcements = fetch_announcements(&pool).await?;
    Ok((StatusCode::OK, Json(announcements)))
}

/// Remove an announcement.
#[utoipa::path(
    delete,
    path = "/announcements/announcement/{id}",
    params(("id" = String, Path, description = "Announcement id")),
    responses(
        (status = 200, description = "Announcement deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown announcement id", body = crate::api::error::ErrorBody)
    ),
    tag = "announcements"
)]
pub async fn delete_announcement(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let announcement_id = parse_content_id(&id)?;

    if !remove_announcement(&pool, announcement_id).await? {
        return Err(ApiError::NotFound);
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "announcement.deleted",
        &format!("announcement {announcement_id}"),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Announcement deleted".to_string(),
        }),
    ))
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
            SecretString::from("announcements-test"),
        ))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn create_announcement_requires_token() -> Result<()> {
        let err = create_announcement(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(test_state()),
            Some(Json(CreateAnnouncementRequest {
                title: "Exam schedule".to_string(),
                content: "Mid-sems start on the 12th".to_string(),
            })),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[tokio::test]
    async fn delete_announcement_requires_token() -> Result<()> {
        let err = delete_announcement(
            Path("9d2f1c8b-0000-4000-8000-000000000001".to_string()),
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(test_state()),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[test]
    fn announcement_response_uses_camel_case() -> Result<()> {
        let announcement = AnnouncementResponse {
            id: "a-1".to_string(),
            title: "Exam schedule".to_string(),
            content: "Mid-sems start on the 12th".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&announcement)?;
        assert!(value.get("createdAt").is_some());
        assert!(value.get("created_at").is_none());
        Ok(())
    }
}
