//! Feedback on notes and tips.
//!
//! Each row hangs off exactly one parent; the schema backs that with a
//! CHECK constraint and `ON DELETE CASCADE`, so deleting the parent takes
//! its feedback with it.

use anyhow::{Context as _, Result};
use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use tracing::{Instrument, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::auth::principal::require_auth;
use super::auth::{AuthState, MessageResponse};
use super::parse_content_id;
use crate::api::error::ApiError;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub content: String,
    #[serde(default)]
    pub note_id: Option<String>,
    #[serde(default)]
    pub tip_id: Option<String>,
}

/// Exactly one of the two must be present.
#[derive(IntoParams, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuery {
    pub note_id: Option<String>,
    pub tip_id: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub id: String,
    pub content: String,
    pub note_id: Option<String>,
    pub tip_id: Option<String>,
    pub author_id: String,
    pub author_name: String,
    pub created_at: String,
}

/// The one-parent rule, shared by create and list.
enum FeedbackParent {
    Note(Uuid),
    Tip(Uuid),
}

fn parse_parent(note_id: Option<&str>, tip_id: Option<&str>) -> Result<FeedbackParent, ApiError> {
    match (note_id, tip_id) {
        (Some(note), None) => Ok(FeedbackParent::Note(parse_content_id(note)?)),
        (None, Some(tip)) => Ok(FeedbackParent::Tip(parse_content_id(tip)?)),
        _ => Err(ApiError::Validation(
            "Exactly one of noteId or tipId is required".to_string(),
        )),
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}

fn response_from_row(row: &PgRow) -> FeedbackResponse {
    FeedbackResponse {
        id: row.get("id"),
        content: row.get("content"),
        note_id: row.get("note_id"),
        tip_id: row.get("tip_id"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        created_at: row.get("created_at"),
    }
}

/// `Ok(None)` means the referenced parent row no longer exists.
async fn insert_feedback(
    pool: &PgPool,
    content: &str,
    parent: &FeedbackParent,
    author_id: Uuid,
    author_name: &str,
) -> Result<Option<FeedbackResponse>> {
    let (note_id, tip_id) = match parent {
        FeedbackParent::Note(id) => (Some(*id), None),
        FeedbackParent::Tip(id) => (None, Some(*id)),
    };

    let query = r#"
        INSERT INTO feedback (content, note_id, tip_id, author_id)
        VALUES ($1, $2, $3, $4)
        RETURNING
            id::text AS id,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(content)
        .bind(note_id)
        .bind(tip_id)
        .bind(author_id)
        .fetch_one(pool)
        .instrument(span)
        .await;

    let row = match row {
        Ok(row) => row,
        Err(err) if is_foreign_key_violation(&err) => return Ok(None),
        Err(err) => return Err(err).context("failed to insert feedback"),
    };

    Ok(Some(FeedbackResponse {
        id: row.get("id"),
        content: content.to_string(),
        note_id: note_id.map(|id| id.to_string()),
        tip_id: tip_id.map(|id| id.to_string()),
        author_id: author_id.to_string(),
        author_name: author_name.to_string(),
        created_at: row.get("created_at"),
    }))
}

async fn fetch_feedback(pool: &PgPool, parent: &FeedbackParent) -> Result<Vec<FeedbackResponse>> {
    let (column, parent_id) = match parent {
        FeedbackParent::Note(id) => ("note_id", *id),
        FeedbackParent::Tip(id) => ("tip_id", *id),
    };

    let query = format!(
        r#"
        SELECT
            f.id::text AS id,
            f.content,
            f.note_id::text AS note_id,
            f.tip_id::text AS tip_id,
            f.author_id::text AS author_id,
            u.name AS author_name,
            to_char(f.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM feedback f
        JOIN users u ON u.id = f.author_id
        WHERE f.{column} = $1
        ORDER BY f.created_at ASC
        "#
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query
    );
    let rows = sqlx::query(&query)
        .bind(parent_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list feedback")?;

    Ok(rows.iter().map(response_from_row).collect())
}

async fn fetch_feedback_author(pool: &PgPool, feedback_id: Uuid) -> Result<Option<Uuid>> {
    let query = "SELECT author_id FROM feedback WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(feedback_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup feedback author")?;

    Ok(row.map(|row| row.get("author_id")))
}

async fn remove_feedback(pool: &PgPool, feedback_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM feedback WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(feedback_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete feedback")?;

    Ok(result.rows_affected() > 0)
}

/// Leave feedback on a note or a tip.
#[utoipa::path(
    post,
    path = "/feedback/feedback",
    request_body = CreateFeedbackRequest,
    responses(
        (status = 201, description = "Feedback created", body = FeedbackResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 404, description = "Parent note or tip not found", body = crate::api::error::ErrorBody)
    ),
    tag = "feedback"
)]
pub async fn create_feedback(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateFeedbackRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation(
            "Feedback content is required".to_string(),
        ));
    }
    let parent = parse_parent(request.note_id.as_deref(), request.tip_id.as_deref())?;

    let Some(feedback) =
        insert_feedback(&pool, content, &parent, principal.user_id, &principal.name).await?
    else {
        return Err(ApiError::NotFound);
    };
    info!(feedback_id = %feedback.id, "feedback created");

    Ok((StatusCode::CREATED, Json(feedback)))
}

/// Feedback for one note or tip, oldest first.
#[utoipa::path(
    get,
    path = "/feedback/feedback",
    params(FeedbackQuery),
    responses(
        (status = 200, description = "Feedback for the parent", body = [FeedbackResponse]),
        (status = 400, description = "Missing or ambiguous parent id", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody)
    ),
    tag = "feedback"
)]
pub async fn list_feedback(
    Query(query): Query<FeedbackQuery>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &auth_state, &pool).await?;
    let parent = parse_parent(query.note_id.as_deref(), query.tip_id.as_deref())?;

    let feedback = fetch_feedback(&pool, &parent).await?;
    Ok((StatusCode::OK, Json(feedback)))
}

/// Remove feedback; only its author or the admin may.
#[utoipa::path(
    delete,
    path = "/feedback/feedback/{id}",
    params(("id" = String, Path, description = "Feedback id")),
    responses(
        (status = 200, description = "Feedback deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not the author or admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown feedback id", body = crate::api::error::ErrorBody)
    ),
    tag = "feedback"
)]
pub async fn delete_feedback(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth_state, &pool).await?;
    let feedback_id = parse_content_id(&id)?;

    let Some(author_id) = fetch_feedback_author(&pool, feedback_id).await? else {
        return Err(ApiError::NotFound);
    };
    if author_id != principal.user_id && !principal.is_admin() {
        return Err(ApiError::Forbidden);
    }

    if !remove_feedback(&pool, feedback_id).await? {
        // Already gone between the ownership check and the delete.
        return Err(ApiError::NotFound);
    }

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Feedback deleted".to_string(),
        }),
    ))
}
