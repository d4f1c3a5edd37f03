//! Subject reference data: name, branch and semester.
//!
//! Admin-managed rows that notes point at. No moderation state; the only
//! rule is the (name, branch, semester) uniqueness the schema enforces.

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
pub struct SubjectRequest {
    pub name: String,
    pub branch: String,
    pub semester: i32,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResponse {
    pub id: String,
    pub name: String,
    pub branch: String,
    pub semester: i32,
    pub created_at: String,
}

struct SubjectFields<'a> {
    name: &'a str,
    branch: &'a str,
    semester: i32,
}

fn validate_subject(request: &SubjectRequest) -> Result<SubjectFields<'_>, ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Subject name is required".to_string()));
    }
    let branch = request.branch.trim();
    if branch.is_empty() {
        return Err(ApiError::Validation("Branch is required".to_string()));
    }
    if !(1..=8).contains(&request.semester) {
        return Err(ApiError::Validation(
            "Semester must be between 1 and 8".to_string(),
        ));
    }
    Ok(SubjectFields {
        name,
        branch,
        semester: request.semester,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

fn response_from_row(row: &PgRow) -> SubjectResponse {
    SubjectResponse {
        id: row.get("id"),
        name: row.get("name"),
        branch: row.get("branch"),
        semester: row.get("semester"),
        created_at: row.get("created_at"),
    }
}

async fn insert_subject(
    pool: &PgPool,
    fields: &SubjectFields<'_>,
) -> Result<Option<SubjectResponse>> {
    let query = r#"
        INSERT INTO subjects (name, branch, semester)
        VALUES ($1, $2, $3)
        RETURNING
            id::text AS id,
            name,
            branch,
            semester,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(fields.name)
        .bind(fields.branch)
        .bind(fields.semester)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(Some(response_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).context("failed to insert subject"),
    }
}

async fn fetch_subjects(pool: &PgPool) -> Result<Vec<SubjectResponse>> {
    let query = r#"
        SELECT
            id::text AS id,
            name,
            branch,
            semester,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM subjects
        ORDER BY branch, semester, name
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
        .context("failed to list subjects")?;

    Ok(rows.iter().map(response_from_row).collect())
}

/// `Ok(None)` means the uniqueness rule blocked the update; `Ok(Some(false))`
/// means the id did not resolve.
async fn update_subject_row(
    pool: &PgPool,
    subject_id: Uuid,
    fields: &SubjectFields<'_>,
) -> Result<Option<bool>> {
    let query = r"
        UPDATE subjects
        SET name = $2, branch = $3, semester = $4
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(subject_id)
        .bind(fields.name)
        .bind(fields.branch)
        .bind(fields.semester)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(result) => Ok(Some(result.rows_affected() > 0)),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err).context("failed to update subject"),
    }
}

async fn remove_subject(pool: &PgPool, subject_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM subjects WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(subject_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete subject")?;

    Ok(result.rows_affected() > 0)
}

/// Create a subject.
#[utoipa::path(
    post,
    path = "/subjects/subject",
    request_body = SubjectRequest,
    responses(
        (status = 201, description = "Subject created", body = SubjectResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody),
        (status = 409, description = "Subject already exists", body = crate::api::error::ErrorBody)
    ),
    tag = "subjects"
)]
pub async fn create_subject(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SubjectRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let fields = validate_subject(&request)?;

    let Some(subject) = insert_subject(&pool, &fields).await? else {
        return Err(ApiError::Conflict("subject already exists"));
    };
    info!(subject_id = %subject.id, "subject created");
    record_activity(
        &pool,
        Some(principal.user_id),
        "subject.created",
        &format!("subject {}", subject.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(subject)))
}

/// All subjects, for filters and upload forms.
#[utoipa::path(
    get,
    path = "/subjects/subjects",
    responses(
        (status = 200, description = "Subjects", body = [SubjectResponse])
    ),
    tag = "subjects"
)]
pub async fn list_subjects(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let subjects = fetch_subjects(&pool).await?;
    Ok((StatusCode::OK, Json(subjects)))
}

/// Rename or move a subject.
#[utoipa::path(
    put,
    path = "/subjects/subject/{id}",
    request_body = SubjectRequest,
    params(("id" = String, Path, description = "Subject id")),
    responses(
        (status = 200, description = "Subject updated", body = MessageResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown subject id", body = crate::api::error::ErrorBody),
        (status = 409, description = "Subject already exists", body = crate::api::error::ErrorBody)
    ),
    tag = "subjects"
)]
pub async fn update_subject(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SubjectRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let subject_id = parse_content_id(&id)?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };
    let fields = validate_subject(&request)?;

    match update_subject_row(&pool, subject_id, &fields).await? {
        None => Err(ApiError::Conflict("subject already exists")),
        Some(false) => Err(ApiError::NotFound),
        Some(true) => {
            record_activity(
                &pool,
                Some(principal.user_id),
                "subject.updated",
                &format!("subject {subject_id}"),
            )
            .await;
            Ok((
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Subject updated".to_string(),
                }),
            ))
        }
    }
}

/// Remove a subject; notes pointing at it keep their rows (`SET NULL`).
#[utoipa::path(
    delete,
    path = "/subjects/subject/{id}",
    params(("id" = String, Path, description = "Subject id")),
    responses(
        (status = 200, description = "Subject deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown subject id", body = crate::api::error::ErrorBody)
    ),
    tag = "subjects"
)]
pub async fn delete_subject(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let subject_id = parse_content_id(&id)?;

    if !remove_subject(&pool, subject_id).await? {
        return Err(ApiError::NotFound);
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "subject.deleted",
        &format!("subject {subject_id}"),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Subject deleted".to_string(),
        }),
    ))
}
