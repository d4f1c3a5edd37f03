//! Note endpoints: upload, browse, moderate, delete.
//!
//! A note is one row carrying its whole branch list as a text array, so a
//! single upload is discoverable under several branch filters without
//! duplicate rows. Visibility follows the approver column: `NULL` means
//! pending, set means approved. Approval is re-entrant and overwrites the
//! approver; bulk approval only touches rows still pending.

mod storage;
pub(crate) mod types;

use anyhow::Context;
use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::activity::record_activity;
use super::auth::principal::{require_admin, require_auth};
use super::auth::{AuthState, MessageResponse};
use super::{ModeratedCountResponse, decode_file_data, parse_bulk_ids, parse_content_id};
use crate::api::blob::BlobStore;
use crate::api::error::ApiError;
use types::{BulkApproveNotesRequest, NoteResponse, NotesQuery, UploadNoteRequest};

const MIN_SEMESTER: i32 = 1;
const MAX_SEMESTER: i32 = 8;

/// Trim, drop empties and deduplicate while keeping the submitted order.
fn normalize_branches(raw: &[String]) -> Vec<String> {
    let mut branches: Vec<String> = Vec::new();
    for value in raw {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if branches.iter().any(|existing| existing == trimmed) {
            continue;
        }
        branches.push(trimmed.to_string());
    }
    branches
}

fn parse_subject_filter(raw: Option<&str>) -> Result<Option<Uuid>, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| ApiError::Validation("subjectId must be a UUID".to_string())),
    }
}

/// Upload a note; it stays hidden from students until approved.
#[utoipa::path(
    post,
    path = "/notes/note/upload",
    request_body = UploadNoteRequest,
    responses(
        (status = 201, description = "Note submitted for moderation", body = NoteResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody)
    ),
    tag = "notes"
)]
pub async fn upload_note(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    blob: Extension<Arc<dyn BlobStore>>,
    payload: Option<Json<UploadNoteRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".to_string()));
    }
    let branches = normalize_branches(&request.branches);
    if branches.is_empty() {
        return Err(ApiError::Validation(
            "At least one branch is required".to_string(),
        ));
    }
    if !(MIN_SEMESTER..=MAX_SEMESTER).contains(&request.semester) {
        return Err(ApiError::Validation(
            "Semester must be between 1 and 8".to_string(),
        ));
    }
    let subject_id = parse_subject_filter(request.subject_id.as_deref())?;
    let file_name = request.file_name.trim();
    if file_name.is_empty() {
        return Err(ApiError::Validation("fileName is required".to_string()));
    }
    let bytes = decode_file_data(&request.file_data)?;

    let store = blob.0.clone();
    let stored_name = file_name.to_string();
    let file_url = tokio::task::spawn_blocking(move || store.store(&stored_name, &bytes))
        .await
        .context("upload task failed")??;

    let note = storage::insert_note(
        &pool,
        title,
        &branches,
        request.semester,
        subject_id,
        file_name,
        &file_url,
        principal.user_id,
        &principal.name,
    )
    .await?
    .ok_or_else(|| ApiError::Validation("Unknown subject".to_string()))?;

    info!(note_id = %note.id, "note submitted");
    record_activity(
        &pool,
        Some(principal.user_id),
        "note.uploaded",
        &format!("note {}", note.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(note)))
}

/// Approved notes, filterable by branch, semester and subject.
#[utoipa::path(
    get,
    path = "/notes/notes",
    params(NotesQuery),
    responses(
        (status = 200, description = "Approved notes", body = [NoteResponse]),
        (status = 400, description = "Invalid filter", body = crate::api::error::ErrorBody)
    ),
    tag = "notes"
)]
pub async fn list_notes(
    pool: Extension<PgPool>,
    Query(filters): Query<NotesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let branch = filters
        .branch
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let semester = match filters
        .semester
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        None => None,
        Some(raw) => {
            let value: i32 = raw
                .parse()
                .map_err(|_| ApiError::Validation("semester must be a number".to_string()))?;
            if !(MIN_SEMESTER..=MAX_SEMESTER).contains(&value) {
                return Err(ApiError::Validation(
                    "Semester must be between 1 and 8".to_string(),
                ));
            }
            Some(value)
        }
    };
    let subject_id = parse_subject_filter(filters.subject_id.as_deref())?;

    let notes = storage::fetch_approved_notes(&pool, branch, semester, subject_id).await?;
    Ok((StatusCode::OK, Json(notes)))
}

/// Moderation worklist, oldest upload first.
#[utoipa::path(
    get,
    path = "/notes/notes/pending",
    responses(
        (status = 200, description = "Pending notes", body = [NoteResponse]),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "notes"
)]
pub async fn list_pending_notes(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&headers, &auth_state, &pool).await?;
    let notes = storage::fetch_pending_notes(&pool).await?;
    Ok((StatusCode::OK, Json(notes)))
}

/// Approve one note.
#[utoipa::path(
    put,
    path = "/notes/note/approve/{id}",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note approved", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown note id", body = crate::api::error::ErrorBody)
    ),
    tag = "notes"
)]
pub async fn approve_note(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let note_id = parse_content_id(&id)?;

    if !storage::set_note_approver(&pool, note_id, principal.user_id).await? {
        return Err(ApiError::NotFound);
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "note.approved",
        &format!("note {note_id}"),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Note approved".to_string(),
        }),
    ))
}

/// Approve a batch of notes in one conditional update.
#[utoipa::path(
    put,
    path = "/notes/note/approve",
    request_body = BulkApproveNotesRequest,
    responses(
        (status = 200, description = "Count of notes actually changed", body = ModeratedCountResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "notes"
)]
pub async fn approve_notes(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<BulkApproveNotesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if request.note_ids.is_empty() {
        return Err(ApiError::Validation(
            "noteIds must not be empty".to_string(),
        ));
    }

    let note_ids = parse_bulk_ids(&request.note_ids);
    let count = storage::approve_pending_notes(&pool, &note_ids, principal.user_id).await?;
    info!(count, "bulk approved notes");
    record_activity(
        &pool,
        Some(principal.user_id),
        "note.bulk_approved",
        &format!("{count} notes approved"),
    )
    .await;

    Ok((StatusCode::OK, Json(ModeratedCountResponse { count })))
}

/// Delete a note. Allowed for its uploader and for the admin.
#[utoipa::path(
    delete,
    path = "/notes/note/{id}",
    params(("id" = String, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not the uploader or admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown note id", body = crate::api::error::ErrorBody)
    ),
    tag = "notes"
)]
pub async fn delete_note(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    blob: Extension<Arc<dyn BlobStore>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth_state, &pool).await?;
    let note_id = parse_content_id(&id)?;

    let Some(owner) = storage::fetch_note_owner(&pool, note_id).await? else {
        return Err(ApiError::NotFound);
    };
    if owner != principal.user_id && !principal.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let Some(file_url) = storage::remove_note(&pool, note_id).await? else {
        return Err(ApiError::NotFound);
    };

    // Best effort: the row is already gone, a leftover file only wastes disk.
    let store = blob.0.clone();
    match tokio::task::spawn_blocking(move || store.delete(&file_url)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%note_id, "failed to remove stored upload: {err:#}"),
        Err(err) => warn!(%note_id, "upload cleanup task failed: {err}"),
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "note.deleted",
        &format!("note {note_id}"),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Note deleted".to_string(),
        }),
    ))
}
