//! General study-material files: upload, list, moderate, delete.
//!
//! Same moderation lifecycle as notes (approver column, `NULL` means
//! pending) without the branch and semester metadata.

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
use tracing::{Instrument, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::activity::record_activity;
use super::auth::principal::{require_admin, require_auth};
use super::auth::{AuthState, MessageResponse};
use super::{ModeratedCountResponse, decode_file_data, parse_bulk_ids, parse_content_id};
use crate::api::blob::BlobStore;
use crate::api::error::ApiError;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    pub file_name: String,
    /// Base64 file content, raw or as a `data:` URL.
    pub file_data: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BulkApproveFilesRequest {
    pub file_ids: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: String,
    pub file_name: String,
    pub file_url: String,
    pub description: Option<String>,
    pub uploaded_by: String,
    pub uploaded_by_name: String,
    pub approved_by: Option<String>,
    pub created_at: String,
}

fn response_from_row(row: &PgRow) -> FileResponse {
    FileResponse {
        id: row.get("id"),
        file_name: row.get("file_name"),
        file_url: row.get("file_url"),
        description: row.get("description"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_by_name: row.get("uploaded_by_name"),
        approved_by: row.get("approved_by"),
        created_at: row.get("created_at"),
    }
}

async fn insert_file(
    pool: &PgPool,
    file_name: &str,
    file_url: &str,
    description: Option<&str>,
    uploaded_by: Uuid,
    uploaded_by_name: &str,
) -> Result<FileResponse> {
    let query = r#"
        INSERT INTO files (file_name, file_url, description, uploaded_by)
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
        .bind(file_name)
        .bind(file_url)
        .bind(description)
        .bind(uploaded_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert file")?;

    Ok(FileResponse {
        id: row.get("id"),
        file_name: file_name.to_string(),
        file_url: file_url.to_string(),
        description: description.map(str::to_string),
        uploaded_by: uploaded_by.to_string(),
        uploaded_by_name: uploaded_by_name.to_string(),
        approved_by: None,
        created_at: row.get("created_at"),
    })
}

async fn fetch_files(pool: &PgPool, approved: bool) -> Result<Vec<FileResponse>> {
    let query = if approved {
        r#"
        SELECT
            f.id::text AS id,
            f.file_name,
            f.file_url,
            f.description,
            f.uploaded_by::text AS uploaded_by,
            u.name AS uploaded_by_name,
            f.approved_by::text AS approved_by,
            to_char(f.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM files f
        JOIN users u ON u.id = f.uploaded_by
        WHERE f.approved_by IS NOT NULL
        ORDER BY f.created_at DESC
        "#
    } else {
        r#"
        SELECT
            f.id::text AS id,
            f.file_name,
            f.file_url,
            f.description,
            f.uploaded_by::text AS uploaded_by,
            u.name AS uploaded_by_name,
            f.approved_by::text AS approved_by,
            to_char(f.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM files f
        JOIN users u ON u.id = f.uploaded_by
        WHERE f.approved_by IS NULL
        ORDER BY f.created_at ASC
        "#
    };
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
        .context("failed to list files")?;

    Ok(rows.iter().map(response_from_row).collect())
}

async fn set_file_approver(pool: &PgPool, file_id: Uuid, approver: Uuid) -> Result<bool> {
    let query = "UPDATE files SET approved_by = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(file_id)
        .bind(approver)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to approve file")?;

    Ok(result.rows_affected() > 0)
}

async fn approve_pending_files(pool: &PgPool, file_ids: &[Uuid], approver: Uuid) -> Result<u64> {
    let query = r"
        UPDATE files
        SET approved_by = $2
        WHERE id = ANY($1) AND approved_by IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(file_ids)
        .bind(approver)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to bulk approve files")?;

    Ok(result.rows_affected())
}

async fn fetch_file_owner(pool: &PgPool, file_id: Uuid) -> Result<Option<Uuid>> {
    let query = "SELECT uploaded_by FROM files WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(file_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup file owner")?;

    Ok(row.map(|row| row.get("uploaded_by")))
}

/// Delete a file row, returning its stored URL so the blob can be reclaimed.
async fn remove_file(pool: &PgPool, file_id: Uuid) -> Result<Option<String>> {
    let query = "DELETE FROM files WHERE id = $1 RETURNING file_url";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(file_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to delete file")?;

    Ok(row.map(|row| row.get("file_url")))
}

/// Upload a study file; hidden until approved.
#[utoipa::path(
    post,
    path = "/files/file/upload",
    request_body = UploadFileRequest,
    responses(
        (status = 201, description = "File submitted for moderation", body = FileResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody)
    ),
    tag = "files"
)]
pub async fn upload_file(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    blob: Extension<Arc<dyn BlobStore>>,
    payload: Option<Json<UploadFileRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let file_name = request.file_name.trim();
    if file_name.is_empty() {
        return Err(ApiError::Validation("fileName is required".to_string()));
    }
    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let bytes = decode_file_data(&request.file_data)?;

    let store = blob.0.clone();
    let stored_name = file_name.to_string();
    let file_url = tokio::task::spawn_blocking(move || store.store(&stored_name, &bytes))
        .await
        .context("upload task failed")??;

    let file = insert_file(
        &pool,
        file_name,
        &file_url,
        description,
        principal.user_id,
        &principal.name,
    )
    .await?;

    info!(file_id = %file.id, "file submitted");
    record_activity(
        &pool,
        Some(principal.user_id),
        "file.uploaded",
        &format!("file {}", file.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(file)))
}

/// Approved files, visible to everyone.
#[utoipa::path(
    get,
    path = "/files/files",
    responses(
        (status = 200, description = "Approved files", body = [FileResponse])
    ),
    tag = "files"
)]
pub async fn list_files(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let files = fetch_files(&pool, true).await?;
    Ok((StatusCode::OK, Json(files)))
}

/// Moderation worklist, oldest upload first.
#[utoipa::path(
    get,
    path = "/files/files/pending",
    responses(
        (status = 200, description = "Pending files", body = [FileResponse]),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "files"
)]
pub async fn list_pending_files(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&headers, &auth_state, &pool).await?;
    let files = fetch_files(&pool, false).await?;
    Ok((StatusCode::OK, Json(files)))
}

/// Approve one file.
#[utoipa::path(
    put,
    path = "/files/file/approve/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File approved", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown file id", body = crate::api::error::ErrorBody)
    ),
    tag = "files"
)]
pub async fn approve_file(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let file_id = parse_content_id(&id)?;

    if !set_file_approver(&pool, file_id, principal.user_id).await? {
        return Err(ApiError::NotFound);
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "file.approved",
        &format!("file {file_id}"),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "File approved".to_string(),
        }),
    ))
}

/// Approve a batch of files in one conditional update.
#[utoipa::path(
    put,
    path = "/files/file/approve",
    request_body = BulkApproveFilesRequest,
    responses(
        (status = 200, description = "Count of files actually changed", body = ModeratedCountResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "files"
)]
pub async fn approve_files(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<BulkApproveFilesRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if request.file_ids.is_empty() {
        return Err(ApiError::Validation(
            "fileIds must not be empty".to_string(),
        ));
    }

    let file_ids = parse_bulk_ids(&request.file_ids);
    let count = approve_pending_files(&pool, &file_ids, principal.user_id).await?;
    info!(count, "bulk approved files");
    record_activity(
        &pool,
        Some(principal.user_id),
        "file.bulk_approved",
        &format!("{count} files approved"),
    )
    .await;

    Ok((StatusCode::OK, Json(ModeratedCountResponse { count })))
}

/// Delete a file. Allowed for its uploader and for the admin.
#[utoipa::path(
    delete,
    path = "/files/file/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not the uploader or admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown file id", body = crate::api::error::ErrorBody)
    ),
    tag = "files"
)]
pub async fn delete_file(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    blob: Extension<Arc<dyn BlobStore>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth_state, &pool).await?;
    let file_id = parse_content_id(&id)?;

    let Some(owner) = fetch_file_owner(&pool, file_id).await? else {
        return Err(ApiError::NotFound);
    };
    if owner != principal.user_id && !principal.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let Some(file_url) = remove_file(&pool, file_id).await? else {
        return Err(ApiError::NotFound);
    };

    // Best effort: the row is already gone, a leftover file only wastes disk.
    let store = blob.0.clone();
    match tokio::task::spawn_blocking(move || store.delete(&file_url)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%file_id, "failed to remove stored upload: {err:#}"),
        Err(err) => warn!(%file_id, "upload cleanup task failed: {err}"),
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "file.deleted",
        &format!("file {file_id}"),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "File deleted".to_string(),
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
            SecretString::from("files-test"),
        ))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[test]
    fn upload_request_parses_camel_case() -> Result<()> {
        let request: UploadFileRequest = serde_json::from_value(serde_json::json!({
            "fileName": "syllabus.pdf",
            "fileData": "aGVsbG8=",
            "description": "Current syllabus"
        }))?;
        assert_eq!(request.file_name, "syllabus.pdf");
        assert!(request.description.is_some());
        Ok(())
    }

    #[test]
    fn file_response_serializes_camel_case() -> Result<()> {
        let file = FileResponse {
            id: "f-1".to_string(),
            file_name: "syllabus.pdf".to_string(),
            file_url: "/uploads/abc_syllabus.pdf".to_string(),
            description: None,
            uploaded_by: "u-1".to_string(),
            uploaded_by_name: "Alice Doe".to_string(),
            approved_by: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&file)?;
        assert!(value.get("fileUrl").is_some());
        assert!(value.get("uploadedByName").is_some());
        assert!(value.get("file_url").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn upload_file_requires_token() -> Result<()> {
        let blob: Arc<dyn BlobStore> =
            Arc::new(crate::api::blob::FsBlobStore::new("/tmp/files-test", "/uploads"));
        let err = upload_file(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(test_state()),
            Extension(blob),
            Some(Json(UploadFileRequest {
                file_name: "syllabus.pdf".to_string(),
                file_data: "aGVsbG8=".to_string(),
                description: None,
            })),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[tokio::test]
    async fn approve_file_requires_token() -> Result<()> {
        let err = approve_file(
            Path("7b3e6f4a-0000-4000-8000-000000000001".to_string()),
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

    #[tokio::test]
    async fn delete_file_requires_token() -> Result<()> {
        let blob: Arc<dyn BlobStore> =
            Arc::new(crate::api::blob::FsBlobStore::new("/tmp/files-test", "/uploads"));
        let err = delete_file(
            Path("7b3e6f4a-0000-4000-8000-000000000001".to_string()),
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(test_state()),
            Extension(blob),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }
}
