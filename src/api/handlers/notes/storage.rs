//! Database helpers for notes.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::types::NoteResponse;

fn response_from_row(row: &PgRow) -> NoteResponse {
    NoteResponse {
        id: row.get("id"),
        title: row.get("title"),
        branches: row.get("branches"),
        semester: row.get("semester"),
        subject_id: row.get("subject_id"),
        file_name: row.get("file_name"),
        file_url: row.get("file_url"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_by_name: row.get("uploaded_by_name"),
        approved_by: row.get("approved_by"),
        created_at: row.get("created_at"),
    }
}

/// Insert a note awaiting approval. One row carries the whole branch list.
///
/// Returns `None` when `subject_id` references no subject.
pub(super) async fn insert_note(
    pool: &PgPool,
    title: &str,
    branches: &[String],
    semester: i32,
    subject_id: Option<Uuid>,
    file_name: &str,
    file_url: &str,
    uploaded_by: Uuid,
    uploaded_by_name: &str,
) -> Result<Option<NoteResponse>> {
    let query = r#"
        INSERT INTO notes (title, branches, semester, subject_id, file_name, file_url, uploaded_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
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
        .bind(title)
        .bind(branches)
        .bind(semester)
        .bind(subject_id)
        .bind(file_name)
        .bind(file_url)
        .bind(uploaded_by)
        .fetch_one(pool)
        .instrument(span)
        .await;

    let row = match row {
        Ok(row) => row,
        Err(err) => {
            if is_foreign_key_violation(&err) {
                return Ok(None);
            }
            return Err(err).context("failed to insert note");
        }
    };

    Ok(Some(NoteResponse {
        id: row.get("id"),
        title: title.to_string(),
        branches: branches.to_vec(),
        semester,
        subject_id: subject_id.map(|id| id.to_string()),
        file_name: file_name.to_string(),
        file_url: file_url.to_string(),
        uploaded_by: uploaded_by.to_string(),
        uploaded_by_name: uploaded_by_name.to_string(),
        approved_by: None,
        created_at: row.get("created_at"),
    }))
}

/// Approved notes, optionally narrowed by branch, semester and subject.
pub(super) async fn fetch_approved_notes(
    pool: &PgPool,
    branch: Option<&str>,
    semester: Option<i32>,
    subject_id: Option<Uuid>,
) -> Result<Vec<NoteResponse>> {
    let query = r#"
        SELECT
            n.id::text AS id,
            n.title,
            n.branches,
            n.semester,
            n.subject_id::text AS subject_id,
            n.file_name,
            n.file_url,
            n.uploaded_by::text AS uploaded_by,
            u.name AS uploaded_by_name,
            n.approved_by::text AS approved_by,
            to_char(n.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM notes n
        JOIN users u ON u.id = n.uploaded_by
        WHERE n.approved_by IS NOT NULL
          AND ($1::text IS NULL OR $1 = ANY(n.branches))
          AND ($2::int IS NULL OR n.semester = $2)
          AND ($3::uuid IS NULL OR n.subject_id = $3)
        ORDER BY n.created_at DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(branch)
        .bind(semester)
        .bind(subject_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list approved notes")?;

    Ok(rows.iter().map(response_from_row).collect())
}

/// Notes still waiting on a decision, oldest first so the queue drains fairly.
pub(super) async fn fetch_pending_notes(pool: &PgPool) -> Result<Vec<NoteResponse>> {
    let query = r#"
        SELECT
            n.id::text AS id,
            n.title,
            n.branches,
            n.semester,
            n.subject_id::text AS subject_id,
            n.file_name,
            n.file_url,
            n.uploaded_by::text AS uploaded_by,
            u.name AS uploaded_by_name,
            n.approved_by::text AS approved_by,
            to_char(n.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM notes n
        JOIN users u ON u.id = n.uploaded_by
        WHERE n.approved_by IS NULL
        ORDER BY n.created_at ASC
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
        .context("failed to list pending notes")?;

    Ok(rows.iter().map(response_from_row).collect())
}

/// Approve one note unconditionally, recording the moderator.
///
/// Re-approving overwrites the approver with the latest actor. Returns
/// `false` when the id names no row.
pub(super) async fn set_note_approver(pool: &PgPool, note_id: Uuid, approver: Uuid) -> Result<bool> {
    let query = "UPDATE notes SET approved_by = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(note_id)
        .bind(approver)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to approve note")?;

    Ok(result.rows_affected() > 0)
}

/// Approve every still-pending id in one conditional update.
pub(super) async fn approve_pending_notes(
    pool: &PgPool,
    note_ids: &[Uuid],
    approver: Uuid,
) -> Result<u64> {
    let query = r"
        UPDATE notes
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
        .bind(note_ids)
        .bind(approver)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to bulk approve notes")?;

    Ok(result.rows_affected())
}

/// Who uploaded the note, or `None` when the id names no row.
pub(super) async fn fetch_note_owner(pool: &PgPool, note_id: Uuid) -> Result<Option<Uuid>> {
    let query = "SELECT uploaded_by FROM notes WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(note_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup note owner")?;

    Ok(row.map(|row| row.get("uploaded_by")))
}

/// Delete a note, returning its stored file URL so the blob can be
/// reclaimed; feedback rows cascade in the schema.
pub(super) async fn remove_note(pool: &PgPool, note_id: Uuid) -> Result<Option<String>> {
    let query = "DELETE FROM notes WHERE id = $1 RETURNING file_url";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(note_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to delete note")?;

    Ok(row.map(|row| row.get("file_url")))
}

/// SQLSTATE 23503: the bound subject id references no row.
fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}
