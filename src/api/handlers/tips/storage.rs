//! Database helpers for tips.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{TipResponse, TipStatus};

fn parse_status(status_text: &str) -> Result<TipStatus> {
    TipStatus::from_db(status_text)
        .ok_or_else(|| anyhow!("unknown status in tips table: {status_text}"))
}

fn response_from_row(row: &PgRow) -> Result<TipResponse> {
    Ok(TipResponse {
        id: row.get("id"),
        content: row.get("content"),
        status: parse_status(row.get("status"))?,
        posted_by: row.get("posted_by"),
        posted_by_name: row.get("posted_by_name"),
        approved_by: row.get("approved_by"),
        created_at: row.get("created_at"),
    })
}

/// Insert a tip in the pending state.
pub(super) async fn insert_tip(
    pool: &PgPool,
    content: &str,
    posted_by: Uuid,
    posted_by_name: &str,
) -> Result<TipResponse> {
    let query = r#"
        INSERT INTO tips (content, posted_by)
        VALUES ($1, $2)
        RETURNING
            id::text AS id,
            status::text AS status,
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
        .bind(posted_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert tip")?;

    Ok(TipResponse {
        id: row.get("id"),
        content: content.to_string(),
        status: parse_status(row.get("status"))?,
        posted_by: posted_by.to_string(),
        posted_by_name: posted_by_name.to_string(),
        approved_by: None,
        created_at: row.get("created_at"),
    })
}

/// Tips in one moderation state, newest first.
pub(super) async fn fetch_tips_by_status(
    pool: &PgPool,
    status: TipStatus,
) -> Result<Vec<TipResponse>> {
    let query = r#"
        SELECT
            t.id::text AS id,
            t.content,
            t.status::text AS status,
            t.posted_by::text AS posted_by,
            u.name AS posted_by_name,
            t.approved_by::text AS approved_by,
            to_char(t.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM tips t
        JOIN users u ON u.id = t.posted_by
        WHERE t.status = $1::tip_status
        ORDER BY t.created_at DESC
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(status.as_db())
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list tips")?;

    rows.iter().map(response_from_row).collect()
}

/// Set one tip's status unconditionally, recording the moderator.
///
/// Re-moderating a decided tip is allowed and overwrites the approver with
/// the latest actor. Returns `false` when the id names no row.
pub(super) async fn set_tip_status(
    pool: &PgPool,
    tip_id: Uuid,
    status: TipStatus,
    approver: Uuid,
) -> Result<bool> {
    let query = r"
        UPDATE tips
        SET status = $2::tip_status, approved_by = $3
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(tip_id)
        .bind(status.as_db())
        .bind(approver)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to moderate tip")?;

    Ok(result.rows_affected() > 0)
}

/// Transition every still-pending id in one conditional update.
///
/// Ids already decided or nonexistent fall out of the WHERE clause, so two
/// concurrent bulk calls cannot double count. Returns the changed count.
pub(super) async fn set_pending_tips_status(
    pool: &PgPool,
    tip_ids: &[Uuid],
    status: TipStatus,
    approver: Uuid,
) -> Result<u64> {
    let query = r"
        UPDATE tips
        SET status = $2::tip_status, approved_by = $3
        WHERE id = ANY($1) AND status = 'pending'
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(tip_ids)
        .bind(status.as_db())
        .bind(approver)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to bulk moderate tips")?;

    Ok(result.rows_affected())
}

/// Who posted the tip, or `None` when the id names no row.
pub(super) async fn fetch_tip_owner(pool: &PgPool, tip_id: Uuid) -> Result<Option<Uuid>> {
    let query = "SELECT posted_by FROM tips WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(tip_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup tip owner")?;

    Ok(row.map(|row| row.get("posted_by")))
}

/// Delete a tip; feedback rows cascade in the schema.
pub(super) async fn remove_tip(pool: &PgPool, tip_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM tips WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(tip_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete tip")?;

    Ok(result.rows_affected() > 0)
}
