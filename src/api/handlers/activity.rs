//! Append-only audit trail.
//!
//! Signups, moderation transitions, uploads and deletes each leave one row
//! behind. The signup row commits with the account transaction; everything
//! else is best effort: a failed audit insert is logged and swallowed so it
//! can never fail the operation it describes.

use anyhow::Context;
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::auth::AuthState;
use super::auth::principal::require_admin;
use crate::api::error::ApiError;

/// Newest-first page size for the admin view.
const ACTIVITY_PAGE_LIMIT: i64 = 200;

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: String,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub action: String,
    pub detail: String,
    pub created_at: String,
}

/// Record one audit entry.
pub(crate) async fn record_activity(
    pool: &PgPool,
    actor_id: Option<Uuid>,
    action: &str,
    detail: &str,
) {
    let query = "INSERT INTO activity_log (actor_id, action, detail) VALUES ($1, $2, $3)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(actor_id)
        .bind(action)
        .bind(detail)
        .execute(pool)
        .instrument(span)
        .await;
    if let Err(err) = result {
        warn!(action = action, "failed to record activity: {err}");
    }
}

/// Latest audit entries, newest first.
#[utoipa::path(
    get,
    path = "/activity/activities",
    responses(
        (status = 200, description = "Recent activity", body = [ActivityResponse]),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "activity"
)]
pub async fn list_activities(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&headers, &auth_state, &pool).await?;
    let activities = fetch_activities(&pool).await?;
    Ok((StatusCode::OK, Json(activities)))
}

async fn fetch_activities(pool: &PgPool) -> anyhow::Result<Vec<ActivityResponse>> {
    let query = r#"
        SELECT
            a.id::text AS id,
            a.actor_id::text AS actor_id,
            u.name AS actor_name,
            a.action,
            a.detail,
            to_char(a.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM activity_log a
        LEFT JOIN users u ON u.id = a.actor_id
        ORDER BY a.created_at DESC
        LIMIT $1
    "#;
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(ACTIVITY_PAGE_LIMIT)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list activity")?;

    Ok(rows
        .into_iter()
        .map(|row| ActivityResponse {
            id: row.get("id"),
            actor_id: row.get("actor_id"),
            actor_name: row.get("actor_name"),
            action: row.get("action"),
            detail: row.get("detail"),
            created_at: row.get("created_at"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::AuthConfig;
    use anyhow::{Context, Result};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn record_activity_swallows_database_errors() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        // No database behind the lazy pool; the call must still return.
        record_activity(&pool, None, "test.action", "detail").await;
        Ok(())
    }

    #[tokio::test]
    async fn list_activities_requires_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = Arc::new(AuthState::new(
            AuthConfig::new(),
            SecretString::from("activity-test"),
        ));

        let err = list_activities(HeaderMap::new(), Extension(pool), Extension(state))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[test]
    fn activity_response_uses_camel_case() -> Result<()> {
        let entry = ActivityResponse {
            id: "a-1".to_string(),
            actor_id: None,
            actor_name: None,
            action: "tip.moderated".to_string(),
            detail: "tip 42 approved".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&entry)?;
        value.get("actorId").context("actorId key")?;
        value.get("actorName").context("actorName key")?;
        value.get("createdAt").context("createdAt key")?;
        assert!(value.get("actor_id").is_none());
        Ok(())
    }
}
