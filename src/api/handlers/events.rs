//! Campus events: admin-created, everyone reads, soonest first.

use anyhow::{Context as _, Result};
use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::NaiveDate;
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
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub date: String,
    pub created_at: String,
}

fn response_from_row(row: &PgRow) -> EventResponse {
    EventResponse {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        date: row.get("date"),
        created_at: row.get("created_at"),
    }
}

async fn insert_event(
    pool: &PgPool,
    title: &str,
    description: Option<&str>,
    date: NaiveDate,
    created_by: Uuid,
) -> Result<EventResponse> {
    let query = r#"
        INSERT INTO events (title, description, event_date, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING
            id::text AS id,
            title,
            description,
            to_char(event_date, 'YYYY-MM-DD') AS date,
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
        .bind(description)
        .bind(date)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to insert event")?;

    Ok(response_from_row(&row))
}

async fn fetch_events(pool: &PgPool) -> Result<Vec<EventResponse>> {
    let query = r#"
        SELECT
            id::text AS id,
            title,
            description,
            to_char(event_date, 'YYYY-MM-DD') AS date,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM events
        ORDER BY event_date ASC
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
        .context("failed to list events")?;

    Ok(rows.iter().map(response_from_row).collect())
}

async fn remove_event(pool: &PgPool, event_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM events WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(event_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete event")?;

    Ok(result.rows_affected() > 0)
}

/// Publish an event.
#[utoipa::path(
    post,
    path = "/events/event",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "events"
)]
pub async fn create_event(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateEventRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let title = request.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Event title is required".to_string()));
    }
    let date = NaiveDate::parse_from_str(request.date.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Date must be YYYY-MM-DD".to_string()))?;
    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());

    let event = insert_event(&pool, title, description, date, principal.user_id).await?;
    info!(event_id = %event.id, "event created");
    record_activity(
        &pool,
        Some(principal.user_id),
        "event.created",
        &format!("event {}", event.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(event)))
}

/// Upcoming and past events, soonest first.
#[utoipa::path(
    get,
    path = "/events/events",
    responses(
        (status = 200, description = "Events", body = [EventResponse])
    ),
    tag = "events"
)]
pub async fn list_events(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let events = fetch_events(&pool).await?;
    Ok((StatusCode::OK, Json(events)))
}

/// Remove an event.
#[utoipa::path(
    delete,
    path = "/events/event/{id}",
    params(("id" = String, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown event id", body = crate::api::error::ErrorBody)
    ),
    tag = "events"
)]
pub async fn delete_event(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let event_id = parse_content_id(&id)?;

    if !remove_event(&pool, event_id).await? {
        return Err(ApiError::NotFound);
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "event.deleted",
        &format!("event {event_id}"),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Event deleted".to_string(),
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
            SecretString::from("events-test"),
        ))
    }

    fn lazy_pool() -> Result<PgPool> {
        Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?)
    }

    #[tokio::test]
    async fn create_event_requires_token() -> Result<()> {
        let err = create_event(
            HeaderMap::new(),
            Extension(lazy_pool()?),
            Extension(test_state()),
            Some(Json(CreateEventRequest {
                title: "Tech fest".to_string(),
                description: None,
                date: "2025-09-20".to_string(),
            })),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[test]
    fn date_format_is_strict() {
        assert!(NaiveDate::parse_from_str("2025-09-20", "%Y-%m-%d").is_ok());
        assert!(NaiveDate::parse_from_str("20-09-2025", "%Y-%m-%d").is_err());
        assert!(NaiveDate::parse_from_str("2025-13-01", "%Y-%m-%d").is_err());
        assert!(NaiveDate::parse_from_str("next friday", "%Y-%m-%d").is_err());
    }

    #[test]
    fn event_request_parses_camel_case() -> Result<()> {
        let request: CreateEventRequest = serde_json::from_value(serde_json::json!({
            "title": "Hackathon",
            "date": "2025-10-05"
        }))?;
        assert_eq!(request.title, "Hackathon");
        assert!(request.description.is_none());
        Ok(())
    }
}
