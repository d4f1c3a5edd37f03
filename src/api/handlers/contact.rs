//! Public contact form.
//!
//! Messages are not sent inline; the handler validates and enqueues an
//! outbox row, and the background worker delivers it with retries. The
//! caller gets 202 once the row is durable.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use utoipa::ToSchema;

use super::auth::MessageResponse;
use crate::api::email::enqueue_email;
use crate::api::error::ApiError;

/// Where contact-form messages are delivered.
const CONTACT_INBOX: &str = "support@notenexus.dev";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Accept a contact-form message for asynchronous delivery.
#[utoipa::path(
    post,
    path = "/contact",
    request_body = ContactRequest,
    responses(
        (status = 202, description = "Message queued for delivery", body = MessageResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody)
    ),
    tag = "contact"
)]
pub async fn contact(
    pool: Extension<PgPool>,
    payload: Option<Json<ContactRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }
    let email = request.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::Validation("Message is required".to_string()));
    }

    let payload = serde_json::json!({
        "name": name,
        "email": email,
        "message": message,
    });
    enqueue_email(&pool, CONTACT_INBOX, "contact_message", &payload).await?;
    info!(from = %email, "contact message queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Message received".to_string(),
        }),
    ))
}
