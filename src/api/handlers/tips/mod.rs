//! Tip endpoints: submit, list, moderate, delete.
//!
//! Tips carry an explicit status column and are the reference shape for the
//! moderation lifecycle:
//!
//! ```text
//!         submit
//!  (none) -------> PENDING
//!  PENDING --approve(admin)--> APPROVED
//!  PENDING --reject(admin)--> REJECTED
//!  APPROVED/REJECTED --re-moderate(admin)--> APPROVED/REJECTED
//! ```
//!
//! Single moderation is re-entrant and overwrites the approver with the
//! latest actor. Bulk moderation only touches rows still pending and
//! reports the changed count; ineligible or unknown ids are skipped rather
//! than failing the batch.

mod storage;
pub(crate) mod types;

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::activity::record_activity;
use super::auth::principal::{require_admin, require_auth};
use super::auth::{AuthState, MessageResponse};
use super::{ModeratedCountResponse, parse_bulk_ids, parse_content_id};
use crate::api::error::ApiError;
use types::{BulkModerateTipsRequest, CreateTipRequest, ModerateTipRequest, TipResponse, TipStatus};

/// Submit a tip; it stays hidden from students until approved.
#[utoipa::path(
    post,
    path = "/tips/tip",
    request_body = CreateTipRequest,
    responses(
        (status = 201, description = "Tip submitted for moderation", body = TipResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody)
    ),
    tag = "tips"
)]
pub async fn create_tip(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateTipRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let content = request.content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("Tip content is required".to_string()));
    }

    let tip = storage::insert_tip(&pool, content, principal.user_id, &principal.name).await?;
    info!(tip_id = %tip.id, "tip submitted");
    record_activity(
        &pool,
        Some(principal.user_id),
        "tip.created",
        &format!("tip {}", tip.id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(tip)))
}

/// Approved tips, visible to everyone.
#[utoipa::path(
    get,
    path = "/tips/tips",
    responses(
        (status = 200, description = "Approved tips", body = [TipResponse])
    ),
    tag = "tips"
)]
pub async fn list_tips(pool: Extension<PgPool>) -> Result<impl IntoResponse, ApiError> {
    let tips = storage::fetch_tips_by_status(&pool, TipStatus::Approved).await?;
    Ok((StatusCode::OK, Json(tips)))
}

/// Moderation worklist.
#[utoipa::path(
    get,
    path = "/tips/tips/pending",
    responses(
        (status = 200, description = "Pending tips", body = [TipResponse]),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "tips"
)]
pub async fn list_pending_tips(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&headers, &auth_state, &pool).await?;
    let tips = storage::fetch_tips_by_status(&pool, TipStatus::Pending).await?;
    Ok((StatusCode::OK, Json(tips)))
}

/// Approve or reject one tip.
#[utoipa::path(
    put,
    path = "/tips/tip/approve/{id}",
    request_body = ModerateTipRequest,
    params(("id" = String, Path, description = "Tip id")),
    responses(
        (status = 200, description = "Tip moderated", body = MessageResponse),
        (status = 400, description = "Invalid status", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown tip id", body = crate::api::error::ErrorBody)
    ),
    tag = "tips"
)]
pub async fn moderate_tip(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ModerateTipRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let tip_id = parse_content_id(&id)?;
    let Some(status) = TipStatus::parse_moderation(&request.status) else {
        return Err(ApiError::Validation(
            "Status must be APPROVED or REJECTED".to_string(),
        ));
    };

    if !storage::set_tip_status(&pool, tip_id, status, principal.user_id).await? {
        return Err(ApiError::NotFound);
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "tip.moderated",
        &format!("tip {tip_id} {}", status.as_db()),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: format!("Tip {}", status.as_db()),
        }),
    ))
}

/// Moderate a batch of tips in one conditional update.
#[utoipa::path(
    put,
    path = "/tips/tip/approve",
    request_body = BulkModerateTipsRequest,
    responses(
        (status = 200, description = "Count of tips actually changed", body = ModeratedCountResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ErrorBody),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::api::error::ErrorBody)
    ),
    tag = "tips"
)]
pub async fn moderate_tips(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<BulkModerateTipsRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&headers, &auth_state, &pool).await?;
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    if request.tip_ids.is_empty() {
        return Err(ApiError::Validation("tipIds must not be empty".to_string()));
    }
    let Some(status) = TipStatus::parse_moderation(&request.status) else {
        return Err(ApiError::Validation(
            "Status must be APPROVED or REJECTED".to_string(),
        ));
    };

    let tip_ids = parse_bulk_ids(&request.tip_ids);
    let count = storage::set_pending_tips_status(&pool, &tip_ids, status, principal.user_id).await?;
    info!(count, status = status.as_db(), "bulk moderated tips");
    record_activity(
        &pool,
        Some(principal.user_id),
        "tip.bulk_moderated",
        &format!("{count} tips {}", status.as_db()),
    )
    .await;

    Ok((StatusCode::OK, Json(ModeratedCountResponse { count })))
}

/// Delete a tip. Allowed for its author and for the admin.
#[utoipa::path(
    delete,
    path = "/tips/tip/{id}",
    params(("id" = String, Path, description = "Tip id")),
    responses(
        (status = 200, description = "Tip deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::api::error::ErrorBody),
        (status = 403, description = "Not the author or admin", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown tip id", body = crate::api::error::ErrorBody)
    ),
    tag = "tips"
)]
pub async fn delete_tip(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth_state, &pool).await?;
    let tip_id = parse_content_id(&id)?;

    let Some(owner) = storage::fetch_tip_owner(&pool, tip_id).await? else {
        return Err(ApiError::NotFound);
    };
    if owner != principal.user_id && !principal.is_admin() {
        return Err(ApiError::Forbidden);
    }

    if !storage::remove_tip(&pool, tip_id).await? {
        return Err(ApiError::NotFound);
    }
    record_activity(
        &pool,
        Some(principal.user_id),
        "tip.deleted",
        &format!("tip {tip_id}"),
    )
    .await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Tip deleted".to_string(),
        }),
    ))
}
