//! Authenticated principal extraction and authorization helpers.
//!
//! Flow Overview: read the bearer token, verify its signature, then resolve
//! the subject to a live user row. Claims alone are never trusted for
//! identity. A deleted account means 401 even with a valid signature, and
//! the role comes from the row, so role changes apply on the next request.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use sqlx::PgPool;
use uuid::Uuid;

use super::state::AuthState;
use super::storage::lookup_user_by_id;
use super::types::UserRole;
use crate::api::error::ApiError;

/// Authenticated user context derived from the bearer token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub name: String,
    pub role: UserRole,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Resolve the bearer token to a live user, or fail with 401.
pub async fn require_auth(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
) -> Result<Principal, ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::Unauthenticated)?;
    let claims = state
        .signer()
        .verify(&token, chrono::Utc::now().timestamp())
        .map_err(|_| ApiError::Unauthenticated)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthenticated)?;

    let Some(record) = lookup_user_by_id(pool, user_id).await? else {
        return Err(ApiError::Unauthenticated);
    };

    Ok(Principal {
        user_id: record.user_id,
        name: record.name,
        role: record.role,
    })
}

/// Like `require_auth`, but fails with 403 for non-admin accounts.
pub async fn require_admin(
    headers: &HeaderMap,
    state: &AuthState,
    pool: &PgPool,
) -> Result<Principal, ApiError> {
    let principal = require_auth(headers, state, pool).await?;
    if principal.is_admin() {
        Ok(principal)
    } else {
        Err(ApiError::Forbidden)
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::state::AuthConfig;
    use anyhow::Result;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn headers_with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extract_bearer_token_variants() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
        assert_eq!(
            extract_bearer_token(&headers_with_auth("Bearer abc.def.ghi")),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            extract_bearer_token(&headers_with_auth("bearer abc")),
            Some("abc".to_string())
        );
        assert_eq!(extract_bearer_token(&headers_with_auth("Bearer ")), None);
        assert_eq!(extract_bearer_token(&headers_with_auth("Basic abc")), None);
    }

    #[tokio::test]
    async fn require_auth_rejects_missing_header() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = AuthState::new(AuthConfig::new(), SecretString::from("principal-test"));

        let err = require_auth(&HeaderMap::new(), &state, &pool)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[tokio::test]
    async fn require_auth_rejects_garbage_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = AuthState::new(AuthConfig::new(), SecretString::from("principal-test"));

        let headers = headers_with_auth("Bearer not.a.token");
        let err = require_auth(&headers, &state, &pool).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[tokio::test]
    async fn require_auth_rejects_non_uuid_subject() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = AuthState::new(AuthConfig::new(), SecretString::from("principal-test"));

        // Signed with the right secret but the subject is not a user id.
        let token = state
            .signer()
            .issue("not-a-uuid", "STUDENT", chrono::Utc::now().timestamp())?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);

        let err = require_auth(&headers, &state, &pool).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }

    #[tokio::test]
    async fn require_auth_rejects_foreign_signature() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = AuthState::new(AuthConfig::new(), SecretString::from("principal-test"));
        let other = AuthState::new(AuthConfig::new(), SecretString::from("different-secret"));

        let token = other.signer().issue(
            "b7f9a9e2-0000-4000-8000-000000000001",
            "STUDENT",
            chrono::Utc::now().timestamp(),
        )?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);

        let err = require_auth(&headers, &state, &pool).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated));
        Ok(())
    }
}
