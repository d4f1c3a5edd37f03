//! Database helpers for accounts.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::UserRole;
use super::utils::is_unique_violation;

/// Advisory lock serializing admin signups so the count check cannot race.
const ADMIN_SIGNUP_LOCK_ID: i64 = 7_301_204;

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Uuid),
    EmailTaken,
    AdminTaken,
}

/// User row fields needed by the auth flows.
pub(crate) struct UserRecord {
    pub(crate) user_id: Uuid,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) role: UserRole,
    pub(crate) password_hash: String,
}

fn parse_role(role_text: &str) -> Result<UserRole> {
    UserRole::parse(role_text).ok_or_else(|| anyhow!("unknown role in users table: {role_text}"))
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: parse_role(row.get("role"))?,
        password_hash: row.get("password_hash"),
    })
}

/// Insert a user, enforcing the single-admin rule inside the transaction.
///
/// Admin signups take an advisory lock before counting existing admins,
/// so two concurrent admin signups cannot both pass the check. The partial
/// unique index on `role='admin'` backs this up at the database level.
/// The `user.signed_up` audit row rides the same transaction.
pub(super) async fn insert_user(
    pool: &PgPool,
    email: &str,
    name: &str,
    password_hash: &str,
    role: UserRole,
) -> Result<SignupOutcome> {
    let mut tx = pool.begin().await.context("begin signup transaction")?;

    if role == UserRole::Admin {
        let query = "SELECT pg_advisory_xact_lock($1)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(ADMIN_SIGNUP_LOCK_ID)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to take admin signup lock")?;

        let query = "SELECT COUNT(*) AS count FROM users WHERE role = 'admin'";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to count admin accounts")?;
        let count: i64 = row.get("count");
        if count > 0 {
            let _ = tx.rollback().await;
            return Ok(SignupOutcome::AdminTaken);
        }
    }

    let query = r"
        INSERT INTO users (email, name, password_hash, role)
        VALUES ($1, $2, $3, $4::user_role)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(role.as_db())
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                let outcome = if is_single_admin_violation(&err) {
                    SignupOutcome::AdminTaken
                } else {
                    SignupOutcome::EmailTaken
                };
                let _ = tx.rollback().await;
                return Ok(outcome);
            }
            return Err(err).context("failed to insert user");
        }
    };

    // The audit row commits atomically with the account itself.
    let query = "INSERT INTO activity_log (actor_id, action, detail) VALUES ($1, $2, $3)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind("user.signed_up")
        .bind(signup_activity_detail(user_id, role))
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to record signup activity")?;

    tx.commit().await.context("commit signup transaction")?;

    Ok(SignupOutcome::Created(user_id))
}

fn signup_activity_detail(user_id: Uuid, role: UserRole) -> String {
    format!("user {user_id} role {}", role.as_wire())
}

fn is_single_admin_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint() == Some("users_single_admin_idx"),
        _ => false,
    }
}

/// Look up an account by normalized email (used by sign-in).
pub(super) async fn lookup_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, name, email, password_hash, role::text AS role
        FROM users
        WHERE lower(email) = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    row.map(|row| record_from_row(&row)).transpose()
}

/// Look up an account by id (used to resolve session tokens to a live user).
pub(crate) async fn lookup_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, name, email, password_hash, role::text AS role
        FROM users
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;

    row.map(|row| record_from_row(&row)).transpose()
}

/// Number of admin accounts (0 or 1 under the single-admin rule).
pub(super) async fn count_admins(pool: &PgPool) -> Result<i64> {
    let query = "SELECT COUNT(*) AS count FROM users WHERE role = 'admin'";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count admin accounts")?;

    Ok(row.get("count"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_activity_detail_names_user_and_wire_role() {
        let user_id = Uuid::nil();
        assert_eq!(
            signup_activity_detail(user_id, UserRole::Admin),
            format!("user {user_id} role ADMIN")
        );
        assert_eq!(
            signup_activity_detail(user_id, UserRole::Student),
            format!("user {user_id} role STUDENT")
        );
    }
}
