//! Request/response types for account endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account role. Stored lowercase in Postgres, `UPPERCASE` on the wire.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Student,
}

impl UserRole {
    /// Parse either wire (`ADMIN`) or database (`admin`) spelling.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Student => "student",
        }
    }

    #[must_use]
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Student => "STUDENT",
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GenerateOtpRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    /// Defaults to `STUDENT` when omitted.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

/// Returned by both signup and signin.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckAdminResponse {
    pub admin_exists: bool,
    pub admin_count: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn role_uses_uppercase_on_the_wire() -> Result<()> {
        let value = serde_json::to_value(UserRole::Admin)?;
        assert_eq!(value, "ADMIN");

        let decoded: UserRole = serde_json::from_value(serde_json::json!("STUDENT"))?;
        assert_eq!(decoded, UserRole::Student);
        Ok(())
    }

    #[test]
    fn role_parse_accepts_both_spellings() {
        assert_eq!(UserRole::parse("ADMIN"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse(" Student "), Some(UserRole::Student));
        assert_eq!(UserRole::parse("owner"), None);
        assert_eq!(UserRole::parse(""), None);
    }

    #[test]
    fn role_db_and_wire_spellings() {
        assert_eq!(UserRole::Admin.as_db(), "admin");
        assert_eq!(UserRole::Admin.as_wire(), "ADMIN");
        assert_eq!(UserRole::Student.as_db(), "student");
        assert_eq!(UserRole::Student.as_wire(), "STUDENT");
    }

    #[test]
    fn signup_request_round_trips() -> Result<()> {
        let request = SignupRequest {
            email: "a@b.com".to_string(),
            name: "Alice Doe".to_string(),
            password: "123456".to_string(),
            role: Some("STUDENT".to_string()),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "a@b.com");
        let decoded: SignupRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.name, "Alice Doe");
        Ok(())
    }

    #[test]
    fn signup_request_role_is_optional() -> Result<()> {
        let decoded: SignupRequest = serde_json::from_value(serde_json::json!({
            "email": "a@b.com",
            "name": "Alice Doe",
            "password": "123456",
        }))?;
        assert_eq!(decoded.role, None);
        Ok(())
    }

    #[test]
    fn check_admin_response_uses_camel_case() -> Result<()> {
        let value = serde_json::to_value(CheckAdminResponse {
            admin_exists: true,
            admin_count: 1,
        })?;
        assert_eq!(value.get("adminExists"), Some(&serde_json::json!(true)));
        assert_eq!(value.get("adminCount"), Some(&serde_json::json!(1)));
        Ok(())
    }

    #[test]
    fn auth_response_round_trips() -> Result<()> {
        let response = AuthResponse {
            token: "abc.def.ghi".to_string(),
            user: UserProfile {
                id: "user-1".to_string(),
                name: "Alice Doe".to_string(),
                email: "a@b.com".to_string(),
                role: UserRole::Student,
            },
        };
        let value = serde_json::to_value(&response)?;
        let role = value
            .get("user")
            .and_then(|user| user.get("role"))
            .and_then(serde_json::Value::as_str)
            .context("missing role")?;
        assert_eq!(role, "STUDENT");
        Ok(())
    }
}
