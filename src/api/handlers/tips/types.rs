//! Request/response types for the tips endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Moderation state. Stored lowercase in Postgres, `UPPERCASE` on the wire.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TipStatus {
    Pending,
    Approved,
    Rejected,
}

impl TipStatus {
    /// Parse a requested moderation target. Only the terminal states are
    /// accepted; `PENDING` cannot be requested back.
    #[must_use]
    pub fn parse_moderation(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Parse the database spelling, covering all three states.
    #[must_use]
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_db(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateTipRequest {
    pub content: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ModerateTipRequest {
    /// `APPROVED` or `REJECTED`.
    pub status: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BulkModerateTipsRequest {
    pub tip_ids: Vec<String>,
    /// `APPROVED` or `REJECTED`, applied to every id still pending.
    pub status: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TipResponse {
    pub id: String,
    pub content: String,
    pub status: TipStatus,
    pub posted_by: String,
    pub posted_by_name: String,
    pub approved_by: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn status_wire_spelling_is_uppercase() -> Result<()> {
        let value = serde_json::to_value(TipStatus::Approved)?;
        assert_eq!(value, serde_json::json!("APPROVED"));
        let parsed: TipStatus = serde_json::from_value(serde_json::json!("REJECTED"))?;
        assert_eq!(parsed, TipStatus::Rejected);
        Ok(())
    }

    #[test]
    fn parse_moderation_accepts_terminal_states_only() {
        assert_eq!(
            TipStatus::parse_moderation("APPROVED"),
            Some(TipStatus::Approved)
        );
        assert_eq!(
            TipStatus::parse_moderation(" rejected "),
            Some(TipStatus::Rejected)
        );
        assert_eq!(TipStatus::parse_moderation("PENDING"), None);
        assert_eq!(TipStatus::parse_moderation("withdrawn"), None);
        assert_eq!(TipStatus::parse_moderation(""), None);
    }

    #[test]
    fn db_spellings_round_trip() {
        for status in [TipStatus::Pending, TipStatus::Approved, TipStatus::Rejected] {
            assert_eq!(TipStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(TipStatus::from_db("APPROVED"), None);
    }

    #[test]
    fn bulk_request_uses_camel_case_ids() -> Result<()> {
        let request: BulkModerateTipsRequest = serde_json::from_value(serde_json::json!({
            "tipIds": ["a", "b"],
            "status": "APPROVED"
        }))?;
        assert_eq!(request.tip_ids.len(), 2);
        assert_eq!(request.status, "APPROVED");
        Ok(())
    }

    #[test]
    fn tip_response_serializes_camel_case() -> Result<()> {
        let tip = TipResponse {
            id: "t-1".to_string(),
            content: "Revise with past papers".to_string(),
            status: TipStatus::Pending,
            posted_by: "u-1".to_string(),
            posted_by_name: "Alice Doe".to_string(),
            approved_by: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&tip)?;
        value.get("postedBy").context("postedBy key")?;
        value.get("postedByName").context("postedByName key")?;
        assert_eq!(value.get("status"), Some(&serde_json::json!("PENDING")));
        assert!(value.get("approvedBy").context("approvedBy key")?.is_null());
        Ok(())
    }
}
