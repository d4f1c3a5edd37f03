//! Route handlers for the NoteNexus API.
//!
//! `auth` owns signup, sign-in and the bearer principal used by every
//! protected endpoint. `notes`, `tips` and `files` share the moderation
//! lifecycle (pending until an admin approves or rejects). The remaining
//! modules are reference data and small reads around that core.

pub mod activity;
pub mod announcements;
pub mod auth;
pub mod contact;
pub mod events;
pub mod feedback;
pub mod files;
pub mod health;
pub mod notes;
pub mod root;
pub mod subjects;
pub mod tips;
pub mod users;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;

/// Upload ceiling after base64 decoding.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// How many rows a bulk moderation actually changed. Ids already decided
/// or unknown are skipped, never errors.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ModeratedCountResponse {
    pub count: u64,
}

/// Decode an upload body. Accepts raw base64 and the `data:` URLs that
/// `FileReader.readAsDataURL` produces.
pub(crate) fn decode_file_data(data: &str) -> Result<Vec<u8>, ApiError> {
    let trimmed = data.trim();
    let encoded = if let Some(rest) = trimmed.strip_prefix("data:") {
        let Some((_, payload)) = rest.split_once("base64,") else {
            return Err(ApiError::Validation(
                "fileData must be base64 encoded".to_string(),
            ));
        };
        payload
    } else {
        trimmed
    };

    // Cheap length gate before decoding anything oversized.
    if encoded.len() > MAX_UPLOAD_BYTES / 3 * 4 + 4 {
        return Err(ApiError::Validation(
            "File exceeds the 10 MiB limit".to_string(),
        ));
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| ApiError::Validation("fileData must be base64 encoded".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::Validation("fileData must not be empty".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::Validation(
            "File exceeds the 10 MiB limit".to_string(),
        ));
    }
    Ok(bytes)
}

/// Parse a content id from a request path. A value that is not a UUID
/// cannot name a row, so it reads as absent.
pub(crate) fn parse_content_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id.trim()).map_err(|_| ApiError::NotFound)
}

/// Bulk moderation ids arrive as strings; entries that are not UUIDs are
/// skipped exactly like ids that no longer exist.
pub(crate) fn parse_bulk_ids(raw: &[String]) -> Vec<Uuid> {
    raw.iter()
        .filter_map(|value| Uuid::parse_str(value.trim()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_content_id_accepts_uuid() {
        let id = parse_content_id(" 0a1b2c3d-0000-4000-8000-000000000042 ");
        assert!(id.is_ok());
    }

    #[test]
    fn parse_content_id_rejects_garbage() {
        assert!(matches!(parse_content_id("42"), Err(ApiError::NotFound)));
        assert!(matches!(parse_content_id(""), Err(ApiError::NotFound)));
    }

    #[test]
    fn parse_bulk_ids_skips_non_uuids() {
        let raw = vec![
            "0a1b2c3d-0000-4000-8000-000000000001".to_string(),
            "not-an-id".to_string(),
            " 0a1b2c3d-0000-4000-8000-000000000002 ".to_string(),
        ];
        let ids = parse_bulk_ids(&raw);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn parse_bulk_ids_empty_input() {
        assert!(parse_bulk_ids(&[]).is_empty());
    }

    #[test]
    fn decode_file_data_accepts_raw_base64() {
        let bytes = decode_file_data("aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn decode_file_data_accepts_data_urls() {
        let bytes = decode_file_data("data:application/pdf;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn decode_file_data_rejects_invalid_input() {
        assert!(matches!(
            decode_file_data("not base64!!"),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            decode_file_data("data:application/pdf,plain"),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(decode_file_data(""), Err(ApiError::Validation(_))));
    }
}
