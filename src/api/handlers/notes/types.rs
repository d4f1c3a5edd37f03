//! Request/response types for the notes endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadNoteRequest {
    pub title: String,
    /// Branches the note should be discoverable under.
    pub branches: Vec<String>,
    pub semester: i32,
    #[serde(default)]
    pub subject_id: Option<String>,
    pub file_name: String,
    /// Base64 file content, raw or as a `data:` URL.
    pub file_data: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BulkApproveNotesRequest {
    pub note_ids: Vec<String>,
}

/// Optional filters for the approved-notes listing.
#[derive(IntoParams, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotesQuery {
    pub branch: Option<String>,
    pub semester: Option<String>,
    pub subject_id: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub id: String,
    pub title: String,
    pub branches: Vec<String>,
    pub semester: i32,
    pub subject_id: Option<String>,
    pub file_name: String,
    pub file_url: String,
    pub uploaded_by: String,
    pub uploaded_by_name: String,
    pub approved_by: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn upload_request_parses_camel_case() -> Result<()> {
        let request: UploadNoteRequest = serde_json::from_value(serde_json::json!({
            "title": "DBMS unit 3",
            "branches": ["CSE", "IT"],
            "semester": 4,
            "subjectId": "7b3e6f4a-0000-4000-8000-000000000001",
            "fileName": "dbms-unit3.pdf",
            "fileData": "aGVsbG8="
        }))?;
        assert_eq!(request.branches.len(), 2);
        assert_eq!(request.semester, 4);
        assert!(request.subject_id.is_some());
        Ok(())
    }

    #[test]
    fn upload_request_subject_is_optional() -> Result<()> {
        let request: UploadNoteRequest = serde_json::from_value(serde_json::json!({
            "title": "DBMS unit 3",
            "branches": ["CSE"],
            "semester": 4,
            "fileName": "dbms-unit3.pdf",
            "fileData": "aGVsbG8="
        }))?;
        assert!(request.subject_id.is_none());
        Ok(())
    }

    #[test]
    fn note_response_serializes_camel_case() -> Result<()> {
        let note = NoteResponse {
            id: "n-1".to_string(),
            title: "DBMS unit 3".to_string(),
            branches: vec!["CSE".to_string()],
            semester: 4,
            subject_id: None,
            file_name: "dbms-unit3.pdf".to_string(),
            file_url: "/uploads/abc_dbms-unit3.pdf".to_string(),
            uploaded_by: "u-1".to_string(),
            uploaded_by_name: "Alice Doe".to_string(),
            approved_by: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&note)?;
        value.get("fileUrl").context("fileUrl key")?;
        value.get("uploadedByName").context("uploadedByName key")?;
        value.get("subjectId").context("subjectId key")?;
        assert!(value.get("file_url").is_none());
        Ok(())
    }
}
