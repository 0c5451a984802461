use serde::Deserialize;

/// Body of `POST /notifications/{id}/mark_as_read/`.
#[derive(Debug, Deserialize)]
pub struct MarkReadResponse {
    #[serde(default)]
    pub status: Option<String>,
}

/// Error body of the token endpoints.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message from a raw error body.
    pub fn message(raw: &str) -> String {
        match serde_json::from_str::<ErrorBody>(raw) {
            Ok(ErrorBody { detail: Some(detail), .. }) => detail,
            _ if raw.trim().is_empty() => "no details".to_string(),
            _ => raw.trim().to_string(),
        }
    }
}
