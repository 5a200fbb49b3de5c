use serde::{Deserialize, Serialize};

/// Error body produced by the gateway itself (missing credential, local
/// failure, malformed request). Backend error bodies are relayed untouched
/// and never wrapped in this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: message.to_string(),
            code: code.to_string(),
        }
    }
}

/// Error body as returned by the payroll backend.
///
/// The backend answers validation failures with a `details` list and every
/// other failure with a single `error` (occasionally `message`) string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BackendError {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<Vec<String>>,
}

impl BackendError {
    /// Parse a relayed error body. Bodies that are not JSON objects yield an
    /// empty error so callers fall back to their own generic message.
    pub fn from_slice(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Field-level validation details, if the backend sent any.
    pub fn validation_details(&self) -> Option<&[String]> {
        self.details.as_deref().filter(|d| !d.is_empty())
    }

    /// Best human-readable message, or `fallback` when the body had none.
    pub fn message_or(&self, fallback: &str) -> String {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}
