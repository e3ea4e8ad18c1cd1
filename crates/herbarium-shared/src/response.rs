//! Standardized API response bodies.

use serde::{Deserialize, Serialize};

/// Body of a `429 Too Many Requests` response.
///
/// The shape is fixed so browser clients can rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitedResponse {
    pub error: String,
    pub message: String,
}

impl Default for RateLimitedResponse {
    fn default() -> Self {
        Self {
            error: "Too many requests".to_string(),
            message: "Rate limit exceeded. Please try again later.".to_string(),
        }
    }
}

/// Body returned when a versioned API path cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_version: Option<String>,
    pub supported_versions: Vec<u32>,
}

impl VersionErrorResponse {
    /// A well-formed version that is not served (`501`).
    pub fn unsupported(requested: u64, supported: &[u32]) -> Self {
        Self {
            error: "Unsupported API version".to_string(),
            message: format!("API version {requested} is not implemented."),
            requested_version: Some(requested.to_string()),
            supported_versions: supported.to_vec(),
        }
    }

    /// A version segment that is not a positive integer (`400`).
    pub fn invalid(segment: impl Into<String>, supported: &[u32]) -> Self {
        let segment = segment.into();
        Self {
            error: "Invalid API version".to_string(),
            message: format!("`{segment}` is not a valid API version."),
            requested_version: Some(segment),
            supported_versions: supported.to_vec(),
        }
    }
}

/// RFC 7807 Problem Details for HTTP APIs.
///
/// See: https://datatracker.ietf.org/doc/html/rfc7807
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub error_type: String,

    /// A short, human-readable summary of the problem type.
    pub title: String,

    /// The HTTP status code.
    pub status: u16,

    /// A human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            error_type: "about:blank".to_string(),
            title: title.into(),
            status,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    // Common error constructors
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(400, "Bad Request").with_detail(detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, "Not Found").with_detail(detail)
    }
}
