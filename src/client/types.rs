//! Image edit client core types
//!
//! The collaborator contract and the JSON shapes exchanged with the
//! image-editing service.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selection::{Corner, Tool};

// ============================================================
// Error Types
// ============================================================

/// Failure of a single edit request
///
/// Both variants are captured into the image's error state by the engine;
/// neither aborts a run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The service rejected the edit, or the request never completed
    #[error("{0}")]
    RemoteEditFailure(String),

    /// The service answered successfully without a usable image
    #[error("Service returned no image")]
    NoImageReturned,
}

pub type EditResult<T> = std::result::Result<T, EditError>;

/// Failure to construct a client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================
// Collaborator Contract
// ============================================================

/// One edit to perform
#[derive(Debug, Clone, Copy)]
pub struct EditRequest<'a> {
    /// Original image bytes
    pub image: &'a [u8],
    /// Declared mime type of `image`
    pub mime_type: &'a str,
    /// Where the object to remove sits
    pub corner: Corner,
    /// Removal strategy
    pub tool: Tool,
}

/// External image-editing collaborator
///
/// Implementations perform exactly one attempt per call. Retrying is the
/// caller's decision.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Edit one image, returning the edited bytes
    async fn edit(&self, request: &EditRequest<'_>) -> EditResult<Vec<u8>>;
}

// ============================================================
// Wire Format
// ============================================================

/// Request body sent to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPayload {
    /// Base64 (standard alphabet, padded) image bytes
    pub image_data: String,
    pub mime_type: String,
    pub corner: Corner,
    pub tool: Tool,
}

impl EditPayload {
    /// Encode a request for the wire
    pub fn from_request(request: &EditRequest<'_>) -> Self {
        Self {
            image_data: general_purpose::STANDARD.encode(request.image),
            mime_type: request.mime_type.to_string(),
            corner: request.corner,
            tool: request.tool,
        }
    }
}

/// Successful response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_image_data: Option<String>,
}

/// Failure response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // TC-CLIENT-001: Payload field names
    #[test]
    fn test_payload_serialization() {
        let request = EditRequest {
            image: b"abc",
            mime_type: "image/png",
            corner: Corner::TopRight,
            tool: Tool::GenerativeRemove,
        };
        let json = serde_json::to_value(EditPayload::from_request(&request)).unwrap();

        assert_eq!(json["imageData"], "YWJj");
        assert_eq!(json["mimeType"], "image/png");
        assert_eq!(json["corner"], "top right");
        assert_eq!(json["tool"], "generative-remove");
    }

    // TC-CLIENT-002: Missing result field deserializes as None
    #[test]
    fn test_response_missing_field() {
        let response: EditResponse = serde_json::from_str("{}").unwrap();
        assert!(response.result_image_data.is_none());

        let response: EditResponse =
            serde_json::from_str(r#"{"resultImageData":"AAEC"}"#).unwrap();
        assert_eq!(response.result_image_data.as_deref(), Some("AAEC"));
    }

    #[test]
    fn test_edit_error_display() {
        assert_eq!(
            EditError::RemoteEditFailure("rate limited".to_string()).to_string(),
            "rate limited"
        );
        assert_eq!(EditError::NoImageReturned.to_string(), "Service returned no image");
    }
}
