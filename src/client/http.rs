//! HTTP implementation of the image edit client

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{
    ClientError, EditError, EditPayload, EditRequest, EditResponse, EditResult, ErrorBody,
    ImageEditor,
};

/// Raw response text longer than this is never shown to the user
pub const MAX_RAW_ERROR_LEN: usize = 500;

/// Client for the image-editing service endpoint
#[derive(Debug, Clone)]
pub struct HttpEditClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpEditClient {
    /// Create a client without a request timeout
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        Self::with_timeout(endpoint, None)
    }

    /// Create a client, optionally bounding each request at the transport
    pub fn with_timeout(endpoint: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let endpoint = Url::parse(endpoint).map_err(|e| ClientError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("corner-heal/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoint,
        })
    }

    /// Endpoint requests are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ImageEditor for HttpEditClient {
    async fn edit(&self, request: &EditRequest<'_>) -> EditResult<Vec<u8>> {
        let payload = EditPayload::from_request(request);
        debug!(
            endpoint = %self.endpoint,
            corner = %request.corner,
            tool = %request.tool,
            bytes = request.image.len(),
            "Sending edit request"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| EditError::RemoteEditFailure(format!("Network error: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            EditError::RemoteEditFailure(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            let message = failure_message(status, &body);
            warn!(status = status.as_u16(), %message, "Edit request rejected");
            return Err(EditError::RemoteEditFailure(message));
        }

        decode_result(&body)
    }
}

/// Human-readable message for a non-success response
///
/// Preference: the body's `error` field, then the raw body if it is short
/// plain text, then the bare status.
pub fn failure_message(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorBody { error: Some(error) }) = serde_json::from_str::<ErrorBody>(body) {
        if !error.trim().is_empty() {
            return error;
        }
    }

    let status_message = format!("Request failed with status {}", status.as_u16());
    let text = body.trim();
    if is_presentable_text(text) {
        format!("{}: {}", status_message, text)
    } else {
        status_message
    }
}

/// Decode the edited image from a success response body
pub fn decode_result(body: &str) -> EditResult<Vec<u8>> {
    let response: EditResponse =
        serde_json::from_str(body).map_err(|_| EditError::NoImageReturned)?;

    let data = response
        .result_image_data
        .filter(|data| !data.is_empty())
        .ok_or(EditError::NoImageReturned)?;

    let bytes = general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|_| EditError::NoImageReturned)?;

    if bytes.is_empty() {
        return Err(EditError::NoImageReturned);
    }
    Ok(bytes)
}

fn is_presentable_text(text: &str) -> bool {
    !text.is_empty()
        && text.chars().count() < MAX_RAW_ERROR_LEN
        && !looks_like_markup(text)
        && serde_json::from_str::<serde_json::Value>(text).is_err()
}

fn looks_like_markup(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    text.starts_with('<') || lower.contains("<html") || lower.contains("<!doctype")
}
