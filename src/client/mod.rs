//! Image Edit Client module
//!
//! Performs one round-trip to the external image-editing service per image.
//!
//! # Wire contract
//!
//! ```text
//! POST <endpoint>
//! { "imageData": "<base64>", "mimeType": "image/jpeg",
//!   "corner": "top right", "tool": "heal" }
//!
//! 2xx  { "resultImageData": "<base64>" }
//! 4xx/5xx  { "error": "message" }
//! ```
//!
//! No retries and no timeout of its own; a transport timeout can be
//! configured on [`HttpEditClient::with_timeout`].

mod http;
mod types;

// Re-export public API
pub use http::{decode_result, failure_message, HttpEditClient, MAX_RAW_ERROR_LEN};
pub use types::{
    ClientError, EditError, EditPayload, EditRequest, EditResponse, EditResult, ErrorBody,
    ImageEditor,
};
