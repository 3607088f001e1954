//! Batch module core types
//!
//! Tracked images, their status machine, and the engine's error and outcome
//! types.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::archive::ArchiveError;
use crate::progress::RunProgress;
use crate::selection::{ProcessingSelection, Tool};

// ============================================================
// Error Types
// ============================================================

/// Batch engine error types
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No images selected")]
    EmptyBatch,

    #[error("A run is in progress")]
    Busy,

    #[error("Image not found: {0}")]
    UnknownImage(ImageId),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

// ============================================================
// Identity
// ============================================================

/// Stable identifier assigned when an image enters a batch
///
/// File names are not unique within a selection, so they are only used for
/// display and output naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ImageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ============================================================
// Images
// ============================================================

/// Original file as selected by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// File name including extension
    pub name: String,
    /// Declared mime type
    pub mime_type: String,
    /// Original bytes, shared and never modified
    pub bytes: Arc<[u8]>,
    /// Opaque display handle owned by the presentation layer
    pub preview: Option<String>,
}

impl SourceImage {
    /// Create a source image
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
            preview: None,
        }
    }

    /// Attach a presentation-layer preview handle
    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.preview = Some(preview.into());
        self
    }
}

/// Successful edit result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedImage {
    /// Edited bytes returned by the service
    pub bytes: Arc<[u8]>,
    /// Mime type of `bytes`
    pub mime_type: String,
    /// Tool that produced this result
    pub tool: Tool,
}

impl EditedImage {
    /// `data:` URL for inline display
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Per-image processing status
///
/// Result data only exists while `Done`, the failure message only while
/// `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImageStatus {
    /// Waiting to be processed
    #[default]
    Pending,
    /// Edit request in flight
    Processing,
    /// Edited successfully
    Done(EditedImage),
    /// Edit failed with a human-readable message
    Error(String),
}

impl ImageStatus {
    /// Status without its payload
    pub fn kind(&self) -> StatusKind {
        match self {
            ImageStatus::Pending => StatusKind::Pending,
            ImageStatus::Processing => StatusKind::Processing,
            ImageStatus::Done(_) => StatusKind::Done,
            ImageStatus::Error(_) => StatusKind::Error,
        }
    }

    /// Check if the image reached a final state
    pub fn is_finished(&self) -> bool {
        matches!(self, ImageStatus::Done(_) | ImageStatus::Error(_))
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind(), f)
    }
}

/// Payload-free status label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    Processing,
    Done,
    Error,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKind::Pending => write!(f, "pending"),
            StatusKind::Processing => write!(f, "processing"),
            StatusKind::Done => write!(f, "done"),
            StatusKind::Error => write!(f, "error"),
        }
    }
}

/// Image tracked by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedImage {
    pub id: ImageId,
    pub source: SourceImage,
    pub status: ImageStatus,
}

impl TrackedImage {
    /// Start tracking a source image as pending
    pub fn new(source: SourceImage) -> Self {
        Self {
            id: ImageId::new(),
            source,
            status: ImageStatus::Pending,
        }
    }

    /// Original file name
    pub fn name(&self) -> &str {
        &self.source.name
    }

    /// Edited result, if done
    pub fn result(&self) -> Option<&EditedImage> {
        match &self.status {
            ImageStatus::Done(result) => Some(result),
            _ => None,
        }
    }

    /// Failure message, if errored
    pub fn failure_message(&self) -> Option<&str> {
        match &self.status {
            ImageStatus::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Tool that produced the current result
    pub fn tool_used(&self) -> Option<Tool> {
        self.result().map(|result| result.tool)
    }

    /// Serializable summary without image bytes
    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            id: self.id,
            name: self.source.name.clone(),
            mime_type: self.source.mime_type.clone(),
            status: self.status.kind(),
            error: self.failure_message().map(str::to_string),
            tool_used: self.tool_used(),
            result_size: self.result().map(|result| result.bytes.len()),
        }
    }
}

/// Byte-free view of a tracked image for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub id: ImageId,
    pub name: String,
    pub mime_type: String,
    pub status: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_size: Option<usize>,
}

// ============================================================
// Runs
// ============================================================

/// Kind of whole-batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Every image in the batch
    ProcessAll,
    /// Only images that were in error when the run started
    RetryFailed,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::ProcessAll => write!(f, "process_all"),
            RunKind::RetryFailed => write!(f, "retry_failed"),
        }
    }
}

/// What the engine is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    /// A whole-batch run is active
    Running { kind: RunKind },
    /// A single-image retry is active
    Retrying { image: ImageId },
}

impl Activity {
    /// Check if any operation is active
    pub fn is_busy(&self) -> bool {
        !matches!(self, Activity::Idle)
    }
}

/// Result of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub kind: RunKind,
    /// Images in the working set
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Wall-clock duration in seconds
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Check if every image in the working set succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Outcome of a whole-batch run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run executed to completion
    Completed(RunSummary),
    /// The request was ignored: engine busy, or nothing to retry
    Ignored,
}

impl RunOutcome {
    /// Summary of the run, if it executed
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::Completed(summary) => Some(summary),
            RunOutcome::Ignored => None,
        }
    }
}

/// Outcome of a single-image retry request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The retry executed; final status of the image
    Completed(ImageStatus),
    /// The request was ignored because the engine was busy
    Ignored,
}

/// Point-in-time copy of everything the presentation layer renders
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub images: Vec<TrackedImage>,
    pub selection: ProcessingSelection,
    pub progress: RunProgress,
    pub activity: Activity,
}

impl BatchSnapshot {
    /// Check if any operation is active
    pub fn is_busy(&self) -> bool {
        self.activity.is_busy()
    }

    /// Check if any image is in error
    pub fn has_errors(&self) -> bool {
        self.images
            .iter()
            .any(|image| matches!(image.status, ImageStatus::Error(_)))
    }

    /// Check if any image has a result
    pub fn has_results(&self) -> bool {
        self.images.iter().any(|image| image.result().is_some())
    }

    /// Image currently being retried on its own
    pub fn retrying(&self) -> Option<ImageId> {
        match self.activity {
            Activity::Retrying { image } => Some(image),
            _ => None,
        }
    }

    /// Count images in the given state
    pub fn count(&self, kind: StatusKind) -> usize {
        self.images
            .iter()
            .filter(|image| image.status.kind() == kind)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(tool: Tool) -> ImageStatus {
        ImageStatus::Done(EditedImage {
            bytes: Arc::from(vec![1u8, 2, 3]),
            mime_type: "image/png".to_string(),
            tool,
        })
    }

    // TC-TYPES-001: New images start pending
    #[test]
    fn test_tracked_image_new() {
        let image = TrackedImage::new(SourceImage::new("a.jpg", "image/jpeg", vec![0u8]));
        assert_eq!(image.status, ImageStatus::Pending);
        assert_eq!(image.name(), "a.jpg");
        assert!(image.result().is_none());
        assert!(image.failure_message().is_none());
        assert!(image.tool_used().is_none());
    }

    // TC-TYPES-002: Ids are distinct for identical names
    #[test]
    fn test_image_ids_unique() {
        let a = TrackedImage::new(SourceImage::new("same.jpg", "image/jpeg", vec![0u8]));
        let b = TrackedImage::new(SourceImage::new("same.jpg", "image/jpeg", vec![0u8]));
        assert_ne!(a.id, b.id);
    }

    // TC-TYPES-003: Accessors follow status
    #[test]
    fn test_status_accessors() {
        let mut image = TrackedImage::new(SourceImage::new("a.png", "image/png", vec![0u8]));

        image.status = done(Tool::GenerativeRemove);
        assert_eq!(image.tool_used(), Some(Tool::GenerativeRemove));
        assert!(image.failure_message().is_none());

        image.status = ImageStatus::Error("boom".to_string());
        assert_eq!(image.failure_message(), Some("boom"));
        assert!(image.tool_used().is_none());
        assert!(image.result().is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ImageStatus::Pending.to_string(), "pending");
        assert_eq!(ImageStatus::Processing.to_string(), "processing");
        assert_eq!(done(Tool::Heal).to_string(), "done");
        assert_eq!(ImageStatus::Error("x".into()).to_string(), "error");
    }

    #[test]
    fn test_is_finished() {
        assert!(!ImageStatus::Pending.is_finished());
        assert!(!ImageStatus::Processing.is_finished());
        assert!(done(Tool::Heal).is_finished());
        assert!(ImageStatus::Error("x".into()).is_finished());
    }

    #[test]
    fn test_data_url() {
        let result = EditedImage {
            bytes: Arc::from(vec![0u8, 1, 2]),
            mime_type: "image/jpeg".to_string(),
            tool: Tool::Heal,
        };
        assert_eq!(result.data_url(), "data:image/jpeg;base64,AAEC");
    }

    // TC-TYPES-004: Summary serialization
    #[test]
    fn test_summary_serialization() {
        let mut image = TrackedImage::new(SourceImage::new("a.png", "image/png", vec![0u8]));
        image.status = done(Tool::Heal);

        let json = serde_json::to_value(image.summary()).unwrap();
        assert_eq!(json["name"], "a.png");
        assert_eq!(json["status"], "done");
        assert_eq!(json["toolUsed"], "heal");
        assert_eq!(json["resultSize"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_image_id_round_trip() {
        let id = ImageId::new();
        let parsed: ImageId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("nope".parse::<ImageId>().is_err());
    }

    #[test]
    fn test_activity_busy() {
        assert!(!Activity::Idle.is_busy());
        assert!(Activity::Running {
            kind: RunKind::ProcessAll
        }
        .is_busy());
        assert!(Activity::Retrying {
            image: ImageId::new()
        }
        .is_busy());
    }

    #[test]
    fn test_activity_serialization() {
        let json = serde_json::to_string(&Activity::Running {
            kind: RunKind::RetryFailed,
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"running","kind":"retry_failed"}"#);
    }
}
