//! Batch Processing Engine module
//!
//! Tracks every selected image through `pending → processing → done/error`.
//!
//! # Operations
//!
//! - **Process all** - reset the batch and edit every image in order
//! - **Retry failed** - edit only the images currently in error
//! - **Retry single** - edit one image again with an explicit tool
//!
//! Images are processed one at a time, and at most one operation is active
//! per engine. Requests made while busy are ignored.
//!
//! # Example
//!
//! ```rust,no_run
//! use corner_heal::{BatchEngine, HttpEditClient, SourceImage};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpEditClient::new("http://127.0.0.1:3000/api/process-image")?;
//! let engine = BatchEngine::new(Arc::new(client));
//!
//! engine
//!     .load(vec![SourceImage::new("photo.jpg", "image/jpeg", std::fs::read("photo.jpg")?)])
//!     .await?;
//! engine.process_all().await?;
//! engine.retry_failed().await;
//!
//! std::fs::write("healed-images.zip", engine.build_archive().await?)?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod types;

// Re-export public API
pub use engine::BatchEngine;
pub use types::{
    Activity, BatchSnapshot, EditedImage, EngineError, ImageId, ImageStatus, ImageSummary, Result,
    RetryOutcome, RunKind, RunOutcome, RunSummary, SourceImage, StatusKind, TrackedImage,
};
