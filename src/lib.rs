//! corner-heal - Batch object removal for photos
//!
//! Erases an object from a chosen corner of every image in a batch by sending
//! each image to a generative image-editing service, then lets failed images
//! be retried and all results be downloaded as one zip archive.
//!
//! # Modules
//!
//! - [`batch`] - Batch Processing Engine (per-image state machine and runs)
//! - [`client`] - Image Edit Client for the remote service
//! - [`archive`] - Zip archive of finished results
//! - [`selection`] - Corner and tool selection
//! - [`progress`] - Run counters and progress reporting
//! - [`config`] - Layered TOML configuration
//! - [`cli`] - Command-line definitions
//! - `web` - Local REST interface (feature `web`)

pub mod archive;
pub mod batch;
pub mod cli;
pub mod client;
pub mod config;
pub mod progress;
pub mod selection;

#[cfg(feature = "web")]
pub mod web;

// Re-exports for convenience
pub use archive::{
    build_archive, output_name, result_entries, ArchiveError, DEFAULT_ARCHIVE_NAME, RESULT_SUFFIX,
};
pub use batch::{
    Activity, BatchEngine, BatchSnapshot, EditedImage, EngineError, ImageId, ImageStatus,
    ImageSummary, RetryOutcome, RunKind, RunOutcome, RunSummary, SourceImage, StatusKind,
    TrackedImage,
};
pub use cli::{collect_image_files, mime_type_for, read_sources, Cli, Commands, InfoArgs, ProcessArgs};
pub use client::{ClientError, EditError, EditRequest, HttpEditClient, ImageEditor};
pub use config::{CliOverrides, Config, ConfigError};
pub use progress::{NoopProgress, OutputMode, ProgressCallback, RunProgress};
pub use selection::{Corner, ProcessingSelection, Tool};

#[cfg(feature = "web")]
pub use cli::ServeArgs;
#[cfg(feature = "web")]
pub use web::{ServerConfig, WebServer};

/// Process exit codes
pub mod exit_codes {
    /// Every image finished successfully
    pub const SUCCESS: i32 = 0;
    /// Unexpected error
    pub const GENERAL_ERROR: i32 = 1;
    /// Run finished but some images are in error
    pub const PARTIAL_FAILURE: i32 = 2;
    /// Input path missing or no supported images found
    pub const INPUT_NOT_FOUND: i32 = 3;
}
