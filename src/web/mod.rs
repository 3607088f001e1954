//! Local REST interface for corner-heal
//!
//! Exposes the batch engine over HTTP so a browser front end can upload
//! images, start runs, poll progress, and download results.
//!
//! # Usage
//!
//! Enable the `web` feature and use the `serve` subcommand:
//!
//! ```bash
//! cargo build --features web
//! corner-heal serve --port 8080
//! ```

mod routes;
mod server;

pub use routes::{api_routes, AcceptedResponse, AppError, AppState, BatchView, HealthResponse};
pub use server::{ServerConfig, ServerError, WebServer};

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default upload limit in bytes (100 MB)
pub const DEFAULT_UPLOAD_LIMIT: usize = 100 * 1024 * 1024;
