//! Web server implementation
//!
//! Provides the main server struct and configuration.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use super::routes::{api_routes, AppState};
use super::{DEFAULT_BIND, DEFAULT_PORT, DEFAULT_UPLOAD_LIMIT};
use crate::batch::BatchEngine;
use crate::client::{ClientError, HttpEditClient};
use crate::config::Config;

/// Server error types
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address: {0}")]
    InvalidAddress(#[from] std::net::AddrParseError),

    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Address to bind to
    pub bind: String,
    /// Maximum upload size in bytes
    pub upload_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with the given port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Create a new server config with the given bind address
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Create a new server config with the given upload limit
    pub fn with_upload_limit(mut self, limit: usize) -> Self {
        self.upload_limit = limit;
        self
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind, self.port).parse()
    }
}

/// Web server instance
pub struct WebServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Serve an existing engine
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Build the engine and HTTP client from application config
    pub fn from_config(config: ServerConfig, app: &Config) -> Result<Self, ServerError> {
        let client = HttpEditClient::with_timeout(&app.client.endpoint, app.client.timeout())?;
        let engine = BatchEngine::with_selection(Arc::new(client), app.selection());
        let state = AppState::new(engine).with_archive_name(&app.output.archive_name);
        Ok(Self::new(config, state))
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Engine served by this instance
    pub fn engine(&self) -> &BatchEngine {
        &self.state.engine
    }

    /// Build the router
    pub fn router(&self) -> Router {
        Router::new()
            .nest("/api", api_routes())
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::max(self.config.upload_limit))
            .layer(RequestBodyLimitLayer::new(self.config.upload_limit))
            .with_state(self.state.clone())
    }

    /// Run the server
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = self.config.socket_addr()?;
        let router = self.router();

        println!("Starting server on http://{}", addr);
        println!("API endpoints:");
        println!("  GET    /api/health              - Health check");
        println!("  GET    /api/batch               - Batch snapshot");
        println!("  POST   /api/batch               - Upload images (multipart `files`)");
        println!("  DELETE /api/batch               - Clear batch");
        println!("  PUT    /api/selection           - Set corner and tool");
        println!("  POST   /api/process             - Process all images");
        println!("  POST   /api/retry-failed        - Retry failed images");
        println!("  POST   /api/images/{{id}}/retry   - Retry one image");
        println!("  GET    /api/images/{{id}}/result  - Download one result");
        println!("  GET    /api/archive             - Download all results");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "Server listening");
        axum::serve(listener, router).await?;

        Ok(())
    }
}
