//! REST API routes for the web server
//!
//! Provides endpoints for batch upload, runs, retries, result download, and
//! health checks.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::archive::{output_name, ArchiveError, DEFAULT_ARCHIVE_NAME};
use crate::batch::{
    Activity, BatchEngine, BatchSnapshot, EngineError, ImageId, ImageSummary, RetryOutcome,
    RunOutcome, SourceImage,
};
use crate::cli::mime_type_for;
use crate::progress::RunProgress;
use crate::selection::{Corner, ProcessingSelection, Tool};

/// Multipart field carrying uploaded images
const UPLOAD_FIELD: &str = "files";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: BatchEngine,
    /// File name offered for archive downloads
    pub archive_name: String,
    pub version: String,
}

impl AppState {
    pub fn new(engine: BatchEngine) -> Self {
        Self {
            engine,
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = name.into();
        self
    }
}

/// Build the API router
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/batch",
            get(get_batch).post(upload_batch).delete(clear_batch),
        )
        .route("/selection", get(get_selection).put(update_selection))
        .route("/process", post(start_process))
        .route("/retry-failed", post(start_retry_failed))
        .route("/images/{id}/retry", post(retry_image))
        .route("/images/{id}/result", get(download_result))
        .route("/archive", get(download_archive))
}

// ============ Responses ============

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub busy: bool,
}

/// Everything a front end needs to render the batch
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    pub images: Vec<ImageSummary>,
    pub selection: ProcessingSelection,
    pub progress: RunProgress,
    pub activity: Activity,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrying: Option<ImageId>,
    pub has_errors: bool,
    pub has_results: bool,
}

impl From<BatchSnapshot> for BatchView {
    fn from(snapshot: BatchSnapshot) -> Self {
        Self {
            busy: snapshot.is_busy(),
            retrying: snapshot.retrying(),
            has_errors: snapshot.has_errors(),
            has_results: snapshot.has_results(),
            images: snapshot.images.iter().map(|image| image.summary()).collect(),
            selection: snapshot.selection,
            progress: snapshot.progress,
            activity: snapshot.activity,
        }
    }
}

/// Reply to a request that starts background work
#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    /// False when the engine was busy and the request was ignored
    pub accepted: bool,
}

fn accepted(accepted: bool) -> (StatusCode, Json<AcceptedResponse>) {
    (StatusCode::ACCEPTED, Json(AcceptedResponse { accepted }))
}

/// Partial selection update; omitted fields keep their value
#[derive(Debug, Default, Deserialize)]
pub struct SelectionUpdate {
    pub corner: Option<Corner>,
    pub tool: Option<Tool>,
}

#[derive(Debug, Deserialize)]
pub struct RetryRequest {
    pub tool: Tool,
}

/// File download with a suggested name
#[derive(Debug)]
pub struct FileDownload {
    data: Vec<u8>,
    filename: String,
    content_type: String,
}

impl IntoResponse for FileDownload {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, self.content_type),
                (
                    header::CONTENT_DISPOSITION,
                    content_disposition(&self.filename),
                ),
            ],
            self.data,
        )
            .into_response()
    }
}

/// `attachment` disposition with `name` as a quoted string
fn content_disposition(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len());
    for c in name.chars().filter(|c| !c.is_control()) {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    format!("attachment; filename=\"{}\"", quoted)
}

/// Base name of an uploaded file, without directories or control characters
fn upload_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let name: String = base.chars().filter(|c| !c.is_control()).collect();
    let name = name.trim();
    match name {
        "" | "." | ".." => None,
        _ => Some(name.to_string()),
    }
}

// ============ Handlers ============

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        busy: state.engine.is_busy().await,
    })
}

async fn get_batch(State(state): State<Arc<AppState>>) -> Json<BatchView> {
    Json(state.engine.snapshot().await.into())
}

/// Replace the batch with uploaded images
async fn upload_batch(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BatchView>), AppError> {
    let mut sources = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .and_then(upload_file_name)
            .unwrap_or_else(|| format!("image-{}", sources.len() + 1));
        let mime_type = field
            .content_type()
            .filter(|mime| mime.starts_with("image/"))
            .map(str::to_string)
            .or_else(|| mime_type_for(std::path::Path::new(&name)).map(str::to_string))
            .ok_or_else(|| AppError::BadRequest(format!("{} is not a supported image", name)))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read {}: {}", name, e)))?;

        sources.push(SourceImage::new(name, mime_type, data.to_vec()));
    }

    if sources.is_empty() {
        return Err(AppError::BadRequest("No files uploaded".to_string()));
    }

    state.engine.load(sources).await?;
    Ok((
        StatusCode::CREATED,
        Json(state.engine.snapshot().await.into()),
    ))
}

async fn clear_batch(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.engine.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_selection(State(state): State<Arc<AppState>>) -> Json<ProcessingSelection> {
    Json(state.engine.selection().await)
}

async fn update_selection(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SelectionUpdate>,
) -> Json<ProcessingSelection> {
    if let Some(corner) = update.corner {
        state.engine.set_corner(corner).await;
    }
    if let Some(tool) = update.tool {
        state.engine.set_tool(tool).await;
    }
    Json(state.engine.selection().await)
}

/// Start processing every image in the background
async fn start_process(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    let engine = state.engine.clone();
    if engine.is_empty().await {
        return Err(EngineError::EmptyBatch.into());
    }
    if engine.is_busy().await {
        return Ok(accepted(false));
    }

    tokio::spawn(async move {
        match engine.process_all().await {
            Ok(outcome) => log_run(&outcome),
            Err(e) => warn!(error = %e, "Background run did not start"),
        }
    });
    Ok(accepted(true))
}

/// Start retrying failed images in the background
async fn start_retry_failed(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    let engine = state.engine.clone();
    if engine.is_empty().await {
        return Err(EngineError::EmptyBatch.into());
    }
    if engine.is_busy().await || !engine.has_errors().await {
        return Ok(accepted(false));
    }

    tokio::spawn(async move {
        let outcome = engine.retry_failed().await;
        log_run(&outcome);
    });
    Ok(accepted(true))
}

/// Retry one image with an explicit tool in the background
async fn retry_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ImageId>,
    Json(request): Json<RetryRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    let engine = state.engine.clone();
    if engine.is_busy().await {
        return Ok(accepted(false));
    }
    if engine.image(id).await.is_none() {
        return Err(EngineError::UnknownImage(id).into());
    }

    tokio::spawn(async move {
        match engine.retry_single(id, request.tool).await {
            Ok(RetryOutcome::Completed(status)) => {
                info!(image = %id, %status, "Background retry finished")
            }
            Ok(RetryOutcome::Ignored) => {
                warn!(image = %id, "Accepted retry ignored, engine was claimed first")
            }
            Err(e) => warn!(image = %id, error = %e, "Background retry did not start"),
        }
    });
    Ok(accepted(true))
}

fn log_run(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(summary) => info!(
            kind = %summary.kind,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Background run finished"
        ),
        RunOutcome::Ignored => warn!("Accepted run ignored, engine was claimed first"),
    }
}

/// Download one edited image
async fn download_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ImageId>,
) -> Result<FileDownload, AppError> {
    let image = state
        .engine
        .image(id)
        .await
        .ok_or(EngineError::UnknownImage(id))?;

    match image.result() {
        Some(result) => Ok(FileDownload {
            data: result.bytes.to_vec(),
            filename: output_name(image.name()),
            content_type: result.mime_type.clone(),
        }),
        None => Err(AppError::Conflict(format!(
            "Image {} has no result ({})",
            image.name(),
            image.status
        ))),
    }
}

/// Download every edited image as one zip
async fn download_archive(State(state): State<Arc<AppState>>) -> Result<FileDownload, AppError> {
    let data = state.engine.build_archive().await?;
    Ok(FileDownload {
        data,
        filename: state.archive_name.clone(),
        content_type: "application/zip".to_string(),
    })
}

// ============ Errors ============

/// API error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        let message = e.to_string();
        match e {
            EngineError::EmptyBatch => AppError::BadRequest(message),
            EngineError::Busy => AppError::Conflict(message),
            EngineError::UnknownImage(_) => AppError::NotFound(message),
            EngineError::Archive(ArchiveError::EmptyResultSet) => AppError::Conflict(message),
            EngineError::Archive(ArchiveError::ArchiveBuildFailure(_)) => {
                AppError::Internal(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let status = self.status();
        let message = match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg) => msg,
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{EditRequest, EditResult, ImageEditor};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct EchoEditor;

    #[async_trait]
    impl ImageEditor for EchoEditor {
        async fn edit(&self, request: &EditRequest<'_>) -> EditResult<Vec<u8>> {
            Ok(request.image.to_vec())
        }
    }

    fn router() -> (Router, BatchEngine) {
        let engine = BatchEngine::new(Arc::new(EchoEditor));
        let state = Arc::new(AppState::new(engine.clone()));
        (Router::new().nest("/api", api_routes()).with_state(state), engine)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_state_new() {
        let engine = BatchEngine::new(Arc::new(EchoEditor));
        let state = AppState::new(engine).with_archive_name("out.zip");
        assert!(!state.version.is_empty());
        assert_eq!(state.archive_name, "out.zip");
    }

    // TC-ROUTES-001: Engine errors map to HTTP statuses
    #[test]
    fn test_app_error_from_engine_error() {
        let cases = [
            (EngineError::EmptyBatch, StatusCode::BAD_REQUEST),
            (EngineError::Busy, StatusCode::CONFLICT),
            (EngineError::UnknownImage(ImageId::new()), StatusCode::NOT_FOUND),
            (
                EngineError::Archive(ArchiveError::EmptyResultSet),
                StatusCode::CONFLICT,
            ),
            (
                EngineError::Archive(ArchiveError::ArchiveBuildFailure("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(AppError::from(error).status(), status);
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = router();
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["busy"], false);
    }

    // TC-ROUTES-002: Empty batch cannot be processed
    #[tokio::test]
    async fn test_process_empty_batch() {
        let (app, _) = router();
        let response = app
            .oneshot(Request::post("/api/process").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "No images selected");
    }

    // TC-ROUTES-003: Partial selection update
    #[tokio::test]
    async fn test_update_selection() {
        let (app, engine) = router();
        let response = app
            .oneshot(
                Request::put("/api/selection")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"corner":"bottom right"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["corner"], "bottom right");
        assert_eq!(json["tool"], "heal");
        assert_eq!(engine.selection().await.corner, Corner::BottomRight);
    }

    #[tokio::test]
    async fn test_unknown_image_result() {
        let (app, _) = router();
        let uri = format!("/api/images/{}/result", ImageId::new());
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_archive_without_results() {
        let (app, _) = router();
        let response = app
            .oneshot(Request::get("/api/archive").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    // TC-ROUTES-004: Download names are quoted safely
    #[test]
    fn test_content_disposition_escapes() {
        assert_eq!(
            content_disposition("a_healed.jpg"),
            "attachment; filename=\"a_healed.jpg\""
        );
        assert_eq!(
            content_disposition("say \"hi\"\r\n.jpg"),
            "attachment; filename=\"say \\\"hi\\\".jpg\""
        );
        assert!(header::HeaderValue::from_str(&content_disposition("a\u{7}b.jpg")).is_ok());
    }

    #[test]
    fn test_upload_file_name() {
        assert_eq!(upload_file_name("a.jpg").as_deref(), Some("a.jpg"));
        assert_eq!(upload_file_name("../x/a.jpg").as_deref(), Some("a.jpg"));
        assert_eq!(upload_file_name("C:\\photos\\b.jpg").as_deref(), Some("b.jpg"));
        assert_eq!(upload_file_name("bad\nname.png").as_deref(), Some("badname.png"));
        assert_eq!(upload_file_name("dir/"), None);
        assert_eq!(upload_file_name(".."), None);
    }

    /// Holds every call until the test releases it
    struct GatedEditor {
        started: tokio::sync::Notify,
        gate: tokio::sync::Semaphore,
    }

    #[async_trait]
    impl ImageEditor for GatedEditor {
        async fn edit(&self, request: &EditRequest<'_>) -> EditResult<Vec<u8>> {
            self.started.notify_one();
            self.gate.acquire().await.unwrap().forget();
            Ok(request.image.to_vec())
        }
    }

    // TC-ROUTES-005: Busy is reported before unknown images, as in the engine
    #[tokio::test]
    async fn test_retry_while_busy_checks_busy_first() {
        let editor = Arc::new(GatedEditor {
            started: tokio::sync::Notify::new(),
            gate: tokio::sync::Semaphore::new(0),
        });
        let engine = BatchEngine::new(editor.clone());
        engine
            .load(vec![SourceImage::new("a.jpg", "image/jpeg", b"a".to_vec())])
            .await
            .unwrap();
        let app = Router::new()
            .nest("/api", api_routes())
            .with_state(Arc::new(AppState::new(engine.clone())));

        let runner = engine.clone();
        let handle = tokio::spawn(async move { runner.process_all().await });
        editor.started.notified().await;

        let uri = format!("/api/images/{}/retry", ImageId::new());
        let response = app
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"tool":"heal"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_json(response).await["accepted"], false);

        editor.gate.add_permits(1);
        handle.await.unwrap().unwrap();
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    // TC-ROUTES-006: An accepted run that loses the claim is a warning
    #[test]
    fn test_ignored_background_run_warns() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || log_run(&RunOutcome::Ignored));

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"), "{}", output);
        assert!(output.contains("Accepted run ignored"), "{}", output);
    }

    #[test]
    fn test_batch_view_serialize() {
        let snapshot = BatchSnapshot {
            images: vec![],
            selection: ProcessingSelection::default(),
            progress: RunProgress::new(2),
            activity: Activity::Idle,
        };
        let json = serde_json::to_value(BatchView::from(snapshot)).unwrap();
        assert_eq!(json["hasErrors"], false);
        assert_eq!(json["progress"]["total"], 2);
        assert_eq!(json["activity"]["state"], "idle");
        assert!(json.get("retrying").is_none());
    }
}
