//! Batch processing engine
//!
//! Owns the tracked images and drives them through the edit client one at a
//! time. Every operation claims the engine under a single write lock; requests
//! that arrive while another operation holds the claim are ignored rather than
//! queued.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{
    Activity, BatchSnapshot, EditedImage, EngineError, ImageId, ImageStatus, Result,
    RetryOutcome, RunKind, RunOutcome, RunSummary, SourceImage, TrackedImage,
};
use crate::archive;
use crate::client::{EditRequest, ImageEditor};
use crate::progress::{NoopProgress, ProgressCallback, RunProgress};
use crate::selection::{Corner, ProcessingSelection, Tool};

/// Message used when the client fails without saying why
const UNKNOWN_ERROR: &str = "An unknown error occurred";

/// Message for an image whose edit was abandoned mid-call
const INTERRUPTED: &str = "Processing was interrupted";

#[derive(Debug, Default)]
struct EngineState {
    images: Vec<TrackedImage>,
    selection: ProcessingSelection,
    progress: RunProgress,
    activity: Activity,
}

impl EngineState {
    /// Release an abandoned claim: fail images left mid-edit, go idle
    fn abandon(&mut self) {
        for image in self.images.iter_mut() {
            if image.status == ImageStatus::Processing {
                image.status = ImageStatus::Error(INTERRUPTED.to_string());
            }
        }
        warn!(activity = ?self.activity, "Operation interrupted, engine released");
        self.activity = Activity::Idle;
    }
}

/// Exclusive claim on the engine for one operation
///
/// Taken under the write lock together with the busy check. An operation that
/// finishes normally disarms the claim after going idle itself; if its future
/// is dropped or panics instead, dropping the claim releases the engine.
struct Claim {
    state: Arc<RwLock<EngineState>>,
    armed: bool,
}

impl Claim {
    fn new(state: &Arc<RwLock<EngineState>>) -> Self {
        Self {
            state: state.clone(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.state.try_write() {
            state.abandon();
            return;
        }

        // Lock is held by an observer; finish the release once it is free
        let state = self.state.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    state.write().await.abandon();
                });
            }
            Err(_) => warn!("Engine claim dropped outside a runtime, engine stays busy"),
        }
    }
}

/// Batch processing engine
///
/// Cloning yields another handle to the same batch, so a background task can
/// run the batch while other handles observe it.
#[derive(Clone)]
pub struct BatchEngine {
    editor: Arc<dyn ImageEditor>,
    callback: Arc<dyn ProgressCallback>,
    state: Arc<RwLock<EngineState>>,
}

impl BatchEngine {
    /// Create an engine with the default selection
    pub fn new(editor: Arc<dyn ImageEditor>) -> Self {
        Self::with_selection(editor, ProcessingSelection::default())
    }

    /// Create an engine with the given initial selection
    pub fn with_selection(editor: Arc<dyn ImageEditor>, selection: ProcessingSelection) -> Self {
        Self {
            editor,
            callback: Arc::new(NoopProgress),
            state: Arc::new(RwLock::new(EngineState {
                selection,
                ..Default::default()
            })),
        }
    }

    /// Report progress to the given observer
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.callback = callback;
        self
    }

    // ============ Batch Lifecycle ============

    /// Replace the batch with a new selection of files
    ///
    /// Fails with [`EngineError::Busy`] while an operation is active; the
    /// current batch is left untouched in that case.
    pub async fn load(&self, sources: Vec<SourceImage>) -> Result<Vec<ImageId>> {
        let mut state = self.state.write().await;
        if state.activity.is_busy() {
            return Err(EngineError::Busy);
        }

        state.images = sources.into_iter().map(TrackedImage::new).collect();
        state.progress = RunProgress::default();

        info!(count = state.images.len(), "Batch loaded");
        Ok(state.images.iter().map(|image| image.id).collect())
    }

    /// Discard the batch
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.activity.is_busy() {
            return Err(EngineError::Busy);
        }

        state.images.clear();
        state.progress = RunProgress::default();
        debug!("Batch cleared");
        Ok(())
    }

    // ============ Selection ============

    /// Current corner and tool
    pub async fn selection(&self) -> ProcessingSelection {
        self.state.read().await.selection
    }

    /// Replace corner and tool; runs already started keep their own copy
    pub async fn set_selection(&self, selection: ProcessingSelection) {
        self.state.write().await.selection = selection;
    }

    pub async fn set_corner(&self, corner: Corner) {
        self.state.write().await.selection.corner = corner;
    }

    pub async fn set_tool(&self, tool: Tool) {
        self.state.write().await.selection.tool = tool;
    }

    // ============ Operations ============

    /// Process every image in batch order with the current selection
    ///
    /// Returns [`EngineError::EmptyBatch`] for an empty batch and
    /// [`RunOutcome::Ignored`] if another operation is active.
    pub async fn process_all(&self) -> Result<RunOutcome> {
        let (claim, working_set, selection) = {
            let mut state = self.state.write().await;
            if state.images.is_empty() {
                return Err(EngineError::EmptyBatch);
            }
            if state.activity.is_busy() {
                debug!(activity = ?state.activity, "Process request ignored");
                return Ok(RunOutcome::Ignored);
            }

            state.activity = Activity::Running {
                kind: RunKind::ProcessAll,
            };
            for image in state.images.iter_mut() {
                image.status = ImageStatus::Pending;
            }
            let total = state.images.len();
            state.progress = RunProgress::new(total);

            let ids: Vec<ImageId> = state.images.iter().map(|image| image.id).collect();
            (Claim::new(&self.state), ids, state.selection)
        };

        let summary = self
            .execute_run(claim, RunKind::ProcessAll, working_set, selection)
            .await;
        Ok(RunOutcome::Completed(summary))
    }

    /// Reprocess only the images that are currently in error
    ///
    /// Ignored if nothing failed or another operation is active.
    pub async fn retry_failed(&self) -> RunOutcome {
        let (claim, working_set, selection) = {
            let mut state = self.state.write().await;
            if state.activity.is_busy() {
                debug!(activity = ?state.activity, "Retry request ignored");
                return RunOutcome::Ignored;
            }

            let failed: Vec<ImageId> = state
                .images
                .iter()
                .filter(|image| matches!(image.status, ImageStatus::Error(_)))
                .map(|image| image.id)
                .collect();
            if failed.is_empty() {
                return RunOutcome::Ignored;
            }

            state.activity = Activity::Running {
                kind: RunKind::RetryFailed,
            };
            for image in state.images.iter_mut() {
                if matches!(image.status, ImageStatus::Error(_)) {
                    image.status = ImageStatus::Pending;
                }
            }
            state.progress = RunProgress::new(failed.len());

            (Claim::new(&self.state), failed, state.selection)
        };

        RunOutcome::Completed(
            self.execute_run(claim, RunKind::RetryFailed, working_set, selection)
                .await,
        )
    }

    /// Reprocess one image with an explicit tool and the current corner
    ///
    /// Leaves the run counters alone. Ignored if another operation is active.
    pub async fn retry_single(&self, id: ImageId, tool: Tool) -> Result<RetryOutcome> {
        let (claim, source, corner) = {
            let mut state = self.state.write().await;
            if state.activity.is_busy() {
                debug!(image = %id, activity = ?state.activity, "Single retry ignored");
                return Ok(RetryOutcome::Ignored);
            }

            let corner = state.selection.corner;
            let image = state
                .images
                .iter_mut()
                .find(|image| image.id == id)
                .ok_or(EngineError::UnknownImage(id))?;
            image.status = ImageStatus::Processing;
            let source = image.source.clone();

            state.activity = Activity::Retrying { image: id };
            (Claim::new(&self.state), source, corner)
        };

        info!(image = %source.name, %corner, %tool, "Retrying image");
        let status = self.edit(&source, corner, tool).await;

        let mut state = self.state.write().await;
        if let Some(image) = state.images.iter_mut().find(|image| image.id == id) {
            image.status = status.clone();
        }
        state.activity = Activity::Idle;
        claim.disarm();

        Ok(RetryOutcome::Completed(status))
    }

    /// Zip every finished result in batch order
    pub async fn build_archive(&self) -> Result<Vec<u8>> {
        let state = self.state.read().await;
        Ok(archive::build_archive(&state.images)?)
    }

    // ============ Observation ============

    /// Copy of the whole engine state
    pub async fn snapshot(&self) -> BatchSnapshot {
        let state = self.state.read().await;
        BatchSnapshot {
            images: state.images.clone(),
            selection: state.selection,
            progress: state.progress,
            activity: state.activity,
        }
    }

    /// Copy of one tracked image
    pub async fn image(&self, id: ImageId) -> Option<TrackedImage> {
        let state = self.state.read().await;
        state.images.iter().find(|image| image.id == id).cloned()
    }

    /// Counters of the most recent run
    pub async fn progress(&self) -> RunProgress {
        self.state.read().await.progress
    }

    pub async fn activity(&self) -> Activity {
        self.state.read().await.activity
    }

    /// Check if a run or single retry is active
    pub async fn is_busy(&self) -> bool {
        self.state.read().await.activity.is_busy()
    }

    /// Check if any image is in error
    pub async fn has_errors(&self) -> bool {
        let state = self.state.read().await;
        state
            .images
            .iter()
            .any(|image| matches!(image.status, ImageStatus::Error(_)))
    }

    /// Check if any image has a result
    pub async fn has_results(&self) -> bool {
        let state = self.state.read().await;
        state.images.iter().any(|image| image.result().is_some())
    }

    /// Number of tracked images
    pub async fn len(&self) -> usize {
        self.state.read().await.images.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.images.is_empty()
    }

    // ============ Run Loop ============

    /// Drive a claimed working set to completion, then release the engine
    async fn execute_run(
        &self,
        claim: Claim,
        kind: RunKind,
        working_set: Vec<ImageId>,
        selection: ProcessingSelection,
    ) -> RunSummary {
        let started_at = Utc::now();
        let total = working_set.len();
        let mut succeeded = 0;
        let mut failed = 0;

        info!(
            %kind,
            total,
            corner = %selection.corner,
            tool = %selection.tool,
            "Run started"
        );
        self.callback.on_run_start(kind, total);

        for (index, id) in working_set.into_iter().enumerate() {
            let source = self.begin_image(id).await;
            let status = match &source {
                Some(source) => {
                    debug!(image = %source.name, index, total, "Processing image");
                    self.callback.on_image_start(&source.name, index, total);
                    self.edit(source, selection.corner, selection.tool).await
                }
                None => ImageStatus::Error(format!("Image {} is no longer tracked", id)),
            };

            match status {
                ImageStatus::Done(_) => succeeded += 1,
                _ => failed += 1,
            }

            let progress = self.finish_image(id, status.clone()).await;
            if let Some(source) = &source {
                self.callback
                    .on_image_complete(&source.name, &status, progress);
            }
        }

        let summary = RunSummary {
            kind,
            total,
            succeeded,
            failed,
            started_at,
            finished_at: Utc::now(),
        };

        self.state.write().await.activity = Activity::Idle;
        claim.disarm();

        info!(%kind, total, succeeded, failed, "Run finished");
        self.callback.on_run_complete(&summary);
        summary
    }

    async fn begin_image(&self, id: ImageId) -> Option<SourceImage> {
        let mut state = self.state.write().await;
        let image = state.images.iter_mut().find(|image| image.id == id)?;
        image.status = ImageStatus::Processing;
        Some(image.source.clone())
    }

    async fn finish_image(&self, id: ImageId, status: ImageStatus) -> RunProgress {
        let mut state = self.state.write().await;
        if let Some(image) = state.images.iter_mut().find(|image| image.id == id) {
            image.status = status;
        }
        state.progress.processed += 1;
        state.progress
    }

    /// One collaborator call, folded into the image's final status
    async fn edit(&self, source: &SourceImage, corner: Corner, tool: Tool) -> ImageStatus {
        let request = EditRequest {
            image: &source.bytes[..],
            mime_type: &source.mime_type,
            corner,
            tool,
        };

        match self.editor.edit(&request).await {
            Ok(bytes) => ImageStatus::Done(EditedImage {
                bytes: bytes.into(),
                mime_type: source.mime_type.clone(),
                tool,
            }),
            Err(e) => {
                let message = e.to_string();
                let message = if message.trim().is_empty() {
                    UNKNOWN_ERROR.to_string()
                } else {
                    message
                };
                warn!(image = %source.name, error = %message, "Edit failed");
                ImageStatus::Error(message)
            }
        }
    }
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine").finish_non_exhaustive()
    }
}
