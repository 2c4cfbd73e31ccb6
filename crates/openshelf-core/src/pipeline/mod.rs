//! Modal acquisition pipeline.
//!
//! Moves one selected asset from "selected" to "imported into the scene"
//! through a state machine ticked from the UI thread. Download and extract
//! run as spawned tasks publishing into shared records the tick polls;
//! import runs inline in the tick, so scene mutation never leaves the UI
//! thread.

pub mod handoff;

pub use handoff::{DrainOutcome, ImportHandoff, ImportPacket};

use crate::annotate::attach_cultural_metadata;
use crate::asset::CulturalAsset;
use crate::config::{LibraryConfig, PipelineConfig};
use crate::download::manager::is_supported_url;
use crate::download::{extract_archive, DownloadManager, DownloadProgress};
use crate::error::{OpenShelfError, Result};
use crate::host::{ImportSettings, ModelImporter, SceneObject, SceneStateStore};
use crate::ui::UiState;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One acquisition at a time per process.
static ACQUISITION_ACTIVE: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Download,
    Extract,
    Import,
    Complete,
    Error,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Complete | PipelineState::Error | PipelineState::Cancelled
        )
    }
}

#[derive(Default)]
struct DownloadShared {
    current_url: String,
    outcome: Option<Result<PathBuf>>,
}

#[derive(Default)]
struct ExtractShared {
    entries_done: usize,
    entries_total: usize,
    /// Path of the chosen primary 3D file on success.
    outcome: Option<Result<PathBuf>>,
}

/// State machine for one asset acquisition, driven by `tick()`.
pub struct ModalAcquisitionPipeline {
    asset: CulturalAsset,
    settings: ImportSettings,
    manager: Arc<DownloadManager>,
    runtime: tokio::runtime::Handle,

    state: PipelineState,
    ui: UiState,
    progress: DownloadProgress,
    global_timeout: Duration,
    step_timeout: Duration,
    started: Instant,
    step_entered: Instant,
    cancel_requested: bool,
    error_message: String,

    download: Arc<Mutex<DownloadShared>>,
    extract: Arc<Mutex<ExtractShared>>,
    extract_dir: PathBuf,
    model_file: Option<PathBuf>,
    imported: Option<Box<dyn SceneObject>>,
    guard_released: bool,
}

impl std::fmt::Debug for ModalAcquisitionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModalAcquisitionPipeline")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ModalAcquisitionPipeline {
    /// Claim the process-wide acquisition slot and prepare the pipeline.
    ///
    /// A second concurrent acquisition is rejected with a precondition
    /// warning until the first reaches a terminal state.
    pub fn new(
        asset: CulturalAsset,
        settings: ImportSettings,
        manager: Arc<DownloadManager>,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self> {
        Self::with_timeouts(
            asset,
            settings,
            manager,
            runtime,
            PipelineConfig::GLOBAL_TIMEOUT,
            PipelineConfig::STEP_TIMEOUT,
        )
    }

    /// Like `new`, with explicit timeout bounds instead of the defaults.
    pub fn with_timeouts(
        asset: CulturalAsset,
        settings: ImportSettings,
        manager: Arc<DownloadManager>,
        runtime: tokio::runtime::Handle,
        global_timeout: Duration,
        step_timeout: Duration,
    ) -> Result<Self> {
        if ACQUISITION_ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OpenShelfError::Precondition {
                message: "another acquisition is already in progress".to_string(),
            });
        }

        let extract_dir = manager
            .session_dir()
            .join(format!("extract_{}", uuid::Uuid::new_v4().simple()));
        let now = Instant::now();
        Ok(Self {
            asset,
            settings,
            manager,
            runtime,
            state: PipelineState::Init,
            ui: UiState::new(),
            progress: DownloadProgress::new(),
            global_timeout,
            step_timeout,
            started: now,
            step_entered: now,
            cancel_requested: false,
            error_message: String::new(),
            download: Arc::new(Mutex::new(DownloadShared::default())),
            extract: Arc::new(Mutex::new(ExtractShared::default())),
            extract_dir,
            model_file: None,
            imported: None,
            guard_released: false,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// The imported scene object, available once the pipeline completed.
    pub fn take_imported(&mut self) -> Option<Box<dyn SceneObject>> {
        self.imported.take()
    }

    /// Request cancellation (the ESC path). Takes effect on the next tick;
    /// the in-flight transfer stops at its next chunk boundary.
    pub fn cancel(&mut self) {
        self.cancel_requested = true;
        self.progress.cancel();
    }

    /// Advance the state machine. Call from the UI thread at 20-50 Hz.
    pub fn tick(
        &mut self,
        importer: &mut dyn ModelImporter,
        store: &mut dyn SceneStateStore,
    ) -> PipelineState {
        if self.state.is_terminal() {
            return self.state;
        }

        if self.cancel_requested {
            self.enter_cancelled(store);
            return self.state;
        }
        if self.started.elapsed() > self.global_timeout {
            self.enter_error(store, "Operation timed out".to_string());
            return self.state;
        }
        if self.step_entered.elapsed() > self.step_timeout {
            self.enter_error(store, "Step timed out".to_string());
            return self.state;
        }

        match self.state {
            PipelineState::Init => self.step_init(store),
            PipelineState::Download => self.step_download(store),
            PipelineState::Extract => self.step_extract(store),
            PipelineState::Import => self.step_import(importer, store),
            _ => {}
        }
        self.state
    }

    fn step_init(&mut self, store: &mut dyn SceneStateStore) {
        let urls: Vec<String> = self
            .asset
            .model_urls
            .iter()
            .filter(|u| is_supported_url(u))
            .cloned()
            .collect();
        if urls.is_empty() {
            self.enter_error(store, "No download URL available".to_string());
            return;
        }

        self.ui.begin("Step 1/3: Downloading model");
        self.ui
            .update(PipelineConfig::DOWNLOAD_SPAN.0, "Step 1/3: Downloading model");
        store.set_is_downloading(true);

        let manager = Arc::clone(&self.manager);
        let progress = self.progress.clone();
        let shared = Arc::clone(&self.download);
        self.runtime.spawn(async move {
            let mut last_error: Option<OpenShelfError> = None;
            for url in urls {
                shared.lock().unwrap().current_url = url.clone();
                match manager.download_file(&url, true, &progress).await {
                    Ok(path) => {
                        shared.lock().unwrap().outcome = Some(Ok(path));
                        return;
                    }
                    Err(e) if e.is_cancelled() => {
                        shared.lock().unwrap().outcome = Some(Err(e));
                        return;
                    }
                    Err(e) => {
                        warn!("Download failed for {}: {}", url, e);
                        last_error = Some(e);
                    }
                }
            }
            shared.lock().unwrap().outcome =
                Some(Err(last_error.unwrap_or_else(|| OpenShelfError::DownloadFailed {
                    url: String::new(),
                    message: "no usable model URL".to_string(),
                })));
        });

        self.transition(PipelineState::Download);
        self.publish(store);
    }

    fn step_download(&mut self, store: &mut dyn SceneStateStore) {
        let (url, outcome) = {
            let mut shared = self.download.lock().unwrap();
            (shared.current_url.clone(), shared.outcome.take())
        };

        let fraction = self
            .progress
            .snapshot()
            .percent
            .map(|p| p / 100.0)
            .unwrap_or(0.0);
        self.ui.update(
            span_progress(PipelineConfig::DOWNLOAD_SPAN, fraction),
            &format!("Step 1/3: Downloading from {url}"),
        );
        self.publish(store);

        match outcome {
            None => {}
            Some(Ok(archive)) => self.begin_extract(store, archive),
            Some(Err(e)) if e.is_cancelled() => self.enter_cancelled(store),
            Some(Err(e)) => self.enter_error(store, e.to_string()),
        }
    }

    fn begin_extract(&mut self, store: &mut dyn SceneStateStore, archive: PathBuf) {
        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.ui.update(
            PipelineConfig::EXTRACT_SPAN.0,
            &format!("Step 2/3: Extracting {name}"),
        );
        self.transition(PipelineState::Extract);
        self.publish(store);

        let dest = self.extract_dir.clone();
        let shared = Arc::clone(&self.extract);
        let cancel = self.progress.cancel_token().clone();
        self.runtime.spawn_blocking(move || {
            let result = extract_archive(&archive, &dest, &cancel, |done, total| {
                let mut shared = shared.lock().unwrap();
                shared.entries_done = done;
                shared.entries_total = total;
            })
            .and_then(|dest| {
                let files = DownloadManager::find_files_by_extension(
                    &dest,
                    LibraryConfig::MODEL_EXTENSIONS,
                );
                primary_model_file(files).ok_or(OpenShelfError::NoSupportedFile(dest))
            });
            shared.lock().unwrap().outcome = Some(result);
        });
    }

    fn step_extract(&mut self, store: &mut dyn SceneStateStore) {
        let (done, total, outcome) = {
            let mut shared = self.extract.lock().unwrap();
            (shared.entries_done, shared.entries_total, shared.outcome.take())
        };

        let fraction = if total > 0 {
            done as f64 / total as f64
        } else {
            0.0
        };
        let message = self.ui.status_message.clone();
        self.ui
            .update(span_progress(PipelineConfig::EXTRACT_SPAN, fraction), &message);
        self.publish(store);

        match outcome {
            None => {}
            Some(Ok(model_file)) => {
                self.model_file = Some(model_file);
                self.ui.update(
                    PipelineConfig::IMPORT_SPAN.0,
                    "Step 3/3: Importing 3D model",
                );
                self.transition(PipelineState::Import);
                self.publish(store);
            }
            Some(Err(e)) => self.enter_error(store, e.to_string()),
        }
    }

    fn step_import(&mut self, importer: &mut dyn ModelImporter, store: &mut dyn SceneStateStore) {
        let Some(model_file) = self.model_file.clone() else {
            self.enter_error(store, "No model file to import".to_string());
            return;
        };

        // Scene mutation happens here, on the ticking thread.
        match importer.import(&model_file, &self.settings) {
            Ok(mut object) => {
                if self.settings.add_metadata {
                    attach_cultural_metadata(object.as_mut(), &self.asset);
                }
                object.select();
                info!("Acquisition complete for {}", self.asset.display_name());
                self.imported = Some(object);
                self.state = PipelineState::Complete;
                self.ui.finish(
                    100,
                    &format!("Import complete: {}", self.asset.display_name()),
                );
                self.finalize(store);
            }
            Err(e) => self.enter_error(store, format!("Model import failed: {e}")),
        }
    }

    fn enter_error(&mut self, store: &mut dyn SceneStateStore, message: String) {
        warn!("Acquisition failed: {}", message);
        self.state = PipelineState::Error;
        self.error_message = message.clone();
        // Stop any worker still streaming or extracting; a timed-out
        // transfer must not finish in the background and touch the cache.
        self.progress.cancel();
        self.ui.finish(0, &message);
        self.finalize(store);
    }

    fn enter_cancelled(&mut self, store: &mut dyn SceneStateStore) {
        debug!("Acquisition cancelled for {}", self.asset.id);
        self.state = PipelineState::Cancelled;
        self.progress.cancel();
        self.ui.finish(0, "Download cancelled");
        self.finalize(store);
    }

    /// Terminal cleanup: temp extraction dir removed, UI drained into the
    /// store, acquisition slot released.
    fn finalize(&mut self, store: &mut dyn SceneStateStore) {
        let _ = std::fs::remove_dir_all(&self.extract_dir);
        self.publish(store);
        store.set_is_downloading(false);
        self.release_guard();
    }

    fn publish(&self, store: &mut dyn SceneStateStore) {
        store.set_download_progress(self.ui.progress);
        store.set_status_message(&self.ui.status_message);
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
        self.step_entered = Instant::now();
    }

    fn release_guard(&mut self) {
        if !self.guard_released {
            self.guard_released = true;
            ACQUISITION_ACTIVE.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for ModalAcquisitionPipeline {
    fn drop(&mut self) {
        self.release_guard();
    }
}

/// Map a stage-local fraction into the stage's slice of the 0-100 bar.
fn span_progress(span: (u8, u8), fraction: f64) -> u8 {
    let (start, end) = (span.0 as f64, span.1 as f64);
    let clamped = fraction.clamp(0.0, 1.0);
    (start + (end - start) * clamped).round() as u8
}

/// First file by extension priority, then path order.
fn primary_model_file(mut files: Vec<PathBuf>) -> Option<PathBuf> {
    for ext in LibraryConfig::MODEL_EXTENSIONS {
        if let Some(index) = files.iter().position(|f| {
            f.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        }) {
            return Some(files.swap_remove(index));
        }
    }
    None
}
