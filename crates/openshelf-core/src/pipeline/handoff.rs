//! Worker-to-UI handoff record.
//!
//! A background worker downloads and extracts, then publishes an
//! [`ImportPacket`]; the UI timer drains the record, performs the import
//! synchronously, and handles terminal transitions. The worker never touches
//! the scene.

use crate::annotate::attach_cultural_metadata;
use crate::asset::CulturalAsset;
use crate::error::{OpenShelfError, Result};
use crate::host::{ImportSettings, ModelImporter, SceneObject, SceneStateStore};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Everything the UI thread needs to finish an acquisition.
#[derive(Debug, Clone)]
pub struct ImportPacket {
    pub file_path: PathBuf,
    pub asset: CulturalAsset,
    pub settings: ImportSettings,
}

#[derive(Debug, Default)]
struct HandoffState {
    is_downloading: bool,
    download_progress: u8,
    status_message: String,
    pending_import_data: Option<ImportPacket>,
    error_message: Option<String>,
    completed: bool,
}

/// What a single drain pass produced.
pub enum DrainOutcome {
    /// Nothing terminal happened; status fields were refreshed.
    Idle,
    Imported(Box<dyn SceneObject>),
    Failed(String),
}

/// Mutex-guarded state shared between one worker and the UI timer.
#[derive(Clone, Default)]
pub struct ImportHandoff {
    state: Arc<Mutex<HandoffState>>,
}

impl ImportHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker side: claim the handoff. Rejected while another acquisition
    /// is active.
    pub fn begin(&self, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.is_downloading {
            return Err(OpenShelfError::Precondition {
                message: "another download is already in progress".to_string(),
            });
        }
        *state = HandoffState {
            is_downloading: true,
            status_message: message.to_string(),
            ..Default::default()
        };
        Ok(())
    }

    /// Worker side: refresh progress and status.
    pub fn set_progress(&self, percent: u8, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.download_progress = percent.min(100);
        state.status_message = message.to_string();
    }

    /// Worker side: hand the located file to the UI thread.
    pub fn publish(&self, packet: ImportPacket) {
        let mut state = self.state.lock().unwrap();
        state.pending_import_data = Some(packet);
        state.completed = true;
    }

    /// Worker side: terminal failure.
    pub fn fail(&self, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.error_message = Some(message.to_string());
        state.completed = true;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().is_downloading
    }

    /// UI side: copy status into the store, consume any pending packet by
    /// importing it, and handle terminal transitions.
    pub fn drain(
        &self,
        importer: &mut dyn ModelImporter,
        store: &mut dyn SceneStateStore,
    ) -> DrainOutcome {
        let (packet, error, completed) = {
            let mut state = self.state.lock().unwrap();
            store.set_download_progress(state.download_progress);
            store.set_status_message(&state.status_message);
            store.set_is_downloading(state.is_downloading);
            (
                state.pending_import_data.take(),
                state.error_message.take(),
                state.completed,
            )
        };

        if let Some(packet) = packet {
            // Import runs here, on the draining (UI) thread.
            let outcome = match importer.import(&packet.file_path, &packet.settings) {
                Ok(mut object) => {
                    if packet.settings.add_metadata {
                        attach_cultural_metadata(object.as_mut(), &packet.asset);
                    }
                    object.select();
                    info!("Imported {}", packet.asset.display_name());
                    store.set_download_progress(100);
                    store.set_status_message(&format!(
                        "Imported {}",
                        packet.asset.display_name()
                    ));
                    DrainOutcome::Imported(object)
                }
                Err(e) => {
                    warn!("Import failed: {}", e);
                    store.set_download_progress(0);
                    store.set_status_message(&format!("Import failed: {e}"));
                    DrainOutcome::Failed(e.to_string())
                }
            };
            self.release(store);
            return outcome;
        }

        if let Some(message) = error {
            store.set_download_progress(0);
            store.set_status_message(&message);
            self.release(store);
            return DrainOutcome::Failed(message);
        }

        if completed {
            self.release(store);
        }
        DrainOutcome::Idle
    }

    fn release(&self, store: &mut dyn SceneStateStore) {
        let mut state = self.state.lock().unwrap();
        state.is_downloading = false;
        state.pending_import_data = None;
        store.set_is_downloading(false);
    }
}
