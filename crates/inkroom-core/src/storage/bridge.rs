//! Moves document snapshots between a [`DocumentStore`] and a [`RecordStore`].
//!
//! Async operations take a [`SaveRequest`] by value, so the document store is
//! never borrowed across an await. Failures are logged, queued as
//! [`Notification`]s, and never roll back the document.

use super::{CanvasVersion, DocumentSnapshot, RecordPatch, RecordStore, StorageError, StorageResult};
use crate::config::DEFAULT_AUTOSAVE_INTERVAL_SECS;
use crate::document::{CanvasPatch, DocumentStore};
use crate::presence::CanvasUpdate;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of a completed save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    /// Version number now stored.
    pub version: u64,
    /// Someone else had saved since our base version. Their write was
    /// overwritten.
    pub conflict: bool,
}

/// What happened to a remote `canvas-update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Adopted,
    /// Not newer than what we already have.
    Stale,
    /// Newer, but local edits are unsaved. Local state was kept.
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A non-blocking message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// Layers captured from the document, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub snapshot: DocumentSnapshot,
    revision: u64,
}

impl SaveRequest {
    pub fn capture(document: &DocumentStore) -> Self {
        Self {
            snapshot: DocumentSnapshot::new(document.layers().to_vec()),
            revision: document.revision(),
        }
    }
}

/// Persistence for one open canvas.
pub struct PersistenceBridge<S: RecordStore> {
    store: Arc<S>,
    canvas_id: String,
    user_id: String,
    base_version: u64,
    saved_revision: Option<u64>,
    interval: Duration,
    last_save: Instant,
    notifications: Vec<Notification>,
}

impl<S: RecordStore> PersistenceBridge<S> {
    pub fn new(store: Arc<S>, canvas_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            canvas_id: canvas_id.into(),
            user_id: user_id.into(),
            base_version: 0,
            saved_revision: None,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: Instant::now(),
            notifications: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    /// Stored version the local document descends from.
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.store
    }

    /// Whether `document` has commits that were never saved or loaded.
    pub fn has_unsaved_changes(&self, document: &DocumentStore) -> bool {
        self.saved_revision != Some(document.revision())
    }

    /// Autosave is due. The interval runs regardless of edits.
    pub fn should_save(&self) -> bool {
        self.should_save_at(Instant::now())
    }

    pub fn should_save_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_save) >= self.interval
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, level: NotificationLevel, message: impl Into<String>) {
        self.notifications.push(Notification {
            level,
            message: message.into(),
        });
    }

    fn report_error(&mut self, action: &str, error: StorageError) {
        log::error!("Failed to {action} canvas {}: {error}", self.canvas_id);
        self.notify(NotificationLevel::Error, format!("Could not {action} canvas: {error}"));
    }

    /// Save if the autosave interval has elapsed.
    pub async fn maybe_save(&mut self, request: SaveRequest) -> Option<SaveReport> {
        if !self.should_save() {
            return None;
        }
        self.save(request).await
    }

    /// Write the snapshot and append a version.
    pub async fn save(&mut self, request: SaveRequest) -> Option<SaveReport> {
        self.last_save = Instant::now();
        match self.try_save(request).await {
            Ok(report) => Some(report),
            Err(e) => {
                self.report_error("save", e);
                None
            }
        }
    }

    async fn try_save(&mut self, request: SaveRequest) -> StorageResult<SaveReport> {
        let record = self
            .store
            .get(&self.canvas_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(self.canvas_id.clone()))?;

        let conflict = record.version > self.base_version;
        if conflict {
            log::warn!(
                "Canvas {} was saved elsewhere (stored v{}, base v{}); overwriting",
                self.canvas_id,
                record.version,
                self.base_version
            );
            self.notify(
                NotificationLevel::Warning,
                "This canvas was changed elsewhere; your version was saved over it",
            );
        }

        let version = record.version.max(self.base_version) + 1;
        let snapshot = request.snapshot.to_value();
        self.store
            .update(
                &self.canvas_id,
                RecordPatch {
                    snapshot: Some(snapshot.clone()),
                    version: Some(version),
                    ..Default::default()
                },
            )
            .await?;
        self.store
            .append_version(CanvasVersion::new(&self.canvas_id, version, snapshot, &self.user_id))
            .await?;

        self.base_version = version;
        self.saved_revision = Some(request.revision);
        log::info!("Saved canvas {} as v{version}", self.canvas_id);
        Ok(SaveReport { version, conflict })
    }

    /// Fetch the stored document and remember its version as our base.
    pub async fn load(&mut self) -> Option<DocumentSnapshot> {
        let result = self.store.get(&self.canvas_id).await;
        match result {
            Ok(Some(record)) => {
                self.base_version = record.version;
                Some(record.document())
            }
            Ok(None) => {
                self.report_error("load", StorageError::NotFound(self.canvas_id.clone()));
                None
            }
            Err(e) => {
                self.report_error("load", e);
                None
            }
        }
    }

    /// Replace the document's layers with `snapshot` and count it as saved.
    pub fn apply(&mut self, document: &mut DocumentStore, snapshot: DocumentSnapshot) {
        document.load_canvas(CanvasPatch::layers(snapshot.layers));
        self.saved_revision = Some(document.revision());
    }

    pub async fn list_versions(&mut self) -> Vec<CanvasVersion> {
        match self.store.list_versions(&self.canvas_id).await {
            Ok(versions) => versions,
            Err(e) => {
                self.report_error("list versions of", e);
                Vec::new()
            }
        }
    }

    /// Load an old version into the document. The returned request must be
    /// saved to make the restore durable as a new version.
    pub fn restore_version(
        &mut self,
        document: &mut DocumentStore,
        version: &CanvasVersion,
    ) -> SaveRequest {
        log::info!(
            "Restoring canvas {} to v{}",
            self.canvas_id,
            version.version_number
        );
        document.load_canvas(CanvasPatch::layers(version.document().layers));
        self.notify(
            NotificationLevel::Info,
            format!("Restored version {}", version.version_number),
        );
        SaveRequest::capture(document)
    }

    /// Merge a peer's published layers.
    pub fn apply_remote_update(
        &mut self,
        document: &mut DocumentStore,
        update: &CanvasUpdate,
    ) -> RemoteOutcome {
        if update.version <= self.base_version {
            return RemoteOutcome::Stale;
        }
        if self.has_unsaved_changes(document) {
            log::warn!(
                "Keeping local edits over v{} of canvas {} from {}",
                update.version,
                self.canvas_id,
                update.user_id
            );
            self.notify(
                NotificationLevel::Warning,
                "Someone else saved this canvas; your unsaved changes were kept",
            );
            return RemoteOutcome::Conflict;
        }
        self.apply(
            document,
            DocumentSnapshot::new(update.layers.clone()),
        );
        self.base_version = update.version;
        RemoteOutcome::Adopted
    }
}
