//! The inspection session: single owner of the application state
//!
//! Every mutation of the [`Snapshot`] goes through a method here. Photo
//! uploads for one section are queued: a batch holds the section's queue
//! from its capacity check until its photos are committed, so two batches
//! racing for the same section cannot both see free slots. Restore and
//! reset take every queue, in index order, so no batch still in flight can
//! commit into the state that replaces the old one.

use crate::asset::AssetStore;
use crate::autosave::Autosaver;
use crate::cancel::CancelToken;
use crate::config::InspectionConfig;
use crate::error::{InspectionError, Result};
use crate::normalize::{normalize, RawUpload};
use crate::notify::{Notifier, Severity};
use crate::persistence::{Loaded, PersistenceManager};
use crate::preview::PreviewStore;
use crate::registry::ensure_preview_handles;
use crate::report::{RenderedReport, ReportRenderer};
use crate::store::SessionStore;
use crate::validation::{self, apply_default_visit_date};
use chrono::{DateTime, Local, Utc};
use futures::future::join_all;
use inspection_types::{
    label_for, FieldValue, Photo, PhotoId, Snapshot, MAX_PHOTOS_PER_SECTION, PHOTO_SECTION_COUNT,
    SECTION_COUNT,
};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Outcome of one upload batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub accepted: Vec<PhotoId>,
    /// Files refused before decoding (empty or not an image)
    pub skipped: Vec<String>,
    /// Files whose normalization failed
    pub failed: Vec<String>,
    /// Files dropped because the section was full
    pub rejected_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Restored {
    Fresh,
    Restored {
        last_saved: Option<DateTime<Utc>>,
        dropped_count: usize,
    },
}

pub struct InspectionSession {
    config: InspectionConfig,
    state: Arc<Mutex<Snapshot>>,
    assets: AssetStore,
    persistence: Arc<PersistenceManager>,
    autosaver: Autosaver,
    notifier: Arc<dyn Notifier>,
    upload_queues: Vec<Mutex<()>>,
    renderer: ReportRenderer,
}

impl InspectionSession {
    /// Create an empty session. Must be called from within a Tokio runtime.
    pub fn new(
        config: InspectionConfig,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mut snapshot = Snapshot::new();
        apply_default_visit_date(&mut snapshot.form_data, Local::now().date_naive());

        let state = Arc::new(Mutex::new(snapshot));
        let persistence = Arc::new(PersistenceManager::new(
            store,
            config.session.storage_key.clone(),
        ));
        let autosaver = Autosaver::spawn(
            Arc::clone(&persistence),
            Arc::clone(&state),
            Arc::clone(&notifier),
            &config.session,
        );

        Self {
            renderer: ReportRenderer::new(config.report.clone()),
            config,
            state,
            assets: AssetStore::new(Arc::new(PreviewStore::new())),
            persistence,
            autosaver,
            notifier,
            upload_queues: (0..PHOTO_SECTION_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn config(&self) -> &InspectionConfig {
        &self.config
    }

    /// Load the stored session, if any, replacing the current state
    pub async fn restore(&self) -> Restored {
        let Loaded::Restored {
            snapshot,
            dropped_count,
        } = self.persistence.load()
        else {
            return Restored::Fresh;
        };

        let last_saved = snapshot.last_saved;
        {
            let _queues = self.lock_upload_queues().await;
            let mut state = self.state.lock().await;
            self.assets.release_all(&mut state.section_photos);
            *state = snapshot;
            ensure_preview_handles(&mut state.section_photos, self.assets.previews());
            let completed = validation::validate_all(&mut state);
            apply_default_visit_date(&mut state.form_data, Local::now().date_naive());
            tracing::debug!(
                completed,
                section = state.current_section,
                photos = state.section_photos.total(),
                "Session state replaced"
            );
        }

        if dropped_count > 0 {
            self.persistence.schedule_resave(
                Arc::clone(&self.state),
                self.config.session.repair_resave_delay(),
            );
            self.notifier.notify(
                &format!(
                    "{} photo(s) illisible(s) retirée(s) de la sauvegarde",
                    dropped_count
                ),
                Severity::Warning,
            );
        }
        if let Some(saved) = last_saved {
            self.notifier.notify(
                &format!(
                    "Données restaurées (dernière sauvegarde : {})",
                    saved.with_timezone(&Local).format("%d/%m/%Y %H:%M:%S")
                ),
                Severity::Info,
            );
        }

        Restored::Restored {
            last_saved,
            dropped_count,
        }
    }

    /// Store a form value. Unknown names are kept but never rendered.
    pub async fn set_field(&self, name: &str, value: impl Into<FieldValue>) {
        self.state.lock().await.form_data.set(name, value);
        self.autosaver.request_save();
    }

    pub async fn field(&self, name: &str) -> Option<FieldValue> {
        self.state.lock().await.form_data.get(name).cloned()
    }

    pub async fn current_section(&self) -> usize {
        self.state.lock().await.current_section
    }

    /// Jump to a section, validating the one being left
    pub async fn go_to_section(&self, index: usize) -> Result<()> {
        if index >= SECTION_COUNT {
            return Err(InspectionError::InvalidSection(index));
        }
        {
            let mut state = self.state.lock().await;
            let leaving = state.current_section;
            validation::validate_section(&mut state, leaving)?;
            state.current_section = index;
        }
        self.autosaver.request_save();
        Ok(())
    }

    /// Validate the current section and move to the next one.
    ///
    /// Missing required fields produce a warning but do not block.
    /// Returns the new current section.
    pub async fn next_section(&self) -> Result<usize> {
        let (current, missing) = {
            let mut state = self.state.lock().await;
            let current = state.current_section;
            let missing = validation::validate_section(&mut state, current)?;
            if current + 1 < SECTION_COUNT {
                state.current_section = current + 1;
            }
            (state.current_section, missing)
        };

        if !missing.is_empty() {
            let labels: Vec<&str> = missing.iter().map(|name| label_for(name)).collect();
            self.notifier.notify(
                &format!(
                    "Champs obligatoires manquants : {}",
                    labels.join(", ")
                ),
                Severity::Warning,
            );
        }
        self.autosaver.request_save();
        Ok(current)
    }

    pub async fn validate_section(&self, index: usize) -> Result<Vec<&'static str>> {
        let missing = validation::validate_section(&mut *self.state.lock().await, index)?;
        self.autosaver.request_save();
        Ok(missing)
    }

    pub async fn validate_all(&self) -> usize {
        let completed = validation::validate_all(&mut *self.state.lock().await);
        self.autosaver.request_save();
        completed
    }

    /// Completed sections over the section count, in `0.0..=1.0`
    pub async fn progress(&self) -> f64 {
        self.state.lock().await.progress()
    }

    pub async fn photos(&self, section: usize) -> Vec<Photo> {
        self.state.lock().await.section_photos.get(section).to_vec()
    }

    /// Normalize and store a batch of files for one section.
    ///
    /// Each file succeeds or fails on its own; every failure is reported
    /// through the notifier and the rest of the batch carries on. Only an
    /// invalid section index fails the whole call.
    pub async fn upload_photos(&self, section: usize, uploads: Vec<RawUpload>) -> Result<UploadReport> {
        let queue = self
            .upload_queues
            .get(section)
            .ok_or(InspectionError::InvalidSection(section))?;
        let mut report = UploadReport::default();

        let mut pending = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match upload.check() {
                Ok(()) => pending.push(upload),
                Err(e) => {
                    tracing::warn!(file = %upload.name, error = %e, "Upload refused");
                    let message = match &e {
                        InspectionError::EmptyFile(name) => format!("{} est vide", name),
                        _ => format!("{} n'est pas une image", upload.name),
                    };
                    self.notifier.notify(&message, Severity::Warning);
                    report.skipped.push(upload.name);
                }
            }
        }
        if pending.is_empty() {
            return Ok(report);
        }

        let _queued = queue.lock().await;

        let room = MAX_PHOTOS_PER_SECTION
            .saturating_sub(self.state.lock().await.section_photos.count(section));
        if room == 0 {
            report.rejected_count = pending.len();
            self.warn_full(InspectionError::CapacityExceeded {
                section,
                rejected: report.rejected_count,
            });
            return Ok(report);
        }

        tracing::info!(section, files = pending.len(), "Processing upload batch");
        let names: Vec<String> = pending.iter().map(|u| u.name.clone()).collect();
        let results = join_all(pending.into_iter().map(normalize)).await;

        let mut photos = Vec::with_capacity(results.len());
        for (name, result) in names.into_iter().zip(results) {
            let photo = result.and_then(|n| self.assets.to_photo(&n.bytes, &n.mime, &name));
            match photo {
                Ok(photo) => photos.push(photo),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Photo processing failed");
                    self.notifier.notify(
                        &format!("Impossible de traiter {} : {}", name, e),
                        Severity::Warning,
                    );
                    report.failed.push(name);
                }
            }
        }

        let inserted = {
            let mut state = self.state.lock().await;
            self.assets
                .insert(&mut state.section_photos, section, photos)?
        };
        drop(_queued);

        if let Some(overflow) = inserted.overflow(section) {
            self.warn_full(overflow);
        }
        for photo in &inserted.accepted {
            self.notifier.notify(
                &format!("Photo ajoutée : {}", photo.display_name),
                Severity::Success,
            );
        }
        if !inserted.accepted.is_empty() {
            self.autosaver.request_save();
        }

        report.rejected_count += inserted.rejected_count;
        report.accepted = inserted.accepted.into_iter().map(|p| p.id).collect();
        Ok(report)
    }

    /// Wait for every in-flight upload batch and hold all section queues
    async fn lock_upload_queues(&self) -> Vec<MutexGuard<'_, ()>> {
        let mut guards = Vec::with_capacity(self.upload_queues.len());
        for queue in &self.upload_queues {
            guards.push(queue.lock().await);
        }
        guards
    }

    fn warn_full(&self, overflow: InspectionError) {
        tracing::warn!(error = %overflow, "Upload overflow");
        let InspectionError::CapacityExceeded { rejected, .. } = overflow else {
            return;
        };
        self.notifier.notify(
            &format!(
                "Maximum {} photos par section : {} photo(s) non ajoutée(s)",
                MAX_PHOTOS_PER_SECTION, rejected
            ),
            Severity::Warning,
        );
    }

    /// Remove a photo by id. Returns false when there was nothing to remove.
    pub async fn remove_photo(&self, section: usize, id: &PhotoId) -> bool {
        let Some(queue) = self.upload_queues.get(section) else {
            return false;
        };
        let _queued = queue.lock().await;
        let removed = {
            let mut state = self.state.lock().await;
            self.assets.remove(&mut state.section_photos, section, id)
        };
        if removed {
            self.notifier.notify("Photo supprimée", Severity::Info);
            self.autosaver.request_save();
        }
        removed
    }

    /// Render the current state to a PDF report
    pub async fn render_report(&self, cancel: &CancelToken) -> Result<RenderedReport> {
        let snapshot = self.snapshot().await;
        match self.renderer.render(&snapshot, cancel).await {
            Ok(report) => {
                self.notifier
                    .notify("PDF généré avec succès", Severity::Success);
                Ok(report)
            }
            Err(InspectionError::Cancelled) => {
                self.notifier
                    .notify("Génération du PDF annulée", Severity::Info);
                Err(InspectionError::Cancelled)
            }
            Err(e) => {
                tracing::error!(error = %e, "Report rendering failed");
                self.notifier
                    .notify("Erreur lors de la génération du PDF", Severity::Error);
                Err(e)
            }
        }
    }

    /// Discard everything and start a blank inspection
    pub async fn new_inspection(&self) {
        {
            let _queues = self.lock_upload_queues().await;
            let mut state = self.state.lock().await;
            self.assets.release_all(&mut state.section_photos);
            *state = Snapshot::new();
            apply_default_visit_date(&mut state.form_data, Local::now().date_naive());
        }
        if let Err(e) = self.persistence.clear() {
            tracing::warn!(error = %e, "Failed to clear stored session");
            self.notifier.notify(
                &format!("Suppression de la sauvegarde impossible : {}", e),
                Severity::Warning,
            );
        }
        tracing::info!("New inspection started");
        self.notifier
            .notify("Nouvelle inspection démarrée", Severity::Info);
    }

    /// Save right away; the equivalent of page-hide or exit
    pub async fn flush(&self) -> bool {
        self.autosaver.flush().await
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.clone()
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn state(&self) -> &Arc<Mutex<Snapshot>> {
        &self.state
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub(crate) fn assets(&self) -> &AssetStore {
        &self.assets
    }
}
