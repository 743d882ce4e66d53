//! Snapshot persistence
//!
//! ```text
//! Empty --load, nothing dropped--> Hydrated
//! Empty --load, photos dropped--> HydratedDirty --resave--> Hydrated
//! Hydrated | HydratedDirty --clear--> Empty
//! ```
//!
//! Loading never fails: missing, unreadable or malformed data all come back
//! as [`Loaded::Empty`] so a session can always start. Malformed photo
//! records only cost the records themselves.

use crate::error::PersistError;
use crate::registry;
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use inspection_types::Snapshot;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serialized snapshots above this size risk hitting browser-like quotas
const LARGE_SNAPSHOT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Empty,
    Hydrated,
    HydratedDirty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Empty,
    Restored {
        snapshot: Snapshot,
        dropped_count: usize,
    },
}

pub struct PersistenceManager {
    store: Arc<dyn SessionStore>,
    key: String,
    state: Mutex<LoadState>,
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

impl PersistenceManager {
    pub fn new(store: Arc<dyn SessionStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            state: Mutex::new(LoadState::Empty),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> LoadState {
        self.state.lock().map(|s| *s).unwrap_or_default()
    }

    fn set_state(&self, next: LoadState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Stamp `last_saved` and write the snapshot under the session key.
    ///
    /// On failure the stamp is rolled back; memory stays authoritative either way.
    pub fn save(&self, snapshot: &mut Snapshot) -> Result<DateTime<Utc>, PersistError> {
        let previous = snapshot.last_saved;
        let now = Utc::now();
        snapshot.last_saved = Some(now);

        let result = snapshot
            .to_json()
            .map_err(PersistError::from)
            .and_then(|json| {
                if json.len() > LARGE_SNAPSHOT_BYTES {
                    tracing::warn!(
                        size_mb = %format!("{:.2}", json.len() as f64 / (1024.0 * 1024.0)),
                        "Snapshot is very large, the store may refuse it"
                    );
                }
                self.store.set(&self.key, &json).map(|_| json.len())
            });

        match result {
            Ok(size) => {
                tracing::debug!(key = %self.key, size, photos = snapshot.section_photos.total(), "Snapshot saved");
                Ok(now)
            }
            Err(e) => {
                snapshot.last_saved = previous;
                tracing::error!(key = %self.key, error = %e, "Failed to save snapshot");
                Err(e)
            }
        }
    }

    /// Read, parse and repair the stored snapshot
    pub fn load(&self) -> Loaded {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = %self.key, "No stored session");
                return Loaded::Empty;
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Session store unreadable, starting empty");
                return Loaded::Empty;
            }
        };

        let mut snapshot = match Snapshot::from_json(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Stored session is malformed, starting empty");
                return Loaded::Empty;
            }
        };

        let repaired = registry::repair(std::mem::take(&mut snapshot.section_photos));
        snapshot.section_photos = repaired.kept;

        self.set_state(if repaired.dropped_count > 0 {
            LoadState::HydratedDirty
        } else {
            LoadState::Hydrated
        });
        tracing::info!(
            key = %self.key,
            photos = snapshot.section_photos.total(),
            dropped = repaired.dropped_count,
            "Session restored"
        );

        Loaded::Restored {
            snapshot,
            dropped_count: repaired.dropped_count,
        }
    }

    /// Re-save after `delay` so storage converges to the repaired state.
    ///
    /// Runs in the background; the load path does not wait for it.
    pub fn schedule_resave(
        self: &Arc<Self>,
        snapshot: Arc<tokio::sync::Mutex<Snapshot>>,
        delay: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if manager.state() != LoadState::HydratedDirty {
                return;
            }
            let mut guard = snapshot.lock().await;
            match manager.save(&mut guard) {
                Ok(_) => manager.set_state(LoadState::Hydrated),
                Err(e) => tracing::warn!(error = %e, "Repair resave failed"),
            }
        })
    }

    /// Remove the stored snapshot and return to `Empty`
    pub fn clear(&self) -> Result<(), PersistError> {
        self.set_state(LoadState::Empty);
        self.store.remove(&self.key)
    }
}
