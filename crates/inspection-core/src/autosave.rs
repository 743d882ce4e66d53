//! Background saving
//!
//! Save requests are coalesced: every request marks the session dirty and
//! wakes the worker, which waits out the debounce window and then writes
//! once. A periodic tick writes regardless. [`Autosaver::flush`] writes
//! immediately and is what page-hide or process exit should call.

use crate::config::SessionConfig;
use crate::notify::{Notifier, Severity};
use crate::persistence::PersistenceManager;
use inspection_types::Snapshot;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

struct Worker {
    persistence: Arc<PersistenceManager>,
    snapshot: Arc<Mutex<Snapshot>>,
    notifier: Arc<dyn Notifier>,
    dirty: AtomicBool,
    saves: AtomicU64,
}

impl Worker {
    async fn save(&self) -> bool {
        self.dirty.store(false, Ordering::SeqCst);
        let mut snapshot = self.snapshot.lock().await;
        match self.persistence.save(&mut snapshot) {
            Ok(_) => {
                self.saves.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(e) => {
                self.notifier.notify(
                    &format!("Sauvegarde impossible : {}", e),
                    Severity::Warning,
                );
                false
            }
        }
    }
}

pub struct Autosaver {
    worker: Arc<Worker>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Autosaver {
    pub fn spawn(
        persistence: Arc<PersistenceManager>,
        snapshot: Arc<Mutex<Snapshot>>,
        notifier: Arc<dyn Notifier>,
        config: &SessionConfig,
    ) -> Self {
        let worker = Arc::new(Worker {
            persistence,
            snapshot,
            notifier,
            dirty: AtomicBool::new(false),
            saves: AtomicU64::new(0),
        });
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(run(
            Arc::clone(&worker),
            Arc::clone(&wake),
            config.autosave_interval(),
            config.save_debounce(),
        ));
        Self { worker, wake, task }
    }

    /// Ask for a save soon. Cheap; any number of calls inside the debounce
    /// window produce a single write.
    pub fn request_save(&self) {
        self.worker.dirty.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Save now. Returns whether the write succeeded.
    pub async fn flush(&self) -> bool {
        self.worker.save().await
    }

    pub fn is_dirty(&self) -> bool {
        self.worker.dirty.load(Ordering::SeqCst)
    }

    /// Number of successful writes so far
    pub fn save_count(&self) -> u64 {
        self.worker.saves.load(Ordering::SeqCst)
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(worker: Arc<Worker>, wake: Arc<Notify>, period: Duration, debounce: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::trace!("Periodic save");
                worker.save().await;
            }
            _ = wake.notified() => {
                if !debounce.is_zero() {
                    tokio::time::sleep(debounce).await;
                }
                // A permit left over from requests already covered by the
                // previous write finds the flag cleared
                if worker.dirty.load(Ordering::SeqCst) {
                    worker.save().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SessionStore};
    use crate::testing::CollectingNotifier;

    fn setup(
        store: Arc<MemoryStore>,
        debounce_ms: u64,
    ) -> (Autosaver, Arc<Mutex<Snapshot>>, Arc<CollectingNotifier>) {
        let persistence = Arc::new(PersistenceManager::new(store, "k"));
        let snapshot = Arc::new(Mutex::new(Snapshot::new()));
        let notifier = Arc::new(CollectingNotifier::default());
        let config = SessionConfig {
            save_debounce_ms: debounce_ms,
            autosave_interval_secs: 3600,
            ..SessionConfig::default()
        };
        let saver = Autosaver::spawn(persistence, snapshot.clone(), notifier.clone(), &config);
        (saver, snapshot, notifier)
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let store = Arc::new(MemoryStore::new());
        let (saver, snapshot, _) = setup(store.clone(), 50);
        snapshot.lock().await.form_data.set("adresse", "x");

        assert!(saver.flush().await);
        let stored = Snapshot::from_json(&store.get("k").unwrap().unwrap()).unwrap();
        assert!(stored.form_data.is_filled("adresse"));
        assert!(stored.last_saved.is_some());
    }

    #[tokio::test]
    async fn test_requests_are_coalesced() {
        let store = Arc::new(MemoryStore::new());
        let (saver, _, _) = setup(store, 30);
        for _ in 0..10 {
            saver.request_save();
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(saver.save_count(), 1);
        assert!(!saver.is_dirty());
    }

    #[tokio::test]
    async fn test_failure_warns_once_per_attempt() {
        let store = Arc::new(MemoryStore::with_quota(8));
        let (saver, _, notifier) = setup(store, 0);

        assert!(!saver.flush().await);
        assert_eq!(notifier.count(Severity::Warning), 1);
        assert_eq!(saver.save_count(), 0);
    }
}
