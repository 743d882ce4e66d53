//! Process-local preview handles
//!
//! Stand-in for revocable object URLs: a handle maps to an in-memory copy of
//! the image bytes for fast display. Handles are never persisted and each one
//! is released at most once.

use inspection_types::PreviewHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct PreviewEntry {
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
}

#[derive(Debug, Default)]
pub struct PreviewStore {
    next: AtomicU64,
    entries: Mutex<HashMap<PreviewHandle, PreviewEntry>>,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes and hand back a new handle.
    ///
    /// Returns `None` when the bytes are empty or the store is unusable;
    /// callers fall back to the photo's embedded data.
    pub fn create(&self, bytes: Vec<u8>, mime: &str) -> Option<PreviewHandle> {
        if bytes.is_empty() {
            return None;
        }
        let handle = PreviewHandle::from_raw(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        let mut entries = self.entries.lock().ok()?;
        entries.insert(
            handle,
            PreviewEntry {
                mime: mime.to_string(),
                bytes: Arc::new(bytes),
            },
        );
        Some(handle)
    }

    pub fn resolve(&self, handle: PreviewHandle) -> Option<PreviewEntry> {
        self.entries.lock().ok()?.get(&handle).cloned()
    }

    /// Release a handle. True only for the first release of a live handle.
    pub fn release(&self, handle: PreviewHandle) -> bool {
        match self.entries.lock() {
            Ok(mut entries) => entries.remove(&handle).is_some(),
            Err(_) => false,
        }
    }

    /// Release every live handle, returning how many were released
    pub fn release_all(&self) -> usize {
        match self.entries.lock() {
            Ok(mut entries) => {
                let count = entries.len();
                entries.clear();
                count
            }
            Err(_) => 0,
        }
    }

    pub fn live_count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_resolve() {
        let store = PreviewStore::new();
        let handle = store.create(vec![1, 2, 3], "image/jpeg").unwrap();
        let entry = store.resolve(handle).unwrap();
        assert_eq!(entry.mime, "image/jpeg");
        assert_eq!(*entry.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_bytes_yield_no_handle() {
        let store = PreviewStore::new();
        assert!(store.create(Vec::new(), "image/png").is_none());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_release_only_once() {
        let store = PreviewStore::new();
        let handle = store.create(vec![9], "image/png").unwrap();
        assert!(store.release(handle));
        assert!(!store.release(handle));
        assert!(store.resolve(handle).is_none());
    }

    #[test]
    fn test_release_all() {
        let store = PreviewStore::new();
        let a = store.create(vec![1], "image/png").unwrap();
        let b = store.create(vec![2], "image/png").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.release_all(), 2);
        assert_eq!(store.release_all(), 0);
        assert!(!store.release(a));
    }
}
