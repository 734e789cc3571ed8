//! Per-filename advisory locks.
//!
//! Edits decode a stored image, modify it, and write it back. Two edits of
//! the same file racing through that cycle would silently drop one of them,
//! so the cycle runs under a lock keyed by filename. Locks for different
//! files are independent.
//!
//! Entries are created on first use and removed as soon as the last holder
//! or waiter is gone, so the map only ever contains files currently being
//! edited.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-filename async mutexes.
#[derive(Debug, Default)]
pub struct FileLocks {
    // Only held for map updates, never across an await.
    entries: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `filename`.
    pub async fn acquire(&self, filename: &str) -> FileLockGuard<'_> {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                entries
                    .entry(filename.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        let guard = lock.lock_owned().await;

        FileLockGuard {
            locks: self,
            filename: filename.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of filenames with a live lock entry.
    pub fn active(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn release(&self, filename: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // The map's own reference is the only one left: nobody holds or waits.
        if let Some(lock) = entries.get(filename) {
            if Arc::strong_count(lock) == 1 {
                entries.remove(filename);
            }
        }
    }
}

/// Exclusive access to one filename; released on drop.
pub struct FileLockGuard<'a> {
    locks: &'a FileLocks,
    filename: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl FileLockGuard<'_> {
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl Drop for FileLockGuard<'_> {
    fn drop(&mut self) {
        // Unlock first so the strong count reflects remaining holders.
        drop(self.guard.take());
        self.locks.release(&self.filename);
    }
}
