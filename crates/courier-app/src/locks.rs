//! Per-source-directory mutual exclusion.
//!
//! Jobs for the same directory serialize; distinct directories proceed concurrently.
//! An entry lives only while some job holds or awaits it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = HashMap<PathBuf, Arc<AsyncMutex<()>>>;

/// Path-keyed async lock table.
#[derive(Debug, Clone, Default)]
pub(crate) struct PathLocks {
    table: Arc<Mutex<LockTable>>,
}

impl PathLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait until no other job holds `path`, then hold it until the guard drops.
    pub(crate) async fn acquire(&self, path: &Path) -> PathGuard {
        let entry = {
            let mut table = self.lock_table();
            Arc::clone(table.entry(path.to_path_buf()).or_default())
        };
        let held = entry.lock_owned().await;
        PathGuard {
            held: Some(held),
            path: path.to_path_buf(),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of paths currently held or awaited.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock_table().len()
    }

    fn lock_table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive hold on one source directory.
#[derive(Debug)]
pub(crate) struct PathGuard {
    held: Option<OwnedMutexGuard<()>>,
    path: PathBuf,
    table: Arc<Mutex<LockTable>>,
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // The table's own reference is the last one once nobody holds or awaits the entry.
        if table
            .get(&self.path)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            let _ = table.remove(&self.path);
        }
    }
}
