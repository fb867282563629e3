//! Persistent queue of links awaiting a later unrestrict attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::persist::write_atomic;

/// A link that failed with a transient error, parked for the next cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryItem {
    pub link: String,
    pub torrent_id: String,
    /// Informational only; shown in logs.
    pub filename: String,
    pub added_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: String,
    /// Coarse error class ("503", "429", "other").
    pub error_type: String,
}

struct Inner {
    path: PathBuf,
    items: Vec<RetryItem>,
}

/// Persistent retry queue. Handles are cheap clones sharing one locked list.
#[derive(Clone)]
pub struct RetryQueue {
    inner: Arc<Mutex<Inner>>,
}

impl RetryQueue {
    /// Open a queue, loading existing items if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match load(&path) {
            Ok(items) => {
                debug!(count = items.len(), "Loaded retry queue");
                items
            }
            Err(_) => {
                debug!("No existing retry queue, starting fresh");
                Vec::new()
            }
        };

        Self {
            inner: Arc::new(Mutex::new(Inner { path, items })),
        }
    }

    /// Add a link. If it is already queued, bump its attempt count and
    /// refresh the error message instead of duplicating.
    pub fn add(&self, link: &str, torrent_id: &str, filename: &str, error_type: &str, error: &str) {
        let mut inner = self.inner.lock().expect("retry queue poisoned");

        if let Some(item) = inner.items.iter_mut().find(|i| i.link == link) {
            item.retry_count += 1;
            item.last_error = error.to_string();
            debug!(link, retry_count = item.retry_count, "Updated queued retry");
            return;
        }

        inner.items.push(RetryItem {
            link: link.to_string(),
            torrent_id: torrent_id.to_string(),
            filename: filename.to_string(),
            added_at: Utc::now(),
            retry_count: 0,
            last_error: error.to_string(),
            error_type: error_type.to_string(),
        });
        info!(link, filename, error_type, "Added to retry queue");
    }

    /// Snapshot of all queued items.
    pub fn get_all(&self) -> Vec<RetryItem> {
        let inner = self.inner.lock().expect("retry queue poisoned");
        inner.items.clone()
    }

    pub fn remove(&self, link: &str) {
        let mut inner = self.inner.lock().expect("retry queue poisoned");
        if let Some(pos) = inner.items.iter().position(|i| i.link == link) {
            inner.items.swap_remove(pos);
            debug!(link, "Removed from retry queue");
        }
    }

    pub fn increment(&self, link: &str) {
        let mut inner = self.inner.lock().expect("retry queue poisoned");
        if let Some(item) = inner.items.iter_mut().find(|i| i.link == link) {
            item.retry_count += 1;
            debug!(link, retry_count = item.retry_count, "Incremented retry count");
        }
    }

    /// Persist to disk (write-then-rename).
    pub fn save(&self) -> io::Result<()> {
        let inner = self.inner.lock().expect("retry queue poisoned");
        let json = serde_json::to_vec_pretty(&inner.items)?;
        write_atomic(&inner.path, &json)?;
        debug!(count = inner.items.len(), "Saved retry queue");
        Ok(())
    }

    pub fn count(&self) -> usize {
        let inner = self.inner.lock().expect("retry queue poisoned");
        inner.items.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("retry queue poisoned");
        inner.items.clear();
        info!("Cleared retry queue");
    }
}

fn load(path: &Path) -> io::Result<Vec<RetryItem>> {
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(io::Error::from)
}
