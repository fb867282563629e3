//! Persistent tracking of generated `.strm` files and their provenance.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::persist::write_atomic;

/// Tracking record for a single `.strm` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedFile {
    pub relative_path: String,
    pub download_url: String,
    /// Original source link; stable enough to re-unrestrict.
    pub link: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    pub torrent_id: String,
}

struct Inner {
    path: PathBuf,
    data: HashMap<String, TrackedFile>,
}

/// Persistent map from relative file path to provenance metadata.
///
/// Handles are cheap clones sharing one locked map; all mutators take the
/// exclusive lock and snapshots are defensive copies.
#[derive(Clone)]
pub struct TrackingStore {
    inner: Arc<Mutex<Inner>>,
}

impl TrackingStore {
    /// Open a store, loading existing data if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match load(&path) {
            Ok(data) => {
                debug!(count = data.len(), "Loaded tracking data");
                data
            }
            Err(_) => {
                debug!("No existing tracking file, starting fresh");
                HashMap::new()
            }
        };

        Self {
            inner: Arc::new(Mutex::new(Inner { path, data })),
        }
    }

    /// Record or update tracking for a file. Updates refresh `last_checked`;
    /// new entries stamp `created_at`.
    pub fn track(&self, relative_path: &str, download_url: &str, link: &str, torrent_id: &str) {
        let mut inner = self.inner.lock().expect("tracking store poisoned");
        let now = Utc::now();

        match inner.data.get_mut(relative_path) {
            Some(existing) => {
                existing.download_url = download_url.to_string();
                existing.link = link.to_string();
                existing.last_checked = Some(now);
                debug!(path = relative_path, "Updated tracking");
            }
            None => {
                inner.data.insert(
                    relative_path.to_string(),
                    TrackedFile {
                        relative_path: relative_path.to_string(),
                        download_url: download_url.to_string(),
                        link: link.to_string(),
                        created_at: now,
                        last_checked: Some(now),
                        torrent_id: torrent_id.to_string(),
                    },
                );
                debug!(path = relative_path, "Started tracking");
            }
        }
    }

    pub fn get(&self, relative_path: &str) -> Option<TrackedFile> {
        let inner = self.inner.lock().expect("tracking store poisoned");
        inner.data.get(relative_path).cloned()
    }

    pub fn remove(&self, relative_path: &str) {
        let mut inner = self.inner.lock().expect("tracking store poisoned");
        inner.data.remove(relative_path);
        debug!(path = relative_path, "Removed tracking");
    }

    /// Records older than `older_than`, judged by `last_checked` and falling
    /// back to `created_at` for entries never checked.
    pub fn expired(&self, older_than: Duration) -> Vec<TrackedFile> {
        let inner = self.inner.lock().expect("tracking store poisoned");
        let threshold = Utc::now() - older_than;

        inner
            .data
            .values()
            .filter(|t| t.last_checked.unwrap_or(t.created_at) < threshold)
            .cloned()
            .collect()
    }

    /// Persist to disk (write-then-rename).
    pub fn save(&self) -> io::Result<()> {
        let inner = self.inner.lock().expect("tracking store poisoned");
        let json = serde_json::to_vec_pretty(&inner.data)?;
        write_atomic(&inner.path, &json)?;
        debug!(count = inner.data.len(), "Saved tracking data");
        Ok(())
    }

    pub fn count(&self) -> usize {
        let inner = self.inner.lock().expect("tracking store poisoned");
        inner.data.len()
    }

    #[cfg(test)]
    fn insert_raw(&self, record: TrackedFile) {
        let mut inner = self.inner.lock().expect("tracking store poisoned");
        inner.data.insert(record.relative_path.clone(), record);
    }
}

fn load(path: &Path) -> io::Result<HashMap<String, TrackedFile>> {
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_track_and_get() {
        let dir = TempDir::new().unwrap();
        let store = TrackingStore::open(dir.path().join("tracking.json"));

        store.track("Show/Episode.strm", "https://cdn/ep.mkv", "link-1", "t1");

        let record = store.get("Show/Episode.strm").unwrap();
        assert_eq!(record.download_url, "https://cdn/ep.mkv");
        assert_eq!(record.link, "link-1");
        assert_eq!(record.torrent_id, "t1");
        assert!(record.last_checked.is_some());
    }

    #[test]
    fn test_track_update_keeps_created_at() {
        let dir = TempDir::new().unwrap();
        let store = TrackingStore::open(dir.path().join("tracking.json"));

        store.track("a.strm", "url-1", "link", "t1");
        let created = store.get("a.strm").unwrap().created_at;

        store.track("a.strm", "url-2", "link", "t1");
        let updated = store.get("a.strm").unwrap();
        assert_eq!(updated.download_url, "url-2");
        assert_eq!(updated.created_at, created);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = TrackingStore::open(dir.path().join("tracking.json"));

        store.track("a.strm", "url", "link", "t1");
        assert_eq!(store.count(), 1);

        store.remove("a.strm");
        assert_eq!(store.count(), 0);
        assert!(store.get("a.strm").is_none());
    }

    #[test]
    fn test_expired_uses_last_checked_fallback_created_at() {
        let dir = TempDir::new().unwrap();
        let store = TrackingStore::open(dir.path().join("tracking.json"));
        let now = Utc::now();

        // Old created, recently checked: not expired.
        store.insert_raw(TrackedFile {
            relative_path: "recent-check".to_string(),
            download_url: String::new(),
            link: String::new(),
            created_at: now - Duration::days(10),
            last_checked: Some(now - Duration::hours(1)),
            torrent_id: String::new(),
        });

        // Old created, never checked: expired via created_at.
        store.insert_raw(TrackedFile {
            relative_path: "never-checked".to_string(),
            download_url: String::new(),
            link: String::new(),
            created_at: now - Duration::days(10),
            last_checked: None,
            torrent_id: String::new(),
        });

        let expired = store.expired(Duration::days(6));
        let paths: Vec<&str> = expired.iter().map(|t| t.relative_path.as_str()).collect();

        assert!(!paths.contains(&"recent-check"));
        assert!(paths.contains(&"never-checked"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracking.json");

        let store = TrackingStore::open(&path);
        store.track("a.strm", "url-a", "link-a", "t1");
        store.track("b/c.strm", "url-c", "link-c", "t2");
        store.save().unwrap();

        let reloaded = TrackingStore::open(&path);
        assert_eq!(reloaded.count(), 2);
        assert_eq!(reloaded.get("a.strm").unwrap().download_url, "url-a");
        assert_eq!(reloaded.get("b/c.strm").unwrap().torrent_id, "t2");
    }

    #[test]
    fn test_open_missing_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = TrackingStore::open(dir.path().join("missing.json"));
        assert_eq!(store.count(), 0);
    }
}
