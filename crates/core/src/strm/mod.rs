//! Stream-redirection file service: reconciles the on-disk `.strm` tree with
//! the candidate set and keeps the tracking store in step.

mod file_types;
mod sanitize;

pub use file_types::{is_subtitle, is_video};
pub use sanitize::sanitize_name;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::provider::Candidate;
use crate::tracking::{TrackedFile, TrackingStore};

#[derive(Debug, Error)]
pub enum StrmError {
    #[error("output directory error: {0}")]
    Io(#[from] io::Error),
}

/// Counts from one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub tracked: usize,
}

/// Service owning the output tree and the tracking store.
pub struct StrmService {
    output_dir: PathBuf,
    tracking: TrackingStore,
}

impl StrmService {
    pub fn new(output_dir: impl Into<PathBuf>, tracking: TrackingStore) -> Self {
        Self {
            output_dir: output_dir.into(),
            tracking,
        }
    }

    /// The tracking store backing this service.
    pub fn tracking(&self) -> &TrackingStore {
        &self.tracking
    }

    /// Reconcile the output tree against `candidates`.
    ///
    /// Files already holding the desired URL are skipped, changed URLs are
    /// rewritten, missing files are created, and on-disk files with no
    /// matching candidate are deleted along with any directories emptied by
    /// the deletion. Per-file write failures are logged and do not abort the
    /// pass.
    pub fn sync(
        &self,
        candidates: &[Candidate],
        dry_run: bool,
    ) -> Result<ReconcileStats, StrmError> {
        let mut stats = ReconcileStats::default();

        if !dry_run {
            fs::create_dir_all(&self.output_dir)?;
        }

        let existing = self.scan_existing();

        let mut desired: HashMap<String, &Candidate> = HashMap::with_capacity(candidates.len());
        for candidate in candidates {
            let path = strm_relative_path(&candidate.torrent_name, &candidate.file_name);
            desired.insert(path, candidate);
        }

        for (path, candidate) in &desired {
            match existing.get(path) {
                Some(current) if current == &candidate.download_url => {
                    stats.skipped += 1;
                }
                Some(_) => {
                    stats.updated += 1;
                    if !dry_run {
                        match self.write_strm(path, &candidate.download_url) {
                            Ok(()) => self.tracking.track(
                                path,
                                &candidate.download_url,
                                &candidate.link,
                                &candidate.torrent_id,
                            ),
                            Err(e) => error!(path = %path, error = %e, "Failed to update strm file"),
                        }
                    }
                    debug!(path = %path, "Updated strm file");
                }
                None => {
                    stats.added += 1;
                    if !dry_run {
                        match self.write_strm(path, &candidate.download_url) {
                            Ok(()) => self.tracking.track(
                                path,
                                &candidate.download_url,
                                &candidate.link,
                                &candidate.torrent_id,
                            ),
                            Err(e) => error!(path = %path, error = %e, "Failed to create strm file"),
                        }
                    }
                    debug!(path = %path, "Created strm file");
                }
            }
        }

        for path in existing.keys() {
            if desired.contains_key(path) {
                continue;
            }
            stats.deleted += 1;
            if !dry_run {
                let full_path = self.output_dir.join(path);
                match fs::remove_file(&full_path) {
                    Ok(()) => self.tracking.remove(path),
                    Err(e) => error!(path = %path, error = %e, "Failed to delete strm file"),
                }
                if let Some(parent) = full_path.parent() {
                    self.cleanup_empty_dirs(parent);
                }
            }
            debug!(path = %path, "Deleted orphan strm file");
        }

        if !dry_run {
            if let Err(e) = self.tracking.save() {
                warn!(error = %e, "Failed to save tracking data");
            }
        }

        stats.tracked = self.tracking.count();

        debug!(
            added = stats.added,
            updated = stats.updated,
            deleted = stats.deleted,
            skipped = stats.skipped,
            tracked = stats.tracked,
            dry_run,
            "Strm reconcile completed"
        );

        Ok(stats)
    }

    /// Overwrite one file with a fresh URL and refresh its tracking record.
    pub fn update_strm(
        &self,
        relative_path: &str,
        new_url: &str,
        link: &str,
        torrent_id: &str,
    ) -> Result<(), StrmError> {
        self.write_strm(relative_path, new_url)?;
        self.tracking.track(relative_path, new_url, link, torrent_id);

        if let Err(e) = self.tracking.save() {
            warn!(error = %e, "Failed to save tracking after update");
        }

        debug!(path = relative_path, "Refreshed strm file");
        Ok(())
    }

    /// Tracking records older than `older_than` (see
    /// [`TrackingStore::expired`] for the timestamp fallback).
    pub fn expired_files(&self, older_than: Duration) -> Vec<TrackedFile> {
        self.tracking.expired(older_than)
    }

    /// Index existing `.strm` files by relative path, mapped to their
    /// trimmed contents. Unreadable entries are skipped.
    fn scan_existing(&self) -> HashMap<String, String> {
        let mut existing = HashMap::new();

        for entry in WalkDir::new(&self.output_dir)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let is_strm = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.to_lowercase().ends_with(".strm"));
            if !is_strm {
                continue;
            }

            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            let Ok(relative) = entry.path().strip_prefix(&self.output_dir) else {
                continue;
            };

            existing.insert(
                relative.to_string_lossy().into_owned(),
                content.trim().to_string(),
            );
        }

        existing
    }

    fn write_strm(&self, relative_path: &str, url: &str) -> Result<(), StrmError> {
        let full_path = self.output_dir.join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full_path, url)?;
        Ok(())
    }

    /// Remove empty directories from `dir` up to, but not including, the
    /// output root.
    fn cleanup_empty_dirs(&self, dir: &Path) {
        let mut dir = dir;
        while dir != self.output_dir && dir.starts_with(&self.output_dir) {
            match fs::read_dir(dir) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        break;
                    }
                }
                Err(_) => break,
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

/// Relative path for a candidate: sanitized folder from the torrent name,
/// sanitized filename with the extension swapped for `.strm`.
pub fn strm_relative_path(torrent_name: &str, file_name: &str) -> String {
    let folder = sanitize_name(torrent_name);
    let file = sanitize_name(file_name);

    let stem = match file.rfind('.') {
        Some(idx) => &file[..idx],
        None => file.as_str(),
    };

    format!("{folder}/{stem}.strm")
}
