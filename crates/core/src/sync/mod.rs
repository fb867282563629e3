//! Sync orchestrator: the per-cycle pipeline and the watch loop.

mod summary;

pub use summary::{format_summary, RunResult, SummaryOptions};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::organizer::Organizer;
use crate::provider::{Candidate, Download, Provider, ProviderError, Torrent};
use crate::repair::RepairService;
use crate::retry_queue::RetryQueue;
use crate::strm::{is_subtitle, is_video, StrmError, StrmService};
use crate::tracking::TrackingStore;
use crate::worker::WorkerPool;

/// Top-level phase failures abort the cycle; everything else degrades to
/// per-item logging.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetching torrents: {0}")]
    FetchTorrents(#[source] ProviderError),

    #[error("fetching downloads: {0}")]
    FetchDownloads(#[source] ProviderError),

    #[error("reconciling strm files: {0}")]
    Reconcile(#[source] StrmError),
}

/// Stats from draining the cross-cycle retry queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainStats {
    pub succeeded: usize,
    pub failed: usize,
    pub maxed_out: usize,
}

/// A torrent link with no matching download yet.
struct MissingLink {
    torrent_id: String,
    torrent_name: String,
    link: String,
}

#[derive(Default)]
struct FanOutState {
    results: Vec<Download>,
    failed: Vec<String>,
    queued: usize,
    completed: usize,
}

/// Orchestrates one sync cycle and the continuous watch loop.
///
/// Holds the single writer handles for the tracking store and retry queue;
/// fan-out tasks funnel their writes through clones of those handles.
pub struct SyncService {
    provider: Arc<dyn Provider>,
    repair: RepairService,
    strm: StrmService,
    retry_queue: RetryQueue,
    organizer: Option<Arc<dyn Organizer>>,
    config: Arc<Config>,
}

impl SyncService {
    pub fn new(config: Arc<Config>, provider: Arc<dyn Provider>) -> Self {
        let tracking = TrackingStore::open(config.tracking_file());
        let strm = StrmService::new(config.output_dir.clone(), tracking);
        let retry_queue = RetryQueue::open(config.retry_queue_file());
        let repair = RepairService::new(Arc::clone(&provider));

        Self {
            provider,
            repair,
            strm,
            retry_queue,
            organizer: None,
            config,
        }
    }

    /// Attach an organizer collaborator, invoked after each mutating cycle.
    pub fn with_organizer(mut self, organizer: Arc<dyn Organizer>) -> Self {
        self.organizer = Some(organizer);
        self
    }

    /// The retry queue backing this service.
    pub fn retry_queue(&self) -> &RetryQueue {
        &self.retry_queue
    }

    /// The strm file service backing this service.
    pub fn strm(&self) -> &StrmService {
        &self.strm
    }

    /// Execute one sync cycle.
    ///
    /// With `dry_run` set, nothing is written remotely or locally: no
    /// unrestriction, no repair, no file writes, no store persistence. Reads
    /// proceed as normal so the counts are real.
    pub async fn run(&self, dry_run: bool) -> Result<RunResult, SyncError> {
        let start = Instant::now();
        let mut result = RunResult::default();

        info!("Starting sync");

        // Fetch torrents.
        let mut downloaded;
        let dead;
        {
            let lists = self
                .provider
                .list_torrents()
                .await
                .map_err(SyncError::FetchTorrents)?;
            downloaded = lists.downloaded;
            dead = lists.dead;
        }
        result.torrents_downloaded = downloaded.len();
        result.torrents_dead = dead.len();
        result.torrents_total = downloaded.len() + dead.len();

        // Drain the retry queue. Successful unrestricts show up in the
        // downloads listing fetched below.
        if !dry_run {
            let drain = self.drain_retry_queue(&downloaded).await;
            if drain.succeeded > 0 {
                info!(
                    succeeded = drain.succeeded,
                    failed = drain.failed,
                    maxed_out = drain.maxed_out,
                    "Retry queue processed"
                );
            }
        }

        // Repair dead torrents.
        if self.config.repair_torrents && !dead.is_empty() {
            debug!(count = dead.len(), "Repairing dead torrents");
            let (repaired, _) = self.repair.repair_torrents(&dead, dry_run).await;
            result.torrents_repaired = repaired;

            if repaired > 0 && !dry_run {
                match self.provider.list_torrents().await {
                    Ok(lists) => downloaded = lists.downloaded,
                    Err(e) => warn!(error = %e, "Failed to re-fetch torrents after repair"),
                }
            }
        }

        // Fetch downloads.
        let downloads = self
            .provider
            .list_downloads()
            .await
            .map_err(SyncError::FetchDownloads)?;
        result.downloads_before = downloads.len();

        // Match torrent links to downloads.
        let mut download_map: HashMap<String, Download> = downloads
            .into_iter()
            .map(|d| (d.link.clone(), d))
            .collect();

        let mut missing: Vec<MissingLink> = Vec::new();
        for torrent in &downloaded {
            for link in &torrent.links {
                if !download_map.contains_key(link) {
                    missing.push(MissingLink {
                        torrent_id: torrent.id.clone(),
                        torrent_name: torrent.filename.clone(),
                        link: link.clone(),
                    });
                }
            }
        }

        debug!(
            total_torrent_links = downloaded.iter().map(|t| t.links.len()).sum::<usize>(),
            existing_downloads = download_map.len(),
            missing = missing.len(),
            "Link matching complete"
        );

        // Unrestrict missing links with bounded concurrency.
        if !missing.is_empty() {
            if dry_run {
                info!(count = missing.len(), "[dry-run] Would unrestrict links");
            } else {
                let outcome = self.unrestrict_links(missing).await;
                result.links_unrestricted = outcome.results.len();
                result.links_failed = outcome.failed.len();
                result.links_queued = outcome.queued;

                for download in outcome.results {
                    download_map.insert(download.link.clone(), download);
                }

                if self.retry_queue.count() > 0 {
                    if let Err(e) = self.retry_queue.save() {
                        warn!(error = %e, "Failed to save retry queue");
                    }
                }

                if !outcome.failed.is_empty() && self.config.repair_torrents {
                    let failed_torrents = torrents_for_links(&downloaded, &outcome.failed);
                    if !failed_torrents.is_empty() {
                        debug!(
                            count = failed_torrents.len(),
                            "Repairing torrents with failed links"
                        );
                        self.repair.repair_torrents(&failed_torrents, dry_run).await;
                    }
                }
            }
        }

        // Build candidates.
        let (candidates, filtered_small, filtered_other) =
            self.build_candidates(&downloaded, &download_map);
        result.filtered_small = filtered_small;
        result.filtered_other = filtered_other;
        result.downloads_after = download_map.len();
        debug!(count = candidates.len(), "Candidates ready");

        // Reconcile local files.
        let stats = self
            .strm
            .sync(&candidates, dry_run)
            .map_err(SyncError::Reconcile)?;
        result.strm_added = stats.added;
        result.strm_updated = stats.updated;
        result.strm_deleted = stats.deleted;
        result.strm_skipped = stats.skipped;
        result.strm_tracked = stats.tracked;

        // Organizer collaborator.
        if let Some(organizer) = &self.organizer {
            if !dry_run {
                debug!("Running library organizer");
                match organizer.organize().await {
                    Ok(org) => result.organizer = Some(org),
                    Err(e) => error!(error = %e, "Organizer failed"),
                }
            }
        }

        // Refresh links nearing expiry.
        if !dry_run {
            self.refresh_expiring_links().await;
        }

        result.duration = start.elapsed();

        info!(
            strm_added = result.strm_added,
            strm_updated = result.strm_updated,
            strm_deleted = result.strm_deleted,
            duration_ms = result.duration.as_millis() as u64,
            "Sync completed"
        );

        Ok(result)
    }

    /// Run cycles forever, `watch_mode_interval` seconds apart. Cycle
    /// failures are logged and the loop continues; ctrl-c interrupts the
    /// inter-cycle sleep and exits cleanly.
    pub async fn watch(&self) -> Result<(), SyncError> {
        let interval = std::time::Duration::from_secs(self.config.watch_mode_interval);

        info!(interval_secs = interval.as_secs(), "Starting watch mode");

        loop {
            match self.run(false).await {
                Ok(result) => {
                    let opts = SummaryOptions {
                        next_run: Some(
                            Local::now() + chrono::Duration::seconds(interval.as_secs() as i64),
                        ),
                        ..Default::default()
                    };
                    info!("{}", format_summary(&result, &opts));
                }
                Err(e) => error!(error = %e, "Sync cycle failed"),
            }

            info!(seconds = interval.as_secs(), "Waiting for next cycle");

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested, stopping watch loop");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        Ok(())
    }

    /// Drain the retry queue against the current downloaded torrents.
    async fn drain_retry_queue(&self, downloaded: &[Torrent]) -> DrainStats {
        let items = self.retry_queue.get_all();
        if items.is_empty() {
            return DrainStats::default();
        }

        info!(count = items.len(), "Processing retry queue");

        let torrent_ids: HashSet<&str> = downloaded.iter().map(|t| t.id.as_str()).collect();
        let mut stats = DrainStats::default();

        for item in items {
            if item.retry_count >= self.config.max_retry_attempts {
                warn!(
                    link = %item.link,
                    filename = %item.filename,
                    retries = item.retry_count,
                    "Max retries exceeded, removing from queue"
                );
                self.retry_queue.remove(&item.link);
                stats.maxed_out += 1;
                continue;
            }

            if !torrent_ids.contains(item.torrent_id.as_str()) {
                debug!(link = %item.link, "Torrent no longer exists, removing from retry queue");
                self.retry_queue.remove(&item.link);
                continue;
            }

            debug!(
                link = %item.link,
                filename = %item.filename,
                attempt = item.retry_count + 1,
                "Retrying link"
            );

            match self.provider.unrestrict_link(&item.link).await {
                Ok(download) => {
                    self.retry_queue.remove(&item.link);
                    stats.succeeded += 1;
                    info!(filename = %download.filename, "Successfully retried link");
                }
                Err(e) if e.is_queueable() => {
                    self.retry_queue.increment(&item.link);
                    stats.failed += 1;
                    debug!(link = %item.link, error = %e, "Retry failed, will try again next cycle");
                }
                Err(e) => {
                    self.retry_queue.remove(&item.link);
                    stats.failed += 1;
                    debug!(link = %item.link, error = %e, "Non-retryable error, removed from queue");
                }
            }
        }

        if let Err(e) = self.retry_queue.save() {
            warn!(error = %e, "Failed to save retry queue");
        }

        stats
    }

    /// Fan out unrestriction over the worker pool. Queueable failures are
    /// parked for the next cycle; hoster and traffic failures are not logged
    /// individually.
    async fn unrestrict_links(&self, missing: Vec<MissingLink>) -> FanOutState {
        let total = missing.len();
        debug!(count = total, "Unrestricting missing links");

        let state = Arc::new(Mutex::new(FanOutState::default()));
        let mut pool = WorkerPool::new(self.config.concurrent_requests);

        for item in missing {
            let provider = Arc::clone(&self.provider);
            let queue = self.retry_queue.clone();
            let state = Arc::clone(&state);

            pool.submit(async move {
                let outcome = provider.unrestrict_link(&item.link).await;

                let mut st = state.lock().expect("fan-out state poisoned");
                st.completed += 1;
                match outcome {
                    Ok(download) => st.results.push(download),
                    Err(err) => {
                        if err.is_queueable() {
                            queue.add(
                                &item.link,
                                &item.torrent_id,
                                &item.torrent_name,
                                err.error_class(),
                                &err.to_string(),
                            );
                            st.queued += 1;
                            debug!(
                                filename = %item.torrent_name,
                                "Queued for next cycle (retryable error)"
                            );
                        } else if !matches!(
                            err,
                            ProviderError::HosterUnavailable | ProviderError::TrafficExceeded
                        ) {
                            debug!(error = %err, "Failed to unrestrict link");
                        }
                        st.failed.push(item.link);
                    }
                }

                if st.completed % 100 == 0 || st.completed == total {
                    info!(
                        completed = st.completed,
                        total,
                        success = st.results.len(),
                        failed = st.failed.len(),
                        "Unrestriction progress"
                    );
                }
            });
        }

        pool.wait().await;

        Arc::try_unwrap(state)
            .unwrap_or_else(|_| panic!("fan-out tasks still hold state"))
            .into_inner()
            .expect("fan-out state poisoned")
    }

    /// Build the candidate set from matched links, applying the extension and
    /// size policy.
    fn build_candidates(
        &self,
        torrents: &[Torrent],
        download_map: &HashMap<String, Download>,
    ) -> (Vec<Candidate>, usize, usize) {
        let min_size = self.config.min_file_size_bytes();
        let mut candidates = Vec::new();
        let mut filtered_small = 0;
        let mut filtered_other = 0;

        for torrent in torrents {
            for link in &torrent.links {
                let Some(download) = download_map.get(link) else {
                    continue;
                };

                let video = is_video(&download.filename);
                let subtitle = is_subtitle(&download.filename);

                // Size floor applies to videos only; subtitles are never
                // size-filtered.
                if video && download.filesize < min_size {
                    debug!(
                        filename = %download.filename,
                        size_mb = download.filesize / (1024 * 1024),
                        min_mb = min_size / (1024 * 1024),
                        "Skipping small video"
                    );
                    filtered_small += 1;
                    continue;
                }

                if !video && !subtitle {
                    debug!(filename = %download.filename, "Skipping non-media file");
                    filtered_other += 1;
                    continue;
                }

                candidates.push(Candidate {
                    torrent_id: torrent.id.clone(),
                    torrent_name: torrent.filename.clone(),
                    file_name: download.filename.clone(),
                    download_url: download.download.clone(),
                    link: download.link.clone(),
                    filesize: download.filesize,
                });
            }
        }

        (candidates, filtered_small, filtered_other)
    }

    /// Re-unrestrict tracked files older than the expiry threshold and
    /// rewrite them in place. Failures never abort the cycle.
    async fn refresh_expiring_links(&self) {
        let older_than = chrono::Duration::days(self.config.file_expiry_days as i64);
        let expired = self.strm.expired_files(older_than);

        if expired.is_empty() {
            return;
        }

        info!(count = expired.len(), "Refreshing expired links");

        let mut refreshed = 0;
        let mut failed = 0;
        for tracked in expired {
            match self.provider.unrestrict_link(&tracked.link).await {
                Ok(download) => {
                    match self.strm.update_strm(
                        &tracked.relative_path,
                        &download.download,
                        &tracked.link,
                        &tracked.torrent_id,
                    ) {
                        Ok(()) => refreshed += 1,
                        Err(e) => {
                            warn!(
                                path = %tracked.relative_path,
                                error = %e,
                                "Failed to update strm file"
                            );
                            failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        path = %tracked.relative_path,
                        error = %e,
                        "Failed to refresh expired link"
                    );
                    failed += 1;
                }
            }
        }

        if refreshed > 0 {
            info!(refreshed, failed, "Link refresh completed");
        }
    }
}

/// Torrents owning any of the failed links, deduplicated by id.
fn torrents_for_links(torrents: &[Torrent], failed_links: &[String]) -> Vec<Torrent> {
    let failed: HashSet<&str> = failed_links.iter().map(String::as_str).collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut result = Vec::new();
    for torrent in torrents {
        if torrent.links.iter().any(|l| failed.contains(l.as_str())) && seen.insert(torrent.id.as_str()) {
            result.push(torrent.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TorrentStatus;
    use chrono::Utc;

    fn torrent(id: &str, links: &[&str]) -> Torrent {
        Torrent {
            id: id.to_string(),
            filename: format!("Torrent {id}"),
            hash: "aabbccdd".to_string(),
            bytes: 0,
            status: TorrentStatus::Downloaded,
            progress: 100.0,
            added: Utc::now(),
            ended: None,
            links: links.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn test_torrents_for_links_dedupes() {
        let torrents = vec![
            torrent("t1", &["link-a", "link-b"]),
            torrent("t2", &["link-c"]),
            torrent("t3", &["link-d"]),
        ];
        let failed = vec!["link-a".to_string(), "link-b".to_string(), "link-c".to_string()];

        let matched = torrents_for_links(&torrents, &failed);
        let ids: Vec<&str> = matched.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[test]
    fn test_torrents_for_links_no_matches() {
        let torrents = vec![torrent("t1", &["link-a"])];
        let failed = vec!["link-z".to_string()];
        assert!(torrents_for_links(&torrents, &failed).is_empty());
    }
}
