//! Repair of dead torrents by re-adding them from their content hash.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::provider::{Provider, ProviderError, Torrent};

/// Re-adds dead torrents via magnet and retires the dead records.
pub struct RepairService {
    provider: Arc<dyn Provider>,
}

impl RepairService {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Repair one dead torrent: add the magnet, select video files (cleaning
    /// up the fresh torrent if selection fails), then delete the dead record.
    /// A failed delete is logged but not fatal, since the replacement already
    /// exists.
    pub async fn repair_torrent(
        &self,
        torrent: &Torrent,
        dry_run: bool,
    ) -> Result<(), ProviderError> {
        info!(
            id = %torrent.id,
            filename = %torrent.filename,
            hash = %&torrent.hash[..torrent.hash.len().min(8)],
            "Repairing torrent"
        );

        if dry_run {
            info!("[dry-run] Would repair torrent");
            return Ok(());
        }

        let new_id = self.provider.add_magnet(&torrent.hash).await?;
        debug!(new_id = %new_id, "Added magnet for repair");

        match self.provider.select_video_files(&new_id).await {
            Ok(count) => debug!(files = count, "Selected video files"),
            Err(e) => {
                let _ = self.provider.delete_torrent(&new_id).await;
                return Err(e);
            }
        }

        if let Err(e) = self.provider.delete_torrent(&torrent.id).await {
            warn!(error = %e, "Failed to delete original torrent");
        }

        info!(old_id = %torrent.id, new_id = %new_id, "Torrent repaired");
        Ok(())
    }

    /// Repair a batch. Returns (succeeded, failed).
    pub async fn repair_torrents(&self, torrents: &[Torrent], dry_run: bool) -> (usize, usize) {
        if torrents.is_empty() {
            return (0, 0);
        }

        info!(count = torrents.len(), "Starting torrent repairs");

        let mut succeeded = 0;
        let mut failed = 0;
        for torrent in torrents {
            match self.repair_torrent(torrent, dry_run).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    error!(filename = %torrent.filename, error = %e, "Repair failed");
                    failed += 1;
                }
            }
        }

        info!(succeeded, failed, "Torrent repairs completed");
        (succeeded, failed)
    }

    /// Re-add a torrent from a bare content hash.
    pub async fn repair_by_hash(&self, hash: &str, dry_run: bool) -> Result<(), ProviderError> {
        if dry_run {
            info!(hash = %&hash[..hash.len().min(8)], "[dry-run] Would repair torrent by hash");
            return Ok(());
        }

        let new_id = self.provider.add_magnet(hash).await?;

        match self.provider.select_video_files(&new_id).await {
            Ok(count) => {
                info!(
                    hash = %&hash[..hash.len().min(8)],
                    id = %new_id,
                    files = count,
                    "Torrent added by hash"
                );
                Ok(())
            }
            Err(e) => {
                let _ = self.provider.delete_torrent(&new_id).await;
                Err(e)
            }
        }
    }
}
