//! Mock provider for tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::provider::{
    dedupe_by_link, Download, Provider, ProviderError, Torrent, TorrentDetails, TorrentLists,
    TorrentStatus,
};

/// Scripted outcome for one `unrestrict_link` call.
#[derive(Debug, Clone)]
pub enum UnrestrictOutcome {
    Success(Download),
    ServerUnavailable,
    RateLimitExceeded,
    HosterUnavailable,
    TrafficExceeded,
    Status(u16),
}

impl UnrestrictOutcome {
    fn into_result(self) -> Result<Download, ProviderError> {
        match self {
            UnrestrictOutcome::Success(download) => Ok(download),
            UnrestrictOutcome::ServerUnavailable => Err(ProviderError::ServerUnavailable),
            UnrestrictOutcome::RateLimitExceeded => Err(ProviderError::RateLimitExceeded),
            UnrestrictOutcome::HosterUnavailable => Err(ProviderError::HosterUnavailable),
            UnrestrictOutcome::TrafficExceeded => Err(ProviderError::TrafficExceeded),
            UnrestrictOutcome::Status(status) => Err(ProviderError::Status {
                status,
                body: String::new(),
            }),
        }
    }
}

#[derive(Default)]
struct State {
    torrents: Vec<Torrent>,
    downloads: Vec<Download>,
    infos: HashMap<String, TorrentDetails>,
    unrestrict_scripts: HashMap<String, VecDeque<UnrestrictOutcome>>,
    video_selection_scripts: HashMap<String, Result<usize, ProviderError>>,
    broken_links: Vec<String>,
    next_magnet_ids: VecDeque<String>,
    magnet_counter: u32,

    unrestrict_calls: Vec<String>,
    added_magnets: Vec<String>,
    deleted_torrents: Vec<String>,
    deleted_downloads: Vec<String>,
    selected_files: Vec<(String, Vec<i64>)>,
}

/// Controllable in-memory [`Provider`].
///
/// Tests preload torrents and downloads, script per-link unrestrict outcomes
/// (consumed in order), and assert on recorded mutations afterwards. A
/// successful unrestrict also lands in the downloads listing, the way the
/// real provider caches unrestricted links.
#[derive(Default)]
pub struct MockProvider {
    state: Mutex<State>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_torrent(&self, torrent: Torrent) {
        self.state.lock().unwrap().torrents.push(torrent);
    }

    pub fn push_download(&self, download: Download) {
        self.state.lock().unwrap().downloads.push(download);
    }

    pub fn remove_torrent(&self, id: &str) {
        self.state.lock().unwrap().torrents.retain(|t| t.id != id);
    }

    /// Queue an outcome for a link; each call consumes one script entry.
    /// An unscripted call fails with a generic API error.
    pub fn script_unrestrict(&self, link: &str, outcome: UnrestrictOutcome) {
        self.state
            .lock()
            .unwrap()
            .unrestrict_scripts
            .entry(link.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn script_torrent_info(&self, details: TorrentDetails) {
        self.state
            .lock()
            .unwrap()
            .infos
            .insert(details.id.clone(), details);
    }

    /// One-shot script for `select_video_files` on a torrent id.
    pub fn script_video_selection(&self, id: &str, result: Result<usize, ProviderError>) {
        self.state
            .lock()
            .unwrap()
            .video_selection_scripts
            .insert(id.to_string(), result);
    }

    pub fn set_next_magnet_id(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .next_magnet_ids
            .push_back(id.to_string());
    }

    pub fn mark_link_broken(&self, link: &str) {
        self.state.lock().unwrap().broken_links.push(link.to_string());
    }

    pub fn unrestrict_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().unrestrict_calls.clone()
    }

    pub fn added_magnets(&self) -> Vec<String> {
        self.state.lock().unwrap().added_magnets.clone()
    }

    pub fn deleted_torrents(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_torrents.clone()
    }

    pub fn deleted_downloads(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_downloads.clone()
    }

    pub fn selected_files(&self) -> Vec<(String, Vec<i64>)> {
        self.state.lock().unwrap().selected_files.clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn list_torrents(&self) -> Result<TorrentLists, ProviderError> {
        let state = self.state.lock().unwrap();
        let mut lists = TorrentLists::default();
        for torrent in &state.torrents {
            match torrent.status {
                TorrentStatus::Downloaded => lists.downloaded.push(torrent.clone()),
                TorrentStatus::Dead => lists.dead.push(torrent.clone()),
                _ => {}
            }
        }
        Ok(lists)
    }

    async fn torrent_info(&self, id: &str) -> Result<TorrentDetails, ProviderError> {
        let state = self.state.lock().unwrap();
        state
            .infos
            .get(id)
            .cloned()
            .ok_or(ProviderError::TorrentNotFound)
    }

    async fn add_magnet(&self, hash: &str) -> Result<String, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.added_magnets.push(hash.to_string());
        let id = match state.next_magnet_ids.pop_front() {
            Some(id) => id,
            None => {
                state.magnet_counter += 1;
                format!("magnet-{}", state.magnet_counter)
            }
        };
        Ok(id)
    }

    async fn select_files(&self, id: &str, file_ids: &[i64]) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state
            .selected_files
            .push((id.to_string(), file_ids.to_vec()));
        Ok(())
    }

    async fn select_video_files(&self, id: &str) -> Result<usize, ProviderError> {
        let mut state = self.state.lock().unwrap();
        match state.video_selection_scripts.remove(id) {
            Some(result) => result,
            None => Err(ProviderError::NoVideoFiles),
        }
    }

    async fn wait_for_download(
        &self,
        id: &str,
        max_attempts: u32,
    ) -> Result<TorrentDetails, ProviderError> {
        for _ in 0..max_attempts {
            let info = self.torrent_info(id).await?;
            match info.status {
                TorrentStatus::Downloaded => return Ok(info),
                TorrentStatus::WaitingFilesSelection => {
                    self.select_video_files(id).await?;
                }
                status if status.is_failed() => {
                    return Err(ProviderError::TorrentFailed(status.as_str()));
                }
                _ => {}
            }
        }
        Err(ProviderError::WaitTimeout(id.to_string()))
    }

    async fn delete_torrent(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.deleted_torrents.push(id.to_string());
        state.torrents.retain(|t| t.id != id);
        Ok(())
    }

    async fn list_downloads(&self) -> Result<Vec<Download>, ProviderError> {
        let state = self.state.lock().unwrap();
        let streamable = state
            .downloads
            .iter()
            .filter(|d| d.is_streamable())
            .cloned()
            .collect();
        Ok(dedupe_by_link(streamable))
    }

    async fn delete_download(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.deleted_downloads.push(id.to_string());
        state.downloads.retain(|d| d.id != id);
        Ok(())
    }

    async fn unrestrict_link(&self, link: &str) -> Result<Download, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.unrestrict_calls.push(link.to_string());

        let outcome = state
            .unrestrict_scripts
            .get_mut(link)
            .and_then(VecDeque::pop_front);

        match outcome {
            Some(outcome) => {
                let result = outcome.into_result();
                if let Ok(download) = &result {
                    // The provider caches successful unrestricts as downloads.
                    state.downloads.push(download.clone());
                }
                result
            }
            None => Err(ProviderError::Api {
                code: -1,
                message: format!("unscripted unrestrict for {link}"),
            }),
        }
    }

    async fn check_link(&self, link: &str) -> Result<(), ProviderError> {
        let state = self.state.lock().unwrap();
        if state.broken_links.iter().any(|l| l == link) {
            return Err(ProviderError::LinkBroken);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn details(id: &str, status: TorrentStatus) -> TorrentDetails {
        TorrentDetails {
            id: id.to_string(),
            filename: "Show".to_string(),
            original_filename: String::new(),
            hash: "aabb".to_string(),
            bytes: 0,
            progress: 100.0,
            status,
            files: vec![],
            links: vec![],
            speed: None,
            seeders: None,
        }
    }

    #[tokio::test]
    async fn test_wait_for_download_returns_downloaded_info() {
        let provider = MockProvider::new();
        provider.script_torrent_info(details("t1", TorrentStatus::Downloaded));

        let info = provider.wait_for_download("t1", 3).await.unwrap();
        assert_eq!(info.id, "t1");
    }

    #[tokio::test]
    async fn test_wait_for_download_fails_on_dead() {
        let provider = MockProvider::new();
        provider.script_torrent_info(details("t1", TorrentStatus::Dead));

        let result = provider.wait_for_download("t1", 3).await;
        assert!(matches!(result, Err(ProviderError::TorrentFailed("dead"))));
    }

    #[tokio::test]
    async fn test_check_link_flags_broken_links() {
        let provider = MockProvider::new();
        provider.mark_link_broken("link-broken");

        assert!(provider.check_link("link-ok").await.is_ok());
        assert!(matches!(
            provider.check_link("link-broken").await,
            Err(ProviderError::LinkBroken)
        ));
    }

    #[tokio::test]
    async fn test_delete_download_records_and_removes() {
        let provider = MockProvider::new();
        let download = Download {
            id: "d1".to_string(),
            filename: "file.mkv".to_string(),
            mime_type: String::new(),
            filesize: 0,
            link: "link-1".to_string(),
            host: String::new(),
            chunks: 0,
            download: "https://cdn/file".to_string(),
            streamable: 1,
            generated: Utc::now(),
        };
        provider.push_download(download);

        provider.delete_download("d1").await.unwrap();
        assert_eq!(provider.deleted_downloads(), vec!["d1"]);
        assert!(provider.list_downloads().await.unwrap().is_empty());
    }
}
