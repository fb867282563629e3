//! HTTP implementation of [`Provider`] against the debrid REST API.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::http::{HttpClient, HttpError, RateLimiter};

use super::types::{
    dedupe_by_link, AddMagnetResponse, ApiErrorBody, Download, Torrent, TorrentDetails,
    TorrentLists, TorrentStatus, UnrestrictResponse,
};
use super::{map_error_code, Provider, ProviderError};

const API_BASE: &str = "https://api.real-debrid.com/rest/1.0";

/// Torrent listings must use 100 or fewer per page for links to be included.
const TORRENTS_PAGE_LIMIT: usize = 100;
/// The downloads endpoint tolerates much larger pages.
const DOWNLOADS_PAGE_LIMIT: usize = 5000;
/// Bound on runaway pagination.
const MAX_PAGES: u32 = 1000;

const MAX_503_RETRIES: u32 = 2;
const MAX_429_RETRIES: u32 = 3;
const RETRY_503_DELAY: Duration = Duration::from_secs(10);
const RETRY_429_BASE_DELAY: Duration = Duration::from_secs(2);

/// Provider API client with two endpoint classes: a general client for
/// unrestrict/downloads traffic and a stricter torrents client.
pub struct DebridClient {
    host: String,
    general: HttpClient,
    torrents: HttpClient,
    min_file_size: u64,
}

impl DebridClient {
    pub fn new(config: &Config) -> Result<Self, HttpError> {
        let general_limiter = Arc::new(RateLimiter::per_minute(config.general_rate_limit));
        let torrents_limiter = Arc::new(RateLimiter::per_minute(config.torrents_rate_limit));

        let general = Self::endpoint_client(config, general_limiter)?;
        let torrents = Self::endpoint_client(config, torrents_limiter)?;

        Ok(Self {
            host: API_BASE.to_string(),
            general,
            torrents,
            min_file_size: config.min_file_size_bytes(),
        })
    }

    fn endpoint_client(
        config: &Config,
        limiter: Arc<RateLimiter>,
    ) -> Result<HttpClient, HttpError> {
        let mut builder = HttpClient::builder()
            .header("Authorization", format!("Bearer {}", config.token))
            .rate_limiter(limiter)
            .max_retries(5)
            .retryable_status(&[429, 502, 503]);

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(proxy.clone());
        }

        builder.build()
    }

    async fn read_body(response: reqwest::Response) -> Result<String, ProviderError> {
        response.text().await.map_err(|e| HttpError::from(e).into())
    }
}

#[async_trait]
impl Provider for DebridClient {
    async fn list_torrents(&self) -> Result<TorrentLists, ProviderError> {
        debug!("Fetching all torrents with pagination");

        let mut all: Vec<Torrent> = Vec::new();
        let mut page: u32 = 1;

        loop {
            let url = format!(
                "{}/torrents?page={}&limit={}",
                self.host, page, TORRENTS_PAGE_LIMIT
            );
            let response = self.torrents.get(&url).await?;
            let status = response.status().as_u16();

            if status == 204 {
                break;
            }
            if status != 200 {
                let body = Self::read_body(response).await.unwrap_or_default();
                return Err(ProviderError::Status { status, body });
            }

            let body = Self::read_body(response).await?;
            let torrents: Vec<Torrent> = serde_json::from_str(&body)
                .map_err(|e| ProviderError::InvalidResponse(format!("torrents page: {e}")))?;

            if torrents.is_empty() {
                break;
            }

            let count = torrents.len();
            all.extend(torrents);
            debug!(page, count, total = all.len(), "Fetched torrents page");

            if count < TORRENTS_PAGE_LIMIT {
                break;
            }

            page += 1;
            if page > MAX_PAGES {
                warn!("Torrent pagination safety limit reached");
                break;
            }
        }

        let mut lists = TorrentLists::default();
        for torrent in all {
            match torrent.status {
                TorrentStatus::Downloaded => lists.downloaded.push(torrent),
                TorrentStatus::Dead => lists.dead.push(torrent),
                _ => {}
            }
        }

        debug!(
            downloaded = lists.downloaded.len(),
            dead = lists.dead.len(),
            "Torrents fetched and partitioned"
        );

        Ok(lists)
    }

    async fn torrent_info(&self, id: &str) -> Result<TorrentDetails, ProviderError> {
        let url = format!("{}/torrents/info/{}", self.host, id);
        let response = self.torrents.get(&url).await?;
        let status = response.status().as_u16();

        if status == 404 {
            return Err(ProviderError::TorrentNotFound);
        }
        if status != 200 {
            let body = Self::read_body(response).await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let body = Self::read_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("torrent info: {e}")))
    }

    async fn add_magnet(&self, hash: &str) -> Result<String, ProviderError> {
        let magnet = format!("magnet:?xt=urn:btih:{hash}");
        let url = format!("{}/torrents/addMagnet", self.host);

        let response = self
            .torrents
            .post_form(&url, &[("magnet", &magnet)])
            .await?;
        let status = response.status().as_u16();
        let body = Self::read_body(response).await?;

        if status != 200 && status != 201 {
            return Err(ProviderError::Status { status, body });
        }

        let result: AddMagnetResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("add magnet: {e}")))?;

        info!(id = %result.id, hash = %&hash[..hash.len().min(8)], "Added magnet");
        Ok(result.id)
    }

    async fn select_files(&self, id: &str, file_ids: &[i64]) -> Result<(), ProviderError> {
        let url = format!("{}/torrents/selectFiles/{}", self.host, id);
        let files = file_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let response = self.torrents.post_form(&url, &[("files", &files)]).await?;
        let status = response.status().as_u16();

        if status != 200 && status != 204 {
            let body = Self::read_body(response).await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        debug!(torrent = id, files = file_ids.len(), "Selected files");
        Ok(())
    }

    async fn select_video_files(&self, id: &str) -> Result<usize, ProviderError> {
        let info = self.torrent_info(id).await?;

        let video_ids: Vec<i64> = info
            .files
            .iter()
            .filter(|f| {
                let ext = Path::new(&f.path)
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase());
                matches!(ext.as_deref(), Some("mkv") | Some("mp4")) && f.bytes >= self.min_file_size
            })
            .map(|f| f.id)
            .collect();

        if video_ids.is_empty() {
            return Err(ProviderError::NoVideoFiles);
        }

        self.select_files(id, &video_ids).await?;
        Ok(video_ids.len())
    }

    async fn wait_for_download(
        &self,
        id: &str,
        max_attempts: u32,
    ) -> Result<TorrentDetails, ProviderError> {
        for attempt in 0..max_attempts {
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

            debug!(
                torrent = id,
                status = info.status.as_str(),
                progress = info.progress,
                attempt = attempt + 1,
                "Waiting for download"
            );
        }

        Err(ProviderError::WaitTimeout(id.to_string()))
    }

    async fn delete_torrent(&self, id: &str) -> Result<(), ProviderError> {
        let url = format!("{}/torrents/delete/{}", self.host, id);
        let response = self.torrents.delete(&url).await?;
        let status = response.status().as_u16();

        if status != 200 && status != 204 {
            let body = Self::read_body(response).await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        info!(id, "Deleted torrent");
        Ok(())
    }

    async fn list_downloads(&self) -> Result<Vec<Download>, ProviderError> {
        debug!("Fetching all downloads with pagination");

        let mut all: Vec<Download> = Vec::new();
        let mut offset = 0usize;

        loop {
            let mut url = format!("{}/downloads?limit={}", self.host, DOWNLOADS_PAGE_LIMIT);
            if offset > 0 {
                url.push_str(&format!("&offset={offset}"));
            }

            let response = self.general.get(&url).await?;
            let status = response.status().as_u16();

            if status == 204 {
                break;
            }
            if status != 200 {
                let body = Self::read_body(response).await.unwrap_or_default();
                return Err(ProviderError::Status { status, body });
            }

            let body = Self::read_body(response).await?;
            let downloads: Vec<Download> = serde_json::from_str(&body)
                .map_err(|e| ProviderError::InvalidResponse(format!("downloads page: {e}")))?;

            if downloads.is_empty() {
                break;
            }

            let count = downloads.len();
            all.extend(downloads);
            debug!(offset, count, total = all.len(), "Fetched downloads batch");

            if count < DOWNLOADS_PAGE_LIMIT {
                break;
            }
            offset += count;
        }

        let total = all.len();
        let streamable: Vec<Download> = all.into_iter().filter(Download::is_streamable).collect();
        let streamable_count = streamable.len();
        let deduped = dedupe_by_link(streamable);

        debug!(
            total,
            streamable = streamable_count,
            deduped = deduped.len(),
            "Downloads fetched and filtered"
        );

        Ok(deduped)
    }

    async fn delete_download(&self, id: &str) -> Result<(), ProviderError> {
        let url = format!("{}/downloads/delete/{}", self.host, id);
        let response = self.general.delete(&url).await?;
        let status = response.status().as_u16();

        if status != 200 && status != 204 {
            let body = Self::read_body(response).await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        debug!(id, "Deleted download");
        Ok(())
    }

    async fn unrestrict_link(&self, link: &str) -> Result<Download, ProviderError> {
        let url = format!("{}/unrestrict/link", self.host);
        let mut attempt_503: u32 = 0;
        let mut attempt_429: u32 = 0;

        loop {
            let response = self.general.post_form(&url, &[("link", link)]).await?;
            let status = response.status().as_u16();
            let body = Self::read_body(response).await?;

            match status {
                200 => {
                    let result: UnrestrictResponse = serde_json::from_str(&body)
                        .map_err(|e| ProviderError::InvalidResponse(format!("unrestrict: {e}")))?;

                    if result.download.is_empty() {
                        return Err(ProviderError::InvalidResponse(
                            "no download URL in response".to_string(),
                        ));
                    }

                    debug!(
                        filename = %result.filename,
                        size = result.filesize,
                        "Unrestricted link"
                    );
                    return Ok(result.into_download());
                }

                // 503: immediate retries with a fixed delay, then defer to
                // the cross-cycle queue.
                503 => {
                    attempt_503 += 1;
                    if attempt_503 <= MAX_503_RETRIES {
                        warn!(
                            attempt = attempt_503,
                            delay_secs = RETRY_503_DELAY.as_secs(),
                            "Server unavailable (503), retrying"
                        );
                        tokio::time::sleep(RETRY_503_DELAY).await;
                        continue;
                    }
                    warn!(
                        attempts = attempt_503,
                        "Server unavailable after immediate retries, deferring to next cycle"
                    );
                    return Err(ProviderError::ServerUnavailable);
                }

                // 429: immediate retries with exponential backoff, never
                // queued on exhaustion.
                429 => {
                    attempt_429 += 1;
                    if attempt_429 <= MAX_429_RETRIES {
                        let delay = RETRY_429_BASE_DELAY * 2u32.pow(attempt_429 - 1);
                        warn!(
                            attempt = attempt_429,
                            delay_secs = delay.as_secs(),
                            "Rate limited (429), backing off"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(ProviderError::RateLimitExceeded);
                }

                _ => {
                    if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
                        if err.error_code != 0 || !err.error.is_empty() {
                            return Err(map_error_code(err.error_code, err.error));
                        }
                    }
                    return Err(ProviderError::Status { status, body });
                }
            }
        }
    }

    async fn check_link(&self, link: &str) -> Result<(), ProviderError> {
        let url = format!("{}/unrestrict/check", self.host);
        let response = self.general.post_form(&url, &[("link", link)]).await?;
        let status = response.status().as_u16();

        if status == 404 {
            return Err(ProviderError::LinkBroken);
        }
        if status != 200 {
            let body = Self::read_body(response).await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            token: "test-token".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_construction() {
        let client = DebridClient::new(&test_config()).unwrap();
        assert_eq!(client.host, API_BASE);
        assert_eq!(client.min_file_size, 150 * 1024 * 1024);
    }

    #[test]
    fn test_client_construction_with_proxy() {
        let config = Config {
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            ..test_config()
        };
        assert!(DebridClient::new(&config).is_ok());
    }

    #[test]
    fn test_backoff_delays_double() {
        // 2s, 4s, 8s for the three 429 attempts.
        for (attempt, expected) in [(1u32, 2u64), (2, 4), (3, 8)] {
            let delay = RETRY_429_BASE_DELAY * 2u32.pow(attempt - 1);
            assert_eq!(delay.as_secs(), expected);
        }
    }
}
