use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
///
/// Every field has a default so a minimal config file only needs `token`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Provider API bearer token.
    #[serde(default)]
    pub token: String,

    /// Root directory for generated `.strm` files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Root directory for organizer output (consumed by the organizer only).
    #[serde(default = "default_organized_dir")]
    pub organized_dir: PathBuf,

    /// Directory for persisted state and logs.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Maximum parallel unrestrict requests.
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Requests per minute for the general endpoint class.
    #[serde(default = "default_general_rate_limit")]
    pub general_rate_limit: u32,

    /// Requests per minute for the torrents endpoint class.
    #[serde(default = "default_torrents_rate_limit")]
    pub torrents_rate_limit: u32,

    /// Accepted for config compatibility; the `watch` command decides
    /// whether the loop runs.
    #[serde(default)]
    pub watch_mode: bool,

    /// Seconds between watch-mode cycles (minimum 10).
    #[serde(default = "default_watch_mode_interval")]
    pub watch_mode_interval: u64,

    /// Enable the dead-torrent repair flow.
    #[serde(default = "default_true")]
    pub repair_torrents: bool,

    /// Videos below this size are dropped from candidates.
    #[serde(default = "default_min_file_size_mb")]
    pub min_file_size_mb: u64,

    /// Tracked files older than this many days are refreshed each cycle.
    #[serde(default = "default_file_expiry_days")]
    pub file_expiry_days: u32,

    /// Retry-queue attempt cap.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    /// Tracking store path. Defaults to `<cache_dir>/file_tracking.json`.
    #[serde(default)]
    pub tracking_file: Option<PathBuf>,

    /// Retry queue path. Defaults to `<cache_dir>/retry_queue.json`.
    #[serde(default)]
    pub retry_queue_file: Option<PathBuf>,

    /// Default log verbosity (debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional proxy URL, `http(s)://` or `socks5://` with optional userinfo.
    /// Absent proxy falls back to environment-derived proxy resolution.
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./library")
}

fn default_organized_dir() -> PathBuf {
    PathBuf::from("./library-organized")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_concurrent_requests() -> usize {
    32
}

fn default_general_rate_limit() -> u32 {
    60
}

fn default_torrents_rate_limit() -> u32 {
    25
}

fn default_watch_mode_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_min_file_size_mb() -> u64 {
    150
}

fn default_file_expiry_days() -> u32 {
    6
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            output_dir: default_output_dir(),
            organized_dir: default_organized_dir(),
            cache_dir: default_cache_dir(),
            concurrent_requests: default_concurrent_requests(),
            general_rate_limit: default_general_rate_limit(),
            torrents_rate_limit: default_torrents_rate_limit(),
            watch_mode: false,
            watch_mode_interval: default_watch_mode_interval(),
            repair_torrents: true,
            min_file_size_mb: default_min_file_size_mb(),
            file_expiry_days: default_file_expiry_days(),
            max_retry_attempts: default_max_retry_attempts(),
            tracking_file: None,
            retry_queue_file: None,
            log_level: default_log_level(),
            proxy: None,
        }
    }
}

impl Config {
    /// Minimum video size in bytes.
    pub fn min_file_size_bytes(&self) -> u64 {
        self.min_file_size_mb * 1024 * 1024
    }

    /// Resolved tracking store path.
    pub fn tracking_file(&self) -> PathBuf {
        self.tracking_file
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("file_tracking.json"))
    }

    /// Resolved retry queue path.
    pub fn retry_queue_file(&self) -> PathBuf {
        self.retry_queue_file
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("retry_queue.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("./library"));
        assert_eq!(config.concurrent_requests, 32);
        assert_eq!(config.general_rate_limit, 60);
        assert_eq!(config.torrents_rate_limit, 25);
        assert_eq!(config.watch_mode_interval, 60);
        assert!(config.repair_torrents);
        assert_eq!(config.min_file_size_mb, 150);
        assert_eq!(config.file_expiry_days, 6);
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.log_level, "info");
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_deserialize_minimal() {
        let json = r#"{ "token": "abc123" }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.token, "abc123");
        assert_eq!(config.concurrent_requests, 32);
        assert_eq!(config.min_file_size_mb, 150);
    }

    #[test]
    fn test_deserialize_full() {
        let json = r#"{
            "token": "abc123",
            "output_dir": "/library",
            "cache_dir": "/data/cache",
            "concurrent_requests": 50,
            "general_rate_limit": 90,
            "torrents_rate_limit": 20,
            "watch_mode_interval": 120,
            "repair_torrents": false,
            "min_file_size_mb": 200,
            "file_expiry_days": 5,
            "max_retry_attempts": 4,
            "tracking_file": "/data/cache/tracking.json",
            "log_level": "debug"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/library"));
        assert_eq!(config.concurrent_requests, 50);
        assert_eq!(config.watch_mode_interval, 120);
        assert!(!config.repair_torrents);
        assert_eq!(
            config.tracking_file(),
            PathBuf::from("/data/cache/tracking.json")
        );
    }

    #[test]
    fn test_min_file_size_bytes() {
        let config = Config {
            min_file_size_mb: 150,
            ..Default::default()
        };
        assert_eq!(config.min_file_size_bytes(), 150 * 1024 * 1024);
    }

    #[test]
    fn test_state_paths_follow_cache_dir() {
        let config = Config {
            cache_dir: PathBuf::from("/data/cache"),
            ..Default::default()
        };
        assert_eq!(
            config.tracking_file(),
            PathBuf::from("/data/cache/file_tracking.json")
        );
        assert_eq!(
            config.retry_queue_file(),
            PathBuf::from("/data/cache/retry_queue.json")
        );
    }
}
