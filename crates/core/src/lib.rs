//! Core sync engine: reconciles a debrid provider's cached torrents with a
//! local library of `.strm` stream-redirection files.
//!
//! The pipeline per cycle: fetch torrents, drain the retry queue, repair dead
//! torrents, fetch downloads, match links, unrestrict what is missing, build
//! candidates, reconcile the local tree, invoke the organizer, refresh links
//! nearing expiry. See [`sync::SyncService`].

pub mod config;
pub mod http;
pub mod organizer;
pub mod provider;
pub mod repair;
pub mod retry_queue;
pub mod strm;
pub mod sync;
pub mod testing;
pub mod tracking;
pub mod worker;

mod persist;

pub use config::{load_config, load_config_from_str, Config, ConfigError};
pub use sync::{format_summary, RunResult, SummaryOptions, SyncError, SyncService};
