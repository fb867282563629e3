//! Compact single-line summaries of a sync cycle.

use chrono::{DateTime, Local};
use std::time::Duration;

use crate::organizer::OrganizerResult;

/// Counters collected over one cycle.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub torrents_total: usize,
    pub torrents_downloaded: usize,
    pub torrents_dead: usize,
    pub torrents_repaired: usize,
    /// Downloads cached at the provider before/after unrestriction.
    pub downloads_before: usize,
    pub downloads_after: usize,
    pub links_unrestricted: usize,
    pub links_failed: usize,
    pub links_queued: usize,
    /// Candidates dropped by the video size floor.
    pub filtered_small: usize,
    /// Candidates dropped for being neither video nor subtitle.
    pub filtered_other: usize,
    pub strm_added: usize,
    pub strm_updated: usize,
    pub strm_deleted: usize,
    pub strm_skipped: usize,
    pub strm_tracked: usize,
    pub organizer: Option<OrganizerResult>,
    pub duration: Duration,
}

/// Formatting knobs for [`format_summary`].
#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    /// Override the leading status segment.
    pub status: Option<String>,
    pub dry_run: bool,
    /// Shown as `next=HH:MM:SS` in watch mode.
    pub next_run: Option<DateTime<Local>>,
}

/// Build the single-line cycle summary.
pub fn format_summary(result: &RunResult, opts: &SummaryOptions) -> String {
    let status = opts.status.clone().unwrap_or_else(|| {
        if opts.dry_run {
            "summary | status=dry".to_string()
        } else {
            "summary | status=ok".to_string()
        }
    });

    let mut parts = vec![
        status,
        format!(
            "torrents_downloaded={} torrents_dead={} repaired={}",
            result.torrents_downloaded, result.torrents_dead, result.torrents_repaired
        ),
    ];

    if result.downloads_after > 0 {
        parts.push(format!(
            "downloads_cached_before={} downloads_cached_after={}",
            result.downloads_before, result.downloads_after
        ));
    } else {
        parts.push(format!("downloads_cached_before={}", result.downloads_before));
    }

    parts.push(format!(
        "links_unrestricted={} links_failed={}",
        result.links_unrestricted, result.links_failed
    ));
    if result.links_queued > 0 {
        parts.push(format!("links_queued={}", result.links_queued));
    }

    parts.push(format!(
        "strm_created={} strm_updated={} strm_removed={} strm_unchanged={}",
        result.strm_added, result.strm_updated, result.strm_deleted, result.strm_skipped
    ));

    if result.filtered_small > 0 || result.filtered_other > 0 {
        parts.push(format!(
            "filtered_small={} filtered_other={}",
            result.filtered_small, result.filtered_other
        ));
    }

    if let Some(org) = &result.organizer {
        parts.push(format!(
            "org_created={} org_updated={} org_removed={}",
            org.new, org.updated, org.deleted
        ));
    }

    if !result.duration.is_zero() {
        let rounded = Duration::from_millis(result.duration.as_millis() as u64);
        parts.push(format!("duration={rounded:?}"));
    }

    if let Some(next) = opts.next_run {
        parts.push(format!("next={}", next.format("%H:%M:%S")));
    }

    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> RunResult {
        RunResult {
            torrents_total: 12,
            torrents_downloaded: 10,
            torrents_dead: 2,
            torrents_repaired: 1,
            downloads_before: 40,
            downloads_after: 45,
            links_unrestricted: 5,
            links_failed: 1,
            links_queued: 0,
            strm_added: 5,
            strm_updated: 0,
            strm_deleted: 1,
            strm_skipped: 39,
            strm_tracked: 44,
            duration: Duration::from_millis(2350),
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_basic() {
        let summary = format_summary(&sample_result(), &SummaryOptions::default());
        assert!(summary.starts_with("summary | status=ok"));
        assert!(summary.contains("torrents_downloaded=10 torrents_dead=2 repaired=1"));
        assert!(summary.contains("downloads_cached_before=40 downloads_cached_after=45"));
        assert!(summary.contains("links_unrestricted=5 links_failed=1"));
        assert!(summary.contains("strm_created=5 strm_updated=0 strm_removed=1 strm_unchanged=39"));
        assert!(summary.contains("duration=2.35s"));
        // Not queued, so the segment is absent.
        assert!(!summary.contains("links_queued"));
    }

    #[test]
    fn test_summary_dry_run_status() {
        let opts = SummaryOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = format_summary(&sample_result(), &opts);
        assert!(summary.starts_with("summary | status=dry"));
    }

    #[test]
    fn test_summary_queued_segment() {
        let result = RunResult {
            links_queued: 3,
            ..sample_result()
        };
        let summary = format_summary(&result, &SummaryOptions::default());
        assert!(summary.contains("links_queued=3"));
    }

    #[test]
    fn test_summary_organizer_segment() {
        let result = RunResult {
            organizer: Some(crate::organizer::OrganizerResult {
                processed: 6,
                new: 4,
                updated: 1,
                deleted: 1,
                skipped: 0,
                errors: 0,
            }),
            ..sample_result()
        };
        let summary = format_summary(&result, &SummaryOptions::default());
        assert!(summary.contains("org_created=4 org_updated=1 org_removed=1"));
    }

    #[test]
    fn test_summary_next_run_segment() {
        let next = Local::now();
        let opts = SummaryOptions {
            next_run: Some(next),
            ..Default::default()
        };
        let summary = format_summary(&sample_result(), &opts);
        assert!(summary.contains(&format!("next={}", next.format("%H:%M:%S"))));
    }

    #[test]
    fn test_summary_downloads_before_only() {
        let result = RunResult {
            downloads_after: 0,
            ..sample_result()
        };
        let summary = format_summary(&result, &SummaryOptions::default());
        assert!(summary.contains("downloads_cached_before=40"));
        assert!(!summary.contains("downloads_cached_after"));
    }
}
