//! Extension policy for candidate filtering.

use std::path::Path;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "m4v", "webm", "mpg", "mpeg", "ts", "m2ts",
];

const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt", "sub", "idx", "smi", "sbv"];

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

pub fn is_video(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_subtitle(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_extensions() {
        assert!(is_video("Movie.2023.1080p.mkv"));
        assert!(is_video("episode.mp4"));
        assert!(is_video("OLD.AVI"));
        assert!(is_video("clip.m2ts"));
        assert!(!is_video("notes.txt"));
        assert!(!is_video("cover.jpg"));
        assert!(!is_video("noextension"));
    }

    #[test]
    fn test_subtitle_extensions() {
        assert!(is_subtitle("Movie.2023.srt"));
        assert!(is_subtitle("episode.ASS"));
        assert!(is_subtitle("track.vtt"));
        assert!(!is_subtitle("movie.mkv"));
        assert!(!is_subtitle("readme.md"));
    }

    #[test]
    fn test_video_and_subtitle_are_disjoint() {
        for ext in VIDEO_EXTENSIONS {
            assert!(!SUBTITLE_EXTENSIONS.contains(ext));
        }
    }
}
