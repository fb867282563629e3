//! Filesystem-safe name cleaning for torrent folders and media files.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

const MAX_NAME_LEN: usize = 200;
const TRUNCATE_TARGET: usize = 195;

fn site_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(hhd\d+\.com@|hdd\d+\.com@|www\.[\w-]+\.com@|[\w-]+\.com@)")
            .expect("invalid site prefix pattern")
    })
}

/// Clean a provider-supplied name into a filesystem-safe, readable form.
///
/// The extension is preserved; everything before it is URL-decoded, stripped
/// of site prefixes, normalized to spaces, and truncated at a word boundary.
/// Stable under repeated application.
pub fn sanitize_name(name: &str) -> String {
    // Multi-pass URL decoding; provider names are sometimes double-encoded.
    let mut name = name.to_string();
    for _ in 0..3 {
        match urlencoding::decode(&name) {
            Ok(Cow::Owned(decoded)) => name = decoded,
            _ => break,
        }
    }

    let name = site_prefix_pattern().replace(&name, "");

    let (base, ext) = split_extension(&name);

    let base: String = base
        .chars()
        .map(|c| match c {
            '.' | '_' | '-' => ' ',
            other => other,
        })
        .collect();
    let base = base.split_whitespace().collect::<Vec<_>>().join(" ");

    let base = truncate_words(&base);

    let base: String = base
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();

    format!("{}{}", base.trim(), ext)
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}

/// Truncate to at most `MAX_NAME_LEN` characters, preferring a cut on a word
/// boundary at `TRUNCATE_TARGET`; hard-cut when no boundary fits.
fn truncate_words(base: &str) -> String {
    if base.chars().count() <= MAX_NAME_LEN {
        return base.to_string();
    }

    let mut truncated = String::new();
    let mut len = 0usize;
    for word in base.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if truncated.is_empty() {
            word_len
        } else {
            word_len + 1
        };
        if len + needed > TRUNCATE_TARGET {
            break;
        }
        if !truncated.is_empty() {
            truncated.push(' ');
        }
        truncated.push_str(word);
        len += needed;
    }

    if truncated.is_empty() {
        base.chars().take(TRUNCATE_TARGET).collect()
    } else {
        truncated
    }
}
