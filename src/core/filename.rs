use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub const FORBIDDEN_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

const FALLBACK_NAME: &str = "untitled";

/// Strips path-hostile characters from a title so it can be used as a single
/// path segment. Scratch names, final names and cleanup paths all go through
/// here, so they agree on the on-disk name.
pub fn sanitize_path_component(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();
    let normalized: String = stripped.nfc().collect();
    let collapsed = WS_RE.replace_all(&normalized, " ");
    let result = collapsed.trim();

    if result.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        result.to_string()
    }
}
