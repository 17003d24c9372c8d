//! Naming rules: grouping keys, store-key sanitization, year extraction.
//!
//! Grouping keys collapse near-duplicate artist spellings ("Afrojack",
//! "afrojack") into a single catalog entity while the first raw spelling
//! observed stays the display name. Store keys are the stable, path-like
//! track identifiers (`Artist/Album/Title.ext`) used for deduplication
//! and cross-run identity.

use std::sync::LazyLock;

use regex::Regex;

static LEADING_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(\d{4})").unwrap()
});

static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[\s_]+").unwrap()
});

static NON_KEY_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[^A-Za-z0-9-]").unwrap()
});

static DASH_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"-+").unwrap()
});

/// Extract a year from common date formats: `2024`, `2024-01`, `2024-01-15`.
#[must_use]
pub fn extract_year(date_value: &str) -> Option<i32> {
    let trimmed = date_value.trim();
    if trimmed.is_empty() {
        return None;
    }
    LEADING_YEAR
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Reduce a multi-artist tag to its primary artist.
///
/// Splits on `/` and keeps the first entry, trimmed:
/// `"Justin Timberlake/50 Cent"` becomes `"Justin Timberlake"`.
#[must_use]
pub fn normalize_artist_name(name: &str) -> String {
    let primary = name.split('/').next().unwrap_or(name);
    primary.trim().to_string()
}

/// Case-insensitive grouping key for an artist display name.
///
/// Deterministic and idempotent; an empty input yields an empty key
/// (callers substitute a placeholder before grouping).
#[must_use]
pub fn group_key(name: &str) -> String {
    normalize_artist_name(name).to_lowercase()
}

/// Sanitize a name for use as a store-key path component.
///
/// Only `A-Z a-z 0-9 -` survive: whitespace and underscores become
/// dashes, everything else is dropped, dash runs collapse, and an
/// empty result falls back to `fallback`.
#[must_use]
pub fn sanitize_key(name: &str, fallback: &str) -> String {
    if name.is_empty() {
        return fallback.to_string();
    }

    let dashed = SPACE_RUNS.replace_all(name, "-");
    let stripped = NON_KEY_CHARS.replace_all(&dashed, "");
    let collapsed = DASH_RUNS.replace_all(&stripped, "-");
    let trimmed = collapsed.trim_matches('-');

    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_year_formats() {
        assert_eq!(extract_year("2024"), Some(2024));
        assert_eq!(extract_year("2024-01"), Some(2024));
        assert_eq!(extract_year("2024-01-15"), Some(2024));
        assert_eq!(extract_year("1990-03-17"), Some(1990));
    }

    #[test]
    fn test_extract_year_invalid() {
        assert_eq!(extract_year(""), None);
        assert_eq!(extract_year("   "), None);
        assert_eq!(extract_year("not-a-date"), None);
        assert_eq!(extract_year("abc"), None);
    }

    #[test]
    fn test_normalize_artist_name_multi_artist() {
        assert_eq!(
            normalize_artist_name("Justin Timberlake/50 Cent"),
            "Justin Timberlake"
        );
        assert_eq!(normalize_artist_name("Afrojack"), "Afrojack");
        assert_eq!(normalize_artist_name("  spaced  "), "spaced");
    }

    #[test]
    fn test_group_key_case_insensitive() {
        assert_eq!(group_key("Afrojack"), "afrojack");
        assert_eq!(group_key("afrojack"), "afrojack");
        assert_eq!(group_key("The Beatles"), group_key("the beatles"));
    }

    #[test]
    fn test_group_key_idempotent() {
        for name in ["The Beatles", "AC/DC", "  Hozier ", "B.O.B", ""] {
            let once = group_key(name);
            assert_eq!(group_key(&once), once);
        }
    }

    #[test]
    fn test_sanitize_key_basic() {
        assert_eq!(sanitize_key("Abbey Road", "Unknown"), "Abbey-Road");
        assert_eq!(sanitize_key("AC/DC", "Unknown"), "ACDC");
        assert_eq!(sanitize_key("B.O.B", "Unknown"), "BOB");
    }

    #[test]
    fn test_sanitize_key_collapses_dashes() {
        assert_eq!(sanitize_key("a - b -- c", "Unknown"), "a-b-c");
        assert_eq!(sanitize_key("_lead_trail_", "Unknown"), "lead-trail");
    }

    #[test]
    fn test_sanitize_key_fallback() {
        assert_eq!(sanitize_key("", "Unknown"), "Unknown");
        assert_eq!(sanitize_key("!!!", "Unknown"), "Unknown");
        assert_eq!(sanitize_key("日本語", "Unknown-Track"), "Unknown-Track");
    }
}
