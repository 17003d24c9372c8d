//! Title and name normalization for provider queries.
//!
//! Provider search endpoints are fussy about punctuation and edition
//! suffixes. This module holds the query-side cleanup shared by the
//! clients: Lucene escaping for fuzzy search, edition-suffix stripping
//! for album titles, artist-name search variations, and the loose
//! name-match heuristic used to pick among multiple search results.

use std::sync::LazyLock;

use regex::Regex;

/// Characters reserved by Lucene query syntax.
const LUCENE_SPECIAL: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\',
    '/', '<', '>',
];

#[allow(clippy::unwrap_used)]
static EDITION_SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\s*\(deluxe(\s+(version|edition))?\)\s*$",
        r"(?i)\s*\((special|expanded)\s+edition\)\s*$",
        r"(?i)\s*\(remaster(ed)?(\s+\d{4})?\)\s*$",
        r"(?i)\s*\(bonus\s+track(s)?(\s+(version|edition))?\)\s*$",
        r"(?i)\s*-\s*single\s*$",
        r"(?i)\s*-\s*ep\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[allow(clippy::unwrap_used)]
static TRAILING_PAREN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").unwrap());

#[allow(clippy::unwrap_used)]
static TRAILING_BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[[^\]]*\]\s*$").unwrap());

/// Escape Lucene query syntax characters with a backslash.
pub fn escape_lucene(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for ch in query.chars() {
        if LUCENE_SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Returns `true` when the string contains characters that Lucene escaping
/// would have mangled, making an unescaped retry worthwhile.
pub fn has_special_chars(name: &str) -> bool {
    name.chars().any(|ch| LUCENE_SPECIAL.contains(&ch))
}

/// Strip known edition suffixes from an album title.
///
/// Applies the specific suffix patterns first (deluxe, remastered, bonus
/// tracks, "- EP", "- Single"), then a generic trailing parenthetical or
/// bracketed suffix, trimming after each substitution. Returns the input
/// unchanged when nothing matches.
pub fn strip_edition_suffix(title: &str) -> String {
    let mut cleaned = title.trim().to_string();
    for pattern in EDITION_SUFFIXES.iter() {
        cleaned = pattern.replace(&cleaned, "").trim().to_string();
    }
    cleaned = TRAILING_PAREN.replace(&cleaned, "").trim().to_string();
    cleaned = TRAILING_BRACKET.replace(&cleaned, "").trim().to_string();
    if cleaned.is_empty() {
        title.trim().to_string()
    } else {
        cleaned
    }
}

fn alnum_lower(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase()
}

/// Loose equality for picking a search result.
///
/// Normalizes both names to lowercase alphanumerics. Accepts an exact
/// match, or a substring match when both sides have at least 3 normalized
/// characters, so short names like "U2" only ever match exactly.
pub fn names_match(a: &str, b: &str) -> bool {
    let left = alnum_lower(a);
    let right = alnum_lower(b);
    if left.is_empty() || right.is_empty() {
        return false;
    }
    if left == right {
        return true;
    }
    left.len() >= 3 && right.len() >= 3 && (left.contains(&right) || right.contains(&left))
}

/// Alternate spellings worth trying when an artist search misses.
///
/// Periods and slashes are the usual culprits: "B.O.B" is indexed as
/// "BOB" or "B. O. B", "AC/DC" as "ACDC" or "AC DC". The original name is
/// not included; callers try it first.
pub fn name_variations(name: &str) -> Vec<String> {
    let mut variations = Vec::new();
    if name.contains('.') {
        variations.push(name.replace('.', ""));
        variations.push(name.replace('.', ". ").trim().to_string());
    }
    if name.contains('/') {
        variations.push(name.replace('/', ""));
        variations.push(name.replace('/', " "));
    }
    variations.retain(|v| !v.trim().is_empty() && v != name);
    variations.dedup();
    variations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_lucene() {
        assert_eq!(escape_lucene("AC/DC"), "AC\\/DC");
        assert_eq!(escape_lucene("what?!"), "what\\?\\!");
        assert_eq!(escape_lucene("plain"), "plain");
    }

    #[test]
    fn test_has_special_chars() {
        assert!(has_special_chars("AC/DC"));
        assert!(has_special_chars("Panic! At The Disco"));
        assert!(!has_special_chars("The Beatles"));
    }

    #[test]
    fn test_strip_deluxe_edition() {
        assert_eq!(
            strip_edition_suffix("Abbey Road (Deluxe Edition)"),
            "Abbey Road"
        );
        assert_eq!(strip_edition_suffix("1989 (Deluxe)"), "1989");
        assert_eq!(
            strip_edition_suffix("Nevermind (Remastered)"),
            "Nevermind"
        );
        assert_eq!(
            strip_edition_suffix("Lemonade (Bonus Tracks Version)"),
            "Lemonade"
        );
    }

    #[test]
    fn test_strip_single_and_ep_suffixes() {
        assert_eq!(strip_edition_suffix("Hello - Single"), "Hello");
        assert_eq!(strip_edition_suffix("Myth Takes - EP"), "Myth Takes");
    }

    #[test]
    fn test_strip_trailing_parenthetical() {
        assert_eq!(
            strip_edition_suffix("OK Computer (Collector's Series)"),
            "OK Computer"
        );
        assert_eq!(strip_edition_suffix("Blue [Japan Import]"), "Blue");
    }

    #[test]
    fn test_strip_leaves_plain_titles_alone() {
        assert_eq!(strip_edition_suffix("Abbey Road"), "Abbey Road");
        // A title that is nothing but a parenthetical stays intact.
        assert_eq!(strip_edition_suffix("(What's the Story)"), "(What's the Story)");
    }

    #[test]
    fn test_names_match_exact_and_case() {
        assert!(names_match("The Beatles", "the beatles"));
        assert!(names_match("AC/DC", "ACDC"));
    }

    #[test]
    fn test_names_match_substring() {
        assert!(names_match("Beatles", "The Beatles"));
        assert!(!names_match("Oasis", "Blur"));
    }

    #[test]
    fn test_names_match_short_names_need_exact() {
        assert!(names_match("U2", "U2"));
        assert!(!names_match("U2", "U2ube"));
    }

    #[test]
    fn test_names_match_rejects_empty() {
        assert!(!names_match("", "The Beatles"));
        assert!(!names_match("!!!", "chk chk chk"));
    }

    #[test]
    fn test_name_variations() {
        assert_eq!(name_variations("B.O.B"), vec!["BOB", "B. O. B"]);
        assert_eq!(name_variations("AC/DC"), vec!["ACDC", "AC DC"]);
        assert!(name_variations("The Beatles").is_empty());
    }
}
