//! Title normalization for length-source lookups.
//!
//! The length source matches poorly on non-ASCII text and on edition or
//! year suffixes, so a failed search is retried with progressively looser
//! variants of the title (see [`search_ladder`]).

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Matches a trailing parenthesized token like "(2020)" or "(Classic)"
pub static TRAILING_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").unwrap());

/// Regex to collapse multiple whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Reduce a title to ASCII. Accents are folded via NFD first
/// ("Pokémon" → "Pokemon"); anything still non-ASCII ("™", CJK) is dropped.
pub fn strip_non_ascii(s: &str) -> String {
    let ascii: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii)
        .collect();
    MULTI_SPACE.replace_all(ascii.trim(), " ").to_string()
}

/// Catalog title as stored in library records
pub fn clean_title(title: &str) -> String {
    title.trim().to_string()
}

/// Query sent to the length source before any retry
pub fn lookup_title(title: &str) -> String {
    strip_non_ascii(title)
}

// ============================================================================
// RETRY LADDER
// ============================================================================

/// One fallback step tried after an empty search result
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rung {
    AsciiOnly,
    LowerCase,
    EditionStripped,
    TrailingParenStripped,
    BeforeDash,
    BeforeColon,
}

impl Rung {
    pub fn label(self) -> &'static str {
        match self {
            Rung::AsciiOnly => "ascii",
            Rung::LowerCase => "lowercase",
            Rung::EditionStripped => "edition",
            Rung::TrailingParenStripped => "paren",
            Rung::BeforeDash => "dash",
            Rung::BeforeColon => "colon",
        }
    }
}

/// "Foo Deluxe Edition" → "Foo". A trailing parenthesized token is
/// skipped when looking for "edition": "Foo: Bar Edition (2020)" → "Foo: Bar".
fn strip_edition(title: &str) -> Option<String> {
    let tokens: Vec<&str> = title.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    let is_edition = |t: &str| t.eq_ignore_ascii_case("edition");
    let last = tokens[tokens.len() - 1];
    let second_last = tokens[tokens.len() - 2];
    let parenthesized = last.starts_with('(') && last.ends_with(')');

    if is_edition(last) || (parenthesized && is_edition(second_last)) {
        let kept = tokens[..tokens.len() - 2].join(" ");
        if !kept.is_empty() {
            return Some(kept);
        }
    }
    None
}

fn strip_trailing_paren(title: &str) -> Option<String> {
    if !TRAILING_PAREN.is_match(title) {
        return None;
    }
    let stripped = TRAILING_PAREN.replace(title, "").trim().to_string();
    (!stripped.is_empty()).then_some(stripped)
}

fn before_first(title: &str, separator: char) -> Option<String> {
    let (head, _) = title.split_once(separator)?;
    let head = head.trim();
    (!head.is_empty()).then(|| head.to_string())
}

/// Fallback queries for a title, in the order they must be tried.
///
/// Inapplicable rungs are left out; applicable ones are kept even when
/// they repeat an earlier query.
pub fn search_ladder(title: &str) -> Vec<(Rung, String)> {
    let ascii = strip_non_ascii(title);
    let mut ladder = vec![
        (Rung::AsciiOnly, ascii.clone()),
        (Rung::LowerCase, ascii.to_lowercase()),
    ];

    if let Some(q) = strip_edition(&ascii) {
        ladder.push((Rung::EditionStripped, q));
    }
    if let Some(q) = strip_trailing_paren(&ascii) {
        ladder.push((Rung::TrailingParenStripped, q));
    }
    if let Some(q) = before_first(&ascii, '-') {
        ladder.push((Rung::BeforeDash, q));
    }
    if let Some(q) = before_first(&ascii, ':') {
        ladder.push((Rung::BeforeColon, q));
    }

    ladder.retain(|(_, q)| !q.is_empty());
    ladder
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(title: &str) -> Vec<String> {
        search_ladder(title).into_iter().map(|(_, q)| q).collect()
    }

    #[test]
    fn test_strip_non_ascii() {
        assert_eq!(strip_non_ascii("Pokémon™ Legends"), "Pokemon Legends");
        assert_eq!(strip_non_ascii("  NieR:Automata™ "), "NieR:Automata");
        assert_eq!(strip_non_ascii("東方 Project  Game"), "Project Game");
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("  Portal 2 \n"), "Portal 2");
    }

    #[test]
    fn test_ladder_full_order() {
        assert_eq!(
            queries("Foo: Bar Edition (2020)"),
            vec![
                "Foo: Bar Edition (2020)",
                "foo: bar edition (2020)",
                "Foo: Bar",
                "Foo: Bar Edition",
                "Foo",
            ]
        );
        let rungs: Vec<Rung> = search_ladder("Foo: Bar Edition (2020)")
            .into_iter()
            .map(|(r, _)| r)
            .collect();
        assert_eq!(
            rungs,
            vec![
                Rung::AsciiOnly,
                Rung::LowerCase,
                Rung::EditionStripped,
                Rung::TrailingParenStripped,
                Rung::BeforeColon,
            ]
        );
    }

    #[test]
    fn test_edition_rung() {
        assert_eq!(strip_edition("Skyrim Special Edition"), Some("Skyrim".to_string()));
        assert_eq!(strip_edition("Game EDITION"), None);
        assert_eq!(strip_edition("Edition Wars"), None);
    }

    #[test]
    fn test_dash_and_colon_rungs() {
        assert_eq!(
            queries("Half-Life: Source"),
            vec!["Half-Life: Source", "half-life: source", "Half", "Half-Life"]
        );
    }

    #[test]
    fn test_plain_title_only_has_basic_rungs() {
        assert_eq!(queries("Celeste"), vec!["Celeste", "celeste"]);
    }
}
