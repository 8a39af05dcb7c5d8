//! Length-source matching: the initial search plus the fallback ladder.

use crate::error::SourceError;
use crate::models::{HltbId, LengthEstimate};
use crate::normalize::{lookup_title, search_ladder, Rung};
use crate::scoring::{best_candidate, estimate_from};
use crate::sources::LengthSource;

/// Result of resolving one title
#[derive(Clone, Debug, PartialEq)]
pub struct LengthMatch {
    pub estimate: LengthEstimate,
    /// Rung that produced the match; `None` for the initial query or a miss
    pub rung: Option<Rung>,
    /// Every query sent, in order
    pub queries: Vec<String>,
}

impl LengthMatch {
    pub fn is_miss(&self) -> bool {
        !self.estimate.is_resolved()
    }
}

/// Run one query. Transport errors count as "no candidates".
fn try_query<L: LengthSource + ?Sized>(
    source: &L,
    query: &str,
    queries: &mut Vec<String>,
) -> Option<LengthEstimate> {
    queries.push(query.to_string());
    match source.search(query) {
        Ok(candidates) => best_candidate(&candidates).map(estimate_from),
        Err(e) => {
            tracing::warn!(query, error = %e, "length search failed");
            None
        }
    }
}

/// Resolve a catalog title to a length estimate.
///
/// Searches with the ASCII-only title, then walks the fallback ladder
/// until some query returns candidates. A rung whose query repeats the
/// previous attempt is skipped. Running out of rungs is not an error: the
/// estimate is simply absent.
pub fn find_length<L: LengthSource + ?Sized>(source: &L, title: &str) -> LengthMatch {
    let mut queries = Vec::new();

    let initial = lookup_title(title);
    if !initial.is_empty() {
        if let Some(estimate) = try_query(source, &initial, &mut queries) {
            return LengthMatch {
                estimate,
                rung: None,
                queries,
            };
        }
    }

    for (rung, query) in search_ladder(title) {
        // Same text as the attempt just made; the source would answer the same
        if queries.last() == Some(&query) {
            continue;
        }
        if let Some(estimate) = try_query(source, &query, &mut queries) {
            tracing::debug!(title, query = %query, rung = rung.label(), "matched on retry");
            return LengthMatch {
                estimate,
                rung: Some(rung),
                queries,
            };
        }
    }

    LengthMatch {
        estimate: LengthEstimate::absent(),
        rung: None,
        queries,
    }
}

/// Re-resolve a known length-source id. `Ok(None)` when the id is gone.
pub fn refresh_by_id<L: LengthSource + ?Sized>(
    source: &L,
    id: HltbId,
) -> Result<Option<LengthEstimate>, SourceError> {
    Ok(source.search_by_id(id)?.as_ref().map(estimate_from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LengthCandidate;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Answers only the queries it was given; records every query.
    #[derive(Default)]
    struct ScriptedLength {
        answers: HashMap<String, Vec<LengthCandidate>>,
        failing: Vec<String>,
        seen: RefCell<Vec<String>>,
    }

    impl LengthSource for ScriptedLength {
        fn search(&self, title: &str) -> Result<Vec<LengthCandidate>, SourceError> {
            self.seen.borrow_mut().push(title.to_string());
            if self.failing.iter().any(|f| f == title) {
                return Err(SourceError::Status { endpoint: "test", status: 500 });
            }
            Ok(self.answers.get(title).cloned().unwrap_or_default())
        }

        fn search_by_id(&self, id: HltbId) -> Result<Option<LengthCandidate>, SourceError> {
            Ok(self.answers.values().flatten().find(|c| c.id == id).cloned())
        }
    }

    fn candidate(id: HltbId, title: &str, similarity: f64, completionist: f64) -> LengthCandidate {
        LengthCandidate {
            id,
            title: title.to_string(),
            similarity,
            main_story: 0.0,
            main_extra: 0.0,
            completionist,
            all_styles: 0.0,
        }
    }

    #[test]
    fn test_direct_hit_uses_best_similarity() {
        let mut source = ScriptedLength::default();
        source.answers.insert(
            "Game A".to_string(),
            vec![candidate(1, "Game A II", 0.5, 3.0), candidate(99, "Game A", 0.9, 10.0)],
        );

        let found = find_length(&source, "  Game A ");
        assert_eq!(found.estimate.hltb_id, Some(99));
        assert_eq!(found.estimate.completionist_hours, Some(10.0));
        assert_eq!(found.rung, None);
        assert_eq!(found.queries, vec!["Game A"]);
    }

    #[test]
    fn test_ladder_attempt_order_until_exhausted() {
        let source = ScriptedLength::default();
        let found = find_length(&source, "Foo: Bar Edition (2020)");

        assert!(found.is_miss());
        assert_eq!(found.estimate, LengthEstimate::absent());
        assert_eq!(
            *source.seen.borrow(),
            vec![
                "Foo: Bar Edition (2020)",
                "foo: bar edition (2020)",
                "Foo: Bar",
                "Foo: Bar Edition",
                "Foo",
            ]
        );
    }

    #[test]
    fn test_ladder_stops_at_first_non_empty_rung() {
        let mut source = ScriptedLength::default();
        source
            .answers
            .insert("Foo: Bar".to_string(), vec![candidate(7, "Foo Bar", 0.8, 12.0)]);

        let found = find_length(&source, "Foo: Bar Edition (2020)");
        assert_eq!(found.rung, Some(Rung::EditionStripped));
        assert_eq!(found.estimate.hltb_title.as_deref(), Some("Foo Bar"));
        assert_eq!(source.seen.borrow().len(), 3);
    }

    #[test]
    fn test_non_ascii_title_is_stripped_before_search() {
        let mut source = ScriptedLength::default();
        source
            .answers
            .insert("Pokemon Legends".to_string(), vec![candidate(3, "Pokemon Legends", 1.0, 40.0)]);

        let found = find_length(&source, "Pokémon™ Legends");
        assert_eq!(found.estimate.hltb_id, Some(3));
        assert_eq!(found.queries, vec!["Pokemon Legends"]);
    }

    #[test]
    fn test_search_errors_fall_through_to_next_rung() {
        let mut source = ScriptedLength::default();
        source.failing.push("Celeste".to_string());
        source
            .answers
            .insert("celeste".to_string(), vec![candidate(5, "Celeste", 1.0, 38.0)]);

        let found = find_length(&source, "Celeste");
        assert_eq!(found.rung, Some(Rung::LowerCase));
        assert_eq!(found.estimate.hltb_id, Some(5));
    }

    #[test]
    fn test_repeated_query_is_not_sent_twice() {
        let source = ScriptedLength::default();
        let found = find_length(&source, "celeste");

        assert!(found.is_miss());
        assert_eq!(*source.seen.borrow(), vec!["celeste"]);
        assert_eq!(found.queries, vec!["celeste"]);
    }

    #[test]
    fn test_zero_times_keep_match_but_absent_hours() {
        let mut source = ScriptedLength::default();
        source
            .answers
            .insert("Tiny".to_string(), vec![candidate(8, "Tiny", 1.0, 0.0)]);

        let found = find_length(&source, "Tiny");
        assert_eq!(found.estimate.hltb_id, Some(8));
        assert_eq!(found.estimate.completionist_hours, None);
    }

    #[test]
    fn test_refresh_by_id() {
        let mut source = ScriptedLength::default();
        source
            .answers
            .insert("x".to_string(), vec![candidate(11, "Eleven", 1.0, 2.5)]);

        let est = refresh_by_id(&source, 11).unwrap().unwrap();
        assert_eq!(est.completionist_hours, Some(2.5));
        assert!(refresh_by_id(&source, 12).unwrap().is_none());
    }
}
