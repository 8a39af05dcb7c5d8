//! Scoring functions for reconciliation.
//!
//! This module contains:
//! - Achievement rarity (rarest global unlock percentage)
//! - Best-candidate selection among length-source matches
//! - Completion time selection and rounding

use crate::models::{AchievementPercentage, LengthCandidate, LengthEstimate};

// ============================================================================
// Rounding
// ============================================================================

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============================================================================
// Rarity
// ============================================================================

/// Rarest achievement percentage as a fixed one-decimal string.
///
/// Formats the stored value directly so half-way decimals are rounded once.
/// Returns `None` when no percentage is usable (empty list or all NaN).
pub fn rarity(achievements: &[AchievementPercentage]) -> Option<String> {
    let rarest = achievements
        .iter()
        .map(|a| a.percent)
        .filter(|p| !p.is_nan())
        .min_by(|a, b| a.total_cmp(b))?;
    Some(format!("{:.1}", rarest))
}

// ============================================================================
// Length Candidates
// ============================================================================

/// Candidate with the highest similarity. Ties keep the first seen.
pub fn best_candidate(candidates: &[LengthCandidate]) -> Option<&LengthCandidate> {
    candidates.iter().fold(None, |best, c| match best {
        Some(b) if b.similarity >= c.similarity => Some(b),
        _ => Some(c),
    })
}

/// Longest of the four reported playstyle times, in hours, rounded to two
/// decimals. Zero means the source had no data and maps to `None`.
pub fn completion_hours(candidate: &LengthCandidate) -> Option<f64> {
    let longest = [
        candidate.main_story,
        candidate.main_extra,
        candidate.completionist,
        candidate.all_styles,
    ]
    .into_iter()
    .filter(|h| h.is_finite())
    .fold(0.0_f64, f64::max);

    let hours = round_to(longest, 2);
    (hours > 0.0).then_some(hours)
}

/// Length estimate for a matched candidate
pub fn estimate_from(candidate: &LengthCandidate) -> LengthEstimate {
    LengthEstimate {
        hltb_id: Some(candidate.id),
        hltb_title: Some(candidate.title.clone()),
        completionist_hours: completion_hours(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(p: f64) -> AchievementPercentage {
        AchievementPercentage::new("ACH", p)
    }

    fn candidate(id: u64, similarity: f64, times: [f64; 4]) -> LengthCandidate {
        LengthCandidate {
            id,
            title: format!("Game {}", id),
            similarity,
            main_story: times[0],
            main_extra: times[1],
            completionist: times[2],
            all_styles: times[3],
        }
    }

    #[test]
    fn test_rarity_is_minimum_one_decimal() {
        assert_eq!(rarity(&[pct(50.0), pct(12.34)]), Some("12.3".to_string()));
        assert_eq!(rarity(&[pct(0.06), pct(99.9)]), Some("0.1".to_string()));
        assert_eq!(rarity(&[pct(7.0), pct(7.0), pct(7.0)]), Some("7.0".to_string()));
        assert_eq!(rarity(&[pct(100.0)]), Some("100.0".to_string()));
    }

    #[test]
    fn test_rarity_half_way_values_round_once() {
        assert_eq!(rarity(&[pct(12.35)]), Some("12.3".to_string()));
        assert_eq!(rarity(&[pct(0.15), pct(4.0)]), Some("0.1".to_string()));
    }

    #[test]
    fn test_rarity_empty_is_none() {
        assert_eq!(rarity(&[]), None);
    }

    #[test]
    fn test_best_candidate_max_similarity() {
        let cands = vec![
            candidate(1, 0.4, [1.0; 4]),
            candidate(2, 0.9, [1.0; 4]),
            candidate(3, 0.7, [1.0; 4]),
        ];
        assert_eq!(best_candidate(&cands).map(|c| c.id), Some(2));
        assert!(best_candidate(&[]).is_none());
    }

    #[test]
    fn test_best_candidate_tie_keeps_first() {
        let cands = vec![candidate(5, 0.8, [1.0; 4]), candidate(6, 0.8, [1.0; 4])];
        assert_eq!(best_candidate(&cands).map(|c| c.id), Some(5));
    }

    #[test]
    fn test_completion_hours_takes_max() {
        let c = candidate(99, 0.9, [5.0, 0.0, 10.0, 0.0]);
        assert_eq!(completion_hours(&c), Some(10.0));
        let c = candidate(99, 0.9, [5.0, 7.456, 6.0, 7.0]);
        assert_eq!(completion_hours(&c), Some(7.46));
    }

    #[test]
    fn test_zero_time_is_absent() {
        let c = candidate(99, 0.9, [0.0; 4]);
        assert_eq!(completion_hours(&c), None);
        let est = estimate_from(&c);
        assert_eq!(est.hltb_id, Some(99));
        assert_eq!(est.completionist_hours, None);
    }
}
