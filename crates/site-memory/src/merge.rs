//! Pattern Merge: combine newly captured patterns into an existing card
//! (spec §4.4 "Pattern Merge").

use crate::card::Pattern;
use std::collections::HashMap;

/// Merges `new_patterns` into `existing`, keyed by `(type, value)`. On a
/// key collision, the winner is picked by higher confidence, then
/// higher use count, then later `lastUsedAt`; truly novel patterns are
/// appended as-is, already carrying the default confidence from
/// `Pattern::new`.
pub fn merge_patterns(existing: Vec<Pattern>, new_patterns: Vec<Pattern>) -> Vec<Pattern> {
    let mut by_key: HashMap<(crate::card::PatternType, String), Pattern> = HashMap::new();
    for pattern in existing.into_iter().chain(new_patterns) {
        let key = (pattern.pattern_type, pattern.value.clone());
        match by_key.get(&key) {
            Some(current) if !is_better(&pattern, current) => {}
            _ => {
                by_key.insert(key, pattern);
            }
        }
    }
    let mut merged: Vec<Pattern> = by_key.into_values().collect();
    merged.sort_by(|a, b| a.value.cmp(&b.value));
    merged
}

fn is_better(candidate: &Pattern, current: &Pattern) -> bool {
    if candidate.confidence != current.confidence {
        return candidate.confidence > current.confidence;
    }
    if candidate.use_count != current.use_count {
        return candidate.use_count > current.use_count;
    }
    candidate.last_used_at > current.last_used_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{PatternSource, PatternType};
    use chrono::{Duration, Utc};

    fn pattern(value: &str, confidence: f64, use_count: u32) -> Pattern {
        Pattern {
            pattern_type: PatternType::Selector,
            value: value.to_string(),
            description: format!("desc for {value}"),
            source: PatternSource::AgentAuto,
            confidence,
            use_count,
            last_used_at: Utc::now(),
        }
    }

    #[test]
    fn higher_confidence_wins_on_conflict() {
        let existing = vec![pattern("#btn", 0.3, 1)];
        let incoming = vec![pattern("#btn", 0.9, 1)];
        let merged = merge_patterns(existing, incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 0.9);
    }

    #[test]
    fn equal_confidence_falls_back_to_use_count() {
        let existing = vec![pattern("#btn", 0.5, 1)];
        let incoming = vec![pattern("#btn", 0.5, 5)];
        let merged = merge_patterns(existing, incoming);
        assert_eq!(merged[0].use_count, 5);
    }

    #[test]
    fn equal_confidence_and_count_falls_back_to_recency() {
        let mut older = pattern("#btn", 0.5, 1);
        older.last_used_at = Utc::now() - Duration::hours(2);
        let newer = pattern("#btn", 0.5, 1);
        let merged = merge_patterns(vec![older], vec![newer.clone()]);
        assert_eq!(merged[0].last_used_at, newer.last_used_at);
    }

    #[test]
    fn distinct_keys_are_both_kept() {
        let merged = merge_patterns(vec![pattern("a", 0.5, 1)], vec![pattern("b", 0.5, 1)]);
        assert_eq!(merged.len(), 2);
    }
}
