use agentbrowse_site_memory::card::{Pattern, PatternSource, PatternType};
use agentbrowse_site_memory::merge_patterns;
use chrono::Utc;
use proptest::prelude::*;

fn pattern(value: &str, confidence: f64, use_count: u32, seconds_ago: i64) -> Pattern {
    Pattern {
        pattern_type: PatternType::Selector,
        value: value.to_string(),
        description: value.to_string(),
        source: PatternSource::AgentAuto,
        confidence,
        use_count,
        last_used_at: Utc::now() - chrono::Duration::seconds(seconds_ago),
    }
}

proptest! {
    /// Merging never produces more than one pattern per (type, value) key,
    /// regardless of how many conflicting saves are merged in.
    #[test]
    fn merge_dedupes_by_key(
        confidences in prop::collection::vec(0.0f64..1.0, 1..10),
    ) {
        let patterns: Vec<Pattern> = confidences
            .iter()
            .enumerate()
            .map(|(i, c)| pattern("same-key", *c, i as u32, i as i64))
            .collect();

        let merged = patterns.into_iter().fold(Vec::new(), |acc, p| {
            merge_patterns(acc, vec![p])
        });

        prop_assert_eq!(merged.len(), 1);
    }

    /// The surviving pattern's confidence is always the maximum of
    /// whatever was merged in.
    #[test]
    fn merge_keeps_highest_confidence(
        confidences in prop::collection::vec(0.0f64..1.0, 1..10),
    ) {
        let expected_max = confidences.iter().cloned().fold(f64::MIN, f64::max);
        let patterns: Vec<Pattern> = confidences
            .iter()
            .map(|c| pattern("same-key", *c, 1, 0))
            .collect();

        let merged = patterns.into_iter().fold(Vec::new(), |acc, p| {
            merge_patterns(acc, vec![p])
        });

        prop_assert_eq!(merged[0].confidence, expected_max);
    }
}
