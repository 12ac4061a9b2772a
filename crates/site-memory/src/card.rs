//! The Knowledge Card: one domain's accumulated patterns (spec §3
//! "Knowledge Card", §4.4 "Knowledge Card Store").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a pattern's `value` field (spec §3 "Knowledge
/// Card"); longer values are truncated rather than rejected, since the
/// capturer should never fail a run over an oversized selector.
pub const MAX_PATTERN_VALUE_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Selector,
    NavigationPath,
    LoginRequired,
    SpaHint,
    PageStructure,
    TaskIntent,
}

impl PatternType {
    /// The injector filters these three by task-text relevance; every
    /// other type (including `task_intent`, sorted separately) passes
    /// through unfiltered (spec §4.2 "Memory Injector").
    pub fn is_relevance_filtered(self) -> bool {
        matches!(
            self,
            PatternType::Selector | PatternType::NavigationPath | PatternType::PageStructure
        )
    }
}

/// Where a pattern's knowledge came from (spec §3 "Knowledge Card").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    AgentAuto,
    HumanRecording,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub value: String,
    pub description: String,
    pub source: PatternSource,
    pub confidence: f64,
    pub use_count: u32,
    pub last_used_at: DateTime<Utc>,
}

impl Pattern {
    pub const DEFAULT_CONFIDENCE: f64 = 0.5;

    pub fn new(pattern_type: PatternType, value: String, description: String) -> Self {
        Self::from_source(pattern_type, value, description, PatternSource::AgentAuto)
    }

    pub fn from_source(
        pattern_type: PatternType,
        value: String,
        description: String,
        source: PatternSource,
    ) -> Self {
        let mut value = value;
        if value.len() > MAX_PATTERN_VALUE_LEN {
            value.truncate(MAX_PATTERN_VALUE_LEN);
        }
        Self {
            pattern_type,
            value,
            description,
            source,
            confidence: Self::DEFAULT_CONFIDENCE,
            use_count: 1,
            last_used_at: Utc::now(),
        }
    }

    fn key(&self) -> (PatternType, &str) {
        (self.pattern_type, self.value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeCard {
    pub domain: String,
    pub version: u32,
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub site_type: Option<String>,
    #[serde(default)]
    pub requires_login: bool,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeCard {
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            version: 1,
            patterns: Vec::new(),
            site_type: None,
            requires_login: false,
            updated_at: Utc::now(),
        }
    }

    /// Total `task_intent` pattern count, used as the primary tie-break
    /// when choosing among candidate cards during auto-recall (spec §4.2
    /// "Auto-recall").
    pub fn task_intent_count(&self) -> usize {
        self.patterns
            .iter()
            .filter(|p| p.pattern_type == PatternType::TaskIntent)
            .count()
    }

    /// A short index entry for `listDomains()`: the domain plus its
    /// highest-confidence pattern descriptions, for quickly deciding
    /// whether a card is relevant without loading and rendering it in
    /// full (spec §4.4 "listDomains() returns an index with top pattern
    /// snippets").
    pub fn top_snippets(&self, limit: usize) -> Vec<String> {
        let mut patterns = self.patterns.clone();
        patterns.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        patterns
            .into_iter()
            .take(limit)
            .map(|p| p.description)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_key_distinguishes_type_and_value() {
        let a = Pattern::new(PatternType::Selector, "#login".into(), "login button".into());
        let b = Pattern::new(
            PatternType::NavigationPath,
            "#login".into(),
            "same value different type".into(),
        );
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn oversized_value_is_truncated() {
        let huge = "x".repeat(MAX_PATTERN_VALUE_LEN + 500);
        let pattern = Pattern::new(PatternType::Selector, huge, "d".into());
        assert_eq!(pattern.value.len(), MAX_PATTERN_VALUE_LEN);
    }

    #[test]
    fn top_snippets_orders_by_confidence_descending() {
        let mut card = KnowledgeCard::new("example.com".to_string());
        let mut low = Pattern::new(PatternType::Selector, "a".into(), "low".into());
        low.confidence = 0.2;
        let mut high = Pattern::new(PatternType::Selector, "b".into(), "high".into());
        high.confidence = 0.9;
        card.patterns = vec![low, high];

        let snippets = card.top_snippets(2);
        assert_eq!(snippets, vec!["high".to_string(), "low".to_string()]);
    }

    #[test]
    fn task_intent_count_ignores_other_types() {
        let mut card = KnowledgeCard::new("example.com".to_string());
        card.patterns = vec![
            Pattern::new(PatternType::TaskIntent, "a".into(), "a".into()),
            Pattern::new(PatternType::TaskIntent, "b".into(), "b".into()),
            Pattern::new(PatternType::Selector, "c".into(), "c".into()),
        ];
        assert_eq!(card.task_intent_count(), 2);
    }
}
