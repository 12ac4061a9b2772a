//! Memory Capturer: turn a successful run's tool-usage trace into
//! reusable patterns (spec §4.4 "Memory Capturer").

use crate::card::{Pattern, PatternType};
use std::collections::HashMap;

/// One tool invocation from a completed run, in the order it happened.
#[derive(Debug, Clone)]
pub struct ToolUsageRecord {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// Captures patterns from a success-trace: every `navigate` target
/// becomes a `navigation_path` pattern, any selector clicked more than
/// once becomes a `selector` pattern, and the task text itself becomes
/// a single `task_intent` pattern. Patterns are deduplicated by
/// `(type, value)` before being returned so the caller can hand them
/// straight to `merge_patterns`.
pub fn capture_patterns(trace: &[ToolUsageRecord], task_text: &str) -> Vec<Pattern> {
    let mut click_counts: HashMap<String, u32> = HashMap::new();
    let mut patterns_by_key: HashMap<(PatternType, String), Pattern> = HashMap::new();

    for record in trace {
        match record.tool_name.as_str() {
            "navigate" => {
                if let Some(url) = record.arguments.get("url").and_then(|v| v.as_str()) {
                    upsert(
                        &mut patterns_by_key,
                        PatternType::NavigationPath,
                        url.to_string(),
                        format!("navigated to {url}"),
                    );
                }
            }
            "click" => {
                if let Some(selector) = record
                    .arguments
                    .get("element_id")
                    .and_then(|v| v.as_str())
                {
                    *click_counts.entry(selector.to_string()).or_insert(0) += 1;
                }
            }
            _ => {}
        }
    }

    for (selector, count) in click_counts {
        if count > 1 {
            upsert(
                &mut patterns_by_key,
                PatternType::Selector,
                selector.clone(),
                format!("clicked {count} times: {selector}"),
            );
        }
    }

    if !task_text.trim().is_empty() {
        upsert(
            &mut patterns_by_key,
            PatternType::TaskIntent,
            task_text.to_string(),
            task_text.to_string(),
        );
    }

    patterns_by_key.into_values().collect()
}

fn upsert(
    map: &mut HashMap<(PatternType, String), Pattern>,
    pattern_type: PatternType,
    value: String,
    description: String,
) {
    map.entry((pattern_type, value.clone()))
        .or_insert_with(|| Pattern::new(pattern_type, value, description));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str, args: serde_json::Value) -> ToolUsageRecord {
        ToolUsageRecord {
            tool_name: name.to_string(),
            arguments: args,
        }
    }

    #[test]
    fn navigate_calls_become_navigation_path_patterns() {
        let trace = vec![record("navigate", json!({"url": "https://example.com"}))];
        let patterns = capture_patterns(&trace, "");
        assert!(patterns
            .iter()
            .any(|p| p.pattern_type == PatternType::NavigationPath && p.value == "https://example.com"));
    }

    #[test]
    fn repeated_clicks_become_selector_pattern_but_single_click_does_not() {
        let trace = vec![
            record("click", json!({"element_id": "#submit"})),
            record("click", json!({"element_id": "#submit"})),
            record("click", json!({"element_id": "#once"})),
        ];
        let patterns = capture_patterns(&trace, "");
        assert!(patterns
            .iter()
            .any(|p| p.pattern_type == PatternType::Selector && p.value == "#submit"));
        assert!(!patterns
            .iter()
            .any(|p| p.pattern_type == PatternType::Selector && p.value == "#once"));
    }

    #[test]
    fn task_text_becomes_task_intent_pattern() {
        let patterns = capture_patterns(&[], "book a flight to Tokyo");
        assert!(patterns
            .iter()
            .any(|p| p.pattern_type == PatternType::TaskIntent && p.value == "book a flight to Tokyo"));
    }

    #[test]
    fn blank_task_text_produces_no_intent_pattern() {
        let patterns = capture_patterns(&[], "   ");
        assert!(!patterns.iter().any(|p| p.pattern_type == PatternType::TaskIntent));
    }
}
