//! Budget-aware tool-result formatter (spec §4.2.2): renders a tool's
//! raw JSON result into Markdown (or compact JSON) within a 4000
//! character budget, with `get_page_info` diffed against the previous
//! call on the same URL and secret-shaped fields masked.

use serde_json::Value;
use std::collections::HashMap;

pub const RESULT_BUDGET: usize = 4000;
const MASK: &str = "********";

/// Per-session cache of the last `get_page_info` element map, keyed by
/// page URL, so repeated calls on an unchanged page can be diffed down
/// to just what moved (spec §4.2.2).
#[derive(Debug, Default)]
pub struct ElementMapCache {
    last_by_url: HashMap<String, HashMap<String, Value>>,
}

impl ElementMapCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Renders `value` (the raw tool result) for `tool_name`, truncating to
/// `RESULT_BUDGET` characters and masking password/secret/token-shaped
/// fields.
pub fn format_tool_result(tool_name: &str, value: &Value, cache: &mut ElementMapCache, url: &str) -> String {
    let masked = mask_secrets(value.clone());
    let rendered = if tool_name == "get_page_info" {
        format_page_info(&masked, cache, url)
    } else {
        render_generic(&masked)
    };
    truncate_to_budget(&rendered, RESULT_BUDGET)
}

fn format_page_info(value: &Value, cache: &mut ElementMapCache, url: &str) -> String {
    let elements = match value.get("elements").and_then(|e| e.as_array()) {
        Some(elements) => elements,
        None => return render_generic(value),
    };

    let current: HashMap<String, Value> = elements
        .iter()
        .filter_map(|e| e.get("id").and_then(|id| id.as_str()).map(|id| (id.to_string(), e.clone())))
        .collect();

    let previous = cache.last_by_url.get(url).cloned();
    let rendered = match previous {
        Some(previous) if !previous.is_empty() => {
            let diff = diff_elements(&previous, &current);
            if diff.changed_ratio <= 0.5 {
                render_diff(&diff)
            } else {
                render_generic(value)
            }
        }
        _ => render_generic(value),
    };

    cache.last_by_url.insert(url.to_string(), current);
    rendered
}

struct ElementDiff {
    added: Vec<String>,
    removed: Vec<String>,
    changed: Vec<String>,
    changed_ratio: f64,
}

fn diff_elements(previous: &HashMap<String, Value>, current: &HashMap<String, Value>) -> ElementDiff {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    for id in current.keys() {
        if !previous.contains_key(id) {
            added.push(id.clone());
        } else if previous.get(id) != current.get(id) {
            changed.push(id.clone());
        }
    }
    for id in previous.keys() {
        if !current.contains_key(id) {
            removed.push(id.clone());
        }
    }

    let total = previous.len().max(current.len()).max(1);
    let changed_count = added.len() + removed.len() + changed.len();
    ElementDiff {
        added,
        removed,
        changed,
        changed_ratio: changed_count as f64 / total as f64,
    }
}

fn render_diff(diff: &ElementDiff) -> String {
    let mut out = String::from("## Page elements (diff since last call)\n");
    if diff.added.is_empty() && diff.removed.is_empty() && diff.changed.is_empty() {
        out.push_str("No changes since the last call.\n");
        return out;
    }
    if !diff.added.is_empty() {
        out.push_str(&format!("Added: {}\n", diff.added.join(", ")));
    }
    if !diff.removed.is_empty() {
        out.push_str(&format!("Removed: {}\n", diff.removed.join(", ")));
    }
    if !diff.changed.is_empty() {
        out.push_str(&format!("Changed: {}\n", diff.changed.join(", ")));
    }
    out
}

fn render_generic(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn truncate_to_budget(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(budget.saturating_sub(20)).collect();
        truncated.push_str("\n…(truncated)");
        truncated
    }
}

/// Masks any JSON string value whose key looks like it holds a secret.
/// Applied recursively so nested objects/arrays are covered.
fn mask_secrets(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if looks_sensitive(&k) {
                        (k, Value::String(MASK.to_string()))
                    } else {
                        (k, mask_secrets(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(mask_secrets).collect()),
        other => other,
    }
}

fn looks_sensitive(key: &str) -> bool {
    let lower = key.to_lowercase();
    ["password", "passwd", "secret", "token", "apikey", "api_key"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_password_field() {
        let value = json!({"username": "bob", "password": "hunter2"});
        let masked = mask_secrets(value);
        assert_eq!(masked["password"], MASK);
        assert_eq!(masked["username"], "bob");
    }

    #[test]
    fn masks_nested_secret_fields() {
        let value = json!({"auth": {"api_key": "sk-live-xyz"}});
        let masked = mask_secrets(value);
        assert_eq!(masked["auth"]["api_key"], MASK);
    }

    #[test]
    fn truncates_over_budget_text() {
        let long = "x".repeat(RESULT_BUDGET * 2);
        let out = truncate_to_budget(&long, RESULT_BUDGET);
        assert!(out.len() <= RESULT_BUDGET);
        assert!(out.ends_with("(truncated)"));
    }

    #[test]
    fn first_page_info_call_renders_full_list_not_a_diff() {
        let mut cache = ElementMapCache::new();
        let value = json!({"elements": [{"id": "1", "label": "Login"}]});
        let out = format_tool_result("get_page_info", &value, &mut cache, "https://a.example");
        assert!(out.contains("Login"));
    }

    #[test]
    fn second_call_on_same_url_with_small_diff_emits_diff_only() {
        let mut cache = ElementMapCache::new();
        let first = json!({"elements": [
            {"id": "1", "label": "Login"},
            {"id": "2", "label": "Search"},
        ]});
        format_tool_result("get_page_info", &first, &mut cache, "https://a.example");

        let second = json!({"elements": [
            {"id": "1", "label": "Login"},
            {"id": "2", "label": "Search"},
            {"id": "3", "label": "New button"},
        ]});
        let out = format_tool_result("get_page_info", &second, &mut cache, "https://a.example");
        assert!(out.contains("diff since last call"));
        assert!(out.contains("Added"));
    }

    #[test]
    fn large_change_ratio_falls_back_to_full_render() {
        let mut cache = ElementMapCache::new();
        let first = json!({"elements": [{"id": "1", "label": "a"}]});
        format_tool_result("get_page_info", &first, &mut cache, "https://a.example");

        let second = json!({"elements": [
            {"id": "2", "label": "b"},
            {"id": "3", "label": "c"},
        ]});
        let out = format_tool_result("get_page_info", &second, &mut cache, "https://a.example");
        assert!(!out.contains("diff since last call"));
    }
}
