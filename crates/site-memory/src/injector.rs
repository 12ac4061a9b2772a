//! Memory Injector: renders a knowledge card down into the Markdown
//! snippet injected as a system hint before the agent's first LLM call
//! (spec §4.4 "Memory Injector").

use crate::card::{KnowledgeCard, Pattern, PatternType};

const FOOTER: &str =
    "\n\n_Note: selectors above may be stale if the site has changed since they were recorded._";

/// Builds the prompt snippet for `card`, filtered and ordered by
/// relevance to `task_text`, truncated to `char_budget` characters
/// (footer included in the budget).
pub fn build_prompt_snippet(card: &KnowledgeCard, task_text: &str, char_budget: usize) -> String {
    let ordered = order_patterns(&card.patterns, task_text);

    let mut body = format!("## Site memory: {}\n", card.domain);
    let footer_len = FOOTER.len();
    let budget_for_patterns = char_budget.saturating_sub(body.len() + footer_len);
    let mut used = 0usize;

    for pattern in ordered {
        let line = render_line(pattern);
        if used + line.len() > budget_for_patterns {
            break;
        }
        used += line.len();
        body.push_str(&line);
    }

    body.push_str(FOOTER);
    body
}

fn render_line(pattern: &Pattern) -> String {
    format!("- [{:?}] {}\n", pattern.pattern_type, pattern.description)
}

/// `selector`/`navigation_path`/`page_structure` patterns are filtered
/// out unless their description shares a case-insensitive substring of
/// at least 2 characters with the task text. `task_intent` patterns are
/// never filtered, only sorted by longest common substring against the
/// task text, falling back to recency. Every other type (`login_required`,
/// `spa_hint`) always passes through, ordered by recency (spec §4.2
/// "Memory Injector").
fn order_patterns<'a>(patterns: &'a [Pattern], task_text: &str) -> Vec<&'a Pattern> {
    let task_lower = task_text.to_lowercase();

    let mut intents: Vec<&Pattern> = Vec::new();
    let mut unfiltered: Vec<&Pattern> = Vec::new();
    let mut relevant: Vec<&Pattern> = Vec::new();

    for pattern in patterns {
        if pattern.pattern_type == PatternType::TaskIntent {
            intents.push(pattern);
        } else if pattern.pattern_type.is_relevance_filtered() {
            if has_shared_substring(&pattern.description.to_lowercase(), &task_lower, 2) {
                relevant.push(pattern);
            }
        } else {
            unfiltered.push(pattern);
        }
    }

    intents.sort_by(|a, b| {
        let a_len = longest_common_substring(&a.value.to_lowercase(), &task_lower);
        let b_len = longest_common_substring(&b.value.to_lowercase(), &task_lower);
        b_len.cmp(&a_len).then(b.last_used_at.cmp(&a.last_used_at))
    });
    unfiltered.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
    relevant.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));

    let mut ordered = intents;
    ordered.extend(unfiltered);
    ordered.extend(relevant);
    ordered
}

fn has_shared_substring(a: &str, b: &str, min_len: usize) -> bool {
    longest_common_substring(a, b) >= min_len
}

/// Naive O(n*m) longest-common-substring length; descriptions and task
/// text are both short so this never matters for performance.
fn longest_common_substring(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = 0;
    for i in 1..=a.len() {
        let mut curr = vec![0usize; b.len() + 1];
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                curr[j] = prev[j - 1] + 1;
                best = best.max(curr[j]);
            }
        }
        prev = curr;
    }
    best
}
