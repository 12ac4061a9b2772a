//! Planner (spec §4.3): maps a task specification to an ordered list of
//! steps via a keyword rule table, with an optional LLM-fallback
//! classifier for goals no rule recognizes.

use agentbrowse_agent_loop::{Conversation, LlmClient};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct Budget {
    pub max_retries: u32,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub goal: String,
    pub inputs: serde_json::Value,
    pub constraints: Option<serde_json::Value>,
    pub output_schema: Option<serde_json::Value>,
    pub budget: Budget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Template {
        template_id: String,
        inputs: serde_json::Value,
    },
    AgentGoal { goal: String },
}

impl Step {
    pub fn agent_goal(goal: impl Into<String>) -> Self {
        Step::AgentGoal { goal: goal.into() }
    }
}

/// Extracts URLs from the task's `inputs.urls` array, falling back to a
/// plain scan of `goal` for `http(s)://` tokens.
fn extract_urls(task: &TaskSpec) -> Vec<String> {
    if let Some(urls) = task.inputs.get("urls").and_then(|v| v.as_array()) {
        let from_inputs: Vec<String> = urls.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
        if !from_inputs.is_empty() {
            return from_inputs;
        }
    }
    task.goal
        .split_whitespace()
        .filter(|tok| tok.starts_with("http://") || tok.starts_with("https://"))
        .map(|tok| tok.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '/' && c != ':' && c != '.').to_string())
        .collect()
}

/// Keyword rule table: multi-URL + "compare" → `multi_tab_compare`;
/// URL(s) + an extraction keyword → `batch_extract`; a login keyword →
/// `login_session`; otherwise no rule matches.
fn rule_match(task: &TaskSpec) -> Option<Step> {
    let goal_lower = task.goal.to_lowercase();
    let urls = extract_urls(task);

    if urls.len() >= 2 && goal_lower.contains("compare") {
        return Some(Step::Template {
            template_id: "multi_tab_compare".to_string(),
            inputs: serde_json::json!({"urls": urls}),
        });
    }

    if !urls.is_empty()
        && (goal_lower.contains("extract") || goal_lower.contains("scrape") || goal_lower.contains("batch"))
    {
        return Some(Step::Template {
            template_id: "batch_extract".to_string(),
            inputs: serde_json::json!({"urls": urls}),
        });
    }

    if goal_lower.contains("log in") || goal_lower.contains("login") || goal_lower.contains("sign in") {
        return Some(Step::Template {
            template_id: "login_session".to_string(),
            inputs: task.inputs.clone(),
        });
    }

    None
}

/// Plans a task into steps, using only the rule table. Most callers
/// should use [`plan_with_llm_fallback`] instead; this is exposed for
/// tests and for callers that never want an LLM call during planning.
pub fn plan(task: &TaskSpec) -> Vec<Step> {
    match rule_match(task) {
        Some(step) => vec![step],
        None => vec![Step::agent_goal(task.goal.clone())],
    }
}

/// Plans a task, consulting `llm` only when no rule matches. The
/// classifier's own failures (HTTP error, unparsable response) are
/// swallowed and fall back to `agent_goal`, per spec §4.3/§7 ("falls
/// back silently to agent_goal").
pub async fn plan_with_llm_fallback(task: &TaskSpec, llm: Option<&LlmClient>) -> Vec<Step> {
    if let Some(step) = rule_match(task) {
        return vec![step];
    }

    if let Some(llm) = llm {
        if let Some(step) = classify_with_llm(task, llm).await {
            return vec![step];
        }
    }

    vec![Step::agent_goal(task.goal.clone())]
}

async fn classify_with_llm(task: &TaskSpec, llm: &LlmClient) -> Option<Step> {
    let mut conversation = Conversation::new();
    conversation.push_system(
        "Classify the task into exactly one JSON object: either \
         {\"kind\":\"template\",\"template_id\":\"batch_extract\"|\"multi_tab_compare\"|\"login_session\",\"inputs\":{...}} \
         or {\"kind\":\"agent_goal\",\"goal\":\"...\"}. Reply with JSON only.",
    );
    conversation.push_user(&task.goal);

    let turn = llm.complete(&conversation, &[]).await.ok()?;
    serde_json::from_str::<Step>(turn.content.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(goal: &str, urls: Vec<&str>) -> TaskSpec {
        TaskSpec {
            goal: goal.to_string(),
            inputs: serde_json::json!({"urls": urls}),
            constraints: None,
            output_schema: None,
            budget: Budget::default(),
        }
    }

    #[test]
    fn two_urls_and_compare_selects_multi_tab_compare() {
        let t = task("compare these pages", vec!["https://a.test", "https://b.test"]);
        let steps = plan(&t);
        assert_eq!(
            steps,
            vec![Step::Template {
                template_id: "multi_tab_compare".to_string(),
                inputs: serde_json::json!({"urls": ["https://a.test", "https://b.test"]}),
            }]
        );
    }

    #[test]
    fn single_url_with_extract_keyword_selects_batch_extract() {
        let t = task("extract the title from this page", vec!["https://a.test"]);
        let steps = plan(&t);
        assert!(matches!(&steps[0], Step::Template { template_id, .. } if template_id == "batch_extract"));
    }

    #[test]
    fn login_keyword_selects_login_session() {
        let t = task("log in to the account", vec![]);
        let steps = plan(&t);
        assert!(matches!(&steps[0], Step::Template { template_id, .. } if template_id == "login_session"));
    }

    #[test]
    fn unmatched_goal_falls_through_to_agent_goal() {
        let t = task("find the cheapest flight to tokyo", vec![]);
        let steps = plan(&t);
        assert_eq!(steps, vec![Step::agent_goal("find the cheapest flight to tokyo")]);
    }

    #[tokio::test]
    async fn llm_fallback_is_not_consulted_when_a_rule_matches() {
        let t = task("compare these pages", vec!["https://a.test", "https://b.test"]);
        // Passing `None` proves the rule path never needs an LLM client.
        let steps = plan_with_llm_fallback(&t, None).await;
        assert!(matches!(&steps[0], Step::Template { template_id, .. } if template_id == "multi_tab_compare"));
    }

    #[tokio::test]
    async fn llm_fallback_falls_back_to_agent_goal_without_a_client() {
        let t = task("find the cheapest flight to tokyo", vec![]);
        let steps = plan_with_llm_fallback(&t, None).await;
        assert_eq!(steps, vec![Step::agent_goal("find the cheapest flight to tokyo")]);
    }
}
