//! Memory integration (spec §4.2 "Memory integration"): pre-recall
//! before the first LLM call, auto-recall before every `navigate`, and
//! capture on a successful run. Thin glue between the agent loop and
//! `agentbrowse_site_memory`.

use agentbrowse_site_memory::{
    capture_patterns, merge_patterns, CardStore, KnowledgeCard, ToolUsageRecord,
};
use std::collections::HashSet;

const PRE_RECALL_MAX_DOMAINS: usize = 3;
const INJECT_CHAR_BUDGET: usize = 2000;

/// Tracks which domains have already had a memory hint injected into
/// this run, so auto-recall never injects the same card twice (spec
/// §4.2 "Dedup per run").
#[derive(Debug, Default)]
pub struct MemoryState {
    injected_domains: HashSet<String>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn already_injected(&self, domain: &str) -> bool {
        self.injected_domains.contains(domain)
    }

    pub fn mark_injected(&mut self, domain: &str) {
        self.injected_domains.insert(domain.to_string());
    }
}

/// Builds the pre-recall system hint: up to `PRE_RECALL_MAX_DOMAINS`
/// domains chosen from the store's index as relevant to `task_text`,
/// each rendered into a prompt snippet. The actual "ask the LLM to
/// choose domains" step happens one layer up (it needs an LLM call);
/// this function does the ranking once candidate domains are known.
pub fn build_pre_recall_hint(
    store: &CardStore,
    candidate_domains: &[String],
    task_text: &str,
    state: &mut MemoryState,
) -> Option<String> {
    let mut snippets = Vec::new();
    for domain in candidate_domains.iter().take(PRE_RECALL_MAX_DOMAINS) {
        if state.already_injected(domain) {
            continue;
        }
        if let Ok(card) = store.load(domain) {
            let snippet = agentbrowse_site_memory::build_prompt_snippet(
                &card,
                task_text,
                INJECT_CHAR_BUDGET,
            );
            snippets.push(snippet);
            state.mark_injected(domain);
        }
    }
    if snippets.is_empty() {
        None
    } else {
        Some(snippets.join("\n\n"))
    }
}

/// Auto-recall before a `navigate` call: picks the best card for
/// `target_url` (normalized domain → full hostname → subdomain scan,
/// tie-break by most `task_intent` patterns then most total patterns)
/// and, if not already injected this run, returns its prompt snippet.
pub fn auto_recall(
    store: &CardStore,
    target_url: &str,
    task_text: &str,
    state: &mut MemoryState,
) -> Option<String> {
    let host = extract_host(target_url)?;
    let candidates = candidate_domains_for_host(&host);

    let mut best: Option<KnowledgeCard> = None;
    for candidate in candidates {
        if let Ok(card) = store.load(&candidate) {
            best = Some(match best {
                None => card,
                Some(current) => pick_better_card(current, card),
            });
        }
    }

    let card = best?;
    if state.already_injected(&card.domain) {
        return None;
    }
    state.mark_injected(card.domain.clone());
    Some(agentbrowse_site_memory::build_prompt_snippet(
        &card,
        task_text,
        INJECT_CHAR_BUDGET,
    ))
}

fn pick_better_card(a: KnowledgeCard, b: KnowledgeCard) -> KnowledgeCard {
    if b.task_intent_count() != a.task_intent_count() {
        if b.task_intent_count() > a.task_intent_count() {
            b
        } else {
            a
        }
    } else if b.patterns.len() > a.patterns.len() {
        b
    } else {
        a
    }
}

/// Normalized domain, then full hostname, then a left-to-right subdomain
/// scan, matching spec §4.2's "normalized domain → full hostname →
/// subdomain scan" auto-recall tie-break order.
fn candidate_domains_for_host(host: &str) -> Vec<String> {
    let mut candidates = vec![agentbrowse_site_memory::normalize_domain(host), host.to_string()];
    let parts: Vec<&str> = host.split('.').collect();
    for i in 1..parts.len().saturating_sub(1) {
        candidates.push(parts[i..].join("."));
    }
    candidates.dedup();
    candidates
}

pub fn extract_host(url: &str) -> Option<String> {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let host = without_scheme.split('/').next()?;
    let host = host.split('@').next_back()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Capture-on-success: converts the run's tool usage trace into
/// patterns, merges them into (or creates) the domain's card, and saves
/// it, bumping the version (spec §4.2 "Capture").
pub fn capture_on_success(
    store: &CardStore,
    domain: &str,
    trace: &[ToolUsageRecord],
    task_text: &str,
) -> agentbrowse_site_memory::error::Result<()> {
    let mut card = store.load_or_new(domain)?;
    let captured = capture_patterns(trace, task_text);
    card.patterns = merge_patterns(card.patterns, captured);
    store.save(card)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_host_strips_scheme_path_and_port() {
        assert_eq!(
            extract_host("https://example.com:8080/search?q=1"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn extract_host_handles_bare_host() {
        assert_eq!(extract_host("example.com/path"), Some("example.com".to_string()));
    }

    #[test]
    fn candidate_domains_includes_normalized_and_subdomain_scan() {
        let candidates = candidate_domains_for_host("checkout.shop.example.com");
        assert!(candidates.contains(&"checkout.shop.example.com".to_string()));
    }

    #[test]
    fn memory_state_dedups_per_run() {
        let mut state = MemoryState::new();
        assert!(!state.already_injected("example.com"));
        state.mark_injected("example.com");
        assert!(state.already_injected("example.com"));
    }
}
