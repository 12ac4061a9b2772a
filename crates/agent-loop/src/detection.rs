//! Loop and pattern detection (spec §4.2 "Loop and pattern detection"):
//! runs over the tool-call signature history after every tool result.
//! Hints produced here are deferred and appended after the turn's tool
//! messages by the caller.

const EXACT_REPEAT_WINDOW: usize = 3;
const OSCILLATION_WINDOW: usize = 6;
const STALL_WINDOW: usize = 5;

/// Marker prefixing every deferred detection hint so it reads as a
/// system-originated aside rather than ordinary user input (spec §8
/// scenario 3).
const HINT_MARKER: &str = "[系统提示] ⚠️";

/// Tools whose result is pure observation, never a state change — used
/// by the progress-stall check (spec §4.2).
fn is_observation_only(tool_name: &str) -> bool {
    matches!(
        tool_name,
        "get_page_info"
            | "get_page_content"
            | "find_element"
            | "get_dialog_info"
            | "get_network_logs"
            | "get_console_logs"
            | "get_downloads"
    )
}

fn is_navigation(tool_name: &str) -> bool {
    matches!(tool_name, "navigate" | "go_back")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSignature {
    pub tool_name: String,
    pub args_key: String,
}

impl CallSignature {
    pub fn new(tool_name: impl Into<String>, arguments: &serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            args_key: canonical_json(arguments),
        }
    }
}

/// Canonicalizes a JSON value into a stable string key by sorting object
/// keys, so two calls with the same arguments in different key order
/// still produce identical signatures.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{k}:{}", canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
struct CallRecord {
    signature: CallSignature,
    success: bool,
}

#[derive(Debug, Default)]
pub struct LoopDetector {
    history: Vec<CallRecord>,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
        }
    }

    /// Records one tool result and returns any hints the detectors
    /// produce. Call once per dispatched tool call, in order.
    pub fn record(&mut self, signature: CallSignature, success: bool) -> Vec<String> {
        self.history.push(CallRecord { signature, success });

        let mut hints = Vec::new();
        if let Some(hint) = self.check_exact_repeat() {
            hints.push(hint);
            self.history.clear();
            return hints;
        }
        if let Some(hint) = self.check_oscillation() {
            hints.push(hint);
        }
        if let Some(hint) = self.check_futile_retry() {
            hints.push(hint);
        }
        if let Some(hint) = self.check_progress_stall() {
            hints.push(hint);
        }
        hints
    }

    fn check_exact_repeat(&self) -> Option<String> {
        if self.history.len() < EXACT_REPEAT_WINDOW {
            return None;
        }
        let tail = &self.history[self.history.len() - EXACT_REPEAT_WINDOW..];
        let first = &tail[0].signature;
        if tail.iter().all(|r| &r.signature == first) {
            Some(format!(
                "{HINT_MARKER} the same `{}` call has been repeated {EXACT_REPEAT_WINDOW} times in a row; \
                 try a different approach",
                first.tool_name
            ))
        } else {
            None
        }
    }

    fn check_oscillation(&self) -> Option<String> {
        if self.history.len() < OSCILLATION_WINDOW {
            return None;
        }
        let tail = &self.history[self.history.len() - OSCILLATION_WINDOW..];
        let a = &tail[0].signature;
        let b = &tail[1].signature;
        if a == b {
            return None;
        }
        let oscillating = tail
            .iter()
            .enumerate()
            .all(|(i, r)| &r.signature == if i % 2 == 0 { a } else { b });
        if oscillating {
            Some(format!(
                "{HINT_MARKER} calls are oscillating between `{}` and `{}`; this is not making progress",
                a.tool_name, b.tool_name
            ))
        } else {
            None
        }
    }

    fn check_futile_retry(&self) -> Option<String> {
        if self.history.len() < 2 {
            return None;
        }
        let last_two = &self.history[self.history.len() - 2..];
        if last_two[0].signature == last_two[1].signature
            && !last_two[0].success
            && !last_two[1].success
        {
            Some(format!(
                "{HINT_MARKER} `{}` has failed twice in a row with the same arguments",
                last_two[0].signature.tool_name
            ))
        } else {
            None
        }
    }

    fn check_progress_stall(&self) -> Option<String> {
        if self.history.len() < STALL_WINDOW {
            return None;
        }
        let tail = &self.history[self.history.len() - STALL_WINDOW..];
        let all_observation = tail
            .iter()
            .all(|r| is_observation_only(&r.signature.tool_name));
        let any_navigation = tail.iter().any(|r| is_navigation(&r.signature.tool_name));
        if all_observation && !any_navigation {
            Some(format!(
                "{HINT_MARKER} the last several calls have only observed the page with no navigation; \
                 consider taking an action instead"
            ))
        } else {
            None
        }
    }
}
