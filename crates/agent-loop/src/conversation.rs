//! Conversation state (spec §3 "Conversation"): an ordered message
//! sequence where insertion order is semantically significant — a tool
//! message must immediately follow the assistant message whose tool
//! call it answers, never interleaved with a later turn's hints.

use agentbrowse_types::tools::ToolCall;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// Holds the message sequence for one agent run. `push_tool_result` is
/// the only way to append a tool message, so the contiguity invariant
/// (tool messages immediately follow their assistant message) can never
/// be violated by construction: deferred hints go through
/// `push_deferred_hints`, which is only ever called after every tool
/// result of the turn has been appended.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.messages.push(Message::system(content));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.messages.push(Message::assistant(content, tool_calls));
    }

    /// Appends one tool-result message. Must be called for every tool
    /// call of the current assistant turn, in order, before any deferred
    /// hint is pushed.
    pub fn push_tool_result(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.messages.push(Message::tool(tool_call_id, content));
    }

    /// Appends hints produced by the recovery policy or loop detector.
    /// Callers must have already appended every tool-result message of
    /// the turn (spec §4.2: "Deferred hints are appended after all tool
    /// messages of the turn, never interleaved").
    pub fn push_deferred_hints(&mut self, hints: impl IntoIterator<Item = String>) {
        for hint in hints {
            self.messages.push(Message::user(hint));
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True iff every assistant message with tool calls is immediately
    /// followed by exactly that many tool messages before any other
    /// assistant/user message. Used only in tests; the public API makes
    /// violating this structurally hard, but this is a cheap crosscheck.
    pub fn is_contiguous(&self) -> bool {
        let mut i = 0;
        while i < self.messages.len() {
            let msg = &self.messages[i];
            if msg.role == Role::Assistant && !msg.tool_calls.is_empty() {
                let expected = msg.tool_calls.len();
                let mut found = 0;
                let mut j = i + 1;
                while j < self.messages.len() && self.messages[j].role == Role::Tool {
                    found += 1;
                    j += 1;
                }
                if found != expected {
                    return false;
                }
                i = j;
                continue;
            }
            i += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentbrowse_types::tools::ToolCall;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "navigate".to_string(),
            arguments: serde_json::json!({}),
        }
    }

    #[test]
    fn fresh_conversation_is_contiguous() {
        let convo = Conversation::new();
        assert!(convo.is_contiguous());
    }

    #[test]
    fn assistant_with_tool_calls_followed_by_results_is_contiguous() {
        let mut convo = Conversation::new();
        convo.push_assistant("", vec![call("1"), call("2")]);
        convo.push_tool_result("1", "ok");
        convo.push_tool_result("2", "ok");
        convo.push_deferred_hints(vec!["hint".to_string()]);
        assert!(convo.is_contiguous());
    }

    #[test]
    fn assistant_with_tool_calls_missing_a_result_is_not_contiguous() {
        let mut convo = Conversation::new();
        convo.push_assistant("", vec![call("1"), call("2")]);
        convo.push_tool_result("1", "ok");
        convo.push_user("oops, no second result");
        assert!(!convo.is_contiguous());
    }

    #[test]
    fn deferred_hints_land_after_tool_results() {
        let mut convo = Conversation::new();
        convo.push_assistant("", vec![call("1")]);
        convo.push_tool_result("1", "ok");
        convo.push_deferred_hints(vec!["careful now".to_string()]);
        let messages = convo.messages();
        assert_eq!(messages[1].role, Role::Tool);
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[2].content, "careful now");
    }
}
