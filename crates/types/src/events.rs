//! Event schema streamed to subscribers (spec §6).
//!
//! `done` is terminal: it is always the last event delivered for a run,
//! whether the run is an agent run or a task run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    SessionCreated {
        session_id: String,
    },
    Thinking {
        iteration: u32,
    },
    ToolCall {
        iteration: u32,
        tool_name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        iteration: u32,
        tool_name: String,
        success: bool,
        /// Rendered result text, with password/secret/token fields masked
        /// (spec §4.2: ask_human payloads are masked before emission).
        content: String,
    },
    Progress {
        done_steps: u32,
        total_steps: u32,
    },
    SubgoalCompleted {
        description: String,
    },
    InputRequired {
        request_id: String,
        question: String,
        fields: Vec<InputField>,
    },
    MemoryRecall {
        domain: String,
        pattern_count: usize,
    },
    Error {
        code: String,
        message: String,
    },
    Done {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl InputField {
    pub fn is_sensitive(&self) -> bool {
        self.field_type == "password"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_event_is_terminal() {
        let ev = AgentEvent::Done {
            success: true,
            result: None,
        };
        assert!(ev.is_terminal());
    }

    #[test]
    fn non_done_events_are_not_terminal() {
        assert!(!AgentEvent::Thinking { iteration: 1 }.is_terminal());
    }

    #[test]
    fn password_field_is_sensitive() {
        let f = InputField {
            name: "pw".to_string(),
            field_type: "password".to_string(),
        };
        assert!(f.is_sensitive());
    }

    #[test]
    fn tagged_serialization_uses_type_field() {
        let ev = AgentEvent::SessionCreated {
            session_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "session_created");
    }
}
