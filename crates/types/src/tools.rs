//! The closed tool surface exposed to the LLM (spec §6).
//!
//! Tool call arguments arrive from the LLM as untyped JSON. We model that
//! as a tagged variant over a closed tool-name set rather than a typed
//! struct per tool: malformed JSON becomes a distinct error variant the
//! loop can recover from instead of a panic (spec §9, "Dynamic JSON
//! arguments from the LLM").

use crate::error::ToolError;
use serde::{Deserialize, Serialize};

/// The closed set of tools the core registers with the LLM, plus the two
/// agent-only pseudo-tools `done` and `ask_human`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    Navigate,
    GetPageInfo,
    GetPageContent,
    Click,
    TypeText,
    PressKey,
    Scroll,
    GoBack,
    FindElement,
    Wait,
    WaitForStable,
    ExecuteJavascript,
    SelectOption,
    Hover,
    SetValue,
    CreateTab,
    CloseTab,
    SwitchTab,
    ListTabs,
    Screenshot,
    HandleDialog,
    GetDialogInfo,
    GetNetworkLogs,
    GetConsoleLogs,
    UploadFile,
    GetDownloads,
    /// Agent-only: terminal success.
    Done,
    /// Agent-only: suspend the loop on a human-input request.
    AskHuman,
}

impl ToolName {
    /// Tool names as registered with the LLM (lowerCamelCase parameter
    /// keys per spec §6, but tool *names* are snake_case verbs — matches
    /// what every name in the closed set above already is).
    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::Navigate => "navigate",
            ToolName::GetPageInfo => "get_page_info",
            ToolName::GetPageContent => "get_page_content",
            ToolName::Click => "click",
            ToolName::TypeText => "type_text",
            ToolName::PressKey => "press_key",
            ToolName::Scroll => "scroll",
            ToolName::GoBack => "go_back",
            ToolName::FindElement => "find_element",
            ToolName::Wait => "wait",
            ToolName::WaitForStable => "wait_for_stable",
            ToolName::ExecuteJavascript => "execute_javascript",
            ToolName::SelectOption => "select_option",
            ToolName::Hover => "hover",
            ToolName::SetValue => "set_value",
            ToolName::CreateTab => "create_tab",
            ToolName::CloseTab => "close_tab",
            ToolName::SwitchTab => "switch_tab",
            ToolName::ListTabs => "list_tabs",
            ToolName::Screenshot => "screenshot",
            ToolName::HandleDialog => "handle_dialog",
            ToolName::GetDialogInfo => "get_dialog_info",
            ToolName::GetNetworkLogs => "get_network_logs",
            ToolName::GetConsoleLogs => "get_console_logs",
            ToolName::UploadFile => "upload_file",
            ToolName::GetDownloads => "get_downloads",
            ToolName::Done => "done",
            ToolName::AskHuman => "ask_human",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "navigate" => ToolName::Navigate,
            "get_page_info" => ToolName::GetPageInfo,
            "get_page_content" => ToolName::GetPageContent,
            "click" => ToolName::Click,
            "type_text" => ToolName::TypeText,
            "press_key" => ToolName::PressKey,
            "scroll" => ToolName::Scroll,
            "go_back" => ToolName::GoBack,
            "find_element" => ToolName::FindElement,
            "wait" => ToolName::Wait,
            "wait_for_stable" => ToolName::WaitForStable,
            "execute_javascript" => ToolName::ExecuteJavascript,
            "select_option" => ToolName::SelectOption,
            "hover" => ToolName::Hover,
            "set_value" => ToolName::SetValue,
            "create_tab" => ToolName::CreateTab,
            "close_tab" => ToolName::CloseTab,
            "switch_tab" => ToolName::SwitchTab,
            "list_tabs" => ToolName::ListTabs,
            "screenshot" => ToolName::Screenshot,
            "handle_dialog" => ToolName::HandleDialog,
            "get_dialog_info" => ToolName::GetDialogInfo,
            "get_network_logs" => ToolName::GetNetworkLogs,
            "get_console_logs" => ToolName::GetConsoleLogs,
            "upload_file" => ToolName::UploadFile,
            "get_downloads" => ToolName::GetDownloads,
            "done" => ToolName::Done,
            "ask_human" => ToolName::AskHuman,
            _ => return None,
        })
    }

    /// `true` for the two pseudo-tools the agent loop handles itself
    /// rather than dispatching through the tool bus.
    pub fn is_agent_only(self) -> bool {
        matches!(self, ToolName::Done | ToolName::AskHuman)
    }
}

/// A single tool invocation requested by the LLM. `arguments` stays
/// untyped JSON until the tool bus validates it against the specific
/// tool's parameter shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Resolve `name` against the closed tool set, or produce the
    /// malformed-tool error variant rather than panicking.
    pub fn resolve_name(&self) -> Result<ToolName, ToolError> {
        ToolName::from_str(&self.name).ok_or_else(|| {
            ToolError::new(
                crate::error::ErrorCode::InvalidParameter,
                format!("unknown tool '{}'", self.name),
            )
        })
    }
}

/// Outcome of dispatching a `ToolCall`. `Ok` carries the raw JSON payload
/// before the agent loop's budget-aware formatter renders it to text;
/// `Err` carries a structured error the LLM can reason about.
pub type ToolOutcome = Result<serde_json::Value, ToolError>;

/// The tool-result message content appended to the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCodeWire>,
}

/// Wire alias kept distinct from `crate::error::ErrorCode` re-export path
/// so downstream crates can `use agentbrowse_types::tools::*` without a
/// name collision against the top-level `ErrorCode` re-export.
pub type ErrorCodeWire = crate::error::ErrorCode;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_round_trips_through_str() {
        for name in [
            ToolName::Navigate,
            ToolName::GetPageInfo,
            ToolName::Done,
            ToolName::AskHuman,
        ] {
            assert_eq!(ToolName::from_str(name.as_str()), Some(name));
        }
    }

    #[test]
    fn unknown_tool_name_is_none() {
        assert_eq!(ToolName::from_str("frobnicate"), None);
    }

    #[test]
    fn done_and_ask_human_are_agent_only() {
        assert!(ToolName::Done.is_agent_only());
        assert!(ToolName::AskHuman.is_agent_only());
        assert!(!ToolName::Click.is_agent_only());
    }

    #[test]
    fn resolve_name_on_malformed_tool_is_tool_error_not_panic() {
        let call = ToolCall {
            id: "1".to_string(),
            name: "does_not_exist".to_string(),
            arguments: serde_json::json!({}),
        };
        assert!(call.resolve_name().is_err());
    }
}
