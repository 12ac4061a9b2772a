//! The reason-act controller (spec §4.2): public contract, per-iteration
//! protocol, and the `{idle → running → (suspended-on-input ⇌ running)
//! → terminal}` state machine.

use crate::conversation::Conversation;
use crate::detection::{CallSignature, LoopDetector};
use crate::events::EventBus;
use crate::formatter::{self, ElementMapCache};
use crate::llm::{LlmClient, ToolFunctionSpec, ToolSpec, Usage};
use crate::memory_integration::{self, MemoryState};
use crate::progress::{ProgressEstimator, SubgoalChecklist};
use crate::recovery::{self, RecoveryAction};
use crate::tool_bus::ToolBus;
use agentbrowse_browser_session::SessionManager;
use agentbrowse_site_memory::{CardStore, ToolUsageRecord};
use agentbrowse_types::events::AgentEvent;
use agentbrowse_types::tools::ToolName;
use agentbrowse_types::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::{oneshot, Mutex};

const DEFAULT_MAX_ITERATIONS: u32 = 30;
const REMINDER_THRESHOLD: u32 = 2;
const ASK_HUMAN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Running,
    SuspendedOnInput,
    Terminal,
}

struct PendingInput {
    request_id: String,
    responder: oneshot::Sender<serde_json::Value>,
}

struct LoopState {
    phase: Phase,
    iteration: u32,
    consecutive_errors: u32,
    pending_input: Option<PendingInput>,
}

impl LoopState {
    fn fresh() -> Self {
        Self {
            phase: Phase::Idle,
            iteration: 0,
            consecutive_errors: 0,
            pending_input: None,
        }
    }
}

/// Result of `AgentLoop::run` (spec §4.2 public contract).
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub success: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub iterations: u32,
    pub token_usage: Option<Usage>,
}

pub struct AgentLoop {
    session_id: SessionId,
    sessions: SessionManager,
    tool_bus: ToolBus,
    llm: LlmClient,
    card_store: Option<Arc<CardStore>>,
    tools: Vec<ToolSpec>,
    max_iterations: u32,
    state: Mutex<LoopState>,
    events: EventBus,
}

impl AgentLoop {
    pub fn new(
        session_id: SessionId,
        sessions: SessionManager,
        llm: LlmClient,
        card_store: Option<Arc<CardStore>>,
    ) -> Self {
        let tool_bus = ToolBus::new(sessions.clone());
        Self {
            session_id,
            sessions,
            tool_bus,
            llm,
            card_store,
            tools: default_tool_specs(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            state: Mutex::new(LoopState::fresh()),
            events: EventBus::new(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Buffered replay of every event emitted so far, plus a receiver for
    /// everything emitted from this point on (spec §5 SSE replay ordering).
    pub fn subscribe(&self) -> (Vec<AgentEvent>, broadcast::Receiver<AgentEvent>) {
        self.events.subscribe()
    }

    /// Single-shot entry point. A second call while a run is already in
    /// flight fails immediately rather than interleaving two loops over
    /// the same conversation (spec §4.2: "subsequent invocations while
    /// running must fail with 'already running'").
    pub async fn run(&self, task: impl Into<String>) -> RunOutcome {
        {
            let mut state = self.state.lock().await;
            if state.phase == Phase::Running {
                return RunOutcome {
                    success: false,
                    result: None,
                    error: Some("already running".to_string()),
                    iterations: state.iteration,
                    token_usage: None,
                };
            }
            *state = LoopState::fresh();
            state.phase = Phase::Running;
        }
        self.events.publish(AgentEvent::SessionCreated {
            session_id: self.session_id.to_string(),
        });

        let task = task.into();
        let mut conversation = Conversation::new();
        conversation.push_system(system_prompt());

        let mut memory_state = MemoryState::new();
        if let Some(store) = &self.card_store {
            if let Ok(domains) = store.list_domains() {
                let candidate_domains: Vec<String> = domains.into_iter().map(|(d, _)| d).collect();
                if let Some(hint) = memory_integration::build_pre_recall_hint(
                    store,
                    &candidate_domains,
                    &task,
                    &mut memory_state,
                ) {
                    for domain in &candidate_domains {
                        if let Ok(card) = store.load(domain) {
                            if memory_state.already_injected(domain) {
                                self.events.publish(AgentEvent::MemoryRecall {
                                    domain: domain.clone(),
                                    pattern_count: card.patterns.len(),
                                });
                            }
                        }
                    }
                    conversation.push_user(format!("Relevant site memory:\n{hint}"));
                }
            }
        }
        conversation.push_user(&task);

        let outcome = self.drive(conversation, &task, memory_state).await;

        let mut state = self.state.lock().await;
        state.phase = Phase::Terminal;
        outcome
    }

    async fn drive(&self, mut conversation: Conversation, task: &str, mut memory_state: MemoryState) -> RunOutcome {
        let mut loop_detector = LoopDetector::new();
        let mut element_cache = ElementMapCache::new();
        let mut progress = ProgressEstimator::new();
        let mut subgoals = SubgoalChecklist::new();
        let mut trace: Vec<ToolUsageRecord> = Vec::new();
        let mut last_usage: Option<Usage> = None;
        let mut reminder_sent = false;

        loop {
            let iteration = {
                let mut state = self.state.lock().await;
                state.iteration += 1;
                state.iteration
            };

            if iteration > self.max_iterations {
                return self.finish(false, None, Some("iteration budget exhausted".to_string()), iteration, last_usage).await;
            }

            let remaining = self.max_iterations.saturating_sub(iteration);
            if remaining <= REMINDER_THRESHOLD && self.max_iterations > 3 && !reminder_sent {
                conversation.push_user(
                    "Only a couple of iterations remain. Call `done` with your best result now.",
                );
                reminder_sent = true;
            }

            let turn = match self.llm.complete(&conversation, &self.tools).await {
                Ok(turn) => turn,
                Err(e) => {
                    let consecutive = {
                        let mut state = self.state.lock().await;
                        state.consecutive_errors += 1;
                        state.consecutive_errors
                    };
                    match recovery::decide(
                        agentbrowse_types::ErrorCode::ExecutionError,
                        "llm_call",
                        consecutive,
                    ) {
                        RecoveryAction::Abort(reason) => {
                            self.events.publish(AgentEvent::Error {
                                code: "EXECUTION_ERROR".to_string(),
                                message: format!("{e}: {reason}"),
                            });
                            return self
                                .finish(false, None, Some(format!("{e}: {reason}")), iteration, last_usage)
                                .await;
                        }
                        RecoveryAction::Retry { delay_ms } => {
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                            continue;
                        }
                        RecoveryAction::InjectHint(hint) => {
                            conversation.push_user(hint);
                            continue;
                        }
                    }
                }
            };
            last_usage = turn.usage.or(last_usage);

            {
                let mut state = self.state.lock().await;
                state.consecutive_errors = 0;
            }

            self.events.publish(AgentEvent::Thinking { iteration });
            for completed in subgoals.scan(&turn.content) {
                self.events.publish(AgentEvent::SubgoalCompleted {
                    description: completed,
                });
            }
            conversation.push_assistant(turn.content.clone(), turn.tool_calls.clone());

            if turn.tool_calls.is_empty() {
                return self
                    .finish(
                        true,
                        Some(serde_json::Value::String(turn.content)),
                        None,
                        iteration,
                        last_usage,
                    )
                    .await;
            }

            let mut deferred_hints: Vec<String> = Vec::new();
            let mut terminal: Option<RunOutcome> = None;

            for mut call in turn.tool_calls {
                let Ok(name) = call.resolve_name() else {
                    conversation.push_tool_result(&call.id, "unknown tool");
                    continue;
                };

                if name == ToolName::Done {
                    let result = call.arguments.get("result").cloned();
                    conversation.push_tool_result(&call.id, "done");
                    terminal = Some(self.finish(true, result, None, iteration, last_usage).await);
                    break;
                }

                if name == ToolName::AskHuman {
                    let question = call
                        .arguments
                        .get("question")
                        .and_then(|v| v.as_str())
                        .unwrap_or("input required")
                        .to_string();
                    let fields = parse_input_fields(call.arguments.get("fields"));
                    let (_request_id, response) =
                        self.suspend_for_input(question.clone(), fields.clone()).await;
                    match response {
                        Some(answer) => {
                            let masked = mask_sensitive_fields(&answer, &fields);
                            self.events.publish(AgentEvent::ToolResult {
                                iteration,
                                tool_name: name.as_str().to_string(),
                                success: true,
                                content: masked.to_string(),
                            });
                            conversation.push_tool_result(&call.id, answer.to_string());
                        }
                        None => {
                            terminal = Some(
                                self.finish(
                                    false,
                                    None,
                                    Some(format!("timed out waiting for input: {question}")),
                                    iteration,
                                    last_usage,
                                )
                                .await,
                            );
                            break;
                        }
                    }
                    continue;
                }

                if name == ToolName::Navigate {
                    if let Some(store) = &self.card_store {
                        if let Some(url) = call.arguments.get("url").and_then(|v| v.as_str()) {
                            if let Some(hint) =
                                memory_integration::auto_recall(store, url, task, &mut memory_state)
                            {
                                if let Some(domain) = memory_integration::extract_host(url) {
                                    self.events.publish(AgentEvent::MemoryRecall {
                                        domain,
                                        pattern_count: hint.matches("\n- ").count(),
                                    });
                                }
                                deferred_hints.push(hint);
                            }
                        }
                    }
                }

                progress.record_tool_call();
                let signature = CallSignature::new(name.as_str(), &call.arguments);
                self.events.publish(AgentEvent::ToolCall {
                    iteration,
                    tool_name: name.as_str().to_string(),
                    arguments: call.arguments.clone(),
                });
                let outcome = self.tool_bus.dispatch(self.session_id, &mut call).await;
                trace.push(ToolUsageRecord {
                    tool_name: name.as_str().to_string(),
                    arguments: call.arguments.clone(),
                });

                let success = outcome.is_ok();
                deferred_hints.extend(loop_detector.record(signature, success));

                match outcome {
                    Ok(value) => {
                        let rendered = formatter::format_tool_result(
                            name.as_str(),
                            &value,
                            &mut element_cache,
                            &current_context_url(&value),
                        );
                        self.events.publish(AgentEvent::ToolResult {
                            iteration,
                            tool_name: name.as_str().to_string(),
                            success: true,
                            content: rendered.clone(),
                        });
                        conversation.push_tool_result(&call.id, rendered);
                    }
                    Err(err) => {
                        let consecutive = {
                            let mut state = self.state.lock().await;
                            state.consecutive_errors += 1;
                            state.consecutive_errors
                        };
                        self.events.publish(AgentEvent::ToolResult {
                            iteration,
                            tool_name: name.as_str().to_string(),
                            success: false,
                            content: err.to_string(),
                        });
                        conversation.push_tool_result(&call.id, err.to_string());
                        match recovery::decide(err.code, name.as_str(), consecutive) {
                            RecoveryAction::Abort(reason) => {
                                self.events.publish(AgentEvent::Error {
                                    code: err.code.to_string(),
                                    message: reason.clone(),
                                });
                                terminal = Some(
                                    self.finish(false, None, Some(reason), iteration, last_usage).await,
                                );
                                break;
                            }
                            RecoveryAction::Retry { .. } => {}
                            RecoveryAction::InjectHint(hint) => deferred_hints.push(hint),
                        }
                    }
                }
            }

            self.events.publish(AgentEvent::Progress {
                done_steps: progress.observations(),
                total_steps: subgoals.progress().1.max(progress.observations()),
            });

            if let Some(outcome) = terminal {
                if outcome.success {
                    if let Some(store) = &self.card_store {
                        if let Some(domain) = task_domain(task, &trace) {
                            let _ = memory_integration::capture_on_success(store, &domain, &trace, task);
                        }
                    }
                }
                return outcome;
            }

            conversation.push_deferred_hints(deferred_hints);
        }
    }

    async fn suspend_for_input(
        &self,
        question: String,
        fields: Vec<agentbrowse_types::events::InputField>,
    ) -> (String, Option<serde_json::Value>) {
        let (tx, rx) = oneshot::channel();
        let request_id = uuid::Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock().await;
            state.phase = Phase::SuspendedOnInput;
            state.pending_input = Some(PendingInput {
                request_id: request_id.clone(),
                responder: tx,
            });
        }
        self.events.publish(AgentEvent::InputRequired {
            request_id: request_id.clone(),
            question,
            fields,
        });

        let result = tokio::time::timeout(ASK_HUMAN_TIMEOUT, rx).await;

        {
            let mut state = self.state.lock().await;
            state.phase = Phase::Running;
            state.pending_input = None;
        }

        (request_id, result.ok().and_then(|r| r.ok()))
    }

    /// Resumes a loop suspended on `ask_human`. Returns `false` if no
    /// input is pending or the request id doesn't match.
    pub async fn resolve_input(&self, request_id: &str, response: serde_json::Value) -> bool {
        let mut state = self.state.lock().await;
        match state.pending_input.take() {
            Some(pending) if pending.request_id == request_id => {
                let _ = pending.responder.send(response);
                true
            }
            Some(pending) => {
                state.pending_input = Some(pending);
                false
            }
            None => false,
        }
    }

    /// Closes the bound session. Always safe to call, even on a loop
    /// that never ran (spec §4.2: "cleanup always closes the owned
    /// session").
    pub async fn cleanup(&self) {
        let _ = self.sessions.close(self.session_id).await;
    }

    async fn finish(
        &self,
        success: bool,
        result: Option<serde_json::Value>,
        error: Option<String>,
        iterations: u32,
        token_usage: Option<Usage>,
    ) -> RunOutcome {
        let mut state = self.state.lock().await;
        state.phase = Phase::Terminal;
        drop(state);
        self.events.publish(AgentEvent::Done {
            success,
            result: result.clone(),
        });
        RunOutcome {
            success,
            result,
            error,
            iterations,
            token_usage,
        }
    }
}

fn parse_input_fields(value: Option<&serde_json::Value>) -> Vec<agentbrowse_types::events::InputField> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let name = item.get("name")?.as_str()?.to_string();
                    let field_type = item
                        .get("type")
                        .and_then(|t| t.as_str())
                        .unwrap_or("text")
                        .to_string();
                    Some(agentbrowse_types::events::InputField { name, field_type })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Masks values for fields flagged `type = password` before they reach an
/// emitted event (spec §4.2: `ask_human` payloads are masked in events,
/// never in the conversation the LLM sees).
fn mask_sensitive_fields(
    answer: &serde_json::Value,
    fields: &[agentbrowse_types::events::InputField],
) -> serde_json::Value {
    let Some(obj) = answer.as_object() else {
        return answer.clone();
    };
    let mut masked = obj.clone();
    for field in fields.iter().filter(|f| f.is_sensitive()) {
        if masked.contains_key(&field.name) {
            masked.insert(field.name.clone(), serde_json::Value::String("***".to_string()));
        }
    }
    serde_json::Value::Object(masked)
}

fn current_context_url(value: &serde_json::Value) -> String {
    value
        .get("url")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Best-effort domain for capture: the last `navigate` target in the
/// trace, falling back to extracting one from the task text.
fn task_domain(task: &str, trace: &[ToolUsageRecord]) -> Option<String> {
    trace
        .iter()
        .rev()
        .find(|r| r.tool_name == "navigate")
        .and_then(|r| r.arguments.get("url").and_then(|v| v.as_str()))
        .and_then(|url| url.split("://").nth(1))
        .and_then(|rest| rest.split('/').next())
        .map(|host| host.to_string())
        .or_else(|| agentbrowse_site_memory::extract_domain_from_task(task))
}

fn system_prompt() -> &'static str {
    "You are an autonomous browsing agent. Use the available tools to \
     accomplish the user's task, then call `done` with the result. If you \
     need information only a human can provide, call `ask_human`."
}

fn default_tool_specs() -> Vec<ToolSpec> {
    let entries: &[(&str, &str)] = &[
        ("navigate", "Navigate the active tab to a URL."),
        ("get_page_info", "List interactive elements on the current page."),
        ("get_page_content", "Extract the visible text content of the current page."),
        ("click", "Click an element by its semantic id."),
        ("type_text", "Type text into an element by its semantic id."),
        ("press_key", "Press a keyboard key."),
        ("scroll", "Scroll the page in a direction."),
        ("go_back", "Navigate back in history."),
        ("find_element", "Find elements matching a natural-language query."),
        ("wait", "Wait for a condition or a fixed duration."),
        ("wait_for_stable", "Wait until the page is stable."),
        ("execute_javascript", "Run a JavaScript expression in the page."),
        ("select_option", "Select an option in a dropdown by semantic id."),
        ("hover", "Hover over an element by semantic id."),
        ("set_value", "Set a form field's value directly."),
        ("create_tab", "Open a new tab."),
        ("close_tab", "Close a tab."),
        ("switch_tab", "Switch the active tab."),
        ("list_tabs", "List open tabs."),
        ("screenshot", "Capture a screenshot of the current page."),
        ("handle_dialog", "Accept or dismiss a native dialog."),
        ("get_dialog_info", "Get the pending dialog, if any."),
        ("get_network_logs", "Get recent network request logs."),
        ("get_console_logs", "Get recent console messages."),
        ("upload_file", "Upload a file to a file input."),
        ("get_downloads", "List files downloaded this session."),
        ("done", "Signal the task is complete with a result."),
        ("ask_human", "Ask the human operator a question."),
    ];
    entries
        .iter()
        .map(|(name, description)| ToolSpec {
            kind: "function",
            function: ToolFunctionSpec {
                name: name.to_string(),
                description: description.to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_mentions_done_and_ask_human() {
        let prompt = system_prompt();
        assert!(prompt.contains("done"));
        assert!(prompt.contains("ask_human"));
    }

    #[test]
    fn default_tool_specs_cover_the_closed_tool_set() {
        let specs = default_tool_specs();
        assert_eq!(specs.len(), 27);
        assert!(specs.iter().any(|s| s.function.name == "done"));
    }

    #[test]
    fn task_domain_prefers_last_navigate_target() {
        let trace = vec![
            ToolUsageRecord {
                tool_name: "navigate".to_string(),
                arguments: serde_json::json!({"url": "https://first.example/a"}),
            },
            ToolUsageRecord {
                tool_name: "navigate".to_string(),
                arguments: serde_json::json!({"url": "https://second.example/b"}),
            },
        ];
        assert_eq!(task_domain("book a flight", &trace), Some("second.example".to_string()));
    }

    #[test]
    fn task_domain_falls_back_to_task_text() {
        let trace = Vec::new();
        assert_eq!(
            task_domain("search 淘宝 for shoes", &trace),
            Some("taobao.com".to_string())
        );
    }

    #[test]
    fn parse_input_fields_defaults_missing_type_to_text() {
        let raw = serde_json::json!([{"name": "pw", "type": "password"}, {"name": "note"}]);
        let fields = parse_input_fields(Some(&raw));
        assert_eq!(fields.len(), 2);
        assert!(fields[0].is_sensitive());
        assert!(!fields[1].is_sensitive());
    }

    #[test]
    fn mask_sensitive_fields_redacts_only_password_fields() {
        let answer = serde_json::json!({"pw": "hunter2", "username": "alice"});
        let fields = vec![
            agentbrowse_types::events::InputField {
                name: "pw".to_string(),
                field_type: "password".to_string(),
            },
            agentbrowse_types::events::InputField {
                name: "username".to_string(),
                field_type: "text".to_string(),
            },
        ];
        let masked = mask_sensitive_fields(&answer, &fields);
        assert_eq!(masked["pw"], "***");
        assert_eq!(masked["username"], "alice");
    }
}
