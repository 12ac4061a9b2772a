use agentbrowse_agent_loop::detection::{CallSignature, LoopDetector};
use agentbrowse_agent_loop::events::EventBus;
use agentbrowse_agent_loop::recovery::{self, RecoveryAction};
use agentbrowse_agent_loop::{Conversation, Role};
use agentbrowse_types::events::AgentEvent;
use agentbrowse_types::ErrorCode;

#[test]
fn repeated_failed_tool_calls_escalate_from_hint_to_abort() {
    let mut detector = LoopDetector::new();
    let args = serde_json::json!({"elementId": "e1"});

    let hints_first = detector.record(CallSignature::new("click", &args), false);
    assert!(hints_first.is_empty());

    let hints_second = detector.record(CallSignature::new("click", &args), false);
    assert!(!hints_second.is_empty(), "futile-retry hint should fire on the second identical failure");

    let mut consecutive = 0;
    let mut last_action = None;
    for _ in 0..6 {
        consecutive += 1;
        last_action = Some(recovery::decide(ErrorCode::ElementNotFound, "click", consecutive));
    }
    assert!(matches!(last_action, Some(RecoveryAction::Abort(_))));
}

#[test]
fn conversation_stays_contiguous_across_a_full_tool_turn() {
    let mut conversation = Conversation::new();
    conversation.push_system("system prompt");
    conversation.push_user("book a flight");

    let call = agentbrowse_types::ToolCall {
        id: "call-1".to_string(),
        name: "navigate".to_string(),
        arguments: serde_json::json!({"url": "https://example.com"}),
    };
    conversation.push_assistant(String::new(), vec![call]);
    conversation.push_tool_result("call-1", "navigated");
    conversation.push_deferred_hints(vec!["consider checking site memory".to_string()]);

    assert!(conversation.is_contiguous());
    assert_eq!(conversation.messages().last().unwrap().role, Role::User);
}

#[test]
fn event_bus_replays_session_lifecycle_atomically() {
    let bus = EventBus::new();
    bus.publish(AgentEvent::SessionCreated {
        session_id: "sess-1".to_string(),
    });
    bus.publish(AgentEvent::Thinking { iteration: 1 });
    bus.publish(AgentEvent::Done {
        success: true,
        result: Some(serde_json::json!({"ok": true})),
    });

    let (buffered, _rx) = bus.subscribe();
    assert_eq!(buffered.len(), 3);
    assert!(buffered.last().unwrap().is_terminal());
}
