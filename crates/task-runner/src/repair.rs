//! Repair loop (spec §4.3): when verification fails, build a single
//! `agent_goal` step describing the missing fields and type mismatches
//! and re-run, bounded by `budget.maxRetries`. If repair yields no step
//! or retries are exhausted, the last verification result stands.

use crate::planner::Step;
use crate::verifier::{verify, VerificationResult};
use serde_json::Value;

/// Builds the single repair step for a failed verification, or `None`
/// when the result already passed (nothing to repair).
pub fn build_repair_step(result: &VerificationResult, goal: &str) -> Option<Step> {
    if result.pass {
        return None;
    }

    let mut parts = Vec::new();
    if !result.missing_fields.is_empty() {
        parts.push(format!("missing fields: {}", result.missing_fields.join(", ")));
    }
    if !result.type_mismatches.is_empty() {
        parts.push(format!("fields with the wrong type: {}", result.type_mismatches.join(", ")));
    }
    if parts.is_empty() {
        return None;
    }

    Some(Step::agent_goal(format!(
        "The previous attempt at \"{goal}\" produced an incomplete result ({}). Fix it and return the complete result.",
        parts.join("; ")
    )))
}

/// Runs `execute` up to `max_retries` additional times, re-verifying
/// against `schema` each time, stopping as soon as a pass is reached or
/// retries are exhausted. `execute` receives the repair step built from
/// the prior failure and returns the new result value.
pub async fn repair_until_pass<F, Fut>(
    schema: &Value,
    mut result: Value,
    goal: &str,
    max_retries: u32,
    mut execute: F,
) -> (Value, VerificationResult)
where
    F: FnMut(Step) -> Fut,
    Fut: std::future::Future<Output = Value>,
{
    let mut verification = verify(schema, &result);
    let mut attempts = 0;

    while !verification.pass && attempts < max_retries {
        let Some(step) = build_repair_step(&verification, goal) else {
            break;
        };
        result = execute(step).await;
        verification = verify(schema, &result);
        attempts += 1;
    }

    (result, verification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn price_schema() -> Value {
        json!({
            "type": "object",
            "required": ["price"],
            "properties": {"price": {"type": "number"}}
        })
    }

    #[test]
    fn passing_result_needs_no_repair_step() {
        let result = verify(&price_schema(), &json!({"price": 1.0}));
        assert!(build_repair_step(&result, "get price").is_none());
    }

    #[test]
    fn failing_result_describes_missing_and_mismatched_fields() {
        let result = verify(&price_schema(), &json!({}));
        let step = build_repair_step(&result, "get price").unwrap();
        match step {
            Step::AgentGoal { goal } => assert!(goal.contains("missing fields: price")),
            _ => panic!("expected an agent_goal step"),
        }
    }

    #[tokio::test]
    async fn repair_stops_as_soon_as_verification_passes() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let (result, verification) = repair_until_pass(&price_schema(), json!({}), "get price", 3, |_step| {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { json!({"price": 9.99}) }
        })
        .await;
        assert!(verification.pass);
        assert_eq!(result, json!({"price": 9.99}));
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repair_gives_up_after_max_retries_and_returns_last_result() {
        let (result, verification) = repair_until_pass(&price_schema(), json!({}), "get price", 2, |_step| async {
            json!({})
        })
        .await;
        assert!(!verification.pass);
        assert_eq!(result, json!({}));
    }
}
