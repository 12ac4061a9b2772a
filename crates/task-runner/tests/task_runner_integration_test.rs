use agentbrowse_task_runner::planner::{plan, Budget, TaskSpec};
use agentbrowse_task_runner::repair::{build_repair_step, repair_until_pass};
use agentbrowse_task_runner::run_manager::{RunManager, RunMeta, DEFAULT_CONCURRENCY};
use agentbrowse_task_runner::verifier::verify;
use agentbrowse_task_runner::{ArtifactStore, RunStatus};
use serde_json::json;
use std::sync::Arc;

fn schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["price"],
        "properties": {"price": {"type": "number"}}
    })
}

#[test]
fn planner_selects_batch_extract_then_repair_describes_the_failure() {
    let task = TaskSpec {
        goal: "extract the price from this page".to_string(),
        inputs: json!({"urls": ["https://example.test/product"]}),
        constraints: None,
        output_schema: Some(schema()),
        budget: Budget {
            max_retries: 2,
            timeout_secs: None,
        },
    };
    let steps = plan(&task);
    assert_eq!(steps.len(), 1);

    let failed = verify(&schema(), &json!({}));
    let repair = build_repair_step(&failed, &task.goal).unwrap();
    match repair {
        agentbrowse_task_runner::planner::Step::AgentGoal { goal } => {
            assert!(goal.contains("missing fields"));
        }
        _ => panic!("expected an agent_goal repair step"),
    }
}

#[tokio::test]
async fn repair_loop_eventually_passes_and_run_manager_reports_succeeded() {
    let manager = RunManager::new(DEFAULT_CONCURRENCY, Arc::new(ArtifactStore::new()));

    let (result, verification) = repair_until_pass(&schema(), json!({}), "get price", 3, |_step| async {
        json!({"price": 12.99})
    })
    .await;
    assert!(verification.pass);

    let run_id = manager
        .submit(
            RunMeta::default(),
            move |_handle| async move { json!({"success": verification.pass && result["price"].is_number()}) },
            None,
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let run = manager.get(&run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
}
