//! agentbrowse CLI — drives an agent run or a task run locally, without
//! the HTTP server, printing events/results to stdout.

use agentbrowse_agent_loop::{AgentLoop, LlmClient, LlmConfig};
use agentbrowse_browser_session::{CookieStore, SessionManager};
use agentbrowse_site_memory::CardStore;
use agentbrowse_task_runner::{planner, templates, Budget, Step, TaskSpec};
use agentbrowse_types::SessionId;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agentbrowse", version, about = "Run the browsing agent or a task template locally")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Run the browser headlessly (default: true).
    #[arg(long, default_value_t = true, global = true)]
    headless: bool,

    /// OpenAI-compatible LLM base URL.
    #[arg(long, default_value = "https://api.openai.com/v1", global = true)]
    llm_base_url: String,

    /// LLM model name.
    #[arg(long, default_value = "gpt-4o", global = true)]
    llm_model: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs the reason-act agent loop on a natural-language task.
    Agent {
        task: String,
        #[arg(long)]
        max_iterations: Option<u32>,
    },
    /// Plans and runs a single task (template or agent_goal) to completion.
    Task {
        goal: String,
        /// JSON object of template inputs, e.g. '{"urls": ["https://a", "https://b"]}'
        #[arg(long, default_value = "{}")]
        inputs: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let llm = LlmClient::new(LlmConfig {
        base_url: cli.llm_base_url,
        api_key: std::env::var("AGENTBROWSE_LLM_API_KEY").unwrap_or_default(),
        model: cli.llm_model,
    });
    let sessions = SessionManager::new(CookieStore::new());
    let card_store = CardStore::new(None).ok().map(std::sync::Arc::new);
    let session_id = sessions.create(cli.headless).await?;

    match cli.command {
        Command::Agent { task, max_iterations } => {
            run_agent(sessions, session_id, llm, card_store, task, max_iterations).await?
        }
        Command::Task { goal, inputs } => run_task(sessions, session_id, llm, card_store, goal, inputs).await?,
    }

    Ok(())
}

async fn run_agent(
    sessions: SessionManager,
    session_id: SessionId,
    llm: LlmClient,
    card_store: Option<std::sync::Arc<CardStore>>,
    task: String,
    max_iterations: Option<u32>,
) -> anyhow::Result<()> {
    let mut agent = AgentLoop::new(session_id, sessions, llm, card_store);
    if let Some(n) = max_iterations {
        agent = agent.with_max_iterations(n);
    }

    let outcome = agent.run(task).await;
    agent.cleanup().await;

    if outcome.success {
        println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    } else {
        eprintln!("agent run failed: {}", outcome.error.unwrap_or_default());
        std::process::exit(1);
    }
    Ok(())
}

async fn run_task(
    sessions: SessionManager,
    session_id: SessionId,
    llm: LlmClient,
    card_store: Option<std::sync::Arc<CardStore>>,
    goal: String,
    inputs: String,
) -> anyhow::Result<()> {
    let inputs: serde_json::Value = serde_json::from_str(&inputs)?;
    let task_spec = TaskSpec {
        goal: goal.clone(),
        inputs,
        constraints: None,
        output_schema: None,
        budget: Budget::default(),
    };

    let steps = planner::plan_with_llm_fallback(&task_spec, Some(&llm)).await;
    let mut result = serde_json::json!({"success": false, "error": "no steps planned"});
    for step in steps {
        result = execute_step(step, &sessions, session_id, &llm, &card_store).await;
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn execute_step(
    step: Step,
    sessions: &SessionManager,
    session_id: SessionId,
    llm: &LlmClient,
    card_store: &Option<std::sync::Arc<CardStore>>,
) -> serde_json::Value {
    match step {
        Step::Template { template_id, inputs } => match template_id.as_str() {
            "batch_extract" => {
                let urls: Vec<String> = inputs
                    .get("urls")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let outcomes = templates::run_batch_extract(sessions, session_id, &urls, None).await;
                serde_json::json!({"results": outcomes})
            }
            "multi_tab_compare" => {
                let urls: Vec<String> = inputs
                    .get("urls")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                match templates::run_multi_tab_compare(sessions, session_id, &urls, None).await {
                    Ok(result) => serde_json::json!({"success": true, "result": result}),
                    Err(e) => serde_json::json!({"success": false, "error": e}),
                }
            }
            "login_session" => {
                let login_input = templates::login_session::LoginInput {
                    url: inputs.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    username: inputs.get("username").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    password: inputs.get("password").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    username_selector: inputs.get("username_selector").and_then(|v| v.as_str()).map(String::from),
                    password_selector: inputs.get("password_selector").and_then(|v| v.as_str()).map(String::from),
                    submit_selector: inputs.get("submit_selector").and_then(|v| v.as_str()).map(String::from),
                    success_selector: inputs.get("success_selector").and_then(|v| v.as_str()).map(String::from),
                    success_url_contains: inputs
                        .get("success_url_contains")
                        .and_then(|v| v.as_str())
                        .map(String::from),
                };
                match templates::run_login_session(sessions, session_id, &login_input).await {
                    Ok(result) => serde_json::json!({"success": true, "result": result}),
                    Err(e) => serde_json::json!({"success": false, "error": e}),
                }
            }
            other => serde_json::json!({"success": false, "error": format!("unknown template {other}")}),
        },
        Step::AgentGoal { goal } => {
            let agent = AgentLoop::new(session_id, sessions.clone(), llm.clone(), card_store.clone());
            let outcome = agent.run(goal).await;
            agent.cleanup().await;
            serde_json::json!({"success": outcome.success, "result": outcome.result, "error": outcome.error})
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
