//! agentbrowse-server — HTTP/SSE transport for the agent loop and task
//! runner (spec §6).

use agentbrowse_server::Config;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "agentbrowse-server", version, about = "Runs the agentbrowse HTTP/SSE server")]
struct Cli {
    /// Run with permissive, localhost-only development defaults.
    #[arg(long)]
    dev: bool,

    /// Path to a TOML configuration file. Defaults to ./config.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = if let Some(path) = cli.config {
        Config::from_file(path)?
    } else if cli.dev {
        Config::dev_default()
    } else {
        Config::from_file("config.toml")?
    };

    init_logging(&config);

    agentbrowse_server::server::run(config).await?;
    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.pretty_print {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }
}
