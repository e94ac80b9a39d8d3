//! rca-agent - run one root cause analysis task
//!
//! Reads a problem file, runs the agent against the configured model and
//! sandbox, and emits the run result as JSON.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::info;

use rca_agent::llm::prompt::{read_problem_file, task_question};
use rca_agent::{AgentConfig, AgentController};

#[derive(Debug, Parser)]
#[command(name = "rca-agent", version, about = "Find the root cause service of an incident")]
struct Args {
    /// Problem file: raw task text or a `TASK_DESCRIPTION = """..."""` assignment
    problem: PathBuf,

    /// Write the run result JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the model request budget
    #[arg(long)]
    max_turns: Option<usize>,

    /// Emit log events as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// OTLP collector endpoint; spans are exported when set
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    match &args.otlp_endpoint {
        Some(endpoint) => rca_agent::tracing::init_tracing("rca-agent", Some(endpoint))
            .map_err(|e| anyhow!("failed to initialize tracing: {}", e))?,
        None => rca_agent::tracing::init_logging(args.json_logs)
            .map_err(|e| anyhow!("failed to initialize logging: {}", e))?,
    }

    let mut config = AgentConfig::from_env().context("invalid configuration")?;
    if let Some(max_turns) = args.max_turns {
        config.max_turns = max_turns;
        config.validate().context("invalid --max-turns")?;
    }

    let problem = read_problem_file(&args.problem)
        .with_context(|| format!("failed to read problem file {}", args.problem.display()))?;
    let question = task_question(&problem, &config.tools.data_dir);

    info!(
        problem = %args.problem.display(),
        model = %config.llm.model,
        sandbox = %config.sandbox_endpoint,
        "Starting root cause analysis"
    );

    let controller = AgentController::from_config(config).context("failed to build model client")?;
    let result = controller.run(&question).await;

    eprintln!("Root cause service: {}", result.prediction);

    let json = serde_json::to_string_pretty(&result).context("failed to serialize run result")?;
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }

    if args.otlp_endpoint.is_some() {
        rca_agent::tracing::shutdown_tracing();
    }

    Ok(())
}
