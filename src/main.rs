use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use scriptsmith::agent::{ConsoleOperator, LoopConfig, Operator, Outcome, PipelineConfig, RepairLoop};
use scriptsmith::llm::ollama::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL};
use scriptsmith::llm::openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use scriptsmith::llm::{
    load_api_key, CompletionClient, CompletionService, OllamaClient, OpenAiClient,
    DEFAULT_MAX_TOKENS,
};
use scriptsmith::metrics;
use scriptsmith::sandbox::{ExecutorConfig, PtyExecutor, DEFAULT_ARTIFACT_PATH};
use scriptsmith::tracing::{init_tracing, shutdown_tracing, LogConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Openai,
    Ollama,
}

/// Generate a Python script from a request, run it, and repair it until it works
#[derive(Debug, Parser)]
#[command(name = "scriptsmith", version)]
struct Cli {
    /// What the script should do (asked interactively when omitted)
    request: Option<String>,

    /// Completion backend
    #[arg(long, value_enum, default_value = "openai")]
    backend: Backend,

    /// Model name (defaults per backend)
    #[arg(long)]
    model: Option<String>,

    /// Backend base URL (defaults per backend)
    #[arg(long)]
    base_url: Option<String>,

    /// File holding the API key; OPENAI_API_KEY is used when it is missing
    #[arg(long, default_value = "apikey.txt")]
    api_key_file: PathBuf,

    /// Interpreter used to run the generated file
    #[arg(long, default_value = "python3")]
    interpreter: String,

    /// Where the generated code is written
    #[arg(long, default_value = DEFAULT_ARTIFACT_PATH)]
    artifact: PathBuf,

    /// Execution deadline in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Token budget per completion request
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Attempts per revision or generation before asking the operator
    #[arg(long, default_value_t = 3)]
    max_retries: usize,

    /// Run install commands and generated code without asking
    #[arg(long, short = 'y')]
    yes: bool,

    /// Log plans and raw responses
    #[arg(long)]
    debug: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Export spans to this OTLP endpoint
    #[arg(long)]
    otlp_endpoint: Option<String>,

    /// Write Prometheus metrics to this file on exit
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let log_config = LogConfig {
        debug: cli.debug,
        json: cli.log_json,
        otlp_endpoint: cli.otlp_endpoint.clone(),
    };
    init_tracing("scriptsmith", &log_config)?;

    let mut operator = ConsoleOperator;
    let request = match cli.request.clone() {
        Some(request) => request,
        None => operator.ask("Create a python script that can: ")?,
    };

    let executor = PtyExecutor::new(ExecutorConfig {
        artifact_path: cli.artifact.clone(),
        interpreter: cli.interpreter.clone(),
        timeout: Duration::from_secs(cli.timeout_secs),
        ..ExecutorConfig::default()
    });
    let config = LoopConfig {
        pipeline: PipelineConfig {
            max_tokens: cli.max_tokens,
            ..PipelineConfig::default()
        },
        max_revision_attempts: cli.max_retries,
        max_generation_attempts: cli.max_retries,
        confirm_installs: !cli.yes,
        confirm_execution: !cli.yes,
    };

    let result = match cli.backend {
        Backend::Openai => {
            let Some(api_key) = load_api_key(&cli.api_key_file) else {
                return Err(format!(
                    "No API key found. Put it in {} or set OPENAI_API_KEY.",
                    cli.api_key_file.display()
                )
                .into());
            };
            let service = OpenAiClient::new(
                cli.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE_URL),
                api_key,
                cli.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
            );
            run_session(service, executor, operator, config, &request).await
        }
        Backend::Ollama => {
            let service = OllamaClient::new(
                cli.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_BASE_URL),
                cli.model.as_deref().unwrap_or(DEFAULT_OLLAMA_MODEL),
            );
            run_session(service, executor, operator, config, &request).await
        }
    };

    if let Some(path) = &cli.metrics_out {
        let text = metrics::render().map_err(|e| e.to_string())?;
        std::fs::write(path, text)?;
    }
    shutdown_tracing(&log_config);
    result
}

async fn run_session<S: CompletionService>(
    service: S,
    executor: PtyExecutor,
    operator: ConsoleOperator,
    config: LoopConfig,
    request: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut repair = RepairLoop::new(CompletionClient::new(service), executor, operator, config);
    let report = repair.run(request).await?;

    if report.outcome == Outcome::Abandoned {
        eprintln!("Session ended without accepted code.");
    }
    tracing::info!(
        trace_id = %report.trace_id,
        calls = report.completion_calls,
        executions = report.executions,
        "Done"
    );
    Ok(())
}
