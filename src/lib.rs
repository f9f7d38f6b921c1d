//! Scriptsmith - supervised generate/execute/repair loop for model-written code
//!
//! This library turns a natural-language request into a runnable program by
//! asking a text-completion service for a plan, install commands and code,
//! then running the code behind a pseudo-terminal and repairing it until the
//! operator is happy with the output.
//!
//! # Modules
//!
//! - `agent` - the repair loop state machine, generation pipeline and operator prompts
//! - `extract` - heuristic extraction of commands and code from free-form responses
//! - `sandbox` - pty-backed execution with a deadline, and the install runner
//! - `llm` - completion service backends (OpenAI-compatible, Ollama) and the counting client
//! - `metrics` - Prometheus metrics for observability
//! - `tracing` - logging and optional OTLP export
//!
//! # Quick Start
//!
//! ```ignore
//! use scriptsmith::agent::{ConsoleOperator, LoopConfig, RepairLoop};
//! use scriptsmith::llm::{CompletionClient, OllamaClient};
//! use scriptsmith::sandbox::PtyExecutor;
//!
//! let client = CompletionClient::new(OllamaClient::new("http://localhost:11434", "qwen3"));
//! let mut repair = RepairLoop::new(client, PtyExecutor::default(), ConsoleOperator, LoopConfig::default());
//! let report = repair.run("list files in the current directory").await?;
//! println!("{} completion calls", report.completion_calls);
//! ```

pub mod agent;
pub mod extract;
pub mod llm;
pub mod metrics;
pub mod sandbox;
pub mod tracing;

// Re-export commonly used types at crate root for convenience
pub use agent::{LoopConfig, Outcome, RepairLoop, SessionReport};
pub use extract::{extract, ExtractionMode, InstallSet};
pub use sandbox::{ExecutionResult, PtyExecutor};
