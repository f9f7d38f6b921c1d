//! Prometheus metrics for a generation session
//!
//! Registered in the default registry on first use. The authoritative
//! per-session call count lives on `CompletionClient`; these counters are
//! for observability only and may span several sessions in one process.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Encoder, Histogram,
    HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Completion Service Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Completion requests by backend and outcome.
    ///
    /// Labels:
    /// - backend: "openai", "ollama", or a test double's name
    /// - status: "ok", "empty" or "error"
    pub static ref COMPLETION_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "scriptsmith_completion_requests_total",
        "Completion service requests by backend and outcome",
        &["backend", "status"]
    ).expect("failed to register COMPLETION_REQUESTS metric");

    /// Completion request latency in seconds.
    pub static ref COMPLETION_DURATION: HistogramVec = register_histogram_vec!(
        "scriptsmith_completion_duration_seconds",
        "Completion service request latency",
        &["backend"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).expect("failed to register COMPLETION_DURATION metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Execution Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Artifact executions by verdict (clean, error_signature, timed_out, failed).
    pub static ref CODE_EXECUTIONS: IntCounterVec = register_int_counter_vec!(
        "scriptsmith_code_executions_total",
        "Generated code executions by verdict",
        &["verdict"]
    ).expect("failed to register CODE_EXECUTIONS metric");

    /// Wall-clock duration of artifact executions in seconds.
    pub static ref CODE_EXECUTION_DURATION: Histogram = register_histogram!(
        "scriptsmith_code_execution_duration_seconds",
        "Generated code execution duration",
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]
    ).expect("failed to register CODE_EXECUTION_DURATION metric");

    /// Installation commands by result (succeeded, failed).
    pub static ref INSTALL_COMMANDS: IntCounterVec = register_int_counter_vec!(
        "scriptsmith_install_commands_total",
        "Installation commands run by result",
        &["result"]
    ).expect("failed to register INSTALL_COMMANDS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Repair Loop Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Repair rounds by path.
    ///
    /// Labels:
    /// - path: "revision" (operator feedback) or "regeneration" (error-driven)
    pub static ref REPAIR_ROUNDS: IntCounterVec = register_int_counter_vec!(
        "scriptsmith_repair_rounds_total",
        "Repair rounds by path",
        &["path"]
    ).expect("failed to register REPAIR_ROUNDS metric");
}

/// Encode every registered metric in the Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_metrics() {
        REPAIR_ROUNDS.with_label_values(&["revision"]).inc();
        let text = render().unwrap();
        assert!(text.contains("scriptsmith_repair_rounds_total"));
    }
}
