//! Logging and optional OpenTelemetry export
//!
//! Console logs always go through `tracing-subscriber`. When an OTLP endpoint
//! is configured, spans are also exported so a session's `trace_id` can be
//! followed across completion calls and executions.
//!
//! ```text
//! scriptsmith ─→ fmt layer (stderr, text or JSON)
//!             └→ OTLP (gRPC) → OTel Collector → Tempo
//! ```

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging options, usually filled from the command line
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Raise the default level to debug (plans and raw responses are logged)
    pub debug: bool,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// OTLP collector endpoint; spans are only exported when set
    pub otlp_endpoint: Option<String>,
}

fn default_filter(debug: bool) -> EnvFilter {
    let directive = if debug { "warn,scriptsmith=debug" } else { "warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Initialize the tracing subsystem
///
/// Logs go to stderr so they don't interleave with operator prompts on stdout.
/// `RUST_LOG` overrides the default filter.
///
/// # Example
/// ```ignore
/// init_tracing("scriptsmith", &LogConfig::default())?;
/// ```
pub fn init_tracing(
    service_name: &str,
    config: &LogConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let otel_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint);

            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(
                    vec![
                        KeyValue::new("service.name", service_name.to_string()),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    ],
                )))
                .install_batch(runtime::Tokio)?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let (text_layer, json_layer) = if config.json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(default_filter(config.debug))
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(
        service = service_name,
        otlp = config.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "Tracing initialized"
    );

    Ok(())
}

/// Flush pending spans when OTLP export was enabled
pub fn shutdown_tracing(config: &LogConfig) {
    if config.otlp_endpoint.is_some() {
        opentelemetry::global::shutdown_tracer_provider();
        tracing::info!("OpenTelemetry tracing shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_config_is_quiet() {
        let config = LogConfig::default();
        assert!(!config.debug);
        assert!(!config.json);
        assert!(config.otlp_endpoint.is_none());
    }
}
