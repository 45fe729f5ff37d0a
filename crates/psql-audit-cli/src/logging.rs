//! Process log and audit sink setup.

use std::sync::Arc;

use psql_audit_core::{AuditOutput, LogFormat, LoggingConfig};
use psql_audit_log::{AuditLogger, AuditSink, ConsoleSink, TracingSink};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured filter.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match config.format {
        LogFormat::Json => builder.json().with_current_span(false).init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Audit logger writing to the configured output.
pub fn audit_logger(config: &LoggingConfig) -> AuditLogger {
    let sink: Arc<dyn AuditSink> = match config.audit_output {
        AuditOutput::Tracing => Arc::new(TracingSink),
        AuditOutput::Stdout => Arc::new(ConsoleSink),
    };
    AuditLogger::new(sink)
}
