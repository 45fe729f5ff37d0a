//! Logging configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Environment variable selecting the log format.
pub const LOG_FORMAT_ENV: &str = "PSQL_AUDIT_LOG_FORMAT";
/// Environment variable selecting where audit records go.
pub const AUDIT_OUTPUT_ENV: &str = "PSQL_AUDIT_OUTPUT";

/// Output format of the process log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable lines for local debugging.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Destination of audit records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutput {
    /// Structured events in the process log.
    #[default]
    Tracing,
    /// Serialized audit records, one JSON object per line on stdout.
    Stdout,
}

impl FromStr for AuditOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tracing" | "log" => Ok(Self::Tracing),
            "stdout" | "console" => Ok(Self::Stdout),
            other => Err(format!("unknown audit output: {other}")),
        }
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter directive, used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Where audit records are written.
    #[serde(default)]
    pub audit_output: AuditOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
            audit_output: AuditOutput::default(),
        }
    }
}

impl LoggingConfig {
    /// Read overrides from the environment. Unset variables keep their
    /// defaults; unparsable values are an error.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        if let Some(output) = lookup(AUDIT_OUTPUT_ENV) {
            config.audit_output = output.parse()?;
        }
        Ok(config)
    }
}

fn default_filter() -> String {
    "info".to_string()
}
