//! Audit sink backends.

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType};
use async_trait::async_trait;
use std::sync::RwLock;

/// Trait for audit sinks.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Emit one audit record.
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Emits each record as a structured `tracing` event.
///
/// Queries are logged at INFO, server error responses at ERROR.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError> {
        match event.event_type {
            AuditEventType::QueryIssued => tracing::info!(
                ip = %event.client,
                app = event.application_name.as_deref().unwrap_or_default(),
                user = event.user.as_deref().unwrap_or_default(),
                message_type = %event.message_type,
                msg = %event.message,
                "{}",
                event.direction
            ),
            AuditEventType::ServerError => tracing::error!(
                ip = %event.client,
                msg = %event.message,
                "{}",
                event.direction
            ),
        }
        Ok(())
    }
}

/// Console sink (one JSON object per line on stdout).
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[async_trait]
impl AuditSink for ConsoleSink {
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError> {
        use tokio::io::AsyncWriteExt;

        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&line).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl AuditSink for NullSink {
    async fn emit(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Filter for querying a [`MemorySink`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event_type: Option<AuditEventType>,
    pub client: Option<String>,
}

impl AuditFilter {
    fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        if let Some(ref client) = self.client {
            if &event.client != client {
                return false;
            }
        }
        true
    }
}

/// Keeps records in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records emitted so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.query(&AuditFilter::default())
    }

    /// Records matching the filter.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEvent> {
        match self.events.read() {
            Ok(events) => events.iter().filter(|e| filter.matches(e)).cloned().collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect(),
        }
    }

    /// Number of records emitted so far.
    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn emit(&self, event: AuditEvent) -> Result<(), AuditError> {
        match self.events.write() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}
