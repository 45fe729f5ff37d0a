//! Audit logger implementation.
//!
//! Provides the `AuditLogger` handle every connection emits through.

use std::sync::Arc;

use crate::event::AuditEvent;
use crate::sink::{AuditSink, NullSink, TracingSink};

/// The audit logger handed to every connection.
///
/// Emission is best-effort: a failing sink is reported at WARN and the
/// caller carries on, so an audit fault never reaches the proxied traffic.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger").finish_non_exhaustive()
    }
}

impl AuditLogger {
    /// Create a logger writing to the given sink.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink))
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) {
        let event_id = event.event_id;
        if let Err(e) = self.sink.emit(event).await {
            tracing::warn!(event_id = %event_id, error = %e, "failed to emit audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::event::AuditEventType;
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn emit(&self, _event: AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::IoError(std::io::Error::other("disk full")))
        }
    }

    fn query_event() -> AuditEvent {
        AuditEvent::builder(AuditEventType::QueryIssued, "10.0.0.1:4000", 'Q', "select * from orders")
            .application_name("myapp")
            .user("alice")
            .build()
    }

    #[tokio::test]
    async fn test_disabled_logger() {
        let logger = AuditLogger::disabled();

        // Should not panic even when logging
        logger.log(query_event()).await;
    }

    #[traced_test]
    #[tokio::test]
    async fn test_failing_sink_is_swallowed() {
        let logger = AuditLogger::new(Arc::new(FailingSink));
        logger
            .log(AuditEvent::new(AuditEventType::ServerError, "c", 'E', "SERROR"))
            .await;
        assert!(logs_contain("failed to emit audit event"));
        assert!(logs_contain("disk full"));
    }

    #[tokio::test]
    async fn test_log_keeps_emission_order() {
        let sink = Arc::new(MemorySink::new());
        let logger = AuditLogger::new(sink.clone());

        logger.log(query_event()).await;
        logger
            .log(AuditEvent::new(
                AuditEventType::ServerError,
                "10.0.0.1:4000",
                'E',
                "SERROR C42P01",
            ))
            .await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::QueryIssued);
        assert_eq!(events[0].application_name.as_deref(), Some("myapp"));
        assert_eq!(events[0].user.as_deref(), Some("alice"));
        assert_eq!(events[0].message, "select * from orders");
        assert_eq!(events[1].event_type, AuditEventType::ServerError);
        assert_eq!(events[1].message_type, "E");
    }
}
