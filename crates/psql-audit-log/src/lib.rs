//! # psql-audit-log
//!
//! Audit records for the psql-audit proxy.
//!
//! The proxy only ever produces two kinds of records:
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `QueryIssued` | A client sent a simple query |
//! | `ServerError` | The server answered with an ErrorResponse |
//!
//! Records are handed to an [`AuditSink`]. The default [`TracingSink`]
//! turns each record into one structured `tracing` event, so the audit
//! trail ends up wherever the process log goes.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use psql_audit_log::{AuditEvent, AuditEventType, AuditLogger, TracingSink};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let logger = AuditLogger::new(Arc::new(TracingSink));
//! let event = AuditEvent::builder(
//!     AuditEventType::QueryIssued,
//!     "10.0.0.7:51234",
//!     'Q',
//!     "select * from orders",
//! )
//! .application_name("psql")
//! .user("alice")
//! .build();
//! logger.log(event).await;
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod sink;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::AuditLogger;
pub use sink::{AuditFilter, AuditSink, ConsoleSink, MemorySink, NullSink, TracingSink};
