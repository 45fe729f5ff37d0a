//! # psql-audit-proxy
//!
//! Passive auditing proxy for the PostgreSQL wire protocol.
//!
//! Bytes are forwarded untouched in both directions. A copy of each
//! direction is decoded on a separate task to:
//! - Track `application_name` and the session user from ParameterStatus
//! - Audit simple queries (catalog queries excluded)
//! - Audit server error responses
//!
//! ## Architecture
//!
//! ```text
//! client ──► tee ──────────────────────► server
//!             └─► decoder ─► AuditPolicy (queries)
//!                                ▲ identity (watch)
//! client ◄────────────────── tee ◄── server
//!                             └─► decoder ─► MetadataExtractor
//!                                          └► AuditPolicy (errors)
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use psql_audit_core::ProxyConfig;
//! use psql_audit_log::AuditLogger;
//! use psql_audit_proxy::AuditProxy;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ProxyConfig::new("0.0.0.0:6432", "127.0.0.1:5432", false);
//!     let proxy = AuditProxy::new(config, AuditLogger::default());
//!     proxy.run().await?;
//!     Ok(())
//! }
//! ```

pub mod decoder;
pub mod error;
pub mod extractor;
pub mod frame;
pub mod identity;
pub mod message;
pub mod pipeline;
pub mod policy;
pub mod proxy;
pub mod session;
pub mod startup;
pub mod tee;

pub use decoder::{Decoded, StreamDecoder};
pub use error::{DecodeError, ProxyError};
pub use extractor::MetadataExtractor;
pub use frame::{Frame, FrameReader};
pub use identity::{IdentityReader, IdentityWriter, SessionIdentity, identity_channel};
pub use message::MessageKind;
pub use policy::AuditPolicy;
pub use proxy::AuditProxy;
pub use session::{ConnectionSession, SessionState, SessionSummary};
pub use startup::{EncryptionNegotiation, StartupPhase};
