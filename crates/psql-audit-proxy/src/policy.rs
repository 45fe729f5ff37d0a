//! Audit policy: which decoded frames become audit records.
//!
//! Only two messages are ever audited: simple queries from the client
//! (minus catalog introspection) and error responses from the server.

use psql_audit_core::Direction;
use psql_audit_log::{AuditEvent, AuditEventType};

use crate::frame::Frame;
use crate::identity::SessionIdentity;
use crate::message::MessageKind;

/// Queries touching the system catalog are driver/tool noise.
pub const CATALOG_MARKER: &str = "pg_catalog";

/// Decides per frame whether to produce an audit record.
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    client: String,
}

impl AuditPolicy {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
        }
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    /// Audit a typed client-to-server frame. `identity` is whatever the
    /// server-to-client pipeline has observed at this point.
    pub fn audit_client_frame(
        &self,
        frame: &Frame,
        identity: &SessionIdentity,
    ) -> Option<AuditEvent> {
        let tag = frame.tag()?;
        if MessageKind::classify(Direction::ClientToServer, tag) != MessageKind::Query {
            return None;
        }

        let query = clean_query_text(frame.payload());
        if query.contains(CATALOG_MARKER) {
            tracing::trace!(ip = %self.client, "skipping catalog query");
            return None;
        }

        Some(
            AuditEvent::builder(
                AuditEventType::QueryIssued,
                &self.client,
                frame.tag_char(),
                query,
            )
            .application_name(&identity.application_name)
            .user(&identity.authorized_user)
            .build(),
        )
    }

    /// Audit a typed server-to-client frame.
    pub fn audit_server_frame(&self, frame: &Frame) -> Option<AuditEvent> {
        let tag = frame.tag()?;
        if MessageKind::classify(Direction::ServerToClient, tag) != MessageKind::ErrorResponse {
            return None;
        }

        Some(AuditEvent::new(
            AuditEventType::ServerError,
            &self.client,
            frame.tag_char(),
            render_error_fields(frame.payload()),
        ))
    }
}

/// Lowercase query text with embedded NULs removed.
pub fn clean_query_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload)
        .to_lowercase()
        .replace('\0', "")
}

/// Error fields with NUL separators rendered as spaces.
pub fn render_error_fields(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).replace('\0', " ")
}
