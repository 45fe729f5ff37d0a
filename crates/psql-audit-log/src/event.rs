//! Audit event types.
//!
//! Fields follow: [direction - client - app - user - type - message].

use chrono::{DateTime, Utc};
use psql_audit_core::Direction;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Client sent a simple query.
    QueryIssued,
    /// Server answered with an ErrorResponse.
    ServerError,
}

impl AuditEventType {
    /// Direction the audited message travelled in.
    pub fn direction(self) -> Direction {
        match self {
            Self::QueryIssued => Direction::ClientToServer,
            Self::ServerError => Direction::ServerToClient,
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueryIssued => write!(f, "QUERY"),
            Self::ServerError => write!(f, "SERVER_ERROR"),
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event_type: AuditEventType,

    /// Direction of the audited message.
    pub direction: Direction,

    /// Client endpoint (peer address of the accepted socket).
    pub client: String,

    /// Application name as observed so far on the connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_name: Option<String>,

    /// Session user as observed so far on the connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Protocol message tag, e.g. "Q" or "E".
    pub message_type: String,

    /// Message text (cleaned query or rendered error fields).
    pub message: String,
}

impl AuditEvent {
    /// Create a new audit event with the given type and core fields.
    pub fn new(
        event_type: AuditEventType,
        client: impl Into<String>,
        message_type: char,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            direction: event_type.direction(),
            client: client.into(),
            application_name: None,
            user: None,
            message_type: message_type.to_string(),
            message: message.into(),
        }
    }

    /// Create a builder for an audit event.
    pub fn builder(
        event_type: AuditEventType,
        client: impl Into<String>,
        message_type: char,
        message: impl Into<String>,
    ) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type, client, message_type, message)
    }
}

/// Builder for creating audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    /// Create a new builder with required fields.
    pub fn new(
        event_type: AuditEventType,
        client: impl Into<String>,
        message_type: char,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event: AuditEvent::new(event_type, client, message_type, message),
        }
    }

    /// Set the application name.
    pub fn application_name(mut self, app: impl Into<String>) -> Self {
        self.event.application_name = Some(app.into());
        self
    }

    /// Set the session user.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.event.user = Some(user.into());
        self
    }

    /// Build the event.
    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_direction_follows_type() {
        let query = AuditEvent::new(AuditEventType::QueryIssued, "1.2.3.4:5", 'Q', "select 1");
        assert_eq!(query.direction, Direction::ClientToServer);

        let error = AuditEvent::new(AuditEventType::ServerError, "1.2.3.4:5", 'E', "boom");
        assert_eq!(error.direction, Direction::ServerToClient);
        assert_eq!(error.message_type, "E");
    }

    #[test]
    fn test_builder_sets_identity() {
        let event = AuditEvent::builder(AuditEventType::QueryIssued, "c", 'Q', "select 1")
            .application_name("psql")
            .user("alice")
            .build();
        assert_eq!(event.application_name.as_deref(), Some("psql"));
        assert_eq!(event.user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_error_event_omits_identity_in_json() {
        let event = AuditEvent::new(AuditEventType::ServerError, "c", 'E', "SERROR");
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("application_name").is_none());
        assert!(json.get("user").is_none());
        assert_eq!(json["event_type"], "server_error");
        assert_eq!(json["direction"], "server_to_client");
    }
}
