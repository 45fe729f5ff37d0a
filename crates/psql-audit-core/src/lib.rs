//! # psql-audit-core
//!
//! Configuration and shared vocabulary for the psql-audit proxy crates.

use serde::{Deserialize, Serialize};

// Configuration types shared across all psql-audit crates
pub mod config;

pub use config::{AuditOutput, LogFormat, LoggingConfig, ProxyConfig};

/// Direction of travel for bytes on a proxied connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Frontend bytes headed for the upstream server.
    ClientToServer,
    /// Backend bytes headed back to the client.
    ServerToClient,
}

impl Direction {
    /// Human-readable label used as the log message for audit lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::ClientToServer => "client to server",
            Self::ServerToClient => "server to client",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_labels() {
        assert_eq!(Direction::ClientToServer.to_string(), "client to server");
        assert_eq!(Direction::ServerToClient.label(), "server to client");
    }

    #[test]
    fn test_direction_serializes_snake_case() {
        let json = serde_json::to_string(&Direction::ServerToClient).unwrap();
        assert_eq!(json, "\"server_to_client\"");
    }
}
