//! Proxy configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for the auditing proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address clients connect to, e.g. "0.0.0.0:6432".
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Address of the upstream PostgreSQL server.
    #[serde(default = "default_upstream_addr")]
    pub upstream_addr: String,

    /// Whether the proxied server negotiates TLS.
    ///
    /// When `false` the client sends an SSLRequest, the server answers with
    /// a single `N` byte and the client follows up with its StartupMessage
    /// in clear text. The decoders account for those extra bytes.
    #[serde(default)]
    pub encryption_negotiation: bool,

    /// Largest frame (in bytes, including the length word) the decoders
    /// accept before giving up on a stream.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_addr: default_upstream_addr(),
            encryption_negotiation: false,
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl ProxyConfig {
    /// Build a configuration from the three startup parameters.
    pub fn new(
        listen_addr: impl Into<String>,
        upstream_addr: impl Into<String>,
        encryption_negotiation: bool,
    ) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            upstream_addr: upstream_addr.into(),
            encryption_negotiation,
            ..Default::default()
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0:6432".to_string()
}

fn default_upstream_addr() -> String {
    "0.0.0.0:5432".to_string()
}

fn default_max_frame_size() -> usize {
    16 * 1024 * 1024
}
