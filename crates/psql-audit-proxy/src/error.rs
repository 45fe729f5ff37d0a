//! Error types for the proxy crate.

use thiserror::Error;

/// Errors that end a proxy or a single session.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Failed to bind to the listen address.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept a connection.
    #[error("failed to accept connection: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Failed to connect to the upstream server.
    #[error("failed to connect to upstream {address}: {source}")]
    UpstreamConnectionFailed {
        address: String,
        source: std::io::Error,
    },
}

/// Errors that end a single observation pipeline.
///
/// These never reach the forwarding path.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Reading from the tapped stream failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a frame.
    #[error("stream ended mid-frame: expected {expected} bytes, read {read}")]
    Truncated { expected: usize, read: usize },

    /// The length word is smaller than the length word itself.
    #[error("invalid frame length: {0}")]
    InvalidLength(i32),

    /// The length word exceeds the configured maximum.
    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },
}
