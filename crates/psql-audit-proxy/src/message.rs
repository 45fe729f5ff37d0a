//! Message classification.
//!
//! Tag bytes are decoded once into a [`MessageKind`]. The same byte means
//! different things per direction (`E` is Execute from the client but
//! ErrorResponse from the server), so classification needs the direction.

use psql_audit_core::Direction;

/// Protocol code carried by an SSLRequest.
pub const SSL_REQUEST_CODE: u32 = 80877103;
/// Protocol code carried by a GSSENCRequest.
pub const GSSENC_REQUEST_CODE: u32 = 80877104;
/// Protocol code carried by a CancelRequest.
pub const CANCEL_REQUEST_CODE: u32 = 80877102;

/// Kinds of typed messages the proxy acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Simple query (`Q`, client to server).
    Query,
    /// ParameterStatus (`S`, server to client).
    ParameterStatus,
    /// ErrorResponse (`E`, server to client).
    ErrorResponse,
    /// Anything else; consumed and ignored.
    Other(u8),
}

impl MessageKind {
    pub fn classify(direction: Direction, tag: u8) -> Self {
        match (direction, tag) {
            (Direction::ClientToServer, b'Q') => Self::Query,
            (Direction::ServerToClient, b'S') => Self::ParameterStatus,
            (Direction::ServerToClient, b'E') => Self::ErrorResponse,
            (_, other) => Self::Other(other),
        }
    }
}

/// What the first untyped client frame asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupRequest {
    SslRequest,
    GssEncRequest,
    CancelRequest,
    /// A StartupMessage for the given protocol version.
    Protocol { major: u16, minor: u16 },
}

impl StartupRequest {
    pub fn from_code(code: u32) -> Self {
        match code {
            SSL_REQUEST_CODE => Self::SslRequest,
            GSSENC_REQUEST_CODE => Self::GssEncRequest,
            CANCEL_REQUEST_CODE => Self::CancelRequest,
            version => Self::Protocol {
                major: (version >> 16) as u16,
                minor: (version & 0xffff) as u16,
            },
        }
    }

    /// Classify an untyped frame payload. `None` if it is shorter than the
    /// 4-byte code.
    pub fn from_payload(payload: &[u8]) -> Option<(u32, Self)> {
        let code = u32::from_be_bytes(payload.get(..4)?.try_into().ok()?);
        Some((code, Self::from_code(code)))
    }
}

/// Key/value pairs of a StartupMessage payload (after the version word).
///
/// Parsing stops at the terminating empty key or at a dangling key without
/// a value.
pub fn startup_parameters(payload: &[u8]) -> Vec<(String, String)> {
    let Some(body) = payload.get(4..) else {
        return Vec::new();
    };

    let mut fields = body.split(|b| *b == 0);
    let mut params = Vec::new();
    while let Some(key) = fields.next() {
        if key.is_empty() {
            break;
        }
        let Some(value) = fields.next() else {
            break;
        };
        params.push((
            String::from_utf8_lossy(key).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        ));
    }
    params
}
