//! Startup phase state machine.
//!
//! Before the first typed message each direction carries a fixed number of
//! bytes that do not follow typed framing. How many depends on the
//! direction and on whether the server negotiates TLS:
//!
//! | direction        | negotiation | phases                                   |
//! |------------------|-------------|------------------------------------------|
//! | client to server | disabled    | `Initial` -> `SecondUntyped` -> `Typed`  |
//! | client to server | enabled     | `Initial` -> `Typed`                     |
//! | server to client | disabled    | `NegotiationByte` -> `Typed`             |
//! | server to client | enabled     | `Typed`                                  |
//!
//! Without negotiation the client opens with an SSLRequest, the server
//! answers with a single byte and the client then sends its StartupMessage,
//! hence the second untyped frame and the one discarded server byte.

use psql_audit_core::Direction;

/// Whether the proxied server negotiates transport encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionNegotiation {
    Enabled,
    Disabled,
}

impl From<bool> for EncryptionNegotiation {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}

/// What the decoder reads while in a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStep {
    /// Read one untyped frame.
    Untyped,
    /// Drop a single byte (the server's answer to an SSLRequest).
    DiscardByte,
    /// Read typed frames until the stream ends.
    Typed,
}

/// Position of a decoder in its startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    /// First client frame (SSLRequest or StartupMessage).
    Initial,
    /// StartupMessage following an unencrypted SSLRequest round trip.
    SecondUntyped,
    /// Server reply to the SSLRequest.
    NegotiationByte,
    /// Startup is over.
    Typed,
}

impl StartupPhase {
    /// Entry phase for a direction.
    pub fn start(direction: Direction, negotiation: EncryptionNegotiation) -> Self {
        match (direction, negotiation) {
            (Direction::ClientToServer, _) => Self::Initial,
            (Direction::ServerToClient, EncryptionNegotiation::Disabled) => Self::NegotiationByte,
            (Direction::ServerToClient, EncryptionNegotiation::Enabled) => Self::Typed,
        }
    }

    /// Phase that follows a completed read in `self`.
    pub fn next(self, negotiation: EncryptionNegotiation) -> Self {
        match (self, negotiation) {
            (Self::Initial, EncryptionNegotiation::Disabled) => Self::SecondUntyped,
            (Self::Initial, EncryptionNegotiation::Enabled) => Self::Typed,
            (Self::SecondUntyped | Self::NegotiationByte | Self::Typed, _) => Self::Typed,
        }
    }

    pub fn step(self) -> StartupStep {
        match self {
            Self::Initial | Self::SecondUntyped => StartupStep::Untyped,
            Self::NegotiationByte => StartupStep::DiscardByte,
            Self::Typed => StartupStep::Typed,
        }
    }

    /// Whether untyped startup bytes are still expected.
    pub fn is_startup(self) -> bool {
        self != Self::Typed
    }
}
