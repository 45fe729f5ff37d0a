//! Session identity shared between the two pipelines of a connection.
//!
//! The server-to-client pipeline is the only writer; the client-to-server
//! pipeline reads whatever has been observed so far. Readers never wait
//! for the writer, so a query can be audited with an identity that lags
//! behind a ParameterStatus still in flight on the other direction.

use tokio::sync::watch;

/// Value of an identity field before anything has been observed.
pub const UNOBSERVED: &str = "";

/// Identity observed on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub application_name: String,
    pub authorized_user: String,
    /// Number of updates applied so far. Zero means nothing observed yet.
    pub revision: u64,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self {
            application_name: UNOBSERVED.to_string(),
            authorized_user: UNOBSERVED.to_string(),
            revision: 0,
        }
    }
}

/// Create the writer/reader pair for a new connection.
pub fn identity_channel() -> (IdentityWriter, IdentityReader) {
    let (tx, rx) = watch::channel(SessionIdentity::default());
    (IdentityWriter { tx }, IdentityReader { rx })
}

/// Write half, owned by the server-to-client pipeline.
#[derive(Debug)]
pub struct IdentityWriter {
    tx: watch::Sender<SessionIdentity>,
}

impl IdentityWriter {
    pub fn set_application_name(&self, name: &str) {
        self.tx.send_modify(|identity| {
            identity.application_name = name.to_string();
            identity.revision += 1;
        });
    }

    pub fn set_authorized_user(&self, user: &str) {
        self.tx.send_modify(|identity| {
            identity.authorized_user = user.to_string();
            identity.revision += 1;
        });
    }
}

/// Read half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IdentityReader {
    rx: watch::Receiver<SessionIdentity>,
}

impl IdentityReader {
    /// Identity as of now.
    pub fn current(&self) -> SessionIdentity {
        self.rx.borrow().clone()
    }
}
