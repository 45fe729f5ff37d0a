//! Session metadata extraction from ParameterStatus messages.
//!
//! A ParameterStatus payload is `name\0value\0`. Extraction is best-effort:
//! malformed payloads fall back to defaults with a warning and never stop
//! the surrounding decode loop.

use crate::frame::Frame;
use crate::identity::IdentityWriter;

/// Parameter carrying the client application name.
pub const APPLICATION_NAME: &str = "application_name";
/// Parameter carrying the session user.
pub const SESSION_AUTHORIZATION: &str = "session_authorization";

/// Application name used when the payload cannot be split.
pub const DEFAULT_APPLICATION_NAME: &str = "psql";
/// User used when the payload cannot be split.
pub const DEFAULT_USER: &str = "unknown";

/// Identity fields changed by one ParameterStatus frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub application_name: Option<String>,
    pub authorized_user: Option<String>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.application_name.is_none() && self.authorized_user.is_none()
    }
}

/// Updates session identity from server ParameterStatus frames.
#[derive(Debug)]
pub struct MetadataExtractor {
    client: String,
    identity: IdentityWriter,
}

impl MetadataExtractor {
    pub fn new(client: impl Into<String>, identity: IdentityWriter) -> Self {
        Self {
            client: client.into(),
            identity,
        }
    }

    /// Apply a ParameterStatus frame to the session identity.
    pub fn observe(&self, frame: &Frame) -> Extracted {
        let extracted = extract(&self.client, frame.payload());
        if let Some(ref app) = extracted.application_name {
            self.identity.set_application_name(app);
        }
        if let Some(ref user) = extracted.authorized_user {
            self.identity.set_authorized_user(user);
        }
        extracted
    }
}

/// Work out which identity fields a ParameterStatus payload sets.
pub fn extract(client: &str, payload: &[u8]) -> Extracted {
    let text = String::from_utf8_lossy(payload).to_lowercase();
    let value = text.split('\0').nth(1);
    let mut extracted = Extracted::default();

    if text.contains(APPLICATION_NAME) {
        extracted.application_name = Some(value_or_default(
            client,
            &text,
            value,
            DEFAULT_APPLICATION_NAME,
            "unable to extract application name, set it to default",
        ));
    }

    if text.contains(SESSION_AUTHORIZATION) {
        extracted.authorized_user = Some(value_or_default(
            client,
            &text,
            value,
            DEFAULT_USER,
            "unable to extract username, set it to default",
        ));
    }

    if extracted.is_empty() && value.is_none() {
        tracing::warn!(ip = %client, payload = %text, "malformed parameter status");
    }

    extracted
}

fn value_or_default(
    client: &str,
    text: &str,
    value: Option<&str>,
    default: &str,
    warning: &str,
) -> String {
    match value {
        Some(value) => value.to_string(),
        None => {
            tracing::warn!(ip = %client, payload = %text, "{}", warning);
            default.to_string()
        }
    }
}
