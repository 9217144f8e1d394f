//! Shaping of API error bodies into one-line messages.

use serde::Deserialize;

const DEFAULT_MESSAGE: &str = "Error occurred";

/// Replacement for the connect-portal error, which is unreadable as returned.
pub const CONNECT_CREDENTIAL_REMEDIATION: &str = "Deploy failed - userSettings field was used \
in the workflow meaning - you MUST go to the integration -> Test Connect Portal and perform a \
one time connection through the connect portal wizard, then rerun this - This is a one time \
manual task needed to be done.";

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: String,
    #[serde(default)]
    meta: ErrorMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorMeta {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    error: String,
}

/// Turn a non-success response body into `"<message>, <sub-error>, ..."`.
///
/// Unparseable bodies become a generic message. A 400 caused by a missing
/// connect credential is replaced by [`CONNECT_CREDENTIAL_REMEDIATION`].
pub fn shape_error(status: u16, body: &str) -> String {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return DEFAULT_MESSAGE.to_string();
    };

    let mut message = if envelope.message.is_empty() {
        DEFAULT_MESSAGE.to_string()
    } else {
        envelope.message
    };

    let details: Vec<&str> = envelope
        .meta
        .errors
        .iter()
        .map(|e| e.error.as_str())
        .filter(|e| !e.is_empty())
        .collect();
    if !details.is_empty() {
        message.push_str(", ");
        message.push_str(&details.join(", "));
    }

    if status == 400
        && message.contains("CONNECT_CREDENTIAL_FIELD")
        && message.contains("no ConnectCredential was supplied")
    {
        return CONNECT_CREDENTIAL_REMEDIATION.to_string();
    }

    message
}
