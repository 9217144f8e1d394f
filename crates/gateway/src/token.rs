//! Identity of the caller, read from the bearer token.
//!
//! The token is a JWT. Only the payload is decoded; the signature is the
//! server's business.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    email: Option<String>,
}

/// Extract the `email` claim from a JWT access token.
pub fn email_from_token(token: &str) -> Result<String> {
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if !payload.is_empty() => payload,
        _ => {
            return Err(Error::InvalidToken(
                "expected three dot-separated segments".to_string(),
            ));
        }
    };

    // Some issuers keep the padding
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::InvalidToken(format!("payload is not base64url: {e}")))?;

    let claims: Claims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::InvalidToken(format!("payload is not JSON: {e}")))?;

    match claims.email {
        Some(email) if !email.is_empty() => Ok(email),
        _ => Err(Error::InvalidToken("no email claim".to_string())),
    }
}

#[cfg(test)]
pub(crate) fn token_with_payload(payload: &str) -> String {
    format!(
        "eyJhbGciOiJIUzI1NiJ9.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(payload)
    )
}
