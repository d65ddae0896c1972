//! Signed cookie encoding.
//!
//! Wire format: `base64url(json) "." base64url(hmac_sha256(key, base64url(json)))`,
//! both parts without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Why a cookie value was rejected. Never surfaced to handlers: callers
/// fall back to an empty session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    Malformed,
    BadSignature,
    BadPayload(String),
    InvalidKey,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Malformed => write!(f, "cookie value is not payload.signature"),
            CodecError::BadSignature => write!(f, "cookie signature does not verify"),
            CodecError::BadPayload(reason) => write!(f, "cookie payload is not a JSON object: {reason}"),
            CodecError::InvalidKey => write!(f, "secret key cannot be used for HMAC"),
        }
    }
}

impl std::error::Error for CodecError {}

fn mac(secret_key: &str) -> Result<HmacSha256, CodecError> {
    HmacSha256::new_from_slice(secret_key.as_bytes()).map_err(|_| CodecError::InvalidKey)
}

/// Serialize and sign session data.
pub fn sign(data: &BTreeMap<String, serde_json::Value>, secret_key: &str) -> Result<String, CodecError> {
    let json = serde_json::to_vec(data).map_err(|e| CodecError::BadPayload(e.to_string()))?;
    let payload = URL_SAFE_NO_PAD.encode(json);
    let mut mac = mac(secret_key)?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{payload}.{signature}"))
}

/// Verify and deserialize a cookie value.
///
/// The signature check is constant-time.
pub fn unsign(value: &str, secret_key: &str) -> Result<BTreeMap<String, serde_json::Value>, CodecError> {
    let (payload, signature) = value.rsplit_once('.').ok_or(CodecError::Malformed)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| CodecError::Malformed)?;

    let mut mac = mac(secret_key)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).map_err(|_| {
        debug!("Session cookie signature mismatch");
        CodecError::BadSignature
    })?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| CodecError::Malformed)?;
    serde_json::from_slice(&json).map_err(|e| CodecError::BadPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> BTreeMap<String, serde_json::Value> {
        let mut d = BTreeMap::new();
        d.insert("user".to_string(), json!("ann"));
        d.insert("n".to_string(), json!(3));
        d
    }

    #[test]
    fn test_sign_then_unsign() {
        let cookie = sign(&data(), "k1").unwrap();
        assert_eq!(cookie.matches('.').count(), 1);
        assert_eq!(unsign(&cookie, "k1").unwrap(), data());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let cookie = sign(&data(), "k1").unwrap();
        assert_eq!(unsign(&cookie, "k2"), Err(CodecError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let cookie = sign(&data(), "k1").unwrap();
        let (_, sig) = cookie.split_once('.').unwrap();
        let forged = format!("{}.{sig}", URL_SAFE_NO_PAD.encode(br#"{"user":"root"}"#));
        assert_eq!(unsign(&forged, "k1"), Err(CodecError::BadSignature));
    }

    #[test]
    fn test_malformed_rejected() {
        assert_eq!(unsign("no-dot-here", "k1"), Err(CodecError::Malformed));
        assert_eq!(unsign("abc.!!!", "k1"), Err(CodecError::Malformed));
    }
}
