//! HMAC-SHA256 payload signing and receiver-side verification.
//!
//! The signature is computed over the exact bytes of the request body, with no
//! prefix or timestamp mixed in, and rendered as 64 lowercase hex characters.
//! Signing performs no I/O.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex encoded HMAC-SHA256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    /// Number of hex characters in a signature.
    pub const LEN: usize = 64;

    /// Returns the hex digest.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the signature and returns the hex digest.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Signs `payload` with `secret`.
///
/// # Errors
///
/// Returns a [`Configuration`] error when `secret` is empty. A webhook without a
/// secret is an operator defect; signing with an empty key would produce a value
/// any receiver could forge.
///
/// [`Configuration`]: crate::ErrorKind::Configuration
pub fn sign(secret: &[u8], payload: &[u8]) -> Result<Signature> {
    let mut mac = new_mac(secret)?;
    mac.update(payload);
    Ok(Signature(hex::encode(mac.finalize().into_bytes())))
}

/// Verifies `signature` (hex) against `payload` in constant time.
///
/// Malformed hex, a wrong length or an empty secret all fail verification.
pub fn verify(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };

    let Ok(mut mac) = new_mac(secret) else {
        return false;
    };

    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(secret: &[u8]) -> Result<HmacSha256> {
    if secret.is_empty() {
        return Err(Error::configuration().with_message("Webhook signing secret is empty"));
    }

    HmacSha256::new_from_slice(secret).map_err(|err| {
        Error::configuration()
            .with_message("Invalid webhook signing secret")
            .with_source(err.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const PAYLOAD: &[u8] =
        br#"{"event":"ticket.created","data":{"id":"1"},"timestamp":"2024-01-01T00:00:00.000Z"}"#;

    #[test]
    fn test_pinned_vector() {
        let signature = sign(b"testsecret", PAYLOAD).unwrap();
        assert_eq!(
            signature.as_str(),
            "a6184b02e0a422e4d6bf9099012c53d977d97854578afa223a5b9c827a7d1733"
        );
    }

    #[test]
    fn test_reference_vector() {
        let signature = sign(b"key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            signature.as_str(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_deterministic_and_fixed_length() {
        let first = sign(b"testsecret", PAYLOAD).unwrap();
        let second = sign(b"testsecret", PAYLOAD).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), Signature::LEN);
        assert!(
            first
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_different_secret_differs() {
        let first = sign(b"testsecret", PAYLOAD).unwrap();
        let second = sign(b"othersecret", PAYLOAD).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_secret_is_configuration_error() {
        let error = sign(b"", PAYLOAD).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_verify() {
        let signature = sign(b"testsecret", PAYLOAD).unwrap();

        assert!(verify(b"testsecret", PAYLOAD, signature.as_str()));
        assert!(!verify(b"wrongsecret", PAYLOAD, signature.as_str()));
        assert!(!verify(b"testsecret", b"{}", signature.as_str()));
        assert!(!verify(b"testsecret", PAYLOAD, "not-hex"));
        assert!(!verify(b"testsecret", PAYLOAD, &signature.as_str()[..32]));
        assert!(!verify(b"", PAYLOAD, signature.as_str()));
    }
}
