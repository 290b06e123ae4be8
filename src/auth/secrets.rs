//! Process-lifetime credentials: the webhook shared secret and the GitHub App
//! identity. Neither type can be serialized, and their `Debug` output is
//! redacted so they can sit inside logged structs.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use std::fmt;

use super::AuthError;

/// DER encoding of the rsaEncryption OID (1.2.840.113549.1.1.1).
const RSA_ENCRYPTION_OID: [u8; 11] = [
    0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01,
];

/// Key shared with GitHub for signing webhook deliveries.
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl From<String> for SharedSecret {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for SharedSecret {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// The GitHub App's issuer id plus its RSA private key, normalized to PEM.
#[derive(Clone)]
pub struct AppIdentity {
    issuer: String,
    key_pem: Vec<u8>,
}

impl AppIdentity {
    /// Build an identity from PEM text (`RSA PRIVATE KEY` or `PRIVATE KEY`).
    pub fn from_pem(issuer: impl Into<String>, pem_text: &str) -> Result<Self, AuthError> {
        Ok(Self {
            issuer: issuer.into(),
            key_pem: normalize_key(pem_text.trim().as_bytes().to_vec())?,
        })
    }

    /// Build an identity from a base64 string wrapping either a DER key
    /// (PKCS#1 or PKCS#8) or PEM text.
    pub fn from_base64(issuer: impl Into<String>, encoded: &str) -> Result<Self, AuthError> {
        let compact: String = encoded.split_whitespace().collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|_| AuthError::signing("private key is not valid base64"))?;

        Ok(Self {
            issuer: issuer.into(),
            key_pem: normalize_key(bytes)?,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub(crate) fn key_pem(&self) -> &[u8] {
        &self.key_pem
    }
}

impl fmt::Debug for AppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppIdentity")
            .field("issuer", &self.issuer)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn normalize_key(bytes: Vec<u8>) -> Result<Vec<u8>, AuthError> {
    if bytes.is_empty() {
        return Err(AuthError::signing("private key is empty"));
    }

    if bytes.starts_with(b"-----BEGIN") {
        let parsed =
            pem::parse(&bytes).map_err(|_| AuthError::signing("private key is not valid PEM"))?;
        return match parsed.tag() {
            "RSA PRIVATE KEY" | "PRIVATE KEY" => Ok(bytes),
            _ => Err(AuthError::signing("PEM block is not an RSA private key")),
        };
    }

    // Raw DER: PKCS#8 wraps the key in an AlgorithmIdentifier naming
    // rsaEncryption near the start, PKCS#1 does not.
    let tag = if is_pkcs8(&bytes) {
        "PRIVATE KEY"
    } else {
        "RSA PRIVATE KEY"
    };
    Ok(pem::encode(&pem::Pem::new(tag, bytes)).into_bytes())
}

fn is_pkcs8(der: &[u8]) -> bool {
    der.windows(RSA_ENCRYPTION_OID.len())
        .take(32)
        .any(|window| window == RSA_ENCRYPTION_OID)
}
