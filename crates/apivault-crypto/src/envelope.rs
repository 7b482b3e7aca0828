// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The self-describing envelope produced by encryption.
//!
//! Encoded form is a versioned colon-separated string:
//!
//! ```text
//! v2:aes-256-gcm:<kdf iterations>:<b64 salt>:<b64 nonce>:<b64 ciphertext>:<b64 tag>
//! ```
//!
//! The iteration count is carried in the envelope so records encrypted under
//! an older KDF cost can still be decrypted after the configured default
//! changes. Outside this crate the encoded envelope is an opaque string.

use apivault_core::VaultError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::aead::{NONCE_LEN, TAG_LEN};
use crate::kdf::SALT_LEN;

/// Current envelope format version. Version 1 was the legacy reversible
/// base64 encoding, which has no explicit marker.
pub const FORMAT_VERSION: u8 = 2;

/// The only algorithm identifier this implementation produces.
pub const ALGORITHM_AES_256_GCM: &str = "aes-256-gcm";

/// Decoded envelope fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub format_version: u8,
    pub algorithm: String,
    pub kdf_iterations: u32,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub auth_tag: [u8; TAG_LEN],
}

impl Envelope {
    /// Encode to the versioned wire string.
    pub fn encode(&self) -> String {
        format!(
            "v{}:{}:{}:{}:{}:{}:{}",
            self.format_version,
            self.algorithm,
            self.kdf_iterations,
            BASE64.encode(self.salt),
            BASE64.encode(self.nonce),
            BASE64.encode(&self.ciphertext),
            BASE64.encode(self.auth_tag),
        )
    }

    /// Decode an encoded envelope.
    ///
    /// Unknown versions and algorithms fail with
    /// [`VaultError::UnsupportedFormat`]; structurally malformed input fails
    /// with [`VaultError::Validation`].
    pub fn decode(raw: &str) -> Result<Self, VaultError> {
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() != 7 {
            return Err(VaultError::Validation(
                "envelope does not have 7 fields".to_string(),
            ));
        }

        let version = parts[0]
            .strip_prefix('v')
            .and_then(|v| v.parse::<u8>().ok())
            .ok_or_else(|| VaultError::Validation("envelope version marker is malformed".to_string()))?;
        if version != FORMAT_VERSION {
            return Err(VaultError::UnsupportedFormat(format!(
                "envelope version {version} is not supported"
            )));
        }

        let algorithm = parts[1];
        if algorithm != ALGORITHM_AES_256_GCM {
            return Err(VaultError::UnsupportedFormat(format!(
                "algorithm {algorithm:?} is not supported"
            )));
        }

        let kdf_iterations: u32 = parts[2]
            .parse()
            .map_err(|_| VaultError::Validation("envelope iteration count is malformed".to_string()))?;

        let salt: [u8; SALT_LEN] = decode_field(parts[3], "salt")?
            .try_into()
            .map_err(|_| VaultError::Validation(format!("corrupted salt (expected {SALT_LEN} bytes)")))?;
        let nonce: [u8; NONCE_LEN] = decode_field(parts[4], "nonce")?
            .try_into()
            .map_err(|_| VaultError::Validation(format!("corrupted nonce (expected {NONCE_LEN} bytes)")))?;
        let ciphertext = decode_field(parts[5], "ciphertext")?;
        let auth_tag: [u8; TAG_LEN] = decode_field(parts[6], "auth tag")?
            .try_into()
            .map_err(|_| VaultError::Validation(format!("corrupted auth tag (expected {TAG_LEN} bytes)")))?;

        Ok(Self {
            format_version: version,
            algorithm: algorithm.to_string(),
            kdf_iterations,
            salt,
            nonce,
            ciphertext,
            auth_tag,
        })
    }
}

fn decode_field(raw: &str, field: &str) -> Result<Vec<u8>, VaultError> {
    BASE64
        .decode(raw)
        .map_err(|_| VaultError::Validation(format!("envelope {field} is not valid base64")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            format_version: FORMAT_VERSION,
            algorithm: ALGORITHM_AES_256_GCM.to_string(),
            kdf_iterations: 1_000,
            salt: [1u8; SALT_LEN],
            nonce: [2u8; NONCE_LEN],
            ciphertext: vec![3, 4, 5],
            auth_tag: [6u8; TAG_LEN],
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let envelope = sample();
        let decoded = Envelope::decode(&envelope.encode()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn encoded_form_is_self_describing() {
        let encoded = sample().encode();
        assert!(encoded.starts_with("v2:aes-256-gcm:1000:"));
    }

    #[test]
    fn unknown_version_is_unsupported_format() {
        let encoded = sample().encode().replacen("v2:", "v9:", 1);
        assert!(matches!(
            Envelope::decode(&encoded),
            Err(VaultError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn unknown_algorithm_is_unsupported_format() {
        let encoded = sample().encode().replacen("aes-256-gcm", "rot13", 1);
        assert!(matches!(
            Envelope::decode(&encoded),
            Err(VaultError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn malformed_input_is_validation_error() {
        for raw in ["", "not an envelope", "v2:aes-256-gcm:oops", "v2:aes-256-gcm:1000:!:!:!:!"] {
            assert!(
                matches!(Envelope::decode(raw), Err(VaultError::Validation(_))),
                "expected validation error for {raw:?}"
            );
        }
    }

    #[test]
    fn wrong_salt_length_is_rejected() {
        let mut envelope = sample();
        envelope.ciphertext = vec![1];
        let encoded = envelope.encode();
        // Swap the salt field for a short one.
        let mut parts: Vec<&str> = encoded.split(':').collect();
        let short = BASE64.encode([0u8; 4]);
        parts[3] = &short;
        let tampered = parts.join(":");
        assert!(matches!(
            Envelope::decode(&tampered),
            Err(VaultError::Validation(_))
        ));
    }
}
