// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The encryption engine: master secret in, envelope out, and back.
//!
//! Each [`encrypt`] call uses a fresh random salt and nonce, so encrypting
//! the same plaintext under the same secret twice yields different envelopes.
//! [`decrypt`] verifies the authentication tag before releasing any plaintext
//! and re-derives the key from the envelope's own salt and iteration count.
//! Derived keys are zeroized on drop on every path.

use apivault_core::VaultError;
use secrecy::{ExposeSecret, SecretString};

use crate::aead;
use crate::envelope::{Envelope, ALGORITHM_AES_256_GCM, FORMAT_VERSION};
use crate::kdf;

/// Encrypt a plaintext secret into a self-describing envelope.
pub fn encrypt(
    plaintext: &str,
    master_secret: &SecretString,
    kdf_iterations: u32,
) -> Result<Envelope, VaultError> {
    let salt = kdf::generate_salt()?;
    let key = kdf::derive_key(
        master_secret.expose_secret().as_bytes(),
        &salt,
        kdf_iterations,
    )?;

    let (ciphertext, auth_tag, nonce) = aead::seal(&key, plaintext.as_bytes())?;

    Ok(Envelope {
        format_version: FORMAT_VERSION,
        algorithm: ALGORITHM_AES_256_GCM.to_string(),
        kdf_iterations,
        salt,
        nonce,
        ciphertext,
        auth_tag,
    })
}

/// Decrypt an envelope back to the plaintext secret.
///
/// Version and algorithm are checked first so an operator sees
/// [`VaultError::UnsupportedFormat`] for foreign data, while every
/// cryptographic mismatch collapses into the undifferentiated
/// [`VaultError::AuthenticationFailure`].
pub fn decrypt(envelope: &Envelope, master_secret: &SecretString) -> Result<SecretString, VaultError> {
    if envelope.format_version != FORMAT_VERSION {
        return Err(VaultError::UnsupportedFormat(format!(
            "envelope version {} is not supported",
            envelope.format_version
        )));
    }
    if envelope.algorithm != ALGORITHM_AES_256_GCM {
        return Err(VaultError::UnsupportedFormat(format!(
            "algorithm {:?} is not supported",
            envelope.algorithm
        )));
    }

    let key = kdf::derive_key(
        master_secret.expose_secret().as_bytes(),
        &envelope.salt,
        envelope.kdf_iterations,
    )?;

    let plaintext = aead::open(&key, &envelope.nonce, &envelope.ciphertext, &envelope.auth_tag)?;

    let value = String::from_utf8(plaintext)
        .map_err(|_| VaultError::Internal("decrypted value is not valid UTF-8".to_string()))?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEST_ITERS: u32 = 1_000;

    fn master(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn scenario_a_roundtrip_and_wrong_master() {
        let envelope = encrypt("sk-test-abc123", &master("master-A"), TEST_ITERS).unwrap();

        let plaintext = decrypt(&envelope, &master("master-A")).unwrap();
        assert_eq!(plaintext.expose_secret(), "sk-test-abc123");

        let result = decrypt(&envelope, &master("master-B"));
        assert!(matches!(result, Err(VaultError::AuthenticationFailure)));
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let envelope = encrypt("", &master("m"), TEST_ITERS).unwrap();
        let plaintext = decrypt(&envelope, &master("m")).unwrap();
        assert_eq!(plaintext.expose_secret(), "");
    }

    #[test]
    fn multi_kilobyte_plaintext_roundtrips_without_truncation() {
        let big = "k".repeat(64 * 1024);
        let envelope = encrypt(&big, &master("m"), TEST_ITERS).unwrap();
        let plaintext = decrypt(&envelope, &master("m")).unwrap();
        assert_eq!(plaintext.expose_secret(), big);
    }

    #[test]
    fn repeated_encryption_differs_in_salt_nonce_and_ciphertext() {
        let e1 = encrypt("sk-same-input", &master("m"), TEST_ITERS).unwrap();
        let e2 = encrypt("sk-same-input", &master("m"), TEST_ITERS).unwrap();

        assert_ne!(e1.salt, e2.salt);
        assert_ne!(e1.nonce, e2.nonce);
        assert_ne!(e1.ciphertext, e2.ciphertext);
        assert_ne!(e1.encode(), e2.encode());
    }

    #[test]
    fn single_bit_flips_fail_authentication() {
        let envelope = encrypt("sk-tamper-target", &master("m"), TEST_ITERS).unwrap();

        let mut corrupt_ct = envelope.clone();
        corrupt_ct.ciphertext[0] ^= 0x01;
        assert!(matches!(
            decrypt(&corrupt_ct, &master("m")),
            Err(VaultError::AuthenticationFailure)
        ));

        let mut corrupt_nonce = envelope.clone();
        corrupt_nonce.nonce[0] ^= 0x01;
        assert!(matches!(
            decrypt(&corrupt_nonce, &master("m")),
            Err(VaultError::AuthenticationFailure)
        ));

        let mut corrupt_tag = envelope.clone();
        corrupt_tag.auth_tag[0] ^= 0x01;
        assert!(matches!(
            decrypt(&corrupt_tag, &master("m")),
            Err(VaultError::AuthenticationFailure)
        ));
    }

    #[test]
    fn unsupported_version_is_rejected_before_key_derivation() {
        let mut envelope = encrypt("sk-x", &master("m"), TEST_ITERS).unwrap();
        envelope.format_version = 3;
        assert!(matches!(
            decrypt(&envelope, &master("m")),
            Err(VaultError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let mut envelope = encrypt("sk-x", &master("m"), TEST_ITERS).unwrap();
        envelope.algorithm = "chacha20-poly1305".to_string();
        assert!(matches!(
            decrypt(&envelope, &master("m")),
            Err(VaultError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn envelope_survives_encode_decode_before_decrypt() {
        let envelope = encrypt("sk-wire-trip", &master("m"), TEST_ITERS).unwrap();
        let revived = Envelope::decode(&envelope.encode()).unwrap();
        let plaintext = decrypt(&revived, &master("m")).unwrap();
        assert_eq!(plaintext.expose_secret(), "sk-wire-trip");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn roundtrip_for_arbitrary_plaintext(plaintext in ".{0,256}", secret in "[a-zA-Z0-9]{1,32}") {
            let envelope = encrypt(&plaintext, &master(&secret), TEST_ITERS).unwrap();
            let decrypted = decrypt(&envelope, &master(&secret)).unwrap();
            prop_assert_eq!(decrypted.expose_secret(), plaintext.as_str());
        }
    }
}
