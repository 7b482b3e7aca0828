// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PBKDF2-HMAC-SHA256 key derivation from the master secret.
//!
//! Derives a 32-byte key from the master secret and a per-record random
//! 32-byte salt. Derivation is deterministic for fixed inputs; the iteration
//! count makes brute-forcing the master secret from `(salt, key)` expensive.
//! Derived keys are wrapped in [`Zeroizing`] so they are wiped on drop on
//! every path, including errors.

use std::num::NonZeroU32;

use apivault_core::VaultError;
use ring::pbkdf2::{self, PBKDF2_HMAC_SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Per-record salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Floor for production iteration counts. Config validation enforces this;
/// tests may go lower through direct construction.
pub const MIN_ITERATIONS: u32 = 100_000;

/// Derive a 32-byte key from the master secret using PBKDF2-HMAC-SHA256.
pub fn derive_key(
    master_secret: &[u8],
    salt: &[u8; SALT_LEN],
    iterations: u32,
) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
    let iterations = NonZeroU32::new(iterations)
        .ok_or_else(|| VaultError::Validation("KDF iteration count must be non-zero".to_string()))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(
        PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        master_secret,
        key.as_mut(),
    );
    Ok(key)
}

/// Generate a random 32-byte salt via the system CSPRNG.
pub fn generate_salt() -> Result<[u8; SALT_LEN], VaultError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| VaultError::Internal("failed to generate random salt".to_string()))?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low iteration counts keep tests fast; production counts are enforced
    // at the config boundary.
    const TEST_ITERS: u32 = 1_000;

    #[test]
    fn derive_key_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let key1 = derive_key(b"master-secret", &salt, TEST_ITERS).unwrap();
        let key2 = derive_key(b"master-secret", &salt, TEST_ITERS).unwrap();
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn different_secrets_produce_different_keys() {
        let salt = [7u8; SALT_LEN];
        let key1 = derive_key(b"master-a", &salt, TEST_ITERS).unwrap();
        let key2 = derive_key(b"master-b", &salt, TEST_ITERS).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let key1 = derive_key(b"master", &[1u8; SALT_LEN], TEST_ITERS).unwrap();
        let key2 = derive_key(b"master", &[2u8; SALT_LEN], TEST_ITERS).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn different_iteration_counts_produce_different_keys() {
        let salt = [3u8; SALT_LEN];
        let key1 = derive_key(b"master", &salt, TEST_ITERS).unwrap();
        let key2 = derive_key(b"master", &salt, TEST_ITERS + 1).unwrap();
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let result = derive_key(b"master", &[0u8; SALT_LEN], 0);
        assert!(matches!(result, Err(VaultError::Validation(_))));
    }

    #[test]
    fn generate_salt_produces_random_values() {
        let salt1 = generate_salt().unwrap();
        let salt2 = generate_salt().unwrap();
        assert_ne!(salt1, salt2);
    }
}
