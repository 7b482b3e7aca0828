// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault configuration model.
//!
//! Unknown keys are rejected at load time via `deny_unknown_fields` so a
//! typo in an operator's config surfaces as an error instead of a silently
//! ignored setting. The master secret is NOT part of this config: it is
//! supplied per call by the external secret-management facility.

use apivault_core::VaultError;
use apivault_crypto::kdf::MIN_ITERATIONS;
use serde::{Deserialize, Serialize};

/// Tunables for the vault.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// PBKDF2 iteration count for newly written envelopes. Existing
    /// envelopes carry their own count and remain readable after a change.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Daily usage limit applied to new credentials when the caller does not
    /// set one (None = unlimited).
    #[serde(default)]
    pub default_daily_limit: Option<u64>,

    /// Days after creation/rotation at which a rotation reminder is due
    /// (None = no reminders).
    #[serde(default)]
    pub rotation_reminder_days: Option<u32>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: default_kdf_iterations(),
            default_daily_limit: None,
            rotation_reminder_days: None,
        }
    }
}

impl VaultConfig {
    /// Reject configurations that weaken the KDF below the supported floor.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.kdf_iterations < MIN_ITERATIONS {
            return Err(VaultError::Validation(format!(
                "kdf_iterations must be at least {MIN_ITERATIONS}, got {}",
                self.kdf_iterations
            )));
        }
        Ok(())
    }
}

fn default_kdf_iterations() -> u32 {
    200_000
}
