// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential vault: encrypts, stores, rotates, and migrates third-party
//! API keys at rest.
//!
//! Plaintext keys go in, opaque envelopes come out. A per-record key is
//! derived from a caller-supplied master secret (PBKDF2-HMAC-SHA256, random
//! 32-byte salt), the plaintext is sealed with AES-256-GCM, and the result
//! is persisted through a pluggable [`CredentialStore`]. Lifecycle
//! transitions (rotation, expiry, revocation) are compare-and-set updates;
//! revocation is terminal and wins every race.
//!
//! The master secret is an explicit parameter on every call. The vault
//! never logs, persists, or returns it.

pub mod config;
pub mod usage;
pub mod vault;

pub use apivault_core::{
    Clock, CredentialMetadata, CredentialRecord, CredentialStatus, CredentialStore,
    CredentialSummary, ManualClock, ServiceKind, SystemClock, UnavailableReason, VaultError,
};
pub use apivault_crypto::{Envelope, MigrationReport};
pub use config::VaultConfig;
pub use usage::UsageReport;
pub use vault::{CredentialVault, StoreOptions};
