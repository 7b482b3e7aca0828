// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the apivault credential vault.
//!
//! Cryptographic failures are deliberately undifferentiated: wrong master
//! secret, corrupted ciphertext, corrupted nonce, and corrupted tag all
//! surface as [`VaultError::AuthenticationFailure`] with a generic message,
//! so a caller relaying errors cannot be used as a decryption oracle.
//! Lifecycle and validation errors may be specific, since they reveal no
//! secret material.

use thiserror::Error;

use crate::types::CredentialStatus;

/// The primary error type used across all vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed input at the API boundary (owner/service/keyName, metadata bounds, TTL).
    #[error("validation error: {0}")]
    Validation(String),

    /// Any authenticated-decryption failure. Intentionally carries no detail.
    #[error("credential unavailable")]
    AuthenticationFailure,

    /// Unknown envelope version or algorithm identifier.
    #[error("unsupported envelope format: {0}")]
    UnsupportedFormat(String),

    /// No record matched the requested id or (owner, service, keyName).
    #[error("credential not found")]
    NotFound,

    /// The record exists but is not readable in its current lifecycle state.
    #[error("credential unavailable: {reason}")]
    NotAvailable { reason: UnavailableReason },

    /// Operation is invalid for the record's current state, e.g. rotating a
    /// revoked credential, or losing a compare-and-set race to a revoke.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Advisory daily-limit breach, for callers that choose to enforce it.
    #[error("daily usage limit exceeded")]
    RateLimitExceeded,

    /// Persistence collaborator errors (connection, query, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Wrap an arbitrary persistence-layer error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        VaultError::Storage {
            source: Box::new(source),
        }
    }
}

/// Why a credential could not be returned, carried by [`VaultError::NotAvailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum UnavailableReason {
    Expired,
    Revoked,
    Inactive,
}

impl UnavailableReason {
    /// Map a non-active lifecycle state to its read-failure reason.
    ///
    /// Returns `None` for `Active`, which is readable.
    pub fn from_status(status: CredentialStatus) -> Option<Self> {
        match status {
            CredentialStatus::Active => None,
            CredentialStatus::Inactive => Some(UnavailableReason::Inactive),
            CredentialStatus::Expired => Some(UnavailableReason::Expired),
            CredentialStatus::Revoked => Some(UnavailableReason::Revoked),
        }
    }
}
