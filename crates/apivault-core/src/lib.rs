// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types, errors, and persistence traits for the apivault credential
//! vault.
//!
//! This crate holds everything the crypto and storage layers share: the
//! error taxonomy, the credential record model, the clock abstraction, and
//! the [`CredentialStore`] trait the persistence collaborator implements.

pub mod clock;
pub mod error;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{UnavailableReason, VaultError};
pub use store::CredentialStore;
pub use types::{
    AuditInfo, CredentialMetadata, CredentialRecord, CredentialStatus, CredentialSummary,
    ServiceKind, UsageCounters, Validity,
};
