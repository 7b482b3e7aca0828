// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait for credential records.
//!
//! The vault core never talks to a database directly; it goes through this
//! trait. Implementations must provide conditional updates keyed on the
//! record `version` so lifecycle transitions can be compare-and-set, and
//! must enforce uniqueness of `(owner_id, service, key_name)` among
//! non-revoked records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::VaultError;
use crate::types::{CredentialRecord, ServiceKind};

/// Durable storage for [`CredentialRecord`]s.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a record by id.
    async fn get(&self, record_id: &str) -> Result<Option<CredentialRecord>, VaultError>;

    /// Find the non-revoked record for `(owner_id, service, key_name)`.
    ///
    /// Revoked records do not occupy the key: rotation after revocation
    /// creates a new identity under the same key.
    async fn find_live(
        &self,
        owner_id: &str,
        service: ServiceKind,
        key_name: &str,
    ) -> Result<Option<CredentialRecord>, VaultError>;

    /// All records belonging to an owner, newest first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<CredentialRecord>, VaultError>;

    /// Insert a new record.
    ///
    /// Fails with [`VaultError::StateConflict`] if a non-revoked record
    /// already holds the same `(owner_id, service, key_name)`.
    async fn insert(&self, record: &CredentialRecord) -> Result<(), VaultError>;

    /// Conditionally replace the record whose id matches `record.id` and
    /// whose persisted version equals `expected_version`.
    ///
    /// On success the persisted version becomes `expected_version + 1` and
    /// `Ok(true)` is returned. `Ok(false)` means another writer won the race;
    /// the caller must re-read before retrying.
    async fn update_if_version(
        &self,
        record: &CredentialRecord,
        expected_version: u64,
    ) -> Result<bool, VaultError>;

    /// Active records whose `expires_at` is at or before `now`. Feeds the
    /// expiry sweep.
    async fn list_active_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CredentialRecord>, VaultError>;

    /// Physically delete a record. Revocation is the soft path; this is the
    /// explicit hard-delete for operators that do not need the audit trail.
    async fn delete(&self, record_id: &str) -> Result<(), VaultError>;
}
