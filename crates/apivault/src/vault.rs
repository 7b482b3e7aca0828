// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential lifecycle: store, rotate, retrieve, revoke, usage, and expiry.
//!
//! Every mutation is a compare-and-set against the record's `version`
//! through the [`CredentialStore`] trait; when a revoke and a rotate race,
//! the rotate re-reads after losing the CAS and gives up with a state
//! conflict, so revocation always wins. The master secret is an explicit
//! parameter on every cryptographic call and is never held by the vault.

use std::sync::Arc;

use apivault_core::{
    types::validate_identifier, AuditInfo, Clock, CredentialMetadata, CredentialRecord,
    CredentialStatus, CredentialStore, CredentialSummary, ServiceKind, SystemClock,
    UnavailableReason, UsageCounters, Validity, VaultError,
};
use apivault_crypto::{engine, legacy, Envelope};
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::config::VaultConfig;
use crate::usage::{apply_usage, UsageReport};

/// Give up after this many lost compare-and-set races.
const CAS_MAX_RETRIES: usize = 3;

/// Caller-supplied options for [`CredentialVault::store_credential`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Days until the credential expires (None = no expiry).
    pub ttl_days: Option<u32>,
    /// Advisory daily usage limit; falls back to the configured default.
    pub daily_limit: Option<u64>,
    /// Metadata to attach, validated before persisting.
    pub metadata: Vec<CredentialMetadata>,
    /// Address recorded in the audit trail for the creating caller.
    pub created_from_address: Option<String>,
}

/// The credential vault.
///
/// Stateless apart from its collaborators: a persistence store, the
/// configuration, and a clock (swappable for tests).
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
    config: VaultConfig,
    clock: Arc<dyn Clock>,
}

impl CredentialVault {
    /// Build a vault on the system clock.
    pub fn new(store: Arc<dyn CredentialStore>, config: VaultConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Build a vault with an explicit clock. Tests drive a manual clock to
    /// simulate expiry and daily-window rollover.
    pub fn with_clock(
        store: Arc<dyn CredentialStore>,
        config: VaultConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Store a credential, encrypting the plaintext under the master secret.
    ///
    /// If a live record already holds `(owner_id, service, key_name)` this is
    /// a rotation: the envelope is replaced atomically, status resets to
    /// active, and the validity window restarts. A revoked record is never
    /// resurrected; the key is simply free again and a new record identity
    /// is created.
    pub async fn store_credential(
        &self,
        owner_id: &str,
        service: ServiceKind,
        key_name: &str,
        plaintext: &SecretString,
        master_secret: &SecretString,
        opts: StoreOptions,
    ) -> Result<String, VaultError> {
        validate_identifier("ownerId", owner_id)?;
        validate_identifier("keyName", key_name)?;
        if opts.ttl_days == Some(0) {
            return Err(VaultError::Validation("ttlDays must be at least 1".to_string()));
        }
        for item in &opts.metadata {
            item.validate()?;
        }

        let envelope = engine::encrypt(
            plaintext.expose_secret(),
            master_secret,
            self.config.kdf_iterations,
        )?
        .encode();

        for _ in 0..CAS_MAX_RETRIES {
            let now = self.clock.now();
            match self.store.find_live(owner_id, service, key_name).await? {
                None => {
                    let record = self.build_record(owner_id, service, key_name, &envelope, &opts, now);
                    match self.store.insert(&record).await {
                        Ok(()) => {
                            info!(record_id = %record.id, service = %service, "credential stored");
                            return Ok(record.id);
                        }
                        // Another writer claimed the key between the lookup
                        // and the insert; retry as a rotation.
                        Err(VaultError::StateConflict(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                Some(existing) => {
                    let mut rotated = existing.clone();
                    rotated.envelope = envelope.clone();
                    rotated.status = CredentialStatus::Active;
                    rotated.validity.expires_at = expires_at(now, opts.ttl_days);
                    rotated.validity.rotation_reminder_at = self.rotation_reminder_at(now);
                    rotated.usage.daily_limit =
                        opts.daily_limit.or(self.config.default_daily_limit);
                    if !opts.metadata.is_empty() {
                        rotated.metadata = opts.metadata.clone();
                    }

                    if self
                        .store
                        .update_if_version(&rotated, existing.version)
                        .await?
                    {
                        info!(record_id = %rotated.id, service = %service, "credential rotated");
                        return Ok(rotated.id);
                    }

                    // Lost the race. Revoke wins: if the concurrent writer
                    // revoked this record, do not overwrite it.
                    match self.store.get(&existing.id).await? {
                        Some(current) if current.status == CredentialStatus::Revoked => {
                            return Err(VaultError::StateConflict(
                                "credential was revoked during rotation".to_string(),
                            ));
                        }
                        _ => continue,
                    }
                }
            }
        }

        Err(VaultError::StateConflict(
            "too many concurrent updates, giving up".to_string(),
        ))
    }

    /// Decrypt and return the credential plaintext.
    ///
    /// Only `active` records are readable. Expiry is applied lazily here: an
    /// active record whose `expires_at` has passed is transitioned before
    /// the unavailability error is returned. With `key_name = None` the
    /// newest active credential for the service is selected.
    pub async fn retrieve_credential(
        &self,
        owner_id: &str,
        service: ServiceKind,
        key_name: Option<&str>,
        master_secret: &SecretString,
    ) -> Result<SecretString, VaultError> {
        validate_identifier("ownerId", owner_id)?;

        let record = self.resolve_for_read(owner_id, service, key_name).await?;
        let now = self.clock.now();

        if record.status == CredentialStatus::Active && record.is_expired_at(now) {
            self.transition_status(&record, CredentialStatus::Expired).await;
            return Err(VaultError::NotAvailable {
                reason: UnavailableReason::Expired,
            });
        }

        if let Some(reason) = UnavailableReason::from_status(record.status) {
            return Err(VaultError::NotAvailable { reason });
        }

        let envelope = Envelope::decode(&record.envelope)?;
        let plaintext = engine::decrypt(&envelope, master_secret)?;
        debug!(record_id = %record.id, "credential retrieved");
        Ok(plaintext)
    }

    /// Revoke a credential. Terminal and idempotent.
    pub async fn revoke_credential(&self, owner_id: &str, record_id: &str) -> Result<(), VaultError> {
        for _ in 0..CAS_MAX_RETRIES {
            let record = self.owned_record(owner_id, record_id).await?;
            if record.status == CredentialStatus::Revoked {
                return Ok(());
            }

            let mut revoked = record.clone();
            revoked.status = CredentialStatus::Revoked;
            if self.store.update_if_version(&revoked, record.version).await? {
                info!(record_id = %record_id, "credential revoked");
                return Ok(());
            }
        }

        Err(VaultError::StateConflict(
            "too many concurrent updates, giving up".to_string(),
        ))
    }

    /// Track one call of `units` against the record's usage counters.
    ///
    /// The returned report is advisory; the call is recorded even when the
    /// daily limit is exceeded.
    pub async fn record_usage(
        &self,
        record_id: &str,
        units: u64,
    ) -> Result<UsageReport, VaultError> {
        for _ in 0..CAS_MAX_RETRIES {
            let record = self
                .store
                .get(record_id)
                .await?
                .ok_or(VaultError::NotFound)?;

            let mut updated = record.clone();
            let report = apply_usage(&mut updated.usage, units, self.clock.now());

            if self.store.update_if_version(&updated, record.version).await? {
                if report.limit_exceeded {
                    warn!(
                        record_id = %record_id,
                        daily_used = updated.usage.daily_used,
                        "daily usage limit exceeded (advisory)"
                    );
                }
                return Ok(report);
            }
        }

        Err(VaultError::StateConflict(
            "too many concurrent updates, giving up".to_string(),
        ))
    }

    /// Record the outcome of an external key-validation probe in the audit
    /// trail.
    pub async fn record_validation(
        &self,
        record_id: &str,
        error: Option<String>,
    ) -> Result<(), VaultError> {
        for _ in 0..CAS_MAX_RETRIES {
            let record = self
                .store
                .get(record_id)
                .await?
                .ok_or(VaultError::NotFound)?;

            let mut updated = record.clone();
            updated.audit.last_validation_at = Some(self.clock.now());
            updated.audit.last_validation_error = error.clone();

            if self.store.update_if_version(&updated, record.version).await? {
                return Ok(());
            }
        }

        Err(VaultError::StateConflict(
            "too many concurrent updates, giving up".to_string(),
        ))
    }

    /// List an owner's credentials. Summaries never contain plaintext or
    /// envelope internals.
    pub async fn list_credentials(
        &self,
        owner_id: &str,
    ) -> Result<Vec<CredentialSummary>, VaultError> {
        validate_identifier("ownerId", owner_id)?;
        let records = self.store.list_for_owner(owner_id).await?;
        Ok(records.iter().map(CredentialSummary::from).collect())
    }

    /// Transition every active record whose expiry has passed. Returns the
    /// number of records transitioned.
    ///
    /// Losing a CAS here is fine: the other writer either expired the record
    /// already or revoked it, and revoked must not be overwritten.
    pub async fn sweep_expired(&self) -> Result<usize, VaultError> {
        let now = self.clock.now();
        let overdue = self.store.list_active_expired(now).await?;
        let mut swept = 0;

        for record in &overdue {
            let mut expired = record.clone();
            expired.status = CredentialStatus::Expired;
            if self.store.update_if_version(&expired, record.version).await? {
                swept += 1;
            }
        }

        if swept > 0 {
            info!(count = swept, "expiry sweep transitioned records");
        }
        Ok(swept)
    }

    /// Hard-delete a record. Revocation is the auditable soft path; this
    /// removes the row entirely.
    pub async fn delete_credential(
        &self,
        owner_id: &str,
        record_id: &str,
    ) -> Result<(), VaultError> {
        self.owned_record(owner_id, record_id).await?;
        self.store.delete(record_id).await?;
        info!(record_id = %record_id, "credential deleted");
        Ok(())
    }

    /// Re-encrypt a legacy reversible-encoded value into an envelope.
    /// Administrative/batch use; does not touch the store.
    pub fn migrate_legacy(
        &self,
        raw: &str,
        master_secret: &SecretString,
    ) -> Result<Envelope, VaultError> {
        legacy::migrate(raw, master_secret, self.config.kdf_iterations)
    }

    fn build_record(
        &self,
        owner_id: &str,
        service: ServiceKind,
        key_name: &str,
        envelope: &str,
        opts: &StoreOptions,
        now: DateTime<Utc>,
    ) -> CredentialRecord {
        CredentialRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            service,
            key_name: key_name.to_string(),
            envelope: envelope.to_string(),
            status: CredentialStatus::Active,
            version: 1,
            validity: Validity {
                created_at: now,
                expires_at: expires_at(now, opts.ttl_days),
                rotation_reminder_at: self.rotation_reminder_at(now),
            },
            usage: UsageCounters::new(now, opts.daily_limit.or(self.config.default_daily_limit)),
            audit: AuditInfo {
                created_from_address: opts.created_from_address.clone(),
                ..AuditInfo::default()
            },
            metadata: opts.metadata.clone(),
        }
    }

    fn rotation_reminder_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.config
            .rotation_reminder_days
            .map(|days| now + Duration::days(i64::from(days)))
    }

    /// Find the record a read should target, including non-active records so
    /// the caller gets a lifecycle reason instead of a bare not-found.
    async fn resolve_for_read(
        &self,
        owner_id: &str,
        service: ServiceKind,
        key_name: Option<&str>,
    ) -> Result<CredentialRecord, VaultError> {
        if let Some(key_name) = key_name {
            if let Some(record) = self.store.find_live(owner_id, service, key_name).await? {
                return Ok(record);
            }
            // Only revoked records can remain under this key; report the
            // newest so the caller sees a lifecycle reason, not not-found.
            return self
                .store
                .list_for_owner(owner_id)
                .await?
                .into_iter()
                .find(|r| r.service == service && r.key_name == key_name)
                .ok_or(VaultError::NotFound);
        }

        // No key name: newest active credential for the service wins; if
        // none is active, report the newest record's state as the reason.
        let records: Vec<CredentialRecord> = self
            .store
            .list_for_owner(owner_id)
            .await?
            .into_iter()
            .filter(|r| r.service == service)
            .collect();

        if let Some(active) = records
            .iter()
            .find(|r| r.status == CredentialStatus::Active)
        {
            return Ok(active.clone());
        }
        records.into_iter().next().ok_or(VaultError::NotFound)
    }

    /// Fetch a record and verify ownership. A foreign record id reports
    /// not-found rather than confirming its existence.
    async fn owned_record(
        &self,
        owner_id: &str,
        record_id: &str,
    ) -> Result<CredentialRecord, VaultError> {
        let record = self
            .store
            .get(record_id)
            .await?
            .ok_or(VaultError::NotFound)?;
        if record.owner_id != owner_id {
            return Err(VaultError::NotFound);
        }
        Ok(record)
    }

    /// Best-effort status transition used by lazy expiry. A lost CAS means
    /// another writer got there first, which is fine.
    async fn transition_status(&self, record: &CredentialRecord, status: CredentialStatus) {
        let mut updated = record.clone();
        updated.status = status;
        match self.store.update_if_version(&updated, record.version).await {
            Ok(true) => debug!(record_id = %record.id, status = %status, "lazy status transition"),
            Ok(false) => {}
            Err(e) => warn!(record_id = %record.id, error = %e, "lazy status transition failed"),
        }
    }
}

fn expires_at(now: DateTime<Utc>, ttl_days: Option<u32>) -> Option<DateTime<Utc>> {
    ttl_days.map(|days| now + Duration::days(i64::from(days)))
}
