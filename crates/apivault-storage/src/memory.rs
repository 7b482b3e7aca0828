// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`CredentialStore`] for tests and embedders that bring their
//! own durability.
//!
//! Semantics mirror [`crate::sqlite::SqliteStore`]: conditional updates on
//! `version`, and `(owner_id, service, key_name)` unique among non-revoked
//! records.

use std::collections::HashMap;
use std::sync::Mutex;

use apivault_core::{CredentialRecord, CredentialStatus, CredentialStore, ServiceKind, VaultError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// HashMap-backed store guarded by a single mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CredentialRecord>>, VaultError> {
        self.records
            .lock()
            .map_err(|_| VaultError::Internal("memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, record_id: &str) -> Result<Option<CredentialRecord>, VaultError> {
        Ok(self.lock()?.get(record_id).cloned())
    }

    async fn find_live(
        &self,
        owner_id: &str,
        service: ServiceKind,
        key_name: &str,
    ) -> Result<Option<CredentialRecord>, VaultError> {
        Ok(self
            .lock()?
            .values()
            .find(|r| {
                r.owner_id == owner_id
                    && r.service == service
                    && r.key_name == key_name
                    && r.status != CredentialStatus::Revoked
            })
            .cloned())
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<CredentialRecord>, VaultError> {
        let mut records: Vec<CredentialRecord> = self
            .lock()?
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.validity.created_at.cmp(&a.validity.created_at));
        Ok(records)
    }

    async fn insert(&self, record: &CredentialRecord) -> Result<(), VaultError> {
        let mut records = self.lock()?;
        let duplicate = records.values().any(|r| {
            r.owner_id == record.owner_id
                && r.service == record.service
                && r.key_name == record.key_name
                && r.status != CredentialStatus::Revoked
        });
        if duplicate {
            return Err(VaultError::StateConflict(
                "a live credential already exists for this (owner, service, keyName)".to_string(),
            ));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_if_version(
        &self,
        record: &CredentialRecord,
        expected_version: u64,
    ) -> Result<bool, VaultError> {
        let mut records = self.lock()?;
        match records.get(&record.id) {
            Some(existing) if existing.version == expected_version => {
                let mut updated = record.clone();
                updated.version = expected_version + 1;
                records.insert(record.id.clone(), updated);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn list_active_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CredentialRecord>, VaultError> {
        Ok(self
            .lock()?
            .values()
            .filter(|r| r.status == CredentialStatus::Active && r.is_expired_at(now))
            .cloned()
            .collect())
    }

    async fn delete(&self, record_id: &str) -> Result<(), VaultError> {
        self.lock()?.remove(record_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apivault_core::{AuditInfo, UsageCounters, Validity};
    use chrono::Duration;

    fn sample_record(owner: &str, key_name: &str) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner.to_string(),
            service: ServiceKind::Anthropic,
            key_name: key_name.to_string(),
            envelope: "v2:opaque".to_string(),
            status: CredentialStatus::Active,
            version: 1,
            validity: Validity {
                created_at: now,
                expires_at: None,
                rotation_reminder_at: None,
            },
            usage: UsageCounters::new(now, None),
            audit: AuditInfo::default(),
            metadata: vec![],
        }
    }

    #[tokio::test]
    async fn insert_get_and_find_live() {
        let store = MemoryStore::new();
        let record = sample_record("owner-1", "default");
        store.insert(&record).await.unwrap();

        assert!(store.get(&record.id).await.unwrap().is_some());
        let found = store
            .find_live("owner-1", ServiceKind::Anthropic, "default")
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, record.id);
    }

    #[tokio::test]
    async fn duplicate_live_key_conflicts_but_revoked_does_not() {
        let store = MemoryStore::new();
        let record = sample_record("owner-1", "default");
        store.insert(&record).await.unwrap();

        let result = store.insert(&sample_record("owner-1", "default")).await;
        assert!(matches!(result, Err(VaultError::StateConflict(_))));

        // Revoke the first, then the key is free again.
        let mut revoked = record.clone();
        revoked.status = CredentialStatus::Revoked;
        assert!(store.update_if_version(&revoked, 1).await.unwrap());
        store.insert(&sample_record("owner-1", "default")).await.unwrap();
    }

    #[tokio::test]
    async fn update_if_version_rejects_stale_writers() {
        let store = MemoryStore::new();
        let mut record = sample_record("owner-1", "default");
        store.insert(&record).await.unwrap();

        record.status = CredentialStatus::Inactive;
        assert!(store.update_if_version(&record, 1).await.unwrap());
        assert!(!store.update_if_version(&record, 1).await.unwrap());

        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched.version, 2);
    }

    #[tokio::test]
    async fn list_active_expired_honors_expiry() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut overdue = sample_record("owner-1", "overdue");
        overdue.validity.expires_at = Some(now - Duration::minutes(1));
        store.insert(&overdue).await.unwrap();

        let fresh = sample_record("owner-1", "fresh");
        store.insert(&fresh).await.unwrap();

        let expired = store.list_active_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, overdue.id);
    }
}
