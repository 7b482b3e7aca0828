// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed [`CredentialStore`].
//!
//! The database holds opaque encrypted envelopes only; no cryptographic
//! logic lives in the data layer. All access goes through tokio-rusqlite's
//! single background thread, which also serializes the check-then-insert in
//! [`SqliteStore::insert`]. Conditional updates compare the persisted
//! `version` column so lifecycle transitions are compare-and-set.

use apivault_core::{CredentialRecord, CredentialStore, ServiceKind, VaultError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS credentials (
    id TEXT PRIMARY KEY NOT NULL,
    owner_id TEXT NOT NULL,
    service TEXT NOT NULL,
    key_name TEXT NOT NULL,
    envelope TEXT NOT NULL,
    status TEXT NOT NULL,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    rotation_reminder_at TEXT,
    usage_count INTEGER NOT NULL DEFAULT 0,
    total_units_consumed INTEGER NOT NULL DEFAULT 0,
    daily_used INTEGER NOT NULL DEFAULT 0,
    daily_reset_at TEXT NOT NULL,
    daily_limit INTEGER,
    created_from_address TEXT,
    last_used_from_address TEXT,
    last_validation_at TEXT,
    last_validation_error TEXT,
    metadata TEXT NOT NULL DEFAULT '[]'
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_credentials_live_key
    ON credentials (owner_id, service, key_name) WHERE status != 'revoked';
CREATE INDEX IF NOT EXISTS idx_credentials_owner
    ON credentials (owner_id, created_at);
";

const COLUMNS: &str = "id, owner_id, service, key_name, envelope, status, version, \
     created_at, expires_at, rotation_reminder_at, \
     usage_count, total_units_consumed, daily_used, daily_reset_at, daily_limit, \
     created_from_address, last_used_from_address, last_validation_at, last_validation_error, \
     metadata";

/// SQLite persistence for credential records.
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    /// Open (or create) the credentials database at `path`.
    pub async fn open(path: &str) -> Result<Self, VaultError> {
        let conn = tokio_rusqlite::Connection::open(path.to_owned())
            .await
            .map_err(|e| map_tr_err(tokio_rusqlite::Error::Error(e)))?;
        Self::init(conn).await
    }

    /// Open an in-memory database. Test and embedder use.
    pub async fn open_in_memory() -> Result<Self, VaultError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| map_tr_err(tokio_rusqlite::Error::Error(e)))?;
        Self::init(conn).await
    }

    async fn init(conn: tokio_rusqlite::Connection) -> Result<Self, VaultError> {
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        debug!("credentials schema ready");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn get(&self, record_id: &str) -> Result<Option<CredentialRecord>, VaultError> {
        let record_id = record_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM credentials WHERE id = ?1"
                ))?;
                let result = stmt.query_row(params![record_id], row_to_record);
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn find_live(
        &self,
        owner_id: &str,
        service: ServiceKind,
        key_name: &str,
    ) -> Result<Option<CredentialRecord>, VaultError> {
        let owner_id = owner_id.to_string();
        let service = service.to_string();
        let key_name = key_name.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM credentials \
                     WHERE owner_id = ?1 AND service = ?2 AND key_name = ?3 AND status != 'revoked'"
                ))?;
                let result = stmt.query_row(params![owner_id, service, key_name], row_to_record);
                match result {
                    Ok(record) => Ok(Some(record)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<CredentialRecord>, VaultError> {
        let owner_id = owner_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM credentials \
                     WHERE owner_id = ?1 ORDER BY created_at DESC"
                ))?;
                let rows = stmt.query_map(params![owner_id], row_to_record)?;
                let mut records = Vec::new();
                for row in rows {
                    records.push(row?);
                }
                Ok(records)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn insert(&self, record: &CredentialRecord) -> Result<(), VaultError> {
        let record = record.clone();
        let metadata = encode_metadata(&record)?;
        let inserted = self
            .conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                // The background thread serializes calls, so this
                // check-then-insert cannot interleave with another writer.
                let live: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM credentials \
                     WHERE owner_id = ?1 AND service = ?2 AND key_name = ?3 AND status != 'revoked'",
                    params![record.owner_id, record.service.to_string(), record.key_name],
                    |row| row.get(0),
                )?;
                if live > 0 {
                    return Ok(false);
                }
                conn.execute(
                    "INSERT INTO credentials (id, owner_id, service, key_name, envelope, status, version, \
                        created_at, expires_at, rotation_reminder_at, \
                        usage_count, total_units_consumed, daily_used, daily_reset_at, daily_limit, \
                        created_from_address, last_used_from_address, last_validation_at, last_validation_error, \
                        metadata) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                    params![
                        record.id,
                        record.owner_id,
                        record.service.to_string(),
                        record.key_name,
                        record.envelope,
                        record.status.to_string(),
                        record.version as i64,
                        record.validity.created_at.to_rfc3339(),
                        record.validity.expires_at.map(|t| t.to_rfc3339()),
                        record.validity.rotation_reminder_at.map(|t| t.to_rfc3339()),
                        record.usage.usage_count as i64,
                        record.usage.total_units_consumed as i64,
                        record.usage.daily_used as i64,
                        record.usage.daily_reset_at.to_rfc3339(),
                        record.usage.daily_limit.map(|v| v as i64),
                        record.audit.created_from_address,
                        record.audit.last_used_from_address,
                        record.audit.last_validation_at.map(|t| t.to_rfc3339()),
                        record.audit.last_validation_error,
                        metadata,
                    ],
                )?;
                Ok(true)
            })
            .await
            .map_err(map_tr_err)?;

        if !inserted {
            return Err(VaultError::StateConflict(
                "a live credential already exists for this (owner, service, keyName)".to_string(),
            ));
        }
        Ok(())
    }

    async fn update_if_version(
        &self,
        record: &CredentialRecord,
        expected_version: u64,
    ) -> Result<bool, VaultError> {
        let record = record.clone();
        let metadata = encode_metadata(&record)?;
        let changed = self
            .conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE credentials SET \
                        envelope = ?1, status = ?2, version = ?3, \
                        created_at = ?4, expires_at = ?5, rotation_reminder_at = ?6, \
                        usage_count = ?7, total_units_consumed = ?8, daily_used = ?9, \
                        daily_reset_at = ?10, daily_limit = ?11, \
                        created_from_address = ?12, last_used_from_address = ?13, \
                        last_validation_at = ?14, last_validation_error = ?15, \
                        metadata = ?16 \
                     WHERE id = ?17 AND version = ?18",
                    params![
                        record.envelope,
                        record.status.to_string(),
                        (expected_version + 1) as i64,
                        record.validity.created_at.to_rfc3339(),
                        record.validity.expires_at.map(|t| t.to_rfc3339()),
                        record.validity.rotation_reminder_at.map(|t| t.to_rfc3339()),
                        record.usage.usage_count as i64,
                        record.usage.total_units_consumed as i64,
                        record.usage.daily_used as i64,
                        record.usage.daily_reset_at.to_rfc3339(),
                        record.usage.daily_limit.map(|v| v as i64),
                        record.audit.created_from_address,
                        record.audit.last_used_from_address,
                        record.audit.last_validation_at.map(|t| t.to_rfc3339()),
                        record.audit.last_validation_error,
                        metadata,
                        record.id,
                        expected_version as i64,
                    ],
                )
            })
            .await
            .map_err(map_tr_err)?;
        Ok(changed == 1)
    }

    async fn list_active_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CredentialRecord>, VaultError> {
        let cutoff = now.to_rfc3339();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM credentials \
                     WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= ?1"
                ))?;
                let rows = stmt.query_map(params![cutoff], row_to_record)?;
                let mut records = Vec::new();
                for row in rows {
                    records.push(row?);
                }
                Ok(records)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete(&self, record_id: &str) -> Result<(), VaultError> {
        let record_id = record_id.to_string();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute("DELETE FROM credentials WHERE id = ?1", params![record_id])?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Map a single row (in [`COLUMNS`] order) to a record.
fn row_to_record(row: &rusqlite::Row<'_>) -> Result<CredentialRecord, rusqlite::Error> {
    use apivault_core::{AuditInfo, UsageCounters, Validity};

    let service: String = row.get(2)?;
    let status: String = row.get(5)?;
    let metadata_json: String = row.get(19)?;

    Ok(CredentialRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        service: parse_column(2, &service)?,
        key_name: row.get(3)?,
        envelope: row.get(4)?,
        status: parse_column(5, &status)?,
        version: row.get::<_, i64>(6)? as u64,
        validity: Validity {
            created_at: parse_ts(7, row.get(7)?)?,
            expires_at: parse_opt_ts(8, row.get(8)?)?,
            rotation_reminder_at: parse_opt_ts(9, row.get(9)?)?,
        },
        usage: UsageCounters {
            usage_count: row.get::<_, i64>(10)? as u64,
            total_units_consumed: row.get::<_, i64>(11)? as u64,
            daily_used: row.get::<_, i64>(12)? as u64,
            daily_reset_at: parse_ts(13, row.get(13)?)?,
            daily_limit: row.get::<_, Option<i64>>(14)?.map(|v| v as u64),
        },
        audit: AuditInfo {
            created_from_address: row.get(15)?,
            last_used_from_address: row.get(16)?,
            last_validation_at: parse_opt_ts(17, row.get(17)?)?,
            last_validation_error: row.get(18)?,
        },
        metadata: serde_json::from_str(&metadata_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(19, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

fn parse_column<T: std::str::FromStr>(index: usize, raw: &str) -> Result<T, rusqlite::Error>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_ts(index: usize, raw: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_opt_ts(index: usize, raw: Option<String>) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    raw.map(|r| parse_ts(index, r)).transpose()
}

fn encode_metadata(record: &CredentialRecord) -> Result<String, VaultError> {
    serde_json::to_string(&record.metadata).map_err(VaultError::storage)
}

/// Convert tokio-rusqlite errors to [`VaultError::Storage`].
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> VaultError {
    VaultError::Storage {
        source: e.to_string().into(),
    }
}
