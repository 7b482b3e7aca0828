// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Migration of legacy reversible-encoded secrets into encrypted envelopes.
//!
//! The legacy format stored API keys as plain base64 of the secret text. It
//! provided no confidentiality or integrity; values must be re-encrypted,
//! not re-wrapped. Detection is best-effort classification of the decoded
//! shape, not a security boundary.
//!
//! Migration is idempotent per value: input that already parses as a current
//! envelope is returned unchanged, so a batch interrupted mid-run can simply
//! be re-run.

use apivault_core::VaultError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secrecy::SecretString;
use tracing::{info, warn};

use crate::engine;
use crate::envelope::Envelope;

/// Prefixes a decoded legacy value is expected to start with.
const LEGACY_SECRET_PREFIXES: &[&str] = &["sk-", "pk-", "api-", "key-"];

/// Heuristic check for a legacy-encoded secret.
///
/// True when `raw` is not a current envelope, decodes as base64 to UTF-8
/// text, and the decoded text matches a recognizable secret shape.
pub fn detect(raw: &str) -> bool {
    if Envelope::decode(raw).is_ok() {
        return false;
    }
    match decode_legacy(raw) {
        Some(decoded) => LEGACY_SECRET_PREFIXES
            .iter()
            .any(|prefix| decoded.starts_with(prefix)),
        None => false,
    }
}

/// Re-encrypt a legacy-encoded secret into a current envelope.
///
/// Already-migrated input (anything that parses as a current envelope) is a
/// no-op and is returned as-is. Input that is neither an envelope nor a
/// recognizable legacy value fails with [`VaultError::Validation`].
pub fn migrate(
    raw: &str,
    master_secret: &SecretString,
    kdf_iterations: u32,
) -> Result<Envelope, VaultError> {
    match Envelope::decode(raw) {
        Ok(envelope) => {
            info!("value already in envelope format, migration is a no-op");
            return Ok(envelope);
        }
        Err(VaultError::UnsupportedFormat(detail)) => {
            // Looks like an envelope but from a future or foreign format;
            // refusing is safer than guessing.
            return Err(VaultError::UnsupportedFormat(detail));
        }
        Err(_) => {}
    }

    let plaintext = decode_legacy(raw)
        .ok_or_else(|| VaultError::Validation("value is not a recognizable legacy secret".to_string()))?;

    engine::encrypt(&plaintext, master_secret, kdf_iterations)
}

/// Outcome of a batch migration run.
///
/// Entries are identified by the caller-supplied label; secret material never
/// appears in the report.
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Labels migrated this run, with their new envelopes.
    pub migrated: Vec<(String, Envelope)>,
    /// Labels that were already in envelope format.
    pub skipped: Vec<String>,
    /// Labels that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

/// Migrate a batch of `(label, raw value)` pairs.
///
/// Each entry is independently idempotent, so re-running after a partial
/// failure only needs the per-value format check and no extra coordination.
pub fn migrate_batch(
    entries: &[(String, String)],
    master_secret: &SecretString,
    kdf_iterations: u32,
) -> MigrationReport {
    let mut report = MigrationReport::default();

    for (label, raw) in entries {
        if Envelope::decode(raw).is_ok() {
            report.skipped.push(label.clone());
            continue;
        }
        match migrate(raw, master_secret, kdf_iterations) {
            Ok(envelope) => {
                info!(label = %label, "migrated legacy secret to envelope format");
                report.migrated.push((label.clone(), envelope));
            }
            Err(e) => {
                warn!(label = %label, error = %e, "legacy migration failed");
                report.failed.push((label.clone(), e.to_string()));
            }
        }
    }

    report
}

/// Reverse the legacy encoding: base64 to UTF-8 text.
fn decode_legacy(raw: &str) -> Option<String> {
    let bytes = BASE64.decode(raw.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const TEST_ITERS: u32 = 1_000;

    fn master() -> SecretString {
        SecretString::from("migration-master".to_string())
    }

    fn legacy(value: &str) -> String {
        BASE64.encode(value)
    }

    #[test]
    fn detect_recognizes_legacy_secrets() {
        assert!(detect(&legacy("sk-live-abc123")));
        assert!(detect(&legacy("api-0099aabb")));
        assert!(detect(&legacy("key-something")));
    }

    #[test]
    fn detect_rejects_non_secrets() {
        // Decodes but has no recognizable prefix.
        assert!(!detect(&legacy("hello world")));
        // Not base64 at all.
        assert!(!detect("!!definitely not base64!!"));
        // Already an envelope.
        let envelope = engine::encrypt("sk-x", &master(), TEST_ITERS).unwrap();
        assert!(!detect(&envelope.encode()));
    }

    #[test]
    fn migrate_recovers_original_plaintext() {
        let envelope = migrate(&legacy("sk-live-abc123"), &master(), TEST_ITERS).unwrap();
        let plaintext = engine::decrypt(&envelope, &master()).unwrap();
        assert_eq!(plaintext.expose_secret(), "sk-live-abc123");
    }

    #[test]
    fn migrate_is_a_noop_on_current_envelopes() {
        let envelope = engine::encrypt("sk-already-done", &master(), TEST_ITERS).unwrap();
        let remigrated = migrate(&envelope.encode(), &master(), TEST_ITERS).unwrap();
        // Byte-identical: no re-encryption happened.
        assert_eq!(remigrated, envelope);
    }

    #[test]
    fn migrate_rejects_future_envelope_versions() {
        let mut encoded = engine::encrypt("sk-x", &master(), TEST_ITERS).unwrap().encode();
        encoded = encoded.replacen("v2:", "v7:", 1);
        assert!(matches!(
            migrate(&encoded, &master(), TEST_ITERS),
            Err(VaultError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn migrate_rejects_unrecognizable_input() {
        assert!(matches!(
            migrate("not legacy, not envelope", &master(), TEST_ITERS),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn batch_migrates_three_distinct_values_that_each_roundtrip() {
        let entries = vec![
            ("openai/default".to_string(), legacy("sk-first-key")),
            ("anthropic/default".to_string(), legacy("sk-second-key")),
            ("custom/reports".to_string(), legacy("api-third-key")),
        ];

        let report = migrate_batch(&entries, &master(), TEST_ITERS);
        assert_eq!(report.migrated.len(), 3);
        assert!(report.skipped.is_empty());
        assert!(report.failed.is_empty());

        let expected = ["sk-first-key", "sk-second-key", "api-third-key"];
        for ((_, envelope), want) in report.migrated.iter().zip(expected) {
            let plaintext = engine::decrypt(envelope, &master()).unwrap();
            assert_eq!(plaintext.expose_secret(), want);
        }
    }

    #[test]
    fn batch_rerun_after_partial_migration_skips_done_work() {
        let first = vec![("a".to_string(), legacy("sk-aaa"))];
        let report = migrate_batch(&first, &master(), TEST_ITERS);
        let (label, envelope) = &report.migrated[0];
        assert_eq!(label, "a");

        // Simulate the resumed batch: one already-migrated value, one fresh.
        let rerun = vec![
            ("a".to_string(), envelope.encode()),
            ("b".to_string(), legacy("sk-bbb")),
        ];
        let report2 = migrate_batch(&rerun, &master(), TEST_ITERS);
        assert_eq!(report2.skipped, vec!["a".to_string()]);
        assert_eq!(report2.migrated.len(), 1);
        assert_eq!(report2.migrated[0].0, "b");
    }

    #[test]
    fn batch_reports_failures_without_aborting() {
        let entries = vec![
            ("good".to_string(), legacy("sk-good")),
            ("bad".to_string(), "garbage-value".to_string()),
        ];
        let report = migrate_batch(&entries, &master(), TEST_ITERS);
        assert_eq!(report.migrated.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
    }
}
