// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence collaborators for the apivault credential vault.
//!
//! Two [`apivault_core::CredentialStore`] implementations: SQLite for
//! durable deployments and an in-memory map for tests. Both hold envelopes
//! as opaque strings; nothing here can decrypt anything.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
