// SPDX-FileCopyrightText: 2026 Apivault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptography for the apivault credential vault.
//!
//! A per-record key is derived from the caller-supplied master secret with
//! PBKDF2-HMAC-SHA256 and a fresh random salt, then used for AES-256-GCM
//! authenticated encryption. The result travels as a self-describing
//! [`Envelope`]. The [`legacy`] module converts values from the old
//! reversible base64 encoding into envelopes.
//!
//! All operations here are stateless and synchronous; key buffers are
//! zeroized on drop.

pub mod aead;
pub mod engine;
pub mod envelope;
pub mod kdf;
pub mod legacy;

pub use engine::{decrypt, encrypt};
pub use envelope::{Envelope, ALGORITHM_AES_256_GCM, FORMAT_VERSION};
pub use legacy::{detect, migrate, migrate_batch, MigrationReport};
