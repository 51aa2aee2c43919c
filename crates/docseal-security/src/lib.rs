// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! docseal-security: tamper evidence for sealed documents.
//!
//! Content hashing over the document and its signatures, typo-detecting
//! reference numbers, the issuer key that countersigns every seal (kept
//! encrypted at rest), and the append-only audit log.

pub mod audit;
pub mod integrity;
pub mod issuer_key;
pub mod reference;
pub mod storage;

pub use audit::AuditLog;
pub use integrity::{content_hash, hash_bytes, verify_content_hash};
pub use issuer_key::IssuerKey;
pub use reference::ReferenceNumber;
pub use storage::EncryptedStorage;
