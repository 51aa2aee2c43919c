// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document integrity: SHA-256 hashing for tamper detection.
//
// The seal hash covers the merged content and the signatures.  Signatures are
// canonicalised (sorted by role, every field length-prefixed) so the hash does
// not depend on the order signatures were collected in or on how a store
// happens to serialise them.

use chrono::SecondsFormat;
use docseal_core::error::DocsealError;
use docseal_core::types::Signature;
use sha2::{Digest, Sha256};

/// Domain separator for content hashes.
const CONTENT_HASH_DOMAIN: &[u8] = b"docseal-content-v1\0";

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Hash of `content` plus the canonical form of `signatures`.
pub fn content_hash(content: &str, signatures: &[Signature]) -> String {
    let mut sorted: Vec<&Signature> = signatures.iter().collect();
    sorted.sort_by(|a, b| a.role.cmp(&b.role));

    let mut hasher = Sha256::new();
    hasher.update(CONTENT_HASH_DOMAIN);
    write_field(&mut hasher, content.as_bytes());
    hasher.update((sorted.len() as u64).to_be_bytes());
    for sig in sorted {
        write_field(&mut hasher, sig.role.as_str().as_bytes());
        write_field(&mut hasher, sig.signer_id.as_bytes());
        write_field(&mut hasher, sig.signer_name.as_bytes());
        let signed_at = sig.signed_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        write_field(&mut hasher, signed_at.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Check a live document body against a stored seal hash.
pub fn verify_content_hash(
    content: &str,
    signatures: &[Signature],
    expected_hex: &str,
) -> Result<(), DocsealError> {
    let actual = content_hash(content, signatures);
    if constant_time_eq(actual.as_bytes(), expected_hex.as_bytes()) {
        Ok(())
    } else {
        Err(DocsealError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

fn write_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
