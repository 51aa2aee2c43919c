// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sealing: freeze a fully signed document under a content hash, a public
// reference number, and the issuer's signature.

use std::sync::Arc;

use chrono::Utc;
use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{Document, DocumentStatus, SealId, SealRecord};
use docseal_security::{IssuerKey, ReferenceNumber, content_hash};
use docseal_store::DocumentStore;
use tracing::{info, instrument, warn};

/// Fresh reference numbers tried before giving up on a seal.
const REFERENCE_ATTEMPTS: u32 = 8;

/// Produces and commits seal records.
#[derive(Debug, Clone)]
pub struct Sealer {
    issuer_key: Arc<IssuerKey>,
}

impl Sealer {
    pub fn new(issuer_key: Arc<IssuerKey>) -> Self {
        Self { issuer_key }
    }

    pub fn issuer_key(&self) -> &Arc<IssuerKey> {
        &self.issuer_key
    }

    /// Seal `doc` and commit it together with its seal record.
    ///
    /// `doc` must already carry the next revision (`expected_revision + 1`).
    /// On success `doc` is updated in place to its sealed form; on any error
    /// it is left untouched and nothing is written.
    #[instrument(skip_all, fields(document = %doc.id))]
    pub fn seal(
        &self,
        store: &dyn DocumentStore,
        doc: &mut Document,
        expected_revision: u64,
    ) -> Result<SealRecord> {
        if doc.status != DocumentStatus::PendingSignature {
            return Err(DocsealError::InvalidTransition {
                action: "seal",
                from: doc.status,
            });
        }
        if !doc.is_fully_signed() {
            return Err(DocsealError::IncompleteSignatures {
                missing: doc.missing_roles().into_iter().map(String::from).collect(),
            });
        }

        let hash = content_hash(&doc.content, &doc.signatures);
        for attempt in 1..=REFERENCE_ATTEMPTS {
            let reference = ReferenceNumber::generate()?;
            let mut seal = SealRecord {
                seal_id: SealId::new(),
                document_id: doc.id,
                reference_number: reference.to_string(),
                content_hash: hash.clone(),
                sealed_at: Utc::now(),
                issuer: self.issuer_key.name().to_owned(),
                issuer_signature: String::new(),
            };
            seal.issuer_signature = self.issuer_key.sign_seal(&seal)?;

            let mut sealed = doc.clone();
            sealed.mark_sealed(seal.seal_id, &seal.reference_number, &seal.issuer)?;

            match store.commit_seal(&sealed, expected_revision, &seal) {
                Ok(()) => {
                    info!(reference = %seal.reference_number, "document sealed");
                    *doc = sealed;
                    return Ok(seal);
                }
                Err(DocsealError::ReferenceCollision(reference)) => {
                    warn!(attempt, %reference, "reference number collision, drawing another");
                }
                Err(err) => return Err(err),
            }
        }

        Err(DocsealError::Internal(format!(
            "no unique reference number after {REFERENCE_ATTEMPTS} attempts"
        )))
    }
}
