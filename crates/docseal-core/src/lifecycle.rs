// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document lifecycle state machine.
//
//   DRAFT ──request/sign──▶ PENDING_SIGNATURE ──last sign + seal──▶ SEALED
//     │                            │
//     └──────────cancel────────────┴──▶ CANCELLED
//
// Every transition appends exactly one history entry.  These methods only
// mutate the in-memory value; persistence (and the revision check that goes
// with it) belongs to the store.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::error::{DocsealError, Result};
use crate::types::{
    Document, DocumentId, DocumentStatus, EntityData, HistoryAction, HistoryEntry, SealId,
    Signature, SignatureRequest, SignerRole, Template,
};

impl Document {
    /// Build a fresh `Draft` from merged content, snapshotting the template's
    /// signer roles.
    pub fn new_draft(
        template: &Template,
        entity_id: &str,
        content: String,
        actor: &str,
        supersedes: Option<DocumentId>,
    ) -> Self {
        let now = Utc::now();
        let mut doc = Self {
            id: DocumentId::new(),
            template_id: template.id.clone(),
            entity_id: entity_id.to_owned(),
            document_type: template.document_type.clone(),
            version: 1,
            revision: 0,
            content,
            status: DocumentStatus::Draft,
            required_signers: template.required_signer_roles.clone(),
            signature_requests: Vec::new(),
            signatures: Vec::new(),
            reference_number: None,
            seal_id: None,
            supersedes,
            superseded_by: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let details = match supersedes {
            Some(previous) => format!("from template {} (supersedes {previous})", template.id),
            None => format!("from template {}", template.id),
        };
        doc.record(HistoryAction::Generated, actor, Some(details));
        doc
    }

    /// Roles that have signed so far.
    pub fn signed_roles(&self) -> BTreeSet<SignerRole> {
        self.signatures.iter().map(|s| s.role.clone()).collect()
    }

    /// Required roles that have not signed yet, in role order.
    pub fn missing_roles(&self) -> Vec<SignerRole> {
        let signed = self.signed_roles();
        self.required_signers
            .iter()
            .filter(|role| !signed.contains(*role))
            .cloned()
            .collect()
    }

    /// True when the signed-role set equals the required set exactly.
    pub fn is_fully_signed(&self) -> bool {
        self.signatures.len() == self.required_signers.len()
            && self.signed_roles() == self.required_signers
    }

    /// Ask `role` to sign.  Moves `Draft` to `PendingSignature`.
    pub fn request_signature(&mut self, role: &SignerRole, actor: &str) -> Result<()> {
        self.ensure_open("request a signature on")?;
        if !self.required_signers.contains(role) {
            return Err(DocsealError::UnauthorizedSigner {
                role: role.to_string(),
            });
        }
        if self.signed_roles().contains(role) {
            return Err(DocsealError::DuplicateSignature {
                role: role.to_string(),
            });
        }

        let now = Utc::now();
        self.signature_requests.push(SignatureRequest {
            role: role.clone(),
            requested_by: actor.to_owned(),
            requested_at: now,
        });
        self.status = DocumentStatus::PendingSignature;
        self.record(
            HistoryAction::SignatureRequested,
            actor,
            Some(format!("role {role}")),
        );
        Ok(())
    }

    /// Append a signature for `role`.  The document stays (or becomes)
    /// `PendingSignature`; sealing is a separate step driven by the caller
    /// once [`is_fully_signed`](Self::is_fully_signed) holds.
    pub fn add_signature(
        &mut self,
        signer_id: &str,
        signer_name: &str,
        role: &SignerRole,
    ) -> Result<()> {
        self.ensure_open("sign")?;
        if !self.required_signers.contains(role) {
            return Err(DocsealError::UnauthorizedSigner {
                role: role.to_string(),
            });
        }
        if self.signed_roles().contains(role) {
            return Err(DocsealError::DuplicateSignature {
                role: role.to_string(),
            });
        }

        self.signatures.push(Signature {
            signer_id: signer_id.to_owned(),
            signer_name: signer_name.to_owned(),
            role: role.clone(),
            signed_at: Utc::now(),
        });
        self.status = DocumentStatus::PendingSignature;
        self.record(
            HistoryAction::Signed,
            signer_id,
            Some(format!("role {role} signed by {signer_name}")),
        );
        Ok(())
    }

    /// Withdraw the document.  Only `Draft` and `PendingSignature` documents
    /// can be cancelled.
    pub fn cancel(&mut self, reason: &str, actor: &str) -> Result<()> {
        self.ensure_open("cancel")?;
        self.status = DocumentStatus::Cancelled;
        self.record(HistoryAction::Cancelled, actor, Some(reason.to_owned()));
        Ok(())
    }

    /// Replace the merged content of a `Draft` and bump its version.
    pub fn replace_content(&mut self, content: String, actor: &str) -> Result<()> {
        if self.status != DocumentStatus::Draft {
            return Err(DocsealError::InvalidTransition {
                action: "regenerate",
                from: self.status,
            });
        }
        self.content = content;
        self.version += 1;
        let details = format!("version {}", self.version);
        self.record(HistoryAction::Regenerated, actor, Some(details));
        Ok(())
    }

    /// Freeze the document under a seal.
    ///
    /// Requires `PendingSignature` with every required role signed.
    pub fn mark_sealed(&mut self, seal_id: SealId, reference_number: &str, issuer: &str) -> Result<()> {
        if self.status != DocumentStatus::PendingSignature {
            return Err(DocsealError::InvalidTransition {
                action: "seal",
                from: self.status,
            });
        }
        if !self.is_fully_signed() {
            return Err(DocsealError::IncompleteSignatures {
                missing: self.missing_roles().into_iter().map(String::from).collect(),
            });
        }
        self.status = DocumentStatus::Sealed;
        self.seal_id = Some(seal_id);
        self.reference_number = Some(reference_number.to_owned());
        self.record(
            HistoryAction::Sealed,
            issuer,
            Some(format!("reference {reference_number}")),
        );
        Ok(())
    }

    /// Record that `successor` replaces this sealed document.  Content and
    /// seal stay untouched.
    pub fn mark_superseded(&mut self, successor: DocumentId, reason: &str, actor: &str) -> Result<()> {
        if self.status != DocumentStatus::Sealed || self.superseded_by.is_some() {
            return Err(DocsealError::InvalidTransition {
                action: "supersede",
                from: self.status,
            });
        }
        self.superseded_by = Some(successor);
        self.record(
            HistoryAction::Superseded,
            actor,
            Some(format!("by {successor}: {reason}")),
        );
        Ok(())
    }

    /// Check that `self` is a legal successor of the `stored` copy: history,
    /// requests and signatures only grow, status only moves forward, content
    /// only changes in `Draft`, and seal and supersede links never change
    /// once set.  Returns the first offending field.
    pub fn append_only_violation(&self, stored: &Document) -> Option<&'static str> {
        if !status_may_follow(stored.status, self.status) {
            return Some("status");
        }
        if !self.history.starts_with(&stored.history) {
            return Some("history");
        }
        if !self.signatures.starts_with(&stored.signatures) {
            return Some("signatures");
        }
        if !self.signature_requests.starts_with(&stored.signature_requests) {
            return Some("signature_requests");
        }
        if stored.status != DocumentStatus::Draft && self.content != stored.content {
            return Some("content");
        }
        if stored.reference_number.is_some() && self.reference_number != stored.reference_number {
            return Some("reference_number");
        }
        if stored.seal_id.is_some() && self.seal_id != stored.seal_id {
            return Some("seal_id");
        }
        if stored.superseded_by.is_some() && self.superseded_by != stored.superseded_by {
            return Some("superseded_by");
        }
        None
    }

    fn ensure_open(&self, action: &'static str) -> Result<()> {
        match self.status {
            DocumentStatus::Draft | DocumentStatus::PendingSignature => Ok(()),
            from => Err(DocsealError::InvalidTransition { action, from }),
        }
    }

    fn record(&mut self, action: HistoryAction, actor: &str, details: Option<String>) {
        let now = Utc::now();
        self.history.push(HistoryEntry {
            action,
            actor: actor.to_owned(),
            timestamp: now,
            details,
        });
        self.updated_at = now;
    }
}

/// Persisted status moves: staying put, `Draft` to `PendingSignature`, and
/// either open status into `Sealed` or `Cancelled`.  Nothing leaves a
/// terminal status.
fn status_may_follow(from: DocumentStatus, to: DocumentStatus) -> bool {
    use DocumentStatus::{Cancelled, Draft, PendingSignature, Sealed};
    from == to
        || matches!(
            (from, to),
            (Draft, PendingSignature) | (Draft | PendingSignature, Sealed | Cancelled)
        )
}

/// The first field the template lists as required that `data` lacks.
pub fn first_missing_field<'a>(template: &'a Template, data: &EntityData) -> Option<&'a str> {
    template
        .required_fields
        .iter()
        .map(String::as_str)
        .find(|field| !data.contains_key(*field))
}
