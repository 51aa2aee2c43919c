// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docseal-store: Document and seal persistence.
//
// Every write is conditional on the revision the caller read
// (write-if-unchanged).  The store also refuses any write that rewrites
// append-only data, whatever the caller's revision.

pub mod memory;
pub mod sqlite;

use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{Document, DocumentId, DocumentStatus, SealRecord};

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Repository for documents and their seal records.
///
/// Implementations are synchronous; async callers drive them from
/// `tokio::task::spawn_blocking`.
pub trait DocumentStore: Send + Sync {
    /// Persist a new document.  Fails if the id already exists.
    fn insert(&self, doc: &Document) -> Result<()>;

    /// Load a document, `NotFound` if absent.
    fn get(&self, id: DocumentId) -> Result<Document>;

    /// Every document, newest first.
    fn list(&self) -> Result<Vec<Document>>;

    /// Replace the stored copy of `doc` if its stored revision is still
    /// `expected_revision`.  `doc.revision` must be `expected_revision + 1`.
    fn update(&self, doc: &Document, expected_revision: u64) -> Result<()>;

    /// `update` plus inserting `seal`, in one transaction.
    fn commit_seal(&self, doc: &Document, expected_revision: u64, seal: &SealRecord) -> Result<()>;

    /// Insert `successor` and update `previous` (which now points at it) in one
    /// transaction.
    fn commit_supersede(
        &self,
        successor: &Document,
        previous: &Document,
        expected_revision: u64,
    ) -> Result<()>;

    fn seal_by_reference(&self, reference_number: &str) -> Result<Option<SealRecord>>;

    fn seal_for_document(&self, id: DocumentId) -> Result<Option<SealRecord>>;
}

/// What a conditional write is allowed to commit.
#[derive(Debug, Clone, Copy)]
pub enum WriteKind<'a> {
    /// `update` and `commit_supersede`: never moves a document into `Sealed`.
    Update,
    /// `commit_seal`: the document becomes `Sealed` under exactly this record.
    Seal(&'a SealRecord),
}

/// Validate a conditional write of `incoming` over `stored`.
pub fn check_write(
    stored: &Document,
    incoming: &Document,
    expected_revision: u64,
    kind: WriteKind<'_>,
) -> Result<()> {
    if stored.revision != expected_revision {
        return Err(DocsealError::StaleRevision(stored.id.to_string()));
    }
    if incoming.revision != expected_revision + 1 {
        return Err(DocsealError::Internal(format!(
            "document {} written with revision {} over {}",
            incoming.id, incoming.revision, expected_revision
        )));
    }
    if let Some(field) = incoming.append_only_violation(stored) {
        return Err(DocsealError::AppendOnlyViolation {
            id: stored.id.to_string(),
            field,
        });
    }
    match kind {
        WriteKind::Update => {
            if incoming.status == DocumentStatus::Sealed && stored.status != DocumentStatus::Sealed {
                return Err(DocsealError::InvalidTransition {
                    action: "seal without a seal record",
                    from: stored.status,
                });
            }
        }
        WriteKind::Seal(seal) => {
            if stored.status == DocumentStatus::Sealed {
                return Err(DocsealError::InvalidTransition {
                    action: "seal",
                    from: stored.status,
                });
            }
            let matches = incoming.status == DocumentStatus::Sealed
                && seal.document_id == incoming.id
                && incoming.seal_id == Some(seal.seal_id)
                && incoming.reference_number.as_deref() == Some(seal.reference_number.as_str());
            if !matches {
                return Err(DocsealError::Internal(format!(
                    "seal {} does not match document {}",
                    seal.seal_id, incoming.id
                )));
            }
        }
    }
    Ok(())
}
