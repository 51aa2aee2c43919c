// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory document store, for tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, instrument};

use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{Document, DocumentId, SealRecord};

use crate::{DocumentStore, WriteKind, check_write};

#[derive(Debug, Default)]
struct Tables {
    documents: HashMap<DocumentId, Document>,
    /// Keyed by reference number.
    seals: HashMap<String, SealRecord>,
    seal_by_document: HashMap<DocumentId, String>,
}

/// [`DocumentStore`] over hash maps behind one mutex.  Each operation holds
/// the lock for its whole check-and-write, which makes it atomic.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    tables: Mutex<Tables>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| DocsealError::Internal("document store lock poisoned".into()))
    }
}

impl Tables {
    fn check(&self, doc: &Document, expected_revision: u64, kind: WriteKind<'_>) -> Result<()> {
        let stored = self
            .documents
            .get(&doc.id)
            .ok_or_else(|| DocsealError::document_not_found(doc.id))?;
        check_write(stored, doc, expected_revision, kind)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn insert(&self, doc: &Document) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.documents.contains_key(&doc.id) {
            return Err(DocsealError::Database(format!("document {} already exists", doc.id)));
        }
        tables.documents.insert(doc.id, doc.clone());
        debug!(document = %doc.id, "document inserted");
        Ok(())
    }

    fn get(&self, id: DocumentId) -> Result<Document> {
        self.lock()?
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| DocsealError::document_not_found(id))
    }

    fn list(&self) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self.lock()?.documents.values().cloned().collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    fn update(&self, doc: &Document, expected_revision: u64) -> Result<()> {
        let mut tables = self.lock()?;
        tables.check(doc, expected_revision, WriteKind::Update)?;
        tables.documents.insert(doc.id, doc.clone());
        Ok(())
    }

    #[instrument(skip_all, fields(document = %doc.id, reference = %seal.reference_number))]
    fn commit_seal(&self, doc: &Document, expected_revision: u64, seal: &SealRecord) -> Result<()> {
        let mut tables = self.lock()?;
        tables.check(doc, expected_revision, WriteKind::Seal(seal))?;
        if tables.seals.contains_key(&seal.reference_number) {
            return Err(DocsealError::ReferenceCollision(seal.reference_number.clone()));
        }
        if tables.seal_by_document.contains_key(&seal.document_id) {
            return Err(DocsealError::StaleRevision(seal.document_id.to_string()));
        }
        tables.documents.insert(doc.id, doc.clone());
        tables
            .seal_by_document
            .insert(seal.document_id, seal.reference_number.clone());
        tables
            .seals
            .insert(seal.reference_number.clone(), seal.clone());
        debug!("seal committed");
        Ok(())
    }

    fn commit_supersede(
        &self,
        successor: &Document,
        previous: &Document,
        expected_revision: u64,
    ) -> Result<()> {
        let mut tables = self.lock()?;
        tables.check(previous, expected_revision, WriteKind::Update)?;
        if tables.documents.contains_key(&successor.id) {
            return Err(DocsealError::Database(format!(
                "document {} already exists",
                successor.id
            )));
        }
        tables.documents.insert(previous.id, previous.clone());
        tables.documents.insert(successor.id, successor.clone());
        Ok(())
    }

    fn seal_by_reference(&self, reference_number: &str) -> Result<Option<SealRecord>> {
        Ok(self.lock()?.seals.get(reference_number).cloned())
    }

    fn seal_for_document(&self, id: DocumentId) -> Result<Option<SealRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .seal_by_document
            .get(&id)
            .and_then(|reference| tables.seals.get(reference))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    #[test]
    fn satisfies_store_contract() {
        contract::run_all(|| Box::new(MemoryDocumentStore::new()));
    }

    #[test]
    fn list_is_newest_first() {
        let store = MemoryDocumentStore::new();
        let mut older = contract::draft();
        older.created_at -= chrono::Duration::hours(1);
        let newer = contract::draft();
        store.insert(&older).unwrap();
        store.insert(&newer).unwrap();

        let ids: Vec<DocumentId> = store.list().unwrap().iter().map(|d| d.id).collect();
        assert_eq!(ids, [newer.id, older.id]);
    }
}
