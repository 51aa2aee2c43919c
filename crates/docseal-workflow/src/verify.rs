// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Public verification of reference numbers.
//
// Callers learn one bit plus a minimal summary.  Malformed, unknown,
// tampered and rate-limited lookups all produce the same negative outcome;
// the reason only goes to the log and, for integrity failures, the audit
// trail.  Audit writes happen on a background thread so a tampered lookup
// answers as quickly as any other.

use std::sync::Arc;
use std::sync::mpsc::{self, Sender};

use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{
    Document, DocumentId, DocumentStatus, PublicStatus, SealRecord, VerificationSummary,
};
use docseal_security::integrity::verify_content_hash;
use docseal_security::{AuditLog, IssuerKey, ReferenceNumber, content_hash};
use docseal_store::DocumentStore;
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::throttle::RateLimiter;

/// Answer to a verification query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<VerificationSummary>,
}

impl VerificationOutcome {
    pub fn not_valid() -> Self {
        Self {
            valid: false,
            summary: None,
        }
    }

    fn valid(summary: VerificationSummary) -> Self {
        Self {
            valid: true,
            summary: Some(summary),
        }
    }
}

/// Why a lookup was refused.  Never shown to the caller.
#[derive(Debug)]
enum Rejection {
    RateLimited,
    Malformed,
    Unknown,
    NotSealed(DocumentStatus),
    Tampered {
        document_id: DocumentId,
        cause: DocsealError,
    },
}

/// An integrity failure bound for the audit log.
struct IntegrityEvent {
    document_id: DocumentId,
    details: String,
}

/// Where integrity events go.
enum AuditSink {
    /// Written by a dedicated thread.
    Queued(Sender<IntegrityEvent>),
    /// Written inline; only when the writer thread could not be started.
    Inline(Arc<AuditLog>),
}

impl AuditSink {
    fn start(audit: Arc<AuditLog>) -> Self {
        let (tx, rx) = mpsc::channel::<IntegrityEvent>();
        let writer_log = audit.clone();
        let spawned = std::thread::Builder::new()
            .name("docseal-verify-audit".into())
            .spawn(move || {
                for event in rx {
                    record_integrity_event(&writer_log, &event);
                }
            });
        match spawned {
            Ok(_) => Self::Queued(tx),
            Err(e) => {
                error!(error = %e, "audit writer thread failed to start, auditing inline");
                Self::Inline(audit)
            }
        }
    }

    fn submit(&self, event: IntegrityEvent) {
        match self {
            Self::Queued(tx) => {
                if let Err(mpsc::SendError(event)) = tx.send(event) {
                    error!(document = %event.document_id, "audit writer gone, integrity event dropped");
                }
            }
            Self::Inline(audit) => record_integrity_event(audit, &event),
        }
    }
}

fn record_integrity_event(audit: &AuditLog, event: &IntegrityEvent) {
    if let Err(e) = audit.record(
        "integrity_mismatch",
        Some(event.document_id),
        "verifier",
        false,
        Some(&event.details),
    ) {
        error!(error = %e, "failed to write audit entry");
    }
}

pub struct Verifier {
    store: Arc<dyn DocumentStore>,
    issuer_key: Arc<IssuerKey>,
    limiter: RateLimiter,
    audit: Option<AuditSink>,
}

impl Verifier {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        issuer_key: Arc<IssuerKey>,
        limiter: RateLimiter,
        audit: Option<Arc<AuditLog>>,
    ) -> Self {
        Self {
            store,
            issuer_key,
            limiter,
            audit: audit.map(AuditSink::start),
        }
    }

    /// Verify `input` on behalf of `caller` (typically the client address).
    #[instrument(skip_all, fields(caller = %caller))]
    pub fn verify(&self, caller: &str, input: &str) -> VerificationOutcome {
        match self.check(caller, input) {
            Ok(summary) => {
                debug!("reference verified");
                VerificationOutcome::valid(summary)
            }
            Err(Rejection::Tampered { document_id, cause }) => {
                warn!(document = %document_id, error = %cause, "sealed document failed integrity check");
                if let Some(sink) = &self.audit {
                    sink.submit(IntegrityEvent {
                        document_id,
                        details: cause.to_string(),
                    });
                }
                VerificationOutcome::not_valid()
            }
            Err(rejection) => {
                debug!(?rejection, "verification rejected");
                VerificationOutcome::not_valid()
            }
        }
    }

    fn check(&self, caller: &str, input: &str) -> std::result::Result<VerificationSummary, Rejection> {
        if !self.limiter.check(caller) {
            warn!("verification rate limit exceeded");
            return Err(Rejection::RateLimited);
        }
        let reference = ReferenceNumber::parse(input).ok_or(Rejection::Malformed)?;

        let lookup = self
            .store
            .seal_by_reference(reference.as_str())
            .and_then(|seal| match seal {
                Some(seal) => self.store.get(seal.document_id).map(|doc| Some((seal, doc))),
                None => Ok(None),
            });
        let (seal, doc) = match lookup {
            Ok(Some(found)) => found,
            Ok(None) => {
                // Keep the unknown path about as expensive as the known one.
                let _ = content_hash(reference.as_str(), &[]);
                return Err(Rejection::Unknown);
            }
            Err(err) => {
                error!(error = %err, "verification lookup failed");
                return Err(Rejection::Unknown);
            }
        };

        if doc.status != DocumentStatus::Sealed {
            return Err(Rejection::NotSealed(doc.status));
        }
        self.check_integrity(&seal, &doc)
            .map_err(|cause| Rejection::Tampered {
                document_id: seal.document_id,
                cause,
            })?;

        Ok(VerificationSummary {
            document_type: doc.document_type.clone(),
            issued_date: seal.sealed_at.date_naive(),
            status: if doc.superseded_by.is_some() {
                PublicStatus::Superseded
            } else {
                PublicStatus::Sealed
            },
        })
    }

    fn check_integrity(&self, seal: &SealRecord, doc: &Document) -> Result<()> {
        if doc.seal_id != Some(seal.seal_id)
            || doc.reference_number.as_deref() != Some(seal.reference_number.as_str())
        {
            return Err(DocsealError::IntegrityMismatch {
                expected: seal.reference_number.clone(),
                actual: doc.reference_number.clone().unwrap_or_default(),
            });
        }
        verify_content_hash(&doc.content, &doc.signatures, &seal.content_hash)?;
        if !self.issuer_key.verify_seal(seal) {
            return Err(DocsealError::IntegrityMismatch {
                expected: "valid issuer signature".into(),
                actual: "signature did not verify".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::Utc;
    use docseal_core::types::{DocumentId, SignerRole, Template};
    use docseal_security::audit::AuditEntry;
    use docseal_store::{MemoryDocumentStore, SqliteDocumentStore};

    use super::*;
    use crate::sealing::Sealer;

    fn template() -> Template {
        Template {
            id: "salary-certificate".into(),
            name: "Salary Certificate".into(),
            document_type: "SALARY_CERTIFICATE".into(),
            body: String::new(),
            required_fields: Vec::new(),
            required_signer_roles: [SignerRole::new("HR_MANAGER")].into_iter().collect(),
        }
    }

    /// Insert and seal a one-signer document, returning it and its seal.
    fn sealed(store: &dyn DocumentStore, key: &Arc<IssuerKey>) -> (Document, SealRecord) {
        let mut doc = Document::new_draft(
            &template(),
            "EMP001",
            "This certifies Ahmed Ali earns 15000 SAR".into(),
            "hr-1",
            None,
        );
        store.insert(&doc).unwrap();
        doc.add_signature("u-1", "Dr. Verify", &SignerRole::new("HR_MANAGER"))
            .unwrap();
        doc.revision += 1;
        let seal = Sealer::new(key.clone()).seal(store, &mut doc, 0).unwrap();
        (doc, seal)
    }

    fn verifier(store: Arc<dyn DocumentStore>, key: Arc<IssuerKey>) -> Verifier {
        Verifier::new(store, key, RateLimiter::new(0, Duration::from_secs(60)), None)
    }

    #[test]
    fn sealed_reference_verifies_with_summary() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let (_, seal) = sealed(store.as_ref(), &key);

        let outcome = verifier(store, key).verify("198.51.100.7", &seal.reference_number);
        assert!(outcome.valid);
        let summary = outcome.summary.unwrap();
        assert_eq!(summary.document_type, "SALARY_CERTIFICATE");
        assert_eq!(summary.issued_date, seal.sealed_at.date_naive());
        assert_eq!(summary.status, PublicStatus::Sealed);
    }

    #[test]
    fn verification_is_idempotent_and_tolerant_of_formatting() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let (_, seal) = sealed(store.as_ref(), &key);
        let verifier = verifier(store, key);

        let first = verifier.verify("c", &seal.reference_number);
        let second = verifier.verify("c", &seal.reference_number);
        assert_eq!(first, second);
        let sloppy = format!("  {}  ", seal.reference_number.to_lowercase());
        assert_eq!(verifier.verify("c", &sloppy), first);
    }

    #[test]
    fn out_of_band_content_edit_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docseal.db");
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open(&path).unwrap());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let audit = Arc::new(AuditLog::open_in_memory().unwrap());
        let (doc, seal) = sealed(store.as_ref(), &key);

        let raw = rusqlite::Connection::open(&path).unwrap();
        raw.execute(
            "UPDATE documents SET content = ?1 WHERE id = ?2",
            rusqlite::params!["This certifies Ahmed Ali earns 95000 SAR", doc.id.to_string()],
        )
        .unwrap();

        let verifier = Verifier::new(
            store,
            key,
            RateLimiter::new(0, Duration::from_secs(60)),
            Some(audit.clone()),
        );
        assert_eq!(
            verifier.verify("c", &seal.reference_number),
            VerificationOutcome::not_valid()
        );
        let entries = audit_entries_eventually(&audit, doc.id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "integrity_mismatch");
        assert!(!entries[0].success);
    }

    #[test]
    fn forged_seal_row_is_rejected() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let (_, seal) = sealed(store.as_ref(), &key);

        let other = Arc::new(IssuerKey::generate("Impostor").unwrap());
        let outcome = verifier(store, other).verify("c", &seal.reference_number);
        assert!(!outcome.valid);
    }

    #[test]
    fn superseded_reference_stays_valid() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let (mut doc, seal) = sealed(store.as_ref(), &key);

        let successor = Document::new_draft(&template(), "EMP001", "v2".into(), "hr-1", Some(doc.id));
        let expected = doc.revision;
        doc.mark_superseded(successor.id, "salary changed", "hr-1").unwrap();
        doc.revision += 1;
        store.commit_supersede(&successor, &doc, expected).unwrap();

        let outcome = verifier(store, key).verify("c", &seal.reference_number);
        assert!(outcome.valid);
        assert_eq!(outcome.summary.unwrap().status, PublicStatus::Superseded);
    }

    #[test]
    fn unknown_but_well_formed_reference_is_not_valid() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let reference = ReferenceNumber::generate().unwrap();
        let outcome = verifier(store, key).verify("c", reference.as_str());
        assert_eq!(outcome, VerificationOutcome::not_valid());
    }

    /// Wraps a store and counts seal lookups.
    struct CountingStore {
        inner: MemoryDocumentStore,
        lookups: AtomicUsize,
    }

    impl DocumentStore for CountingStore {
        fn insert(&self, doc: &Document) -> Result<()> {
            self.inner.insert(doc)
        }
        fn get(&self, id: DocumentId) -> Result<Document> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.get(id)
        }
        fn list(&self) -> Result<Vec<Document>> {
            self.inner.list()
        }
        fn update(&self, doc: &Document, expected_revision: u64) -> Result<()> {
            self.inner.update(doc, expected_revision)
        }
        fn commit_seal(&self, doc: &Document, expected_revision: u64, seal: &SealRecord) -> Result<()> {
            self.inner.commit_seal(doc, expected_revision, seal)
        }
        fn commit_supersede(
            &self,
            successor: &Document,
            previous: &Document,
            expected_revision: u64,
        ) -> Result<()> {
            self.inner.commit_supersede(successor, previous, expected_revision)
        }
        fn seal_by_reference(&self, reference_number: &str) -> Result<Option<SealRecord>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.seal_by_reference(reference_number)
        }
        fn seal_for_document(&self, id: DocumentId) -> Result<Option<SealRecord>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.seal_for_document(id)
        }
    }

    #[test]
    fn malformed_input_never_reaches_the_store() {
        let store = Arc::new(CountingStore {
            inner: MemoryDocumentStore::new(),
            lookups: AtomicUsize::new(0),
        });
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let verifier = verifier(store.clone(), key);

        let valid = ReferenceNumber::generate().unwrap().to_string();
        let mut typo: Vec<char> = valid.chars().collect();
        typo[3] = if typo[3] == 'A' { 'B' } else { 'A' };
        let typo: String = typo.into_iter().collect();

        for input in ["not-a-real-ref", "", "DS-", typo.as_str(), "DS-0000-0000-0000-1"] {
            assert_eq!(verifier.verify("c", input), VerificationOutcome::not_valid());
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn rate_limited_callers_get_the_generic_answer() {
        let store = Arc::new(CountingStore {
            inner: MemoryDocumentStore::new(),
            lookups: AtomicUsize::new(0),
        });
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let (_, seal) = sealed(store.as_ref(), &key);
        let verifier = Verifier::new(
            store.clone(),
            key,
            RateLimiter::new(2, Duration::from_secs(3600)),
            None,
        );

        assert!(verifier.verify("203.0.113.1", &seal.reference_number).valid);
        assert!(verifier.verify("203.0.113.1", &seal.reference_number).valid);
        let before = store.lookups.load(Ordering::SeqCst);
        assert_eq!(
            verifier.verify("203.0.113.1", &seal.reference_number),
            VerificationOutcome::not_valid()
        );
        assert_eq!(store.lookups.load(Ordering::SeqCst), before);
        assert!(verifier.verify("203.0.113.2", &seal.reference_number).valid);
    }

    /// Integrity events are written off the verification path.
    fn audit_entries_eventually(audit: &AuditLog, id: DocumentId) -> Vec<AuditEntry> {
        for _ in 0..200 {
            let entries = audit.entries_for_document(id).unwrap();
            if !entries.is_empty() {
                return entries;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        Vec::new()
    }

    #[test]
    fn seal_for_a_draft_is_refused_by_the_store() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let doc = Document::new_draft(&template(), "EMP001", "x".into(), "hr-1", None);
        store.insert(&doc).unwrap();
        let seal = SealRecord {
            seal_id: docseal_core::types::SealId::new(),
            document_id: doc.id,
            reference_number: ReferenceNumber::generate().unwrap().to_string(),
            content_hash: content_hash("x", &[]),
            sealed_at: Utc::now(),
            issuer: "Docseal".into(),
            issuer_signature: String::new(),
        };
        let mut bumped = doc.clone();
        bumped.revision += 1;
        assert!(store.commit_seal(&bumped, 0, &seal).is_err());

        assert!(store.seal_by_reference(&seal.reference_number).unwrap().is_none());
        assert!(!verifier(store, key).verify("c", &seal.reference_number).valid);
    }

    #[test]
    fn status_rolled_back_out_of_band_is_not_verifiable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docseal.db");
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::open(&path).unwrap());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let (doc, seal) = sealed(store.as_ref(), &key);

        let raw = rusqlite::Connection::open(&path).unwrap();
        raw.execute(
            "UPDATE documents SET status = 'DRAFT' WHERE id = ?1",
            rusqlite::params![doc.id.to_string()],
        )
        .unwrap();

        assert_eq!(
            verifier(store, key).verify("c", &seal.reference_number),
            VerificationOutcome::not_valid()
        );
    }
}
