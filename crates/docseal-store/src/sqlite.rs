// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent document store backed by SQLite.
//
// Scalar fields live in their own columns; the append-only lists are stored
// as JSON text.  Seal records live in a separate table whose UNIQUE
// constraints make a second seal for a document, or a reused reference
// number, impossible even if a caller skipped the revision check.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::{debug, error, info, instrument};

use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{Document, DocumentId, DocumentStatus, SealId, SealRecord};

use crate::{DocumentStore, WriteKind, check_write};

const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        template_id TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        document_type TEXT NOT NULL,
        version INTEGER NOT NULL,
        revision INTEGER NOT NULL,
        content TEXT NOT NULL,
        status TEXT NOT NULL,
        required_signers TEXT NOT NULL,
        signature_requests TEXT NOT NULL DEFAULT '[]',
        signatures TEXT NOT NULL DEFAULT '[]',
        reference_number TEXT,
        seal_id TEXT,
        supersedes TEXT,
        superseded_by TEXT,
        history TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS seals (
        seal_id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL UNIQUE REFERENCES documents(id),
        reference_number TEXT NOT NULL UNIQUE,
        content_hash TEXT NOT NULL,
        sealed_at TEXT NOT NULL,
        issuer TEXT NOT NULL,
        issuer_signature TEXT NOT NULL
    );
"#;

const DOCUMENT_COLUMNS: &str = "id, template_id, entity_id, document_type, version, revision, \
     content, status, required_signers, signature_requests, signatures, reference_number, \
     seal_id, supersedes, superseded_by, history, created_at, updated_at";

const SEAL_COLUMNS: &str =
    "seal_id, document_id, reference_number, content_hash, sealed_at, issuer, issuer_signature";

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> DocsealError + '_ {
    move |e| DocsealError::Database(format!("{context}: {e}"))
}

/// SQLite-backed [`DocumentStore`].
///
/// One connection behind a mutex; writers take an IMMEDIATE transaction so a
/// second process sharing the file cannot interleave a read-modify-write.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open (or create) the database at `path` in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("open"))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err("WAL pragma"))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(db_err("foreign_keys pragma"))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create tables"))?;
        info!("document database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open in-memory"))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(db_err("foreign_keys pragma"))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(db_err("create tables"))?;
        debug!("in-memory document database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DocsealError::Internal("document store lock poisoned".into()))
    }
}

impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip_all, fields(document = %doc.id))]
    fn insert(&self, doc: &Document) -> Result<()> {
        let conn = self.lock()?;
        insert_document(&conn, doc)?;
        info!(status = %doc.status, "document inserted");
        Ok(())
    }

    #[instrument(skip(self))]
    fn get(&self, id: DocumentId) -> Result<Document> {
        let conn = self.lock()?;
        load_document(&conn, id)?.ok_or_else(|| DocsealError::document_not_found(id))
    }

    fn list(&self) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at DESC"
            ))
            .map_err(db_err("prepare list"))?;
        let docs = stmt
            .query_map([], row_to_document)
            .map_err(db_err("query list"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect rows"))?;
        debug!(count = docs.len(), "listed documents");
        Ok(docs)
    }

    #[instrument(skip_all, fields(document = %doc.id, expected_revision = expected_revision))]
    fn update(&self, doc: &Document, expected_revision: u64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = begin(&mut conn)?;
        guarded_update(&tx, doc, expected_revision, WriteKind::Update)?;
        tx.commit().map_err(db_err("commit update"))?;
        debug!(revision = doc.revision, status = %doc.status, "document updated");
        Ok(())
    }

    #[instrument(skip_all, fields(document = %doc.id, reference = %seal.reference_number))]
    fn commit_seal(&self, doc: &Document, expected_revision: u64, seal: &SealRecord) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = begin(&mut conn)?;
        guarded_update(&tx, doc, expected_revision, WriteKind::Seal(seal))?;
        tx.execute(
            &format!("INSERT INTO seals ({SEAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                seal.seal_id.to_string(),
                seal.document_id.to_string(),
                seal.reference_number,
                seal.content_hash,
                seal.sealed_at.to_rfc3339(),
                seal.issuer,
                seal.issuer_signature,
            ],
        )
        .map_err(|e| seal_insert_error(e, seal))?;
        tx.commit().map_err(db_err("commit seal"))?;
        info!("seal committed");
        Ok(())
    }

    #[instrument(skip_all, fields(successor = %successor.id, previous = %previous.id))]
    fn commit_supersede(
        &self,
        successor: &Document,
        previous: &Document,
        expected_revision: u64,
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = begin(&mut conn)?;
        guarded_update(&tx, previous, expected_revision, WriteKind::Update)?;
        insert_document(&tx, successor)?;
        tx.commit().map_err(db_err("commit supersede"))?;
        info!("supersede committed");
        Ok(())
    }

    fn seal_by_reference(&self, reference_number: &str) -> Result<Option<SealRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {SEAL_COLUMNS} FROM seals WHERE reference_number = ?1"),
            params![reference_number],
            row_to_seal,
        )
        .optional()
        .map_err(db_err("seal by reference"))
    }

    fn seal_for_document(&self, id: DocumentId) -> Result<Option<SealRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {SEAL_COLUMNS} FROM seals WHERE document_id = ?1"),
            params![id.to_string()],
            row_to_seal,
        )
        .optional()
        .map_err(db_err("seal for document"))
    }
}

fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(db_err("begin transaction"))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn insert_document(conn: &Connection, doc: &Document) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO documents ({DOCUMENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
        ),
        params![
            doc.id.to_string(),
            doc.template_id,
            doc.entity_id,
            doc.document_type,
            doc.version,
            doc.revision as i64,
            doc.content,
            doc.status.as_str(),
            to_json(&doc.required_signers)?,
            to_json(&doc.signature_requests)?,
            to_json(&doc.signatures)?,
            doc.reference_number,
            doc.seal_id.map(|s| s.to_string()),
            doc.supersedes.map(|s| s.to_string()),
            doc.superseded_by.map(|s| s.to_string()),
            to_json(&doc.history)?,
            doc.created_at.to_rfc3339(),
            doc.updated_at.to_rfc3339(),
        ],
    )
    .map_err(db_err("insert document"))?;
    Ok(())
}

fn load_document(conn: &Connection, id: DocumentId) -> Result<Option<Document>> {
    conn.query_row(
        &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
        params![id.to_string()],
        row_to_document,
    )
    .optional()
    .map_err(db_err("load document"))
}

/// Check-then-write inside an open transaction.
fn guarded_update(
    tx: &Transaction<'_>,
    doc: &Document,
    expected_revision: u64,
    kind: WriteKind<'_>,
) -> Result<()> {
    let stored = load_document(tx, doc.id)?.ok_or_else(|| DocsealError::document_not_found(doc.id))?;
    check_write(&stored, doc, expected_revision, kind)?;

    let rows = tx
        .execute(
            "UPDATE documents SET version = ?1, revision = ?2, content = ?3, status = ?4,
                 signature_requests = ?5, signatures = ?6, reference_number = ?7, seal_id = ?8,
                 superseded_by = ?9, history = ?10, updated_at = ?11
             WHERE id = ?12 AND revision = ?13",
            params![
                doc.version,
                doc.revision as i64,
                doc.content,
                doc.status.as_str(),
                to_json(&doc.signature_requests)?,
                to_json(&doc.signatures)?,
                doc.reference_number,
                doc.seal_id.map(|s| s.to_string()),
                doc.superseded_by.map(|s| s.to_string()),
                to_json(&doc.history)?,
                doc.updated_at.to_rfc3339(),
                doc.id.to_string(),
                expected_revision as i64,
            ],
        )
        .map_err(db_err("update document"))?;
    if rows == 0 {
        return Err(DocsealError::StaleRevision(doc.id.to_string()));
    }
    Ok(())
}

/// Map a failed seal INSERT onto the workflow's error vocabulary.
fn seal_insert_error(e: rusqlite::Error, seal: &SealRecord) -> DocsealError {
    if let rusqlite::Error::SqliteFailure(code, Some(message)) = &e {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            if message.contains("seals.reference_number") {
                return DocsealError::ReferenceCollision(seal.reference_number.clone());
            }
            // UNIQUE(document_id): someone else sealed it first.
            return DocsealError::StaleRevision(seal.document_id.to_string());
        }
    }
    error!(error = %e, "seal insert failed");
    DocsealError::Database(format!("insert seal: {e}"))
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn uuid_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<uuid::Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| uuid::Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn time_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

#[derive(Debug)]
struct CorruptColumn(String);

impl std::fmt::Display for CorruptColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unreadable column value {:?}", self.0)
    }
}

impl std::error::Error for CorruptColumn {}

/// Column order must match [`DOCUMENT_COLUMNS`].
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let id = uuid_column(row, 0)?.ok_or_else(|| conversion_err(0, CorruptColumn("null id".into())))?;
    let status_raw: String = row.get(7)?;
    let status = DocumentStatus::parse(&status_raw)
        .ok_or_else(|| conversion_err(7, CorruptColumn(status_raw.clone())))?;

    Ok(Document {
        id: DocumentId(id),
        template_id: row.get(1)?,
        entity_id: row.get(2)?,
        document_type: row.get(3)?,
        version: row.get(4)?,
        revision: row.get::<_, i64>(5)? as u64,
        content: row.get(6)?,
        status,
        required_signers: json_column(row, 8)?,
        signature_requests: json_column(row, 9)?,
        signatures: json_column(row, 10)?,
        reference_number: row.get(11)?,
        seal_id: uuid_column(row, 12)?.map(SealId),
        supersedes: uuid_column(row, 13)?.map(DocumentId),
        superseded_by: uuid_column(row, 14)?.map(DocumentId),
        history: json_column(row, 15)?,
        created_at: time_column(row, 16)?,
        updated_at: time_column(row, 17)?,
    })
}

/// Column order must match [`SEAL_COLUMNS`].
fn row_to_seal(row: &rusqlite::Row<'_>) -> rusqlite::Result<SealRecord> {
    let seal_id = uuid_column(row, 0)?.ok_or_else(|| conversion_err(0, CorruptColumn("null seal id".into())))?;
    let document_id =
        uuid_column(row, 1)?.ok_or_else(|| conversion_err(1, CorruptColumn("null document id".into())))?;
    Ok(SealRecord {
        seal_id: SealId(seal_id),
        document_id: DocumentId(document_id),
        reference_number: row.get(2)?,
        content_hash: row.get(3)?,
        sealed_at: time_column(row, 4)?,
        issuer: row.get(5)?,
        issuer_signature: row.get(6)?,
    })
}
