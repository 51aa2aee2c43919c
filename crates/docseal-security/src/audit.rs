// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only SQLite log of workflow actions and verification
// attempts.
//
// Schema:
//   audit_log(
//     id          INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp   TEXT    NOT NULL,   -- RFC 3339
//     action      TEXT    NOT NULL,   -- e.g. "generate", "sign", "verify"
//     document_id TEXT,               -- NULL for attempts that matched nothing
//     actor       TEXT    NOT NULL,   -- user id, or the caller key for verify
//     success     INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details     TEXT
//   )
//
// The table has no UPDATE or DELETE path in this module.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use docseal_core::error::DocsealError;
use docseal_core::types::DocumentId;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CREATE_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS audit_log (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp   TEXT    NOT NULL,
        action      TEXT    NOT NULL,
        document_id TEXT,
        actor       TEXT    NOT NULL,
        success     INTEGER NOT NULL,
        details     TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_audit_document ON audit_log(document_id);
";

const SELECT_COLUMNS: &str = "id, timestamp, action, document_id, actor, success, details";

fn db_err(e: rusqlite::Error) -> DocsealError {
    DocsealError::Database(e.to_string())
}

/// A single row of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub document_id: Option<String>,
    pub actor: String,
    pub success: bool,
    pub details: Option<String>,
}

/// Append-only audit log backed by SQLite.
pub struct AuditLog {
    conn: Mutex<Connection>,
}

impl AuditLog {
    /// Open (or create) the audit database at `path` in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocsealError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        debug!("audit log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, DocsealError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DocsealError> {
        self.conn
            .lock()
            .map_err(|_| DocsealError::Internal("audit log lock poisoned".into()))
    }

    /// Append an entry.
    #[instrument(skip(self, details), fields(%action, %actor, success))]
    pub fn record(
        &self,
        action: &str,
        document_id: Option<DocumentId>,
        actor: &str,
        success: bool,
        details: Option<&str>,
    ) -> Result<(), DocsealError> {
        let timestamp = Utc::now().to_rfc3339();
        let document_id = document_id.map(|id| id.to_string());
        self.lock()?
            .execute(
                "INSERT INTO audit_log (timestamp, action, document_id, actor, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![timestamp, action, document_id, actor, success as i32, details],
            )
            .map_err(db_err)?;
        debug!("audit entry recorded");
        Ok(())
    }

    /// All entries for one document, oldest first.
    pub fn entries_for_document(&self, id: DocumentId) -> Result<Vec<AuditEntry>, DocsealError> {
        self.query(
            &format!("SELECT {SELECT_COLUMNS} FROM audit_log WHERE document_id = ?1 ORDER BY id ASC"),
            params![id.to_string()],
        )
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>, DocsealError> {
        self.query(
            &format!("SELECT {SELECT_COLUMNS} FROM audit_log ORDER BY id DESC LIMIT ?1"),
            params![limit],
        )
    }

    pub fn count(&self) -> Result<u64, DocsealError> {
        self.lock()?
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<AuditEntry>, DocsealError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(args, |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    action: row.get(2)?,
                    document_id: row.get(3)?,
                    actor: row.get(4)?,
                    success: row.get::<_, i32>(5)? != 0,
                    details: row.get(6)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }
}
