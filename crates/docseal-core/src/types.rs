// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Docseal document pipeline.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the textual (hyphenated UUID) form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a seal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealId(pub Uuid);

impl SealId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SealId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SealId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named role (not a person) that must countersign a document.
///
/// Roles are normalised to trimmed upper case so `hr_manager` and
/// `HR_MANAGER` name the same role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SignerRole(String);

impl SignerRole {
    pub fn new(role: impl AsRef<str>) -> Self {
        Self(role.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SignerRole {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SignerRole {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<SignerRole> for String {
    fn from(value: SignerRole) -> Self {
        value.0
    }
}

impl std::fmt::Display for SignerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field values for one entity (employee, supplier, ...), keyed by token name.
///
/// A `BTreeMap` keeps iteration order stable so anything derived from it is
/// reproducible.
pub type EntityData = BTreeMap<String, String>;

/// A parametrised document template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Document kind, e.g. `SALARY_CERTIFICATE`.
    #[serde(rename = "type")]
    pub document_type: String,
    /// Body text containing `{{token}}` placeholders.
    pub body: String,
    pub required_fields: Vec<String>,
    pub required_signer_roles: BTreeSet<SignerRole>,
}

/// Lifecycle states of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Merged, still editable by regeneration.
    Draft,
    /// At least one signer requested or signature collected.
    PendingSignature,
    /// Every required role has signed. Only exists inside the sign/seal
    /// transition; a stored document goes straight to `Sealed`.
    Signed,
    /// Frozen with a reference number and seal record.
    Sealed,
    /// Withdrawn before sealing.
    Cancelled,
}

impl DocumentStatus {
    /// Stable text form used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingSignature => "PENDING_SIGNATURE",
            Self::Signed => "SIGNED",
            Self::Sealed => "SEALED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "PENDING_SIGNATURE" => Some(Self::PendingSignature),
            "SIGNED" => Some(Self::Signed),
            "SEALED" => Some(Self::Sealed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collected signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub signer_id: String,
    pub signer_name: String,
    pub role: SignerRole,
    pub signed_at: DateTime<Utc>,
}

/// A request for a role to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub role: SignerRole,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
}

/// What happened in a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Generated,
    Regenerated,
    SignatureRequested,
    Signed,
    Sealed,
    Cancelled,
    Superseded,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Regenerated => "regenerated",
            Self::SignatureRequested => "signature_requested",
            Self::Signed => "signed",
            Self::Sealed => "sealed",
            Self::Cancelled => "cancelled",
            Self::Superseded => "superseded",
        }
    }
}

/// One append-only entry in a document's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}

/// A generated document and everything that happened to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub template_id: String,
    pub entity_id: String,
    /// Snapshot of the template's document kind.
    #[serde(rename = "type")]
    pub document_type: String,
    /// Content version; starts at 1 and only moves while in `Draft`.
    pub version: u32,
    /// Optimistic-concurrency counter, bumped on every stored write.
    pub revision: u64,
    pub content: String,
    pub status: DocumentStatus,
    /// Roles snapshotted from the template at generation time.
    pub required_signers: BTreeSet<SignerRole>,
    pub signature_requests: Vec<SignatureRequest>,
    pub signatures: Vec<Signature>,
    pub reference_number: Option<String>,
    pub seal_id: Option<SealId>,
    pub supersedes: Option<DocumentId>,
    pub superseded_by: Option<DocumentId>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The tamper-evidence record written when a document is sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealRecord {
    pub seal_id: SealId,
    pub document_id: DocumentId,
    pub reference_number: String,
    /// Hex SHA-256 over the content and canonicalised signatures.
    pub content_hash: String,
    pub sealed_at: DateTime<Utc>,
    pub issuer: String,
    /// Hex ECDSA P-256 signature by the issuer key over the seal payload.
    pub issuer_signature: String,
}

/// Publicly visible state of a sealed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicStatus {
    Sealed,
    /// A newer document replaced this one; the seal itself is still genuine.
    Superseded,
}

/// Minimal summary returned by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSummary {
    #[serde(rename = "type")]
    pub document_type: String,
    pub issued_date: NaiveDate,
    pub status: PublicStatus,
}

/// Standard paper sizes for PDF export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    Letter,
    Legal,
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
        }
    }
}

/// Status of the embedded HTTP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}
