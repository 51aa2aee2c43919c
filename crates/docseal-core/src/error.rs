// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Docseal.

use thiserror::Error;

use crate::types::DocumentStatus;

/// Top-level error type for all Docseal operations.
#[derive(Debug, Error)]
pub enum DocsealError {
    // -- Lookup errors --
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    // -- Template / merge errors --
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid template {id}: {reason}")]
    InvalidTemplate { id: String, reason: String },

    // -- Lifecycle errors --
    #[error("cannot {action} a document in status {from}")]
    InvalidTransition {
        action: &'static str,
        from: DocumentStatus,
    },

    #[error("role {role} is not a required signer")]
    UnauthorizedSigner { role: String },

    #[error("role {role} has already signed")]
    DuplicateSignature { role: String },

    #[error("signatures incomplete, missing roles: {}", missing.join(", "))]
    IncompleteSignatures { missing: Vec<String> },

    // -- Integrity / concurrency --
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("document {0} changed since it was read")]
    StaleRevision(String),

    #[error("reference number {0} already issued")]
    ReferenceCollision(String),

    #[error("document {id} still contended after {attempts} attempts")]
    Conflict { id: String, attempts: u32 },

    #[error("append-only field rewritten on document {id}: {field}")]
    AppendOnlyViolation { id: String, field: &'static str },

    // -- Caller errors --
    #[error("caller is not authenticated")]
    Unauthenticated,

    #[error("bad request: {0}")]
    BadRequest(String),

    // -- Security errors --
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("signing failed: {0}")]
    Signing(String),

    // -- Rendering --
    #[error("PDF operation failed: {0}")]
    Pdf(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DocsealError {
    /// Stable machine-readable kind, surfaced to API callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::EntityNotFound(_) => "EntityNotFound",
            Self::MissingField(_) => "MissingFieldError",
            Self::InvalidTemplate { .. } => "InvalidTemplate",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::UnauthorizedSigner { .. } => "UnauthorizedSigner",
            Self::DuplicateSignature { .. } => "DuplicateSignature",
            Self::IncompleteSignatures { .. } => "IncompleteSignatures",
            Self::IntegrityMismatch { .. } => "IntegrityMismatch",
            Self::StaleRevision(_) | Self::ReferenceCollision(_) | Self::Conflict { .. } => {
                "Conflict"
            }
            Self::AppendOnlyViolation { .. } => "AppendOnlyViolation",
            Self::Unauthenticated => "Unauthenticated",
            Self::BadRequest(_) => "BadRequest",
            Self::Encryption(_)
            | Self::Decryption(_)
            | Self::Signing(_)
            | Self::Pdf(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_) => "Internal",
        }
    }

    /// Shorthand for a missing document.
    pub fn document_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: "document",
            id: id.to_string(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocsealError>;
