// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Caller-facing error messages.
//
// Every error is mapped to a message that is safe to show an API caller and a
// disposition that the transport layer turns into a status code.
// Infrastructure failures never leak their detail.

use crate::error::DocsealError;

/// How the transport layer should classify an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The referenced document, template or entity does not exist.
    NotFound,
    /// The request is well-formed but its content is unusable.
    Invalid,
    /// The request conflicts with the document's current state.
    Conflict,
    /// The caller is authenticated but may not act in this role.
    Forbidden,
    /// No authenticated caller.
    Unauthenticated,
    /// Our fault; detail goes to the log, not the caller.
    Internal,
}

/// An error rendered for an API caller.
#[derive(Debug, Clone)]
pub struct PublicError {
    /// Stable machine-readable kind (see [`DocsealError::kind`]).
    pub kind: &'static str,
    /// Message safe to return to the caller.
    pub message: String,
    pub disposition: Disposition,
}

/// Convert a `DocsealError` into a `PublicError`.
pub fn publicize(err: &DocsealError) -> PublicError {
    let kind = err.kind();
    let (message, disposition) = match err {
        DocsealError::NotFound { entity, id } => {
            (format!("No {entity} with id {id}."), Disposition::NotFound)
        }
        DocsealError::EntityNotFound(id) => (
            format!("No entity data found for {id}."),
            Disposition::NotFound,
        ),
        DocsealError::MissingField(field) => (
            format!("The entity has no value for required field '{field}'."),
            Disposition::Invalid,
        ),
        DocsealError::InvalidTemplate { id, reason } => (
            format!("Template {id} is not valid: {reason}."),
            Disposition::Invalid,
        ),
        DocsealError::BadRequest(detail) => (detail.clone(), Disposition::Invalid),
        DocsealError::InvalidTransition { action, from } => (
            format!("Cannot {action} a document that is {from}."),
            Disposition::Conflict,
        ),
        DocsealError::DuplicateSignature { role } => (
            format!("Role {role} has already signed this document."),
            Disposition::Conflict,
        ),
        DocsealError::IncompleteSignatures { missing } => (
            format!("Still waiting for: {}.", missing.join(", ")),
            Disposition::Conflict,
        ),
        DocsealError::StaleRevision(_)
        | DocsealError::ReferenceCollision(_)
        | DocsealError::Conflict { .. } => (
            "The document is being changed by another request. Try again.".into(),
            Disposition::Conflict,
        ),
        DocsealError::UnauthorizedSigner { role } => (
            format!("Role {role} is not allowed to sign this document."),
            Disposition::Forbidden,
        ),
        DocsealError::Unauthenticated => (
            "Authentication required.".into(),
            Disposition::Unauthenticated,
        ),
        DocsealError::IntegrityMismatch { .. }
        | DocsealError::AppendOnlyViolation { .. }
        | DocsealError::Encryption(_)
        | DocsealError::Decryption(_)
        | DocsealError::Signing(_)
        | DocsealError::Pdf(_)
        | DocsealError::Database(_)
        | DocsealError::Io(_)
        | DocsealError::Serialization(_)
        | DocsealError::Internal(_) => (
            "The request could not be completed.".into(),
            Disposition::Internal,
        ),
    };

    PublicError {
        kind,
        message,
        disposition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentStatus;

    #[test]
    fn missing_field_is_invalid_and_named() {
        let public = publicize(&DocsealError::MissingField("salary".into()));
        assert_eq!(public.disposition, Disposition::Invalid);
        assert_eq!(public.kind, "MissingFieldError");
        assert!(public.message.contains("salary"));
    }

    #[test]
    fn transition_from_sealed_is_conflict() {
        let public = publicize(&DocsealError::InvalidTransition {
            action: "cancel",
            from: DocumentStatus::Sealed,
        });
        assert_eq!(public.disposition, Disposition::Conflict);
        assert!(public.message.contains("SEALED"));
    }

    #[test]
    fn database_detail_is_not_leaked() {
        let public = publicize(&DocsealError::Database("disk I/O error at /var/db".into()));
        assert_eq!(public.disposition, Disposition::Internal);
        assert!(!public.message.contains("/var/db"));
    }

    #[test]
    fn unauthorized_signer_is_forbidden() {
        let public = publicize(&DocsealError::UnauthorizedSigner {
            role: "INTERN".into(),
        });
        assert_eq!(public.disposition, Disposition::Forbidden);
    }
}
