// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document service: the lifecycle operations behind the HTTP routes.
//
// Each mutation is a read-modify-write against the document revision, run
// under the conflict retry loop.  Outcomes (success or failure) go to the
// audit log when one is configured.

use std::sync::Arc;

use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{Document, DocumentId, DocumentStatus, HistoryEntry, SignerRole, Template};
use docseal_document::{PdfRenderer, TemplateRegistry, merge};
use docseal_security::AuditLog;
use docseal_store::DocumentStore;
use tracing::{debug, error, info, instrument};

use crate::entities::EntityProvider;
use crate::retry::{RetryConfig, with_retry};
use crate::sealing::Sealer;

pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    templates: Arc<TemplateRegistry>,
    entities: Arc<dyn EntityProvider>,
    sealer: Sealer,
    renderer: PdfRenderer,
    audit: Option<Arc<AuditLog>>,
    retry: RetryConfig,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        templates: Arc<TemplateRegistry>,
        entities: Arc<dyn EntityProvider>,
        sealer: Sealer,
        renderer: PdfRenderer,
    ) -> Self {
        Self {
            store,
            templates,
            entities,
            sealer,
            renderer,
            audit: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    // -- Creation ---------------------------------------------------------

    /// Merge `template_id` with the entity's data and persist a new draft.
    #[instrument(skip_all, fields(template = template_id, entity = entity_id, actor = actor))]
    pub fn generate(&self, template_id: &str, entity_id: &str, actor: &str) -> Result<Document> {
        let result = self.merge_for(template_id, entity_id).and_then(|(template, content)| {
            let doc = Document::new_draft(&template, entity_id, content, actor, None);
            self.store.insert(&doc)?;
            Ok(doc)
        });
        if let Ok(doc) = &result {
            info!(document = %doc.id, "document generated");
        }
        let id = result.as_ref().ok().map(|d| d.id);
        self.audit("generate", id, actor, &result, Some(format!("{template_id} for {entity_id}")));
        result
    }

    // -- Transitions ------------------------------------------------------

    #[instrument(skip_all, fields(document = %id, role = %role))]
    pub fn request_signature(&self, id: DocumentId, role: &SignerRole, actor: &str) -> Result<Document> {
        let result = self.mutate(id, |doc| doc.request_signature(role, actor));
        if result.is_ok() {
            info!("signature requested");
        }
        self.audit("request_signature", Some(id), actor, &result, Some(format!("role {role}")));
        result
    }

    /// Record `role`'s signature.  The last required signature seals the
    /// document in the same write.
    #[instrument(skip_all, fields(document = %id, role = %role))]
    pub fn sign(
        &self,
        id: DocumentId,
        signer_id: &str,
        signer_name: &str,
        role: &SignerRole,
    ) -> Result<Document> {
        let mut sealed_reference = None;
        let result = with_retry(&id.to_string(), &self.retry, || {
            let mut doc = self.store.get(id)?;
            let expected = doc.revision;
            doc.add_signature(signer_id, signer_name, role)?;
            doc.revision += 1;
            if doc.is_fully_signed() {
                let seal = self.sealer.seal(self.store.as_ref(), &mut doc, expected)?;
                sealed_reference = Some(seal.reference_number);
            } else {
                self.store.update(&doc, expected)?;
            }
            Ok(doc)
        });

        match (&result, &sealed_reference) {
            (Ok(doc), Some(reference)) => {
                info!(status = %doc.status, %reference, "final signature recorded");
                self.audit("sign", Some(id), signer_id, &result, Some(format!("role {role}")));
                self.audit("seal", Some(id), signer_id, &result, Some(format!("reference {reference}")));
            }
            _ => {
                if result.is_ok() {
                    info!("signature recorded");
                }
                self.audit("sign", Some(id), signer_id, &result, Some(format!("role {role}")));
            }
        }
        result
    }

    #[instrument(skip_all, fields(document = %id, actor = actor))]
    pub fn cancel(&self, id: DocumentId, reason: &str, actor: &str) -> Result<Document> {
        let result = self.mutate(id, |doc| doc.cancel(reason, actor));
        if result.is_ok() {
            info!("document cancelled");
        }
        self.audit("cancel", Some(id), actor, &result, Some(reason.to_owned()));
        result
    }

    /// Re-merge a draft with fresh entity data.
    #[instrument(skip_all, fields(document = %id, actor = actor))]
    pub fn regenerate(&self, id: DocumentId, actor: &str) -> Result<Document> {
        let result = self.mutate(id, |doc| {
            ensure_status(doc, DocumentStatus::Draft, "regenerate")?;
            let (_, content) = self.merge_for(&doc.template_id, &doc.entity_id)?;
            doc.replace_content(content, actor)
        });
        if let Ok(doc) = &result {
            info!(version = doc.version, "document regenerated");
        }
        self.audit("regenerate", Some(id), actor, &result, None);
        result
    }

    /// Replace a sealed document with a new draft for the same template and
    /// entity.  Returns the new draft; the old document keeps its content
    /// and seal and gains a `superseded_by` link.
    #[instrument(skip_all, fields(document = %id, actor = actor))]
    pub fn supersede(&self, id: DocumentId, reason: &str, actor: &str) -> Result<Document> {
        let result = with_retry(&id.to_string(), &self.retry, || {
            let mut previous = self.store.get(id)?;
            if previous.superseded_by.is_some() {
                return Err(DocsealError::InvalidTransition {
                    action: "supersede",
                    from: previous.status,
                });
            }
            ensure_status(&previous, DocumentStatus::Sealed, "supersede")?;

            let expected = previous.revision;
            let (template, content) = self.merge_for(&previous.template_id, &previous.entity_id)?;
            let successor =
                Document::new_draft(&template, &previous.entity_id, content, actor, Some(id));
            previous.mark_superseded(successor.id, reason, actor)?;
            previous.revision += 1;
            self.store.commit_supersede(&successor, &previous, expected)?;
            Ok(successor)
        });
        if let Ok(successor) = &result {
            info!(successor = %successor.id, "document superseded");
            self.audit("generate", Some(successor.id), actor, &result, Some(format!("supersedes {id}")));
        }
        self.audit("supersede", Some(id), actor, &result, Some(reason.to_owned()));
        result
    }

    // -- Reads ------------------------------------------------------------

    pub fn get(&self, id: DocumentId) -> Result<Document> {
        debug!(document = %id, "document lookup");
        self.store.get(id)
    }

    pub fn list(&self) -> Result<Vec<Document>> {
        self.store.list()
    }

    pub fn history(&self, id: DocumentId) -> Result<Vec<HistoryEntry>> {
        Ok(self.store.get(id)?.history)
    }

    pub fn render_pdf(&self, id: DocumentId) -> Result<Vec<u8>> {
        let doc = self.store.get(id)?;
        self.renderer.render_document(&doc)
    }

    // -- Internals --------------------------------------------------------

    fn merge_for(&self, template_id: &str, entity_id: &str) -> Result<(Template, String)> {
        let template = self.templates.get(template_id)?;
        let data = self.entities.get_entity(entity_id)?;
        let content = merge(&template, &data)?;
        Ok((template, content))
    }

    /// Load, apply `change`, and write back under the revision check.
    fn mutate(
        &self,
        id: DocumentId,
        change: impl Fn(&mut Document) -> Result<()>,
    ) -> Result<Document> {
        with_retry(&id.to_string(), &self.retry, || {
            let mut doc = self.store.get(id)?;
            let expected = doc.revision;
            change(&mut doc)?;
            doc.revision += 1;
            self.store.update(&doc, expected)?;
            Ok(doc)
        })
    }

    fn audit<T>(
        &self,
        action: &str,
        document_id: Option<DocumentId>,
        actor: &str,
        result: &Result<T>,
        details: Option<String>,
    ) {
        let Some(audit) = &self.audit else {
            return;
        };
        let details = match result {
            Ok(_) => details,
            Err(err) => Some(match details {
                Some(d) => format!("{d}: {err}"),
                None => err.to_string(),
            }),
        };
        if let Err(e) = audit.record(action, document_id, actor, result.is_ok(), details.as_deref()) {
            error!(error = %e, action, "failed to write audit entry");
        }
    }
}

fn ensure_status(doc: &Document, wanted: DocumentStatus, action: &'static str) -> Result<()> {
    if doc.status == wanted {
        Ok(())
    } else {
        Err(DocsealError::InvalidTransition {
            action,
            from: doc.status,
        })
    }
}
