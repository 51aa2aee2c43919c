// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template registry: validated, shared catalogue of document templates.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::RwLock;

use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{SignerRole, Template};
use tracing::{debug, info, instrument};

use crate::merge::placeholders;

/// In-process template catalogue, keyed by template id.
///
/// Documents snapshot what they need from a template at generation time, so
/// replacing a template never affects documents already in flight.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: RwLock<BTreeMap<String, Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the stock HR certificates.
    pub fn with_builtin() -> Result<Self> {
        let registry = Self::new();
        for template in builtin_templates() {
            registry.register(template)?;
        }
        Ok(registry)
    }

    /// Validate and insert `template`, replacing any template with the same id.
    #[instrument(skip_all, fields(template = %template.id))]
    pub fn register(&self, template: Template) -> Result<()> {
        validate(&template)?;
        let mut guard = self
            .templates
            .write()
            .map_err(|_| DocsealError::Internal("template registry lock poisoned".into()))?;
        if guard.insert(template.id.clone(), template).is_some() {
            info!("template replaced");
        } else {
            debug!("template registered");
        }
        Ok(())
    }

    /// All templates, ordered by id.
    pub fn list(&self) -> Result<Vec<Template>> {
        let guard = self
            .templates
            .read()
            .map_err(|_| DocsealError::Internal("template registry lock poisoned".into()))?;
        Ok(guard.values().cloned().collect())
    }

    pub fn get(&self, id: &str) -> Result<Template> {
        let guard = self
            .templates
            .read()
            .map_err(|_| DocsealError::Internal("template registry lock poisoned".into()))?;
        guard.get(id).cloned().ok_or_else(|| DocsealError::NotFound {
            entity: "template",
            id: id.to_owned(),
        })
    }

    /// Register every template in a JSON array file. Returns how many were
    /// loaded. Nothing is registered if any template in the file is invalid.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_json_file(&self, path: &Path) -> Result<usize> {
        let raw = std::fs::read_to_string(path)?;
        let templates: Vec<Template> = serde_json::from_str(&raw)?;
        for template in &templates {
            validate(template)?;
        }
        let count = templates.len();
        for template in templates {
            self.register(template)?;
        }
        info!(count, "templates loaded from file");
        Ok(count)
    }
}

fn validate(template: &Template) -> Result<()> {
    let invalid = |reason: String| DocsealError::InvalidTemplate {
        id: template.id.clone(),
        reason,
    };

    if template.id.trim().is_empty() {
        return Err(invalid("empty template id".into()));
    }
    if template.required_signer_roles.is_empty() {
        return Err(invalid("no required signer roles".into()));
    }
    if template.required_signer_roles.iter().any(|r| r.as_str().is_empty()) {
        return Err(invalid("blank signer role".into()));
    }

    let declared: BTreeSet<&str> = template.required_fields.iter().map(String::as_str).collect();
    for token in placeholders(&template.body).map_err(invalid)? {
        if !declared.contains(token.name) {
            return Err(invalid(format!(
                "placeholder {} is not listed in requiredFields",
                token.name
            )));
        }
    }
    Ok(())
}

fn roles(names: &[&str]) -> BTreeSet<SignerRole> {
    names.iter().map(SignerRole::new).collect()
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn builtin_templates() -> Vec<Template> {
    vec![
        Template {
            id: "salary-certificate".into(),
            name: "Salary Certificate".into(),
            document_type: "SALARY_CERTIFICATE".into(),
            body: "This certifies {{name}} earns {{salary}} SAR".into(),
            required_fields: fields(&["name", "salary"]),
            required_signer_roles: roles(&["HR_MANAGER"]),
        },
        Template {
            id: "employment-certificate".into(),
            name: "Employment Certificate".into(),
            document_type: "EMPLOYMENT_CERTIFICATE".into(),
            body: "This is to certify that {{name}} has been employed with {{company}} \
                   as {{position}} since {{join_date}} and remains in active service."
                .into(),
            required_fields: fields(&["name", "company", "position", "join_date"]),
            required_signer_roles: roles(&["HR_MANAGER"]),
        },
        Template {
            id: "experience-letter".into(),
            name: "Experience Letter".into(),
            document_type: "EXPERIENCE_LETTER".into(),
            body: "To whom it may concern,\n\n{{name}} worked with {{company}} as \
                   {{position}} from {{join_date}} to {{end_date}}. During this period \
                   their conduct was satisfactory.\n\nWe wish them success."
                .into(),
            required_fields: fields(&["name", "company", "position", "join_date", "end_date"]),
            required_signer_roles: roles(&["HR_MANAGER", "DEPARTMENT_HEAD"]),
        },
        Template {
            id: "no-objection-certificate".into(),
            name: "No Objection Certificate".into(),
            document_type: "NO_OBJECTION_CERTIFICATE".into(),
            body: "{{company}} has no objection to {{name}}, {{position}}, \
                   pursuing {{purpose}}. This certificate carries no financial \
                   liability for the company."
                .into(),
            required_fields: fields(&["name", "company", "position", "purpose"]),
            required_signer_roles: roles(&["HR_MANAGER", "GENERAL_MANAGER"]),
        },
    ]
}
