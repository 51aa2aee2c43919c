// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: opens the stores, loads the issuer key and the
// template/entity data, and assembles the state the HTTP server runs on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docseal_core::AppConfig;
use docseal_core::error::{DocsealError, Result};
use docseal_document::{PdfRenderer, TemplateRegistry};
use docseal_security::{AuditLog, EncryptedStorage, IssuerKey};
use docseal_server::{AppState, DocsealServer};
use docseal_store::{DocumentStore, SqliteDocumentStore};
use docseal_workflow::{
    DocumentService, EntityProvider, RateLimiter, RetryConfig, Sealer, StaticEntityProvider,
    Verifier,
};
use tracing::{error, info, warn};

use super::data_dir;

/// Passphrase protecting the issuer key at rest.
pub const PASSPHRASE_ENV: &str = "DOCSEAL_KEY_PASSPHRASE";

const CONFIG_FILE: &str = "config.json";
const DOCUMENTS_DB: &str = "documents.db";
const AUDIT_DB: &str = "audit.db";
const ISSUER_KEY_FILE: &str = "issuer.key.age";

/// Everything the running service needs, wired together.
#[derive(Clone)]
pub struct AppServices {
    state: AppState,
    audit_log: Option<Arc<AuditLog>>,
    data_dir: PathBuf,
    config: AppConfig,
}

impl AppServices {
    /// Initialise from the environment.  Call once at startup.
    pub fn init() -> Result<Self> {
        let dir = data_dir::data_dir()?;
        let passphrase = std::env::var(PASSPHRASE_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DocsealError::Internal(format!("{PASSPHRASE_ENV} is not set")))?;
        Self::init_at(&dir, &passphrase)
    }

    /// Initialise with an explicit data directory and key passphrase.
    pub fn init_at(dir: &Path, passphrase: &str) -> Result<Self> {
        info!(path = %dir.display(), "initialising app services");
        std::fs::create_dir_all(dir)?;

        let config = match load_config(dir) {
            Some(config) => config,
            None => {
                let config = AppConfig::default();
                persist_config(dir, &config);
                config
            }
        };

        let store: Arc<dyn DocumentStore> =
            Arc::new(SqliteDocumentStore::open(dir.join(DOCUMENTS_DB))?);
        let audit_log = if config.audit_enabled {
            Some(Arc::new(AuditLog::open(dir.join(AUDIT_DB))?))
        } else {
            None
        };

        let storage = EncryptedStorage::new(passphrase);
        let issuer_key = Arc::new(IssuerKey::load_or_create(
            &dir.join(ISSUER_KEY_FILE),
            &storage,
            &config.issuer,
        )?);

        let templates = TemplateRegistry::with_builtin()?;
        if let Some(path) = &config.template_file {
            let loaded = templates.load_json_file(path)?;
            info!(path = %path.display(), loaded, "custom templates loaded");
        }
        let entities = load_entities(&config)?;

        let mut service = DocumentService::new(
            store.clone(),
            Arc::new(templates),
            entities,
            Sealer::new(issuer_key.clone()),
            PdfRenderer::new(config.paper_size, config.issuer.clone()),
        )
        .with_retry(RetryConfig::with_max_attempts(config.max_conflict_retries));
        if let Some(audit) = &audit_log {
            service = service.with_audit(audit.clone());
        }

        let verifier = Verifier::new(
            store,
            issuer_key,
            RateLimiter::new(
                config.verify_rate_limit,
                Duration::from_secs(config.verify_window_secs),
            ),
            audit_log.clone(),
        );

        info!("all services initialised");
        Ok(Self {
            state: AppState {
                service: Arc::new(service),
                verifier: Arc::new(verifier),
            },
            audit_log,
            data_dir: dir.to_path_buf(),
            config,
        })
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// An HTTP server bound to the configured address.  Not started.
    pub fn server(&self) -> DocsealServer {
        DocsealServer::new(self.config.bind_address.clone(), self.config.port)
    }

    /// Record a service-level audit event (startup, shutdown).  Failures are
    /// logged, never propagated.
    pub fn audit(&self, action: &str, success: bool, details: Option<&str>) {
        if let Some(log) = &self.audit_log {
            if let Err(e) = log.record(action, None, "system", success, details) {
                error!(error = %e, %action, "failed to write audit entry");
            }
        }
    }
}

/// Entities from `entity_file` when configured, otherwise a single demo
/// employee so a fresh install can generate something.
fn load_entities(config: &AppConfig) -> Result<Arc<dyn EntityProvider>> {
    let provider = match &config.entity_file {
        Some(path) => StaticEntityProvider::load_json_file(path)?,
        None => {
            warn!("no entity_file configured, using demo entity EMP001");
            StaticEntityProvider::new().with_entity(
                "EMP001",
                [
                    ("name".to_owned(), "Ahmed Ali".to_owned()),
                    ("salary".to_owned(), "15000".to_owned()),
                ]
                .into_iter()
                .collect(),
            )
        }
    };
    Ok(Arc::new(provider))
}

fn load_config(dir: &Path) -> Option<AppConfig> {
    let path = dir.join(CONFIG_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable config, using defaults");
            None
        }
    }
}

fn persist_config(dir: &Path, config: &AppConfig) {
    let path = dir.join(CONFIG_FILE);
    match serde_json::to_string_pretty(config) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&path, json) {
                warn!(path = %path.display(), error = %e, "failed to persist config");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialise config"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseal_core::types::SignerRole;

    #[test]
    fn first_start_writes_default_config_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init_at(dir.path(), "pass").unwrap();

        assert_eq!(services.config().port, 8080);
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert!(dir.path().join(ISSUER_KEY_FILE).exists());
        assert!(dir.path().join(DOCUMENTS_DB).exists());
        assert!(dir.path().join(AUDIT_DB).exists());
    }

    #[test]
    fn demo_entity_generates_and_seals() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init_at(dir.path(), "pass").unwrap();
        let state = services.state();

        let doc = state
            .service
            .generate("salary-certificate", "EMP001", "hr-1")
            .unwrap();
        assert!(doc.content.contains("Ahmed Ali"));
        let sealed = state
            .service
            .sign(doc.id, "hr-1", "Sara HR", &SignerRole::new("HR_MANAGER"))
            .unwrap();
        let reference = sealed.reference_number.unwrap();

        let outcome = state.verifier.verify("127.0.0.1", &reference);
        assert!(outcome.valid);
    }

    #[test]
    fn documents_and_key_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let reference = {
            let services = AppServices::init_at(dir.path(), "pass").unwrap();
            let state = services.state();
            let doc = state
                .service
                .generate("salary-certificate", "EMP001", "hr-1")
                .unwrap();
            let sealed = state
                .service
                .sign(doc.id, "hr-1", "Sara HR", &SignerRole::new("HR_MANAGER"))
                .unwrap();
            sealed.reference_number.unwrap()
        };

        let services = AppServices::init_at(dir.path(), "pass").unwrap();
        assert!(services.state().verifier.verify("10.0.0.1", &reference).valid);
    }

    #[test]
    fn wrong_passphrase_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        AppServices::init_at(dir.path(), "right").unwrap();
        assert!(AppServices::init_at(dir.path(), "wrong").is_err());
    }

    #[test]
    fn stored_config_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "port": 9123, "issuer": "Acme HR", "audit_enabled": false }"#,
        )
        .unwrap();

        let services = AppServices::init_at(dir.path(), "pass").unwrap();
        assert_eq!(services.config().port, 9123);
        assert_eq!(services.config().issuer, "Acme HR");
        assert!(!dir.path().join(AUDIT_DB).exists());
        // Auditing disabled is a silent no-op.
        services.audit("server_start", true, None);
    }

    #[test]
    fn entity_file_replaces_the_demo_entity() {
        let dir = tempfile::tempdir().unwrap();
        let entities = dir.path().join("entities.json");
        std::fs::write(&entities, r#"{ "EMP777": { "name": "Lina Haddad", "salary": 21000 } }"#)
            .unwrap();
        let config = serde_json::json!({ "entity_file": entities });
        std::fs::write(dir.path().join(CONFIG_FILE), config.to_string()).unwrap();

        let services = AppServices::init_at(dir.path(), "pass").unwrap();
        let service = &services.state().service;
        let doc = service.generate("salary-certificate", "EMP777", "hr-1").unwrap();
        assert!(doc.content.contains("Lina Haddad"));
        assert!(service.generate("salary-certificate", "EMP001", "hr-1").is_err());
    }
}
