// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Persistent application settings, stored as `config.json` in the data
/// directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interface the HTTP server binds to.
    pub bind_address: String,
    /// Port for the HTTP server (default 8080).
    pub port: u16,
    /// Issuer name recorded on every seal.
    pub issuer: String,
    /// Verification requests allowed per caller per window.
    pub verify_rate_limit: u32,
    /// Length of the verification rate-limit window in seconds.
    pub verify_window_secs: u64,
    /// Attempts for a contended write before surfacing a conflict.
    pub max_conflict_retries: u32,
    /// Extra templates (JSON array) merged over the built-in set.
    pub template_file: Option<PathBuf>,
    /// Entity data (JSON object keyed by entity id) for the merge engine.
    pub entity_file: Option<PathBuf>,
    /// Paper size used for PDF export.
    pub paper_size: crate::PaperSize,
    /// Enable audit trail logging.
    pub audit_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 8080,
            issuer: "Docseal".into(),
            verify_rate_limit: 30,
            verify_window_secs: 60,
            max_conflict_retries: 5,
            template_file: None,
            entity_file: None,
            paper_size: crate::PaperSize::A4,
            audit_enabled: true,
        }
    }
}
