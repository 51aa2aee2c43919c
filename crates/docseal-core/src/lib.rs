// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docseal: Core types, lifecycle rules and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod public_errors;
pub mod types;

pub use config::AppConfig;
pub use error::DocsealError;
pub use types::*;
