// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::PathBuf;

use docseal_core::error::Result;

/// Explicit override for the data directory.
pub const DATA_DIR_ENV: &str = "DOCSEAL_DATA_DIR";

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> Result<PathBuf> {
    let dir = resolve(|name| std::env::var(name).ok());
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `DOCSEAL_DATA_DIR`, then `$XDG_DATA_HOME/docseal`, then
/// `$HOME/.local/share/docseal`.  Empty variables count as unset.
fn resolve(var: impl Fn(&str) -> Option<String>) -> PathBuf {
    let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());
    if let Some(dir) = var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("docseal");
    }
    if let Some(home) = var("HOME") {
        return PathBuf::from(home).join(".local").join("share").join("docseal");
    }
    // Last resort
    std::env::temp_dir().join("docseal")
}
