// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encrypted storage for secrets at rest (the issuer signing key).
// age scrypt recipients, so the operator only has to supply a passphrase.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use age::secrecy::SecretString;
use docseal_core::error::DocsealError;
use tracing::{debug, instrument};

fn sealing_err(e: impl std::fmt::Display) -> DocsealError {
    DocsealError::Encryption(e.to_string())
}

fn opening_err(e: impl std::fmt::Display) -> DocsealError {
    DocsealError::Decryption(e.to_string())
}

/// Passphrase-based encrypted storage backed by the `age` crate.
pub struct EncryptedStorage {
    /// Zeroised on drop.
    passphrase: SecretString,
}

impl EncryptedStorage {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: SecretString::from(passphrase.into()),
        }
    }

    /// Encrypt `plaintext` into a complete age file.
    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, DocsealError> {
        let mut sealed = Vec::with_capacity(plaintext.len() + 256);
        let mut stream = age::Encryptor::with_user_passphrase(self.passphrase.clone())
            .wrap_output(&mut sealed)
            .map_err(sealing_err)?;
        stream.write_all(plaintext).map_err(sealing_err)?;
        stream.finish().map_err(sealing_err)?;

        debug!(ciphertext_len = sealed.len(), "secret sealed");
        Ok(sealed)
    }

    /// Decrypt a complete age file.  A wrong passphrase and a corrupt file
    /// both surface as `Decryption`.
    #[instrument(skip_all, fields(ciphertext_len = ciphertext.len()))]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, DocsealError> {
        let identity = age::scrypt::Identity::new(self.passphrase.clone());
        let mut stream = age::Decryptor::new(ciphertext)
            .map_err(opening_err)?
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(opening_err)?;

        let mut secret = Vec::new();
        stream.read_to_end(&mut secret).map_err(opening_err)?;
        debug!(plaintext_len = secret.len(), "secret opened");
        Ok(secret)
    }

    /// Encrypt `plaintext` into a new file at `path`.
    ///
    /// Parent directories are created.  The file is written beside its final
    /// name and renamed into place, readable by the owner only on Unix, and
    /// an existing file is never replaced.
    pub fn write_file(&self, path: &Path, plaintext: &[u8]) -> Result<(), DocsealError> {
        if path.exists() {
            return Err(DocsealError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let sealed = self.encrypt(plaintext)?;

        let staging = staging_path(path);
        let mut file = owner_only(&staging)?;
        file.write_all(&sealed)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&staging, path)?;
        Ok(())
    }

    /// Read and decrypt the age file at `path`.
    pub fn read_file(&self, path: &Path) -> Result<Vec<u8>, DocsealError> {
        self.decrypt(&std::fs::read(path)?)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn owner_only(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn owner_only(path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::File::create(path)
}
