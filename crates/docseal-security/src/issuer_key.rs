// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Issuer key: an ECDSA P-256 key pair that countersigns every seal.
//
// The content hash alone only proves the document has not drifted from the
// seal row. Signing the seal payload with a key that never leaves the server
// also ties the seal row itself to the issuer, so a forged row written straight
// into the database does not verify.

use std::path::Path;

use docseal_core::error::DocsealError;
use docseal_core::types::SealRecord;
use ring::rand::SystemRandom;
use ring::signature::{
    ECDSA_P256_SHA256_ASN1, ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair,
    UnparsedPublicKey,
};
use tracing::{debug, info, instrument};

use crate::storage::EncryptedStorage;

/// Domain separator for seal payloads.
const SEAL_PAYLOAD_DOMAIN: &[u8] = b"docseal-seal-v1\0";

/// The issuer's signing key.
pub struct IssuerKey {
    name: String,
    key_pair: EcdsaKeyPair,
    /// PKCS#8 v1 DER, kept so the key can be re-persisted.
    pkcs8_der: Vec<u8>,
    rng: SystemRandom,
}

impl std::fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerKey")
            .field("name", &self.name)
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

impl IssuerKey {
    /// Generate a fresh key pair from the OS CSPRNG.
    #[instrument]
    pub fn generate(name: &str) -> Result<Self, DocsealError> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|e| DocsealError::Signing(format!("key generation failed: {e}")))?;
        Self::from_pkcs8(name, pkcs8.as_ref())
    }

    /// Load a key from PKCS#8 v1 DER.
    pub fn from_pkcs8(name: &str, pkcs8_der: &[u8]) -> Result<Self, DocsealError> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8_der, &rng)
            .map_err(|e| DocsealError::Signing(format!("key parsing failed: {e}")))?;
        debug!(issuer = name, "issuer key loaded");
        Ok(Self {
            name: name.to_owned(),
            key_pair,
            pkcs8_der: pkcs8_der.to_vec(),
            rng,
        })
    }

    /// Load the key stored at `path`, or generate and store one if the file
    /// does not exist yet.
    #[instrument(skip_all, fields(path = %path.display(), issuer = name))]
    pub fn load_or_create(
        path: &Path,
        storage: &EncryptedStorage,
        name: &str,
    ) -> Result<Self, DocsealError> {
        if path.exists() {
            let pkcs8 = storage.read_file(path)?;
            return Self::from_pkcs8(name, &pkcs8);
        }
        let key = Self::generate(name)?;
        storage.write_file(path, &key.pkcs8_der)?;
        info!("generated new issuer key");
        Ok(key)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncompressed SEC1 public key (65 bytes).
    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    /// ASN.1 DER ECDSA signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, DocsealError> {
        let sig = self
            .key_pair
            .sign(&self.rng, message)
            .map_err(|e| DocsealError::Signing(format!("signing failed: {e}")))?;
        Ok(sig.as_ref().to_vec())
    }

    /// Sign `seal` and return the hex signature for `issuer_signature`.
    pub fn sign_seal(&self, seal: &SealRecord) -> Result<String, DocsealError> {
        Ok(hex::encode(self.sign(&seal_payload(seal))?))
    }

    /// Check `seal.issuer_signature` against this key.
    pub fn verify_seal(&self, seal: &SealRecord) -> bool {
        match hex::decode(&seal.issuer_signature) {
            Ok(sig) => verify_signature(self.public_key(), &seal_payload(seal), &sig),
            Err(_) => false,
        }
    }
}

/// Verify an ASN.1 DER ECDSA P-256 signature.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, public_key)
        .verify(message, signature)
        .is_ok()
}

/// Bytes covered by the issuer signature. Everything except the signature.
pub fn seal_payload(seal: &SealRecord) -> Vec<u8> {
    let seal_id = seal.seal_id.to_string();
    let document_id = seal.document_id.to_string();
    let sealed_at = seal
        .sealed_at
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    let fields: [&[u8]; 6] = [
        seal_id.as_bytes(),
        document_id.as_bytes(),
        seal.reference_number.as_bytes(),
        seal.content_hash.as_bytes(),
        sealed_at.as_bytes(),
        seal.issuer.as_bytes(),
    ];
    let mut out = SEAL_PAYLOAD_DOMAIN.to_vec();
    for field in fields {
        out.extend_from_slice(&(field.len() as u64).to_be_bytes());
        out.extend_from_slice(field);
    }
    out
}
