// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Public reference numbers for sealed documents.
//
// Format: `DS-XXXX-XXXX-XXXX-C`
//
//   X  12 payload symbols, Crockford base-32 (no I, L, O, U), 60 bits drawn
//      from the OS CSPRNG
//   C  Luhn mod-32 check symbol over the payload
//
// Luhn mod N with an even N detects every single-symbol substitution and most
// adjacent transpositions, so a mistyped reference is rejected without
// touching the store.

use std::fmt;

use docseal_core::error::DocsealError;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

/// Prefix of every reference number.
pub const PREFIX: &str = "DS";

/// Crockford base-32 alphabet.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Number of random payload symbols.
const PAYLOAD_LEN: usize = 12;

/// Symbols per hyphen-separated group in the canonical form.
const GROUP_LEN: usize = 4;

/// Length of the canonical text form: "DS-" + 3 groups with hyphens + "-C".
const CANONICAL_LEN: usize = PREFIX.len() + 1 + PAYLOAD_LEN + PAYLOAD_LEN / GROUP_LEN + 1;

/// A syntactically valid reference number in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceNumber(String);

impl ReferenceNumber {
    /// Draw a fresh reference number from the system CSPRNG.
    pub fn generate() -> Result<Self, DocsealError> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; 8];
        rng.fill(&mut bytes)
            .map_err(|_| DocsealError::Internal("system randomness unavailable".into()))?;
        let bits = u64::from_be_bytes(bytes);

        let mut payload = [0u8; PAYLOAD_LEN];
        for (i, slot) in payload.iter_mut().enumerate() {
            *slot = ((bits >> (5 * i)) & 0x1F) as u8;
        }
        Ok(Self::from_payload(&payload))
    }

    /// Build the canonical form from payload symbol values (each `< 32`).
    fn from_payload(payload: &[u8; PAYLOAD_LEN]) -> Self {
        let check = luhn_check_symbol(payload);
        let mut out = String::with_capacity(CANONICAL_LEN);
        out.push_str(PREFIX);
        for (i, value) in payload.iter().enumerate() {
            if i % GROUP_LEN == 0 {
                out.push('-');
            }
            out.push(ALPHABET[*value as usize] as char);
        }
        out.push('-');
        out.push(ALPHABET[check as usize] as char);
        Self(out)
    }

    /// Parse user input.
    ///
    /// Case and hyphen placement are forgiving; everything else is strict.
    /// Runs in constant time with respect to the store (no lookups) and
    /// bounded time with respect to the input.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.len() > CANONICAL_LEN + 8 {
            return None;
        }

        let mut symbols: Vec<u8> = Vec::with_capacity(PREFIX.len() + PAYLOAD_LEN + 1);
        for ch in input.chars() {
            match ch {
                '-' | ' ' => continue,
                c if c.is_ascii_alphanumeric() => symbols.push(c.to_ascii_uppercase() as u8),
                _ => return None,
            }
        }

        let body = symbols.strip_prefix(PREFIX.as_bytes())?;
        if body.len() != PAYLOAD_LEN + 1 {
            return None;
        }

        let mut values = [0u8; PAYLOAD_LEN + 1];
        for (slot, symbol) in values.iter_mut().zip(body) {
            *slot = symbol_value(*symbol)?;
        }
        if !luhn_is_valid(&values) {
            return None;
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&values[..PAYLOAD_LEN]);
        Some(Self::from_payload(&payload))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ReferenceNumber {
    type Err = DocsealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DocsealError::BadRequest("malformed reference number".into()))
    }
}

fn symbol_value(symbol: u8) -> Option<u8> {
    ALPHABET
        .iter()
        .position(|&c| c == symbol)
        .map(|idx| idx as u8)
}

/// Luhn mod-32 check symbol for `payload`.
fn luhn_check_symbol(payload: &[u8]) -> u8 {
    let n = ALPHABET.len() as u32;
    let mut factor = 2;
    let mut sum = 0u32;
    for &value in payload.iter().rev() {
        let addend = factor * value as u32;
        sum += addend / n + addend % n;
        factor = if factor == 2 { 1 } else { 2 };
    }
    ((n - sum % n) % n) as u8
}

/// Validate payload plus trailing check symbol.
fn luhn_is_valid(values: &[u8]) -> bool {
    let n = ALPHABET.len() as u32;
    let mut factor = 1;
    let mut sum = 0u32;
    for &value in values.iter().rev() {
        let addend = factor * value as u32;
        sum += addend / n + addend % n;
        factor = if factor == 2 { 1 } else { 2 };
    }
    sum % n == 0
}
