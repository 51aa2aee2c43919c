// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry engine for optimistic-concurrency conflicts.
//
// Every mutating workflow operation is read-modify-write against a document
// revision.  When another writer got there first the store answers
// `StaleRevision`; the operation reloads and re-applies after a short,
// jittered backoff.  Everything else is permanent and surfaces immediately.

use std::time::Duration;

use docseal_core::error::{DocsealError, Result};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Base delay between attempts (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }
}

/// How an error should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Lost a race; reload and try again.
    Contended,
    /// Retrying cannot change the outcome.
    Permanent,
}

/// Result of evaluating whether to retry.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
    Exhausted,
}

pub fn classify_error(err: &DocsealError) -> ErrorClass {
    match err {
        DocsealError::StaleRevision(_) => ErrorClass::Contended,
        _ => ErrorClass::Permanent,
    }
}

/// Decide what to do after `attempt` (1-based) failed with `err`.
pub fn should_retry(err: &DocsealError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match classify_error(err) {
        ErrorClass::Permanent => RetryDecision::GiveUp,
        ErrorClass::Contended if attempt >= config.max_attempts => {
            warn!(attempt, max = config.max_attempts, "conflict retries exhausted");
            RetryDecision::Exhausted
        }
        ErrorClass::Contended => {
            let delay = compute_delay(attempt, config);
            debug!(attempt, delay_us = delay.as_micros() as u64, "retrying after conflict");
            RetryDecision::RetryAfter(delay)
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Exhaustion is reported as `Conflict` for `id`.  Blocks the calling
/// thread while backing off, so call it from blocking context.
pub fn with_retry<T>(
    id: &str,
    config: &RetryConfig,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match op() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        match should_retry(&err, attempt, config) {
            RetryDecision::GiveUp => return Err(err),
            RetryDecision::Exhausted => {
                return Err(DocsealError::Conflict {
                    id: id.to_owned(),
                    attempts: attempt,
                });
            }
            RetryDecision::RetryAfter(delay) => std::thread::sleep(delay),
        }
    }
}

/// delay = min(base * 2^(attempt-1) + jitter, max_delay), jitter in [0, base).
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_us = config.base_delay.as_micros() as u64;
    let exp_us = base_us.saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
    let total_us = exp_us.saturating_add(jitter(base_us));
    Duration::from_micros(total_us.min(config.max_delay.as_micros() as u64))
}

fn jitter(base_us: u64) -> u64 {
    let mut bytes = [0u8; 4];
    match SystemRandom::new().fill(&mut bytes) {
        Ok(()) => u64::from(u32::from_le_bytes(bytes)) % base_us.max(1),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_micros(10),
            max_delay: Duration::from_micros(50),
        }
    }

    #[test]
    fn only_stale_revisions_are_retried() {
        assert_eq!(
            classify_error(&DocsealError::StaleRevision("d".into())),
            ErrorClass::Contended
        );
        assert_eq!(
            classify_error(&DocsealError::DuplicateSignature { role: "HR".into() }),
            ErrorClass::Permanent
        );
        assert_eq!(
            classify_error(&DocsealError::Database("disk full".into())),
            ErrorClass::Permanent
        );
    }

    #[test]
    fn retry_respects_max() {
        let config = fast();
        let err = DocsealError::StaleRevision("d".into());
        assert!(matches!(should_retry(&err, 1, &config), RetryDecision::RetryAfter(_)));
        assert_eq!(should_retry(&err, 3, &config), RetryDecision::Exhausted);
    }

    #[test]
    fn recovers_after_transient_conflicts() {
        let calls = Cell::new(0);
        let result = with_retry("doc", &fast(), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(DocsealError::StaleRevision("doc".into()))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn exhaustion_becomes_conflict() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry("doc-1", &fast(), || {
            calls.set(calls.get() + 1);
            Err(DocsealError::StaleRevision("doc-1".into()))
        });
        assert_eq!(calls.get(), 3);
        match result {
            Err(DocsealError::Conflict { id, attempts }) => {
                assert_eq!(id, "doc-1");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = with_retry("doc", &fast(), || {
            calls.set(calls.get() + 1);
            Err(DocsealError::Unauthenticated)
        });
        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(DocsealError::Unauthenticated)));
    }

    #[test]
    fn delay_grows_and_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(20),
        };
        let d1 = compute_delay(1, &config);
        let d4 = compute_delay(4, &config);
        assert!(d1 < Duration::from_millis(2));
        assert!(d4 >= Duration::from_millis(8));
        assert!(compute_delay(30, &config) <= Duration::from_millis(20));
    }
}
