// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-caller rate limiting for the public verification endpoint.
//
// Fixed-window counters keyed by caller, spread over a handful of
// independently locked shards so concurrent verifications from different
// callers rarely contend.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

const SHARDS: usize = 16;

/// Windows are pruned from a shard once it tracks this many callers.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    shards: Vec<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    /// Allow `limit` requests per caller per `window`.  A limit of zero
    /// disables limiting.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Count a request from `caller`; `false` means over budget.
    pub fn check(&self, caller: &str) -> bool {
        self.check_at(caller, Instant::now())
    }

    pub fn check_at(&self, caller: &str, now: Instant) -> bool {
        if self.limit == 0 {
            return true;
        }
        let Ok(mut shard) = self.shards[shard_index(caller)].lock() else {
            // A poisoned shard only loses counters; refuse rather than
            // stop limiting.
            warn!("rate limiter shard poisoned");
            return false;
        };

        if shard.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            shard.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = shard.entry(caller.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.limit {
            debug!(caller, "rate limit exceeded");
            return false;
        }
        entry.count += 1;
        true
    }
}

fn shard_index(caller: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    caller.hash(&mut hasher);
    (hasher.finish() as usize) % SHARDS
}
