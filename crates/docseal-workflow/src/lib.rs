// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docseal-workflow: the document lifecycle on top of the store: generation,
// signature collection, sealing, supersession, and public verification of
// reference numbers.  Everything here is synchronous; the server drives it
// from blocking tasks.

pub mod entities;
pub mod retry;
pub mod sealing;
pub mod service;
pub mod throttle;
pub mod verify;

pub use entities::{EntityProvider, StaticEntityProvider};
pub use retry::RetryConfig;
pub use sealing::Sealer;
pub use service::DocumentService;
pub use throttle::RateLimiter;
pub use verify::{VerificationOutcome, Verifier};
