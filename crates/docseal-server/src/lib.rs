// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docseal-server: HTTP interface.  JSON routes for the document lifecycle
// behind caller identity headers, plus the public verification endpoint.

pub mod error;
pub mod identity;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use identity::Actor;
pub use routes::{AppState, build_router};
pub use server::DocsealServer;
