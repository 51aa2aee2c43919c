// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Caller identity, as forwarded by the upstream identity layer.
//
// Authentication happens in front of this service.  What reaches us is an
// actor id and the roles that actor holds, in plain headers.

use std::collections::BTreeSet;

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use docseal_core::error::DocsealError;
use docseal_core::types::SignerRole;
use tracing::warn;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLES_HEADER: &str = "x-actor-roles";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub roles: BTreeSet<SignerRole>,
}

impl Actor {
    /// `None` when the id header is absent, blank, or not valid text.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let id = headers.get(ACTOR_ID_HEADER)?.to_str().ok()?.trim();
        if id.is_empty() {
            return None;
        }
        let roles = headers
            .get(ACTOR_ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(SignerRole::new)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            id: id.to_owned(),
            roles,
        })
    }

    pub fn holds(&self, role: &SignerRole) -> bool {
        self.roles.contains(role)
    }
}

/// Middleware: reject requests without an actor, otherwise make the
/// [`Actor`] available as a request extension.
pub async fn require_actor(mut request: Request, next: Next) -> Response {
    match Actor::from_headers(request.headers()) {
        Some(actor) => {
            request.extensions_mut().insert(actor);
            next.run(request).await
        }
        None => {
            warn!(path = %request.uri().path(), "request without actor identity");
            ApiError(DocsealError::Unauthenticated).into_response()
        }
    }
}
