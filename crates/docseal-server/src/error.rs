// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docseal_core::error::DocsealError;
use docseal_core::public_errors::{Disposition, publicize};
use serde::Serialize;
use tracing::{debug, error};

/// A domain error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DocsealError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DocsealError> for ApiError {
    fn from(err: DocsealError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match publicize(&self.0).disposition {
            Disposition::NotFound => StatusCode::NOT_FOUND,
            Disposition::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
            Disposition::Conflict => StatusCode::CONFLICT,
            Disposition::Forbidden => StatusCode::FORBIDDEN,
            Disposition::Unauthenticated => StatusCode::UNAUTHORIZED,
            Disposition::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let public = publicize(&self.0);
        if public.disposition == Disposition::Internal {
            error!(error = %self.0, "request failed");
        } else {
            debug!(kind = public.kind, %status, "request rejected");
        }
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                kind: public.kind,
                message: public.message,
            },
        };
        (status, Json(body)).into_response()
    }
}
