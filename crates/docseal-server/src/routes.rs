// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Route table and handlers.
//
// The workflow is synchronous (SQLite underneath), so every handler hands its
// work to `spawn_blocking` and awaits the result.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{Document, DocumentId, HistoryEntry, SignerRole, VerificationSummary};
use docseal_workflow::{DocumentService, Verifier};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::identity::{Actor, require_actor};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
    pub verifier: Arc<Verifier>,
}

/// Build the full router.  Lifecycle routes require an actor; templates,
/// health, and verification are public.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/generate", post(generate))
        .route("/request-signature", post(request_signature))
        .route("/sign", post(sign))
        .route("/cancel", post(cancel))
        .route("/regenerate", post(regenerate))
        .route("/supersede", post(supersede))
        .route("/documents", get(list_documents))
        .route("/documents/:id", get(get_document))
        .route("/documents/:id/history", get(document_history))
        .route("/documents/:id/pdf", get(document_pdf))
        .layer(middleware::from_fn(require_actor));

    let public = Router::new()
        .route("/health", get(health))
        .route("/templates", get(list_templates))
        .route("/verify/:reference", get(verify));

    public.merge(protected).with_state(state)
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

fn ok<T>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    template_id: String,
    entity_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestSignatureRequest {
    doc_id: String,
    signer_role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    doc_id: String,
    signer_name: String,
    role: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReasonRequest {
    doc_id: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocRequest {
    doc_id: String,
}

#[derive(Debug, Serialize)]
struct TemplateSummary {
    id: String,
    name: String,
    #[serde(rename = "type")]
    document_type: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    success: bool,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<VerificationSummary>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run synchronous workflow code off the async executor.
async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DocsealError::Internal(format!("blocking task failed: {e}")))?
        .map_err(ApiError::from)
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| DocsealError::BadRequest(rejection.body_text()).into())
}

fn document_id(raw: &str) -> ApiResult<DocumentId> {
    DocumentId::parse(raw)
        .ok_or_else(|| DocsealError::BadRequest(format!("'{raw}' is not a document id")).into())
}

// ---------------------------------------------------------------------------
// Public handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_templates(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<TemplateSummary>>>> {
    let templates = state.service.templates().list()?;
    Ok(ok(templates
        .into_iter()
        .map(|t| TemplateSummary {
            id: t.id,
            name: t.name,
            document_type: t.document_type,
        })
        .collect()))
}

/// Always 200.  The body says whether the reference is genuine and nothing
/// about why it is not.  An undecodable path segment goes through the
/// verifier as an empty reference, so it is rate limited and answered like
/// any other malformed input.
async fn verify(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    reference: std::result::Result<Path<String>, PathRejection>,
) -> Json<VerifyResponse> {
    let reference = match reference {
        Ok(Path(reference)) => reference,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "undecodable verify reference");
            String::new()
        }
    };
    let caller = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned());
    let verifier = state.verifier.clone();
    let outcome = match tokio::task::spawn_blocking(move || verifier.verify(&caller, &reference)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "verification task failed");
            docseal_workflow::VerificationOutcome::not_valid()
        }
    };
    Json(VerifyResponse {
        success: true,
        valid: outcome.valid,
        message: (!outcome.valid).then_some("No valid sealed document matches this reference number."),
        data: outcome.summary,
    })
}

// ---------------------------------------------------------------------------
// Lifecycle handlers
// ---------------------------------------------------------------------------

async fn generate(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<Document>>)> {
    let req = body(payload)?;
    let service = state.service.clone();
    let doc = blocking(move || service.generate(&req.template_id, &req.entity_id, &actor.id)).await?;
    Ok((StatusCode::CREATED, ok(doc)))
}

async fn request_signature(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: std::result::Result<Json<RequestSignatureRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<Document>>> {
    let req = body(payload)?;
    let id = document_id(&req.doc_id)?;
    let role = SignerRole::new(&req.signer_role);
    let service = state.service.clone();
    let doc = blocking(move || service.request_signature(id, &role, &actor.id)).await?;
    Ok(ok(doc))
}

/// The caller must hold the role they sign as.
async fn sign(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: std::result::Result<Json<SignRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<Document>>> {
    let req = body(payload)?;
    let id = document_id(&req.doc_id)?;
    let role = SignerRole::new(&req.role);
    if !actor.holds(&role) {
        warn!(actor = %actor.id, %role, "sign attempted without holding the role");
        return Err(DocsealError::UnauthorizedSigner {
            role: role.to_string(),
        }
        .into());
    }
    let service = state.service.clone();
    let doc = blocking(move || service.sign(id, &actor.id, &req.signer_name, &role)).await?;
    Ok(ok(doc))
}

async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: std::result::Result<Json<ReasonRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<Document>>> {
    let req = body(payload)?;
    let id = document_id(&req.doc_id)?;
    let service = state.service.clone();
    let doc = blocking(move || service.cancel(id, &req.reason, &actor.id)).await?;
    Ok(ok(doc))
}

async fn regenerate(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: std::result::Result<Json<DocRequest>, JsonRejection>,
) -> ApiResult<Json<Envelope<Document>>> {
    let req = body(payload)?;
    let id = document_id(&req.doc_id)?;
    let service = state.service.clone();
    let doc = blocking(move || service.regenerate(id, &actor.id)).await?;
    Ok(ok(doc))
}

async fn supersede(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: std::result::Result<Json<ReasonRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Envelope<Document>>)> {
    let req = body(payload)?;
    let id = document_id(&req.doc_id)?;
    let service = state.service.clone();
    let doc = blocking(move || service.supersede(id, &req.reason, &actor.id)).await?;
    Ok((StatusCode::CREATED, ok(doc)))
}

// ---------------------------------------------------------------------------
// Document reads
// ---------------------------------------------------------------------------

async fn list_documents(State(state): State<AppState>) -> ApiResult<Json<Envelope<Vec<Document>>>> {
    let service = state.service.clone();
    Ok(ok(blocking(move || service.list()).await?))
}

async fn get_document(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<Envelope<Document>>> {
    let id = document_id(&raw)?;
    let service = state.service.clone();
    Ok(ok(blocking(move || service.get(id)).await?))
}

async fn document_history(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<Json<Envelope<Vec<HistoryEntry>>>> {
    let id = document_id(&raw)?;
    let service = state.service.clone();
    Ok(ok(blocking(move || service.history(id)).await?))
}

async fn document_pdf(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = document_id(&raw)?;
    let service = state.service.clone();
    let bytes = blocking(move || service.render_pdf(id)).await?;
    debug!(document = %id, size = bytes.len(), "pdf rendered");
    let disposition = format!("inline; filename=\"{id}.pdf\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use docseal_core::types::{EntityData, PaperSize};
    use docseal_document::{PdfRenderer, TemplateRegistry};
    use docseal_security::IssuerKey;
    use docseal_store::{DocumentStore, MemoryDocumentStore};
    use docseal_workflow::{RateLimiter, Sealer, StaticEntityProvider};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::identity::{ACTOR_ID_HEADER, ACTOR_ROLES_HEADER};

    fn entity(pairs: &[(&str, &str)]) -> EntityData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn app() -> Router {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let key = Arc::new(IssuerKey::generate("Docseal").unwrap());
        let entities = StaticEntityProvider::new()
            .with_entity("EMP001", entity(&[("name", "Ahmed Ali"), ("salary", "15000")]))
            .with_entity("EMP003", entity(&[("name", "No Salary")]));
        let service = DocumentService::new(
            store.clone(),
            Arc::new(TemplateRegistry::with_builtin().unwrap()),
            Arc::new(entities),
            Sealer::new(key.clone()),
            PdfRenderer::new(PaperSize::A4, "Docseal"),
        );
        let verifier = Verifier::new(store, key, RateLimiter::new(0, Duration::from_secs(60)), None);
        build_router(AppState {
            service: Arc::new(service),
            verifier: Arc::new(verifier),
        })
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn post_as(uri: &str, actor: Option<(&str, &str)>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some((id, roles)) = actor {
            builder = builder
                .header(ACTOR_ID_HEADER, id)
                .header(ACTOR_ROLES_HEADER, roles);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, actor: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(id) = actor {
            builder = builder.header(ACTOR_ID_HEADER, id);
        }
        builder.body(Body::empty()).unwrap()
    }

    const HR: Option<(&str, &str)> = Some(("hr-1", "HR_MANAGER"));

    async fn generate_salary(app: &Router, entity: &str) -> (StatusCode, Value) {
        call(
            app,
            post_as(
                "/generate",
                HR,
                json!({"templateId": "salary-certificate", "entityId": entity}),
            ),
        )
        .await
    }

    #[tokio::test]
    async fn health_and_templates_are_public() {
        let app = app();
        let (status, body) = call(&app, get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = call(&app, get("/templates", None)).await;
        assert_eq!(status, StatusCode::OK);
        let templates = body["data"].as_array().unwrap();
        assert_eq!(templates.len(), 4);
        assert!(templates.iter().any(|t| t["type"] == "SALARY_CERTIFICATE"));
    }

    #[tokio::test]
    async fn mutating_routes_need_an_actor() {
        let app = app();
        let (status, body) = call(
            &app,
            post_as(
                "/generate",
                None,
                json!({"templateId": "salary-certificate", "entityId": "EMP001"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "Unauthenticated");
    }

    #[tokio::test]
    async fn generate_sign_verify() {
        let app = app();
        let (status, body) = generate_salary(&app, "EMP001").await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "DRAFT");
        assert_eq!(body["data"]["content"], "This certifies Ahmed Ali earns 15000 SAR");
        let doc_id = body["data"]["id"].as_str().unwrap().to_owned();

        let (status, body) = call(
            &app,
            post_as(
                "/sign",
                Some(("u-7", "HR_MANAGER")),
                json!({"docId": doc_id, "signerName": "Dr. Verify", "role": "HR_MANAGER"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "SEALED");
        let reference = body["data"]["referenceNumber"].as_str().unwrap().to_owned();

        let (status, body) = call(&app, get(&format!("/verify/{reference}"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);
        assert_eq!(body["data"]["type"], "SALARY_CERTIFICATE");
        assert_eq!(body["data"]["status"], "SEALED");
        assert!(body["data"].get("content").is_none());

        let (status, body) = call(
            &app,
            post_as(
                "/sign",
                Some(("u-7", "HR_MANAGER")),
                json!({"docId": doc_id, "signerName": "Dr. Verify", "role": "HR_MANAGER"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "InvalidTransition");
    }

    #[tokio::test]
    async fn signing_requires_holding_the_role() {
        let app = app();
        let (_, body) = generate_salary(&app, "EMP001").await;
        let doc_id = body["data"]["id"].as_str().unwrap().to_owned();

        let (status, body) = call(
            &app,
            post_as(
                "/sign",
                Some(("u-8", "FINANCE")),
                json!({"docId": doc_id, "signerName": "Mallory", "role": "HR_MANAGER"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["kind"], "UnauthorizedSigner");
    }

    #[tokio::test]
    async fn missing_field_is_unprocessable() {
        let app = app();
        let (status, body) = generate_salary(&app, "EMP003").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "MissingFieldError");
        assert!(body["error"]["message"].as_str().unwrap().contains("salary"));

        let (status, body) = generate_salary(&app, "EMP404").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "EntityNotFound");
    }

    #[tokio::test]
    async fn malformed_bodies_and_ids() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .header(ACTOR_ID_HEADER, "hr-1")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "BadRequest");

        let (status, _) = call(&app, get("/documents/not-a-uuid", Some("hr-1"))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let unknown = DocumentId::new();
        let (status, body) = call(&app, get(&format!("/documents/{unknown}"), Some("hr-1"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["kind"], "NotFound");
    }

    #[tokio::test]
    async fn verify_answers_generically() {
        let app = app();
        for reference in ["not-a-real-ref", "DS-0000-0000-0000-0", "%FF", "DS-%C3%28"] {
            let (status, body) = call(&app, get(&format!("/verify/{reference}"), None)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["valid"], false);
            assert!(body.get("data").is_none());
        }
    }

    #[tokio::test]
    async fn undecodable_reference_matches_the_unknown_answer() {
        let app = app();
        let (_, unknown) = call(&app, get("/verify/DS-0000-0000-0000-0", None)).await;
        let (status, body) = call(&app, get("/verify/%FF", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, unknown);
    }

    #[tokio::test]
    async fn cancel_regenerate_and_history() {
        let app = app();
        let (_, body) = generate_salary(&app, "EMP001").await;
        let doc_id = body["data"]["id"].as_str().unwrap().to_owned();

        let (status, body) = call(&app, post_as("/regenerate", HR, json!({"docId": doc_id}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["version"], 2);

        let (status, body) = call(
            &app,
            post_as("/cancel", HR, json!({"docId": doc_id, "reason": "wrong month"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "CANCELLED");

        let (status, body) = call(&app, get(&format!("/documents/{doc_id}/history"), Some("hr-1"))).await;
        assert_eq!(status, StatusCode::OK);
        let actions: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| h["action"].as_str().unwrap())
            .collect();
        assert_eq!(actions, ["generated", "regenerated", "cancelled"]);
    }

    #[tokio::test]
    async fn supersede_and_pdf() {
        let app = app();
        let (_, body) = generate_salary(&app, "EMP001").await;
        let doc_id = body["data"]["id"].as_str().unwrap().to_owned();
        call(
            &app,
            post_as(
                "/sign",
                HR,
                json!({"docId": doc_id, "signerName": "Dr. Verify", "role": "HR_MANAGER"}),
            ),
        )
        .await;

        let response = app
            .clone()
            .oneshot(get(&format!("/documents/{doc_id}/pdf"), Some("hr-1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let (status, body) = call(
            &app,
            post_as("/supersede", HR, json!({"docId": doc_id, "reason": "salary revised"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "DRAFT");
        assert_eq!(body["data"]["supersedes"], doc_id.as_str());
    }
}
