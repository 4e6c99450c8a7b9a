//! HTTP API server.
//!
//! Exposes the conversational pipeline and the ingestion run over a JSON
//! HTTP API.
//!
//! # Endpoints
//!
//! | Method   | Path | Description |
//! |----------|------|-------------|
//! | `POST`   | `/query` | Answer a question over the indexed corpus |
//! | `POST`   | `/ingest` | Run one ingestion pass |
//! | `GET`    | `/documents` | List ingested pages and their fingerprints |
//! | `DELETE` | `/documents/{page_id}` | Drop one page from the index |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::answer::ChatPipeline;
use crate::config::Config;
use crate::fetch::PageSource;
use crate::ingest::run_ingest;
use crate::registry::Registry;
use crate::store::SimilarityStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pipeline: Arc<ChatPipeline>,
    store: Arc<dyn SimilarityStore>,
    source: Arc<dyn PageSource>,
}

/// Starts the HTTP server on `[server].bind` and serves until the process
/// is terminated.
pub async fn run_server(
    config: &Config,
    source: Arc<dyn PageSource>,
    store: Arc<dyn SimilarityStore>,
    pipeline: Arc<ChatPipeline>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline,
        store,
        source,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/query", post(handle_query))
        .route("/ingest", post(handle_ingest))
        .route("/documents", get(handle_list_documents))
        .route("/documents/{page_id}", delete(handle_delete_document))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
}

/// Handler for `POST /query`. A blank question is a client error; everything
/// downstream degrades to the pipeline's fallback answer rather than a 500.
async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let answer = state.pipeline.answer(question).await;
    Ok(Json(QueryResponse { answer }))
}

// ============ POST /ingest ============

#[derive(Deserialize, Default)]
struct IngestRequest {
    /// Space to ingest; the configured default when omitted.
    space_key: Option<String>,
}

#[derive(Serialize)]
struct IngestResponse {
    message: String,
    updated_count: usize,
}

/// Handler for `POST /ingest`. A fetch failure is the one condition that
/// surfaces as a 500; per-page failures are absorbed by the run itself.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let space_key = request
        .space_key
        .unwrap_or_else(|| state.config.wiki.space_key.clone());

    let outcome = run_ingest(
        &state.config,
        &space_key,
        state.source.as_ref(),
        state.store.clone(),
    )
    .await
    .map_err(|e| {
        error!(error = format!("{e:#}"), "ingestion run failed");
        internal(format!("ingestion failed: {e:#}"))
    })?;

    Ok(Json(IngestResponse {
        message: format!("Ingestion complete for space '{}'", space_key),
        updated_count: outcome.updated,
    }))
}

// ============ GET /documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: BTreeMap<String, String>,
}

/// Handler for `GET /documents`. Returns the registry as a flat
/// `page_id -> fingerprint` map.
async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let registry = Registry::load(&state.config.registry.path)
        .map_err(|e| internal(format!("failed to load registry: {e:#}")))?;

    Ok(Json(DocumentsResponse {
        documents: registry.entries().clone(),
    }))
}

// ============ DELETE /documents/{page_id} ============

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
}

/// Handler for `DELETE /documents/{page_id}`. Drops the page's chunks from
/// the store and its registry entry, so the next ingestion run re-embeds it.
async fn handle_delete_document(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    if page_id.trim().is_empty() {
        return Err(bad_request("page_id must not be empty"));
    }

    state.store.delete_by_page(&page_id).await;

    let registry_path = &state.config.registry.path;
    let mut registry = Registry::load(registry_path)
        .map_err(|e| internal(format!("failed to load registry: {e:#}")))?;
    if registry.remove(&page_id) {
        registry
            .save(registry_path)
            .map_err(|e| internal(format!("failed to persist registry: {e:#}")))?;
    }

    Ok(Json(DeleteResponse {
        message: format!("Page '{}' removed from the index", page_id),
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
