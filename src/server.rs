//! JSON HTTP server.
//!
//! Exposes facet filtering, document listing, the bulk insight job, passage
//! search and question answering to browser or service clients. Requests
//! are stateless: each one builds a fresh [`crate::session::Session`] from
//! the facets in its body.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check, with corpus and index status |
//! | `POST` | `/facets` | Cascade: options with counts, revalidated selections, matching ids |
//! | `POST` | `/documents` | Details of the matching documents |
//! | `POST` | `/insights` | Run the bulk insight job over the matching documents |
//! | `POST` | `/search` | Top passages for a query |
//! | `POST` | `/ask` | Retrieval-grounded answer to a question |
//! | `GET`  | `/trending` | Digest of recent research (`?years=N` overrides the window) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `index_uninitialized` (503), `collaborator_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use evidence_harness_core::corpus::DocumentDetails;
use evidence_harness_core::index::RetrievedPassage;
use evidence_harness_core::CoreError;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app::App;
use crate::ask::{ask, search_passages, Answer};
use crate::error::CollaboratorError;
use crate::facets::{facet_report, matching_details, FacetReport, FacetRequest};
use crate::insights::{run_topics, select_topics, TopicReport};
use crate::trending::trending;
use evidence_harness_core::trending::TrendingReport;

/// Build the router over a loaded application.
pub fn router(app: App) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/facets", post(handle_facets))
        .route("/documents", post(handle_documents))
        .route("/insights", post(handle_insights))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .route("/trending", get(handle_trending))
        .layer(cors)
        .with_state(app)
}

/// Serve until the process is terminated.
pub async fn run_server(app: App) -> anyhow::Result<()> {
    let bind_addr = app.config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "server listening");
    println!("Evidence Harness listening on http://{}", bind_addr);
    axum::serve(listener, router(app)).await?;
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

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn error(status: StatusCode, code: &'static str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code,
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    error(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Map an error from the library layer to a status and code.
fn classify_error(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);

    if let Some(core) = err.downcast_ref::<CoreError>() {
        return match core {
            CoreError::Uninitialized => {
                error(StatusCode::SERVICE_UNAVAILABLE, "index_uninitialized", message)
            }
            CoreError::InvalidTopK | CoreError::DimensionMismatch { .. } => bad_request(message),
            CoreError::NonFiniteQuery => {
                error(StatusCode::BAD_GATEWAY, "collaborator_error", message)
            }
            CoreError::InvalidIndex(_) => {
                error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        };
    }
    if err.downcast_ref::<CollaboratorError>().is_some() {
        return error(StatusCode::BAD_GATEWAY, "collaborator_error", message);
    }
    if message.contains("not found") {
        error(StatusCode::NOT_FOUND, "not_found", message)
    } else if message.contains("must not be empty")
        || message.contains("must be [low, high]")
        || message.contains("is required")
        || message.contains("must be >= 1")
    {
        bad_request(message)
    } else if message.contains("disabled") {
        error(StatusCode::BAD_GATEWAY, "collaborator_error", message)
    } else {
        error(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    documents: usize,
    index_passages: Option<usize>,
}

async fn handle_health(State(app): State<App>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: app.store.documents().len(),
        index_passages: app.index.is_initialized().then(|| app.index.len()),
    })
}

// ============ Facets and documents ============

async fn handle_facets(
    State(app): State<App>,
    Json(req): Json<FacetRequest>,
) -> Result<Json<FacetReport>, AppError> {
    let mut session = req.session(&app).map_err(classify_error)?;
    Ok(Json(facet_report(&app, &mut session)))
}

#[derive(Debug, Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentDetails>,
}

async fn handle_documents(
    State(app): State<App>,
    Json(req): Json<FacetRequest>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let mut session = req.session(&app).map_err(classify_error)?;
    Ok(Json(DocumentsResponse {
        documents: matching_details(&app, &mut session),
    }))
}

// ============ POST /insights ============

#[derive(Deserialize, Default)]
#[serde(default)]
struct InsightsRequest {
    #[serde(flatten)]
    facets: FacetRequest,
    /// Slots to run; all configured topics when absent.
    topics: Option<Vec<String>>,
}

#[derive(Serialize)]
struct InsightsResponse {
    documents: usize,
    results: Vec<TopicReport>,
}

async fn handle_insights(
    State(app): State<App>,
    Json(req): Json<InsightsRequest>,
) -> Result<Json<InsightsResponse>, AppError> {
    let topics = select_topics(&app, req.topics.as_deref()).map_err(classify_error)?;
    let mut session = req.facets.session(&app).map_err(classify_error)?;
    session.begin_job().map_err(classify_error)?;
    let documents = session.matching_documents(&app.facet_engine());
    let count = documents.len();
    let results = run_topics(&app, &topics, documents).await;
    session.finish_job(&results);
    Ok(Json(InsightsResponse {
        documents: count,
        results,
    }))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<RetrievedPassage>,
}

async fn handle_search(
    State(app): State<App>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let results = search_passages(&app, &req.query, req.limit)
        .await
        .map_err(classify_error)?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn handle_ask(
    State(app): State<App>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    let answer = ask(&app, &req.question).await.map_err(classify_error)?;
    Ok(Json(answer))
}

// ============ GET /trending ============

#[derive(Deserialize, Default)]
struct TrendingQuery {
    years: Option<usize>,
}

async fn handle_trending(
    State(app): State<App>,
    Query(query): Query<TrendingQuery>,
) -> Result<Json<TrendingReport>, AppError> {
    let report = trending(&app, query.years).map_err(classify_error)?;
    Ok(Json(report))
}
