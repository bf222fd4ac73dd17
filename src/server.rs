//! Web interface and JSON API.
//!
//! Serves a single-page question form and the endpoints it calls. The
//! [`RagEngine`] is built once before the server starts and shared read-only
//! across handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Question form |
//! | `POST` | `/api/ask` | Answer a question with cited sources |
//! | `POST` | `/api/search` | Retrieval only, no model call |
//! | `GET`  | `/health` | Status, version, and indexed chunk count |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `upstream_error` (502, the completion
//! API failed), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::models::{Answer, SearchHit};
use crate::rag::RagEngine;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Upper bound on `top_k` accepted from clients.
const MAX_TOP_K: usize = 20;

#[derive(Clone)]
struct AppState {
    engine: Arc<RagEngine>,
}

/// Build the application router. Exposed so tests and embedding binaries can
/// serve it on their own listener.
pub fn router(engine: Arc<RagEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/api/ask", post(handle_ask))
        .route("/api/search", post(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { engine })
}

/// Bind `bind_addr` and serve until the process is terminated.
pub async fn run_server(bind_addr: &str, engine: Arc<RagEngine>) -> anyhow::Result<()> {
    let chunks = engine.chunk_count();
    let app = router(engine);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    println!(
        "TravelRAG listening on http://{} ({} chunks indexed)",
        bind_addr, chunks
    );
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

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error".to_string(),
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

// ============ Requests ============

#[derive(Debug, Deserialize)]
struct QuestionRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
}

impl QuestionRequest {
    fn validate(&self, engine: &RagEngine) -> Result<(String, usize), AppError> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(bad_request("question must not be empty"));
        }
        let top_k = self.top_k.unwrap_or_else(|| engine.default_top_k());
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(bad_request(format!(
                "top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }
        Ok((question.to_string(), top_k))
    }
}

/// Malformed bodies are reported through the same JSON error contract.
fn parse_question(
    payload: Result<Json<QuestionRequest>, JsonRejection>,
    engine: &RagEngine,
) -> Result<(String, usize), AppError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    req.validate(engine)
}

// ============ GET / ============

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chunks: state.engine.chunk_count(),
    })
}

// ============ POST /api/ask ============

async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let (question, top_k) = parse_question(payload, &state.engine)?;

    let hits = state
        .engine
        .retrieve(&question, top_k)
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;

    let answer = state
        .engine
        .generate(&question, &hits)
        .await
        .map_err(|e| {
            tracing::warn!("completion failed: {:#}", e);
            upstream_error(format!("{:#}", e))
        })?;

    Ok(Json(answer))
}

// ============ POST /api/search ============

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    hits: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let (question, top_k) = parse_question(payload, &state.engine)?;

    let hits = state
        .engine
        .retrieve(&question, top_k)
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;

    Ok(Json(SearchResponse {
        query: question,
        hits,
    }))
}
