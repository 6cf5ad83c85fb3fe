//! HTTP API server.
//!
//! Serves the JSON endpoints used by the web frontend. Every handler works
//! on the data file configured in `[data].path`; the chat endpoint forwards
//! to the backend in `[chat]` when one is configured.
//!
//! # Endpoints
//!
//! | Method | Path | Body / Query | Response |
//! |--------|------|--------------|----------|
//! | `GET` | `/health` | | `{status, version}` |
//! | `GET` | `/api/data` | | `{message, data, count}` |
//! | `POST` | `/api/data` | `{text}` | `201 {message, data}` |
//! | `DELETE` | `/api/data/{id}` | | `{message}` |
//! | `POST` | `/api/clear` | | `{message}` |
//! | `GET` | `/api/micro-grants` | | `{micro_grants}` |
//! | `POST` | `/api/micro-grants` | `{title, description, amount, userId?, email?}` | `201 {micro_grant}` |
//! | `PATCH` | `/api/micro-grants` | `{id, amount}` | `{micro_grant}` |
//! | `GET` | `/api/documents` | | `{documents, stats}` |
//! | `POST` | `/api/documents` | document | `201 {document}` |
//! | `DELETE` | `/api/documents/{id}` | | `{message}` |
//! | `GET` | `/api/documents/search` | `?q=&type=` | `{results, count}` |
//! | `POST` | `/api/chat` | `{messages, fileName?}` | `{reply}` |
//!
//! # Errors
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "..." } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `chat_disabled` (400),
//! `upstream` (502), `internal` (500).

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use medsplit_core::grants::GrantRequest;
use medsplit_core::models::{DocumentStats, TypeFilter};
use medsplit_core::store::Store;

use crate::chat::{ChatClient, ChatRequest};
use crate::config::Config;
use crate::data::DataFile;
use crate::documents::{today, DocumentInput};
use crate::search::search_store;
use crate::{entries, grants};

/// Shared state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    data: Arc<DataFile>,
    /// `None` when `[chat] base_url` is not set.
    chat: Option<Arc<ChatClient>>,
}

/// Build the application router for `config`.
pub fn build_router(config: &Config) -> anyhow::Result<Router> {
    let chat = if config.chat.is_enabled() {
        Some(Arc::new(ChatClient::from_config(&config.chat)?))
    } else {
        None
    };

    let state = AppState {
        config: Arc::new(config.clone()),
        data: Arc::new(DataFile::from_config(config)),
        chat,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/health", get(handle_health))
        .route("/api/data", get(handle_list_entries).post(handle_add_entry))
        .route("/api/data/{id}", delete(handle_delete_entry))
        .route("/api/clear", post(handle_clear_entries))
        .route(
            "/api/micro-grants",
            get(handle_list_grants)
                .post(handle_create_grant)
                .patch(handle_donate),
        )
        .route(
            "/api/documents",
            get(handle_list_documents).post(handle_upsert_document),
        )
        .route("/api/documents/search", get(handle_search_documents))
        .route("/api/documents/{id}", delete(handle_delete_document))
        .route("/api/chat", post(handle_chat))
        .layer(cors)
        .with_state(state))
}

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = build_router(config)?;
    let bind_addr = config.server.bind.clone();

    info!(data = %config.data.path.display(), chat = config.chat.is_enabled(), "starting server");
    println!("MedSplit server listening on http://{}", bind_addr);

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
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

struct AppError {
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Logs the full error chain; the client only sees `context`.
fn internal(context: &str, err: anyhow::Error) -> AppError {
    error!(error = %format!("{:#}", err), "{}", context);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: context.to_string(),
    }
}

fn rejected(rejection: JsonRejection) -> AppError {
    bad_request(rejection.body_text())
}

fn bad_path(rejection: PathRejection) -> AppError {
    bad_request(rejection.body_text())
}

type ApiResult<T> = Result<T, AppError>;

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

// ============ /api/data ============

#[derive(Deserialize)]
struct EntryBody {
    #[serde(default)]
    text: Option<String>,
}

async fn handle_list_entries(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let data = entries::list(&state.data)
        .await
        .map_err(|e| internal("Failed to read data", e))?;
    Ok(Json(json!({
        "message": "Data retrieved successfully",
        "count": data.len(),
        "data": data,
    })))
}

async fn handle_add_entry(
    State(state): State<AppState>,
    body: Result<Json<EntryBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = body.map_err(rejected)?;
    let text = body
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| bad_request("Text field is required"))?;

    let entry = entries::add(&state.data, &text)
        .await
        .map_err(|e| internal("Failed to save data", e))?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Data saved successfully", "data": entry })),
    ))
}

async fn handle_delete_entry(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id.map_err(bad_path)?;
    entries::delete(&state.data, id)
        .await
        .map_err(|e| internal("Failed to delete data", e))?;
    Ok(Json(json!({ "message": "Data deleted successfully" })))
}

async fn handle_clear_entries(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    entries::clear(&state.data)
        .await
        .map_err(|e| internal("Failed to clear data", e))?;
    Ok(Json(json!({ "message": "All data cleared successfully" })))
}

// ============ /api/micro-grants ============

#[derive(Deserialize)]
struct DonationBody {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    amount: f64,
}

/// Maps grant failures: bad input → 400, unknown grant → 404, else 500.
fn grant_error(context: &str, err: anyhow::Error) -> AppError {
    if grants::is_invalid_input(&err) {
        bad_request(err.to_string())
    } else if grants::is_not_found(&err) {
        not_found(err.to_string())
    } else {
        internal(context, err)
    }
}

async fn handle_list_grants(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let list = grants::list(&state.data)
        .await
        .map_err(|e| internal("Failed to read data", e))?;
    Ok(Json(json!({ "micro_grants": list })))
}

async fn handle_create_grant(
    State(state): State<AppState>,
    body: Result<Json<GrantRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body.map_err(rejected)?;
    let grant = grants::request(&state.data, &req, state.config.grants.max_amount)
        .await
        .map_err(|e| grant_error("Failed to save grant", e))?;
    Ok((StatusCode::CREATED, Json(json!({ "micro_grant": grant }))))
}

async fn handle_donate(
    State(state): State<AppState>,
    body: Result<Json<DonationBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = body.map_err(rejected)?;
    let grant = grants::donate(&state.data, body.id, body.amount)
        .await
        .map_err(|e| grant_error("Failed to update grant", e))?;
    Ok(Json(json!({ "micro_grant": grant })))
}

// ============ /api/documents ============

async fn handle_list_documents(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let docs = state
        .data
        .list_documents()
        .await
        .map_err(|e| internal("Failed to read data", e))?;
    let stats = DocumentStats::from_documents(&docs);
    Ok(Json(json!({ "documents": docs, "stats": stats })))
}

async fn handle_upsert_document(
    State(state): State<AppState>,
    body: Result<Json<DocumentInput>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(input) = body.map_err(rejected)?;
    let mut doc = input
        .into_document(today())
        .map_err(|e| bad_request(e.to_string()))?;
    doc.id = state
        .data
        .upsert_document(&doc)
        .await
        .map_err(|e| internal("Failed to save document", e))?;
    info!(id = doc.id, name = %doc.name, "document stored");
    Ok((StatusCode::CREATED, Json(json!({ "document": doc }))))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id.map_err(bad_path)?;
    let removed = state
        .data
        .delete_document(id)
        .await
        .map_err(|e| internal("Failed to delete document", e))?;
    if !removed {
        return Err(not_found(format!("Document not found: {}", id)));
    }
    Ok(Json(json!({ "message": "Document deleted successfully" })))
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    #[serde(rename = "type", default)]
    doc_type: String,
}

async fn handle_search_documents(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let filter: TypeFilter = params
        .doc_type
        .parse()
        .map_err(|e: anyhow::Error| bad_request(e.to_string()))?;
    let results = search_store(state.data.as_ref(), &params.q, filter, None)
        .await
        .map_err(|e| internal("Failed to read data", e))?;
    Ok(Json(json!({ "count": results.len(), "results": results })))
}

// ============ POST /api/chat ============

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body.map_err(rejected)?;
    let client = state.chat.as_ref().ok_or_else(|| AppError {
        status: StatusCode::BAD_REQUEST,
        code: "chat_disabled",
        message: "Chat is disabled. Set [chat] base_url in config.".to_string(),
    })?;

    let docs = state
        .data
        .list_documents()
        .await
        .map_err(|e| internal("Failed to read data", e))?;

    match client.respond(&req, &docs, |_: &str| {}).await {
        Ok(reply) => Ok(Json(json!({ "reply": reply }))),
        Err(e) => {
            error!(error = %format!("{:#}", e), "chat backend failed");
            Err(AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "upstream",
                message: format!("Chat backend failed: {}", e),
            })
        }
    }
}
