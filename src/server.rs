//! HTTP API for docchat.
//!
//! Thin plumbing over the [`Engine`]: request/response marshaling, file
//! upload handling, and HTTP status mapping. All retrieval logic lives in
//! the core modules.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check, reports whether a document is loaded |
//! | `POST` | `/upload` | Multipart upload a document and build the index |
//! | `POST` | `/query` | Ask a question about the uploaded document |
//! | `POST` | `/validate` | Run the guardrail against a query without executing it |
//! | `POST` | `/evaluate` | Run retrieval evaluation on the loaded document |
//!
//! # Error Contract
//!
//! Error responses use the shape:
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "no document loaded..." } }
//! ```
//!
//! Codes: `bad_request`, `not_ready`, `not_found`, `rejected` (all 400,
//! except `not_found` → 404) and `backend_error` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser frontends
//! can call the API directly.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::engine::Engine;
use crate::error::Error;
use crate::loader;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    document_loaded: bool,
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

#[derive(Deserialize)]
struct ValidateRequest {
    query: String,
}

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    filename: String,
    num_chunks: usize,
    strategy: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Map a core error onto an HTTP response per the error contract.
fn error_response(err: Error) -> Response {
    let (status, code) = match &err {
        Error::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        Error::NotReady => (StatusCode::BAD_REQUEST, "not_ready"),
        Error::Rejected(_) => (StatusCode::BAD_REQUEST, "rejected"),
        Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        Error::Embedding(_) | Error::Synthesis(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "backend_error")
        }
    };

    if status.is_server_error() {
        tracing::error!(%err, "request failed");
    }

    (
        status,
        Json(ErrorBody {
            error: ErrorDetail {
                code,
                message: err.to_string(),
            },
        }),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    error_response(Error::InvalidArgument(message.into()))
}

/// Start the HTTP server and run until the process is terminated.
pub async fn run_server(engine: Arc<Engine>) -> anyhow::Result<()> {
    let bind = engine.config().server.bind.clone();
    let max_bytes = engine.config().server.max_file_size_mb * 1024 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/query", post(query))
        .route("/validate", post(validate))
        .route("/evaluate", post(evaluate))
        // Generous slack over the documented limit; exact enforcement
        // happens in the handler so the error message is ours
        .layer(DefaultBodyLimit::max((max_bytes as usize) * 2 + 1024))
        .layer(cors)
        .with_state(engine);

    tracing::info!(bind = %bind, "starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(engine): State<Arc<Engine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        document_loaded: engine.is_ready().await,
    })
}

async fn upload(State(engine): State<Arc<Engine>>, mut multipart: Multipart) -> Response {
    let mut filename: Option<String> = None;
    let mut contents: Option<Vec<u8>> = None;
    let mut strategy = "fixed".to_string();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name().map(|s| s.to_string()).as_deref() {
                Some("file") => {
                    filename = field.file_name().map(|s| s.to_string());
                    match field.bytes().await {
                        Ok(bytes) => contents = Some(bytes.to_vec()),
                        Err(e) => return bad_request(format!("failed to read upload: {}", e)),
                    }
                }
                Some("strategy") => match field.text().await {
                    Ok(text) => strategy = text,
                    Err(e) => return bad_request(format!("failed to read strategy: {}", e)),
                },
                _ => {}
            },
            Ok(None) => break,
            Err(e) => return bad_request(format!("malformed multipart body: {}", e)),
        }
    }

    let Some(filename) = filename else {
        return bad_request("missing 'file' field");
    };
    let Some(contents) = contents else {
        return bad_request("missing 'file' field");
    };

    if !loader::is_supported(&filename) {
        return bad_request(format!(
            "Unsupported file type: '{}'. Supported: pdf, txt, md.",
            filename
        ));
    }

    let max_bytes = engine.config().server.max_file_size_mb * 1024 * 1024;
    if contents.len() as u64 > max_bytes {
        return bad_request(format!(
            "File too large. Maximum size is {} MB.",
            engine.config().server.max_file_size_mb
        ));
    }

    let upload_dir = &engine.config().server.upload_dir;
    if let Err(e) = std::fs::create_dir_all(upload_dir) {
        return error_response(Error::InvalidArgument(format!(
            "could not create upload directory: {}",
            e
        )));
    }

    // Strip any path components a client might smuggle into the filename
    let safe_name = PathBuf::from(&filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    let file_path = upload_dir.join(&safe_name);

    if let Err(e) = std::fs::write(&file_path, &contents) {
        return error_response(Error::InvalidArgument(format!(
            "could not save upload: {}",
            e
        )));
    }

    match engine.load_and_index(&file_path, &strategy).await {
        Ok(summary) => Json(UploadResponse {
            message: "Document uploaded and indexed successfully.",
            filename: safe_name,
            num_chunks: summary.num_chunks,
            strategy: summary.strategy,
        })
        .into_response(),
        Err(err) => error_response(err),
    }
}

async fn query(State(engine): State<Arc<Engine>>, Json(req): Json<QueryRequest>) -> Response {
    match engine.query(&req.question).await {
        Ok(answer) => Json(answer).into_response(),
        Err(err) => error_response(err),
    }
}

async fn validate(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<ValidateRequest>,
) -> Response {
    Json(engine.validate(&req.query)).into_response()
}

async fn evaluate(State(engine): State<Arc<Engine>>) -> Response {
    match engine.run_evaluation().await {
        Ok(result) => Json(result).into_response(),
        Err(err) => error_response(err),
    }
}
