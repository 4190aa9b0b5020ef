//! # sage-api
//!
//! HTTP server for datasage: the streaming ask endpoint, ingestion
//! endpoints, and conversation ledger CRUD.

pub mod error;
pub mod handlers;
pub mod state;

use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{owner_id, AppState, USER_ID_HEADER};

use handlers::ask::ask_stream;
use handlers::conversations::{
    create_conversation, delete_conversation, get_conversation, list_conversations,
    rename_conversation,
};
use handlers::ingest::{ingest_records, upload};

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the application router over shared state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Questions
        .route("/ask/stream", post(ask_stream))
        // Ingestion
        .route("/upload", post(upload))
        .route("/ingest/records", post(ingest_records))
        // Conversation ledger
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route(
            "/conversations/:id",
            get(get_conversation).delete(delete_conversation),
        )
        .route("/conversations/:id/title", patch(rename_conversation))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
