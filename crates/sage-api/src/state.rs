//! Shared application state.

use std::sync::Arc;

use axum::http::HeaderMap;
use uuid::Uuid;

use sage_db::Database;
use sage_index::IndexService;
use sage_inference::StreamCoordinator;

use crate::error::ApiError;

/// Header carrying the caller identity, set by the upstream auth proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub index: Arc<IndexService>,
    pub coordinator: Arc<StreamCoordinator>,
    /// Chunks retrieved per RAG query.
    pub top_k: usize,
}

/// Extract the caller identity from the `x-user-id` header.
///
/// Authentication itself happens upstream; a missing or malformed header is
/// a 401 here.
pub fn owner_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;

    Uuid::parse_str(raw)
        .map_err(|_| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header")))
}
