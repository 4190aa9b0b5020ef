//! Conversation ledger CRUD.
//!
//! Ownership comes from the `x-user-id` header; a conversation belonging to
//! another user is a 404, never a 403, so existence does not leak.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use sage_core::ConversationStore;

use crate::error::ApiError;
use crate::state::{owner_id, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "New Conversation".to_string()
}

#[derive(Debug, Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&headers)?;
    let conversations = state.db.conversations().list(owner).await?;
    Ok(Json(conversations))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&headers)?;
    let id = state.db.conversations().create(owner, &request.title).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": id,
            "title": request.title,
            "message_count": 0,
        })),
    ))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&headers)?;
    let messages = state.db.conversations().messages(id, owner).await?;
    Ok(Json(serde_json::json!({
        "id": id,
        "message_count": messages.len(),
        "messages": messages,
    })))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&headers)?;
    state.db.conversations().delete(id, owner).await?;
    Ok(Json(serde_json::json!({ "message": "Conversation deleted" })))
}

pub async fn rename_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(request): Json<RenameConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = owner_id(&headers)?;
    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    state
        .db
        .conversations()
        .rename(id, owner, &request.title)
        .await?;
    Ok(Json(serde_json::json!({ "message": "Title updated" })))
}
