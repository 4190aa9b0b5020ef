//! The `/ask/stream` endpoint.
//!
//! The query router decides how a question is answered: `chart` and
//! `aggregation` questions short-circuit to deterministic JSON built from
//! the relational store; everything else streams a generated answer as
//! Server-Sent Events. When a conversation id is supplied, the user turn is
//! recorded before any answering starts and the assistant turn after the
//! stream reaches its terminal event.

use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;
use tracing::warn;
use uuid::Uuid;

use sage_core::defaults::RELAY_CAPACITY;
use sage_core::{ConversationStore, MessageRole, Mode, StreamEvent};
use sage_db::{Database, TopCustomer};

use crate::error::ApiError;
use crate::state::{owner_id, AppState};

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
    pub conversation_id: Option<Uuid>,
}

/// Ledger target for this exchange: (conversation, owner).
type LedgerTarget = Option<(Uuid, Uuid)>;

pub async fn ask_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AskRequest>,
) -> Result<Response, ApiError> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let mode = Mode::classify(&query);

    // Resolve and validate the ledger target before anything else runs.
    let ledger: LedgerTarget = match request.conversation_id {
        Some(conversation_id) => {
            let owner = owner_id(&headers)?;
            if !state
                .db
                .conversations()
                .exists(conversation_id, owner)
                .await?
            {
                return Err(ApiError::NotFound(format!(
                    "Conversation not found: {conversation_id}"
                )));
            }
            Some((conversation_id, owner))
        }
        None => None,
    };

    // The user turn is persisted synchronously, before generation begins.
    if let Some((conversation_id, owner)) = ledger {
        state
            .db
            .conversations()
            .append_message(conversation_id, owner, MessageRole::User, &query, mode, None)
            .await?;
    }

    match mode {
        Mode::Chart => {
            let chart = chart_response(&state.db, &query).await?;
            if let Some((conversation_id, owner)) = ledger {
                persist_assistant(
                    &state.db,
                    conversation_id,
                    owner,
                    "",
                    Mode::Chart,
                    Some(&chart.to_string()),
                )
                .await;
            }
            Ok(Json(serde_json::json!({ "mode": "chart", "chart": chart })).into_response())
        }
        Mode::Aggregation => {
            let result = aggregation_response(&state.db).await?;
            if let Some((conversation_id, owner)) = ledger {
                let answer = result["answer"].as_str().unwrap_or("");
                let sources = result["sources"].to_string();
                persist_assistant(
                    &state.db,
                    conversation_id,
                    owner,
                    answer,
                    Mode::Aggregation,
                    Some(&sources),
                )
                .await;
            }
            let mut body = serde_json::json!({ "mode": "aggregation" });
            if let (Some(obj), Some(extra)) = (body.as_object_mut(), result.as_object()) {
                for (key, value) in extra {
                    obj.insert(key.clone(), value.clone());
                }
            }
            Ok(Json(body).into_response())
        }
        Mode::Rag => {
            let events = state.coordinator.stream_answer(&query, state.top_k);
            let (sse_tx, sse_rx) = mpsc::channel::<StreamEvent>(RELAY_CAPACITY);
            let db = state.db.clone();
            tokio::spawn(relay_and_persist(events, sse_tx, db, ledger));

            let stream = ReceiverStream::new(sse_rx).map(|event| {
                let data = match &event {
                    StreamEvent::Start => {
                        serde_json::json!({ "type": "start", "mode": "rag" }).to_string()
                    }
                    other => serde_json::to_string(other).unwrap_or_default(),
                };
                Ok::<_, std::convert::Infallible>(Event::default().data(data))
            });

            Ok(Sse::new(stream)
                .keep_alive(
                    KeepAlive::new()
                        .interval(Duration::from_secs(15))
                        .text("keepalive"),
                )
                .into_response())
        }
    }
}

/// Forward stream events to the SSE channel while accumulating token
/// content; record the assistant turn once the stream reaches its terminal
/// event. A persistence failure here is logged and never retracts the
/// already-delivered stream.
async fn relay_and_persist(
    mut events: mpsc::Receiver<StreamEvent>,
    sse_tx: mpsc::Sender<StreamEvent>,
    db: Database,
    ledger: LedgerTarget,
) {
    let mut collected = String::new();

    while let Some(event) = events.recv().await {
        if let StreamEvent::Token { content } = &event {
            collected.push_str(content);
        }
        let done = event.is_end();
        // A gone SSE consumer does not stop collection; the ledger write
        // still waits for the terminal event.
        let _ = sse_tx.send(event).await;
        if done {
            break;
        }
    }

    if let Some((conversation_id, owner)) = ledger {
        if !collected.is_empty() {
            persist_assistant(&db, conversation_id, owner, &collected, Mode::Rag, None).await;
        }
    }
}

async fn persist_assistant(
    db: &Database,
    conversation_id: Uuid,
    owner: Uuid,
    content: &str,
    mode: Mode,
    metadata: Option<&str>,
) {
    if let Err(e) = db
        .conversations()
        .append_message(
            conversation_id,
            owner,
            MessageRole::Assistant,
            content,
            mode,
            metadata,
        )
        .await
    {
        warn!(
            subsystem = "api",
            op = "persist_assistant",
            conversation_id = %conversation_id,
            error_msg = %e,
            "Failed to record assistant turn"
        );
    }
}

/// Build the chart payload for a chart-mode question.
///
/// Monthly questions chart sales per month; customer questions fall back to
/// the top-customer aggregation. Anything else reports an unsupported chart
/// inside the payload rather than failing the request.
async fn chart_response(db: &Database, query: &str) -> Result<serde_json::Value, ApiError> {
    let lowered = query.to_lowercase();

    let month_keywords = ["month", "monthly", "per month"];
    let customer_keywords = ["customer", "client", "buyer"];

    if month_keywords.iter().any(|k| lowered.contains(k)) {
        let chart = db.records().sales_by_month().await?;
        return Ok(serde_json::to_value(chart).map_err(sage_core::Error::from)?);
    }

    if customer_keywords.iter().any(|k| lowered.contains(k)) {
        return aggregation_response(db).await;
    }

    Ok(serde_json::json!({ "error": "Chart type not supported" }))
}

async fn aggregation_response(db: &Database) -> Result<serde_json::Value, ApiError> {
    match db.records().top_customer().await? {
        Some(top) => Ok(aggregation_result(&top)),
        None => Ok(serde_json::json!({
            "answer": "No business records ingested yet.",
            "sources": [],
        })),
    }
}

fn aggregation_result(top: &TopCustomer) -> serde_json::Value {
    serde_json::json!({
        "answer": top.answer(),
        "sources": [
            {
                "source": "sqlite",
                "table": "business_records",
                "aggregation": "SUM(amount) GROUP BY customer_name",
            }
        ],
    })
}
