//! End-to-end tests for the HTTP API.
//!
//! Each test spawns the full router on an ephemeral port with the mock
//! inference backend, a temp snapshot directory, and an in-memory SQLite
//! ledger, then drives it over real HTTP.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use sage_api::{app, AppState, USER_ID_HEADER};
use sage_core::{EmbeddingBackend, GenerationBackend, Retriever};
use sage_db::Database;
use sage_index::IndexService;
use sage_inference::{MockBackend, StreamConfig, StreamCoordinator, SynthesizedTokenProducer};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    // Held so the snapshot directory outlives the server.
    _snapshot_dir: tempfile::TempDir,
}

async fn in_memory_db() -> Database {
    let options = sqlx::sqlite::SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    Database::from_pool(pool).await.unwrap()
}

async fn spawn_server(answer: &str) -> TestServer {
    spawn_server_with_backend(MockBackend::new().with_fixed_response(answer)).await
}

async fn spawn_server_with_backend(backend: MockBackend) -> TestServer {
    let backend = Arc::new(backend);
    let snapshot_dir = tempfile::tempdir().unwrap();

    let db = in_memory_db().await;
    let index = Arc::new(IndexService::open(
        snapshot_dir.path(),
        backend.clone() as Arc<dyn EmbeddingBackend>,
    ));
    let producer = Arc::new(SynthesizedTokenProducer::new(
        backend as Arc<dyn GenerationBackend>,
        Duration::from_millis(1),
    ));
    let coordinator = Arc::new(StreamCoordinator::with_config(
        index.clone() as Arc<dyn Retriever>,
        producer,
        StreamConfig {
            event_timeout: Duration::from_secs(5),
            token_delay: Duration::from_millis(1),
            relay_capacity: 32,
        },
    ));

    let state = AppState {
        db,
        index,
        coordinator,
        top_k: 3,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        _snapshot_dir: snapshot_dir,
    }
}

fn user() -> String {
    Uuid::new_v4().to_string()
}

/// Parse `data:` lines of an SSE body into JSON events.
fn sse_events(body: &str) -> Vec<serde_json::Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter_map(|data| serde_json::from_str(data).ok())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let server = spawn_server("unused").await;
    let body: serde_json::Value = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ask_stream_empty_corpus() {
    let server = spawn_server("unused").await;
    let response = server
        .client
        .post(format!("{}/ask/stream", server.base_url))
        .json(&serde_json::json!({ "query": "what is the meaning of life" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let events = sse_events(&response.text().await.unwrap());
    assert_eq!(events[0]["type"], "start");
    assert_eq!(events[0]["mode"], "rag");
    assert_eq!(events[1]["type"], "error");
    assert_eq!(events[1]["content"], "No documents ingested yet.");
    assert_eq!(events.last().unwrap()["type"], "end");
}

#[tokio::test]
async fn test_upload_then_stream_answer() {
    let server = spawn_server("Photosynthesis converts light into energy").await;

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::text("Plants use photosynthesis to grow.")
            .file_name("biology.txt"),
    );
    let upload: serde_json::Value = server
        .client
        .post(format!("{}/upload", server.base_url))
        .header(USER_ID_HEADER, user())
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(upload["chunks_created"], 1);

    let body = server
        .client
        .post(format!("{}/ask/stream", server.base_url))
        .json(&serde_json::json!({ "query": "how do plants grow" }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let events = sse_events(&body);
    assert_eq!(events[0]["type"], "start");
    assert_eq!(events.last().unwrap()["type"], "end");

    let answer: String = events
        .iter()
        .filter(|e| e["type"] == "token")
        .filter_map(|e| e["content"].as_str())
        .collect();
    assert_eq!(answer, "Photosynthesis converts light into energy");
}

#[tokio::test]
async fn test_upload_requires_identity() {
    let server = spawn_server("unused").await;
    let form = reqwest::multipart::Form::new()
        .part("file", reqwest::multipart::Part::text("text").file_name("a.txt"));
    let response = server
        .client
        .post(format!("{}/upload", server.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

fn sample_records() -> serde_json::Value {
    serde_json::json!({
        "records": [
            {
                "customer_name": "Alice",
                "finance_type": "credit",
                "product": "Laptop",
                "amount": 1200.0,
                "month": "February",
                "quantity": 1
            },
            {
                "customer_name": "Bob",
                "finance_type": "debit",
                "product": "Phone",
                "amount": 800.0,
                "month": "January",
                "quantity": 2
            }
        ]
    })
}

#[tokio::test]
async fn test_ingest_records_then_chart_query() {
    let server = spawn_server("unused").await;

    let ingest: serde_json::Value = server
        .client
        .post(format!("{}/ingest/records", server.base_url))
        .header(USER_ID_HEADER, user())
        .json(&sample_records())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ingest["status"], "success");
    assert_eq!(ingest["rows_ingested"], 2);

    let body: serde_json::Value = server
        .client
        .post(format!("{}/ask/stream", server.base_url))
        .json(&serde_json::json!({ "query": "show me a chart of sales per month" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["mode"], "chart");
    assert_eq!(body["chart"]["type"], "bar");
    assert_eq!(
        body["chart"]["labels"],
        serde_json::json!(["January", "February"])
    );
    assert_eq!(
        body["chart"]["datasets"][0]["data"],
        serde_json::json!([800.0, 1200.0])
    );
}

#[tokio::test]
async fn test_aggregation_query() {
    let server = spawn_server("unused").await;

    server
        .client
        .post(format!("{}/ingest/records", server.base_url))
        .header(USER_ID_HEADER, user())
        .json(&sample_records())
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = server
        .client
        .post(format!("{}/ask/stream", server.base_url))
        .json(&serde_json::json!({ "query": "who spent the most money" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["mode"], "aggregation");
    assert_eq!(body["answer"], "Alice spent the most with a total of 1200.");
    assert_eq!(body["sources"][0]["table"], "business_records");
}

#[tokio::test]
async fn test_conversation_lifecycle() {
    let server = spawn_server("Grass is green").await;
    let owner = user();

    // Create
    let created: serde_json::Value = server
        .client
        .post(format!("{}/conversations", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .json(&serde_json::json!({ "title": "Color questions" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conversation_id = created["id"].as_str().unwrap().to_string();

    // Seed the corpus so the RAG path streams an answer.
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::text("Grass is green in spring.").file_name("facts.txt"),
    );
    server
        .client
        .post(format!("{}/upload", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .multipart(form)
        .send()
        .await
        .unwrap();

    // Ask within the conversation; the body completes only after the
    // assistant turn has been recorded.
    let body = server
        .client
        .post(format!("{}/ask/stream", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .json(&serde_json::json!({
            "query": "what color is grass",
            "conversation_id": conversation_id,
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("\"type\":\"end\""));

    let conversation: serde_json::Value = server
        .client
        .get(format!("{}/conversations/{conversation_id}", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let messages = conversation["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "what color is grass");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Grass is green");
    assert_eq!(messages[1]["mode"], "rag");

    // List shows it with both turns counted.
    let list: serde_json::Value = server
        .client
        .get(format!("{}/conversations", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list[0]["message_count"], 2);

    // Rename
    let renamed = server
        .client
        .patch(format!(
            "{}/conversations/{conversation_id}/title",
            server.base_url
        ))
        .header(USER_ID_HEADER, &owner)
        .json(&serde_json::json!({ "title": "Botany" }))
        .send()
        .await
        .unwrap();
    assert!(renamed.status().is_success());

    // Delete, then it is gone.
    let deleted = server
        .client
        .delete(format!("{}/conversations/{conversation_id}", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .send()
        .await
        .unwrap();
    assert!(deleted.status().is_success());

    let missing = server
        .client
        .get(format!("{}/conversations/{conversation_id}", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_failed_stream_persists_only_user_turn() {
    let server =
        spawn_server_with_backend(MockBackend::new().with_generation_failure("backend down"))
            .await;
    let owner = user();

    let created: serde_json::Value = server
        .client
        .post(format!("{}/conversations", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .json(&serde_json::json!({ "title": "Doomed questions" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conversation_id = created["id"].as_str().unwrap().to_string();

    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::text("Grass is green in spring.").file_name("facts.txt"),
    );
    server
        .client
        .post(format!("{}/upload", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .multipart(form)
        .send()
        .await
        .unwrap();

    // Generation fails before any token, so the stream carries no content.
    let body = server
        .client
        .post(format!("{}/ask/stream", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .json(&serde_json::json!({
            "query": "what color is grass",
            "conversation_id": conversation_id,
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = sse_events(&body);
    assert_eq!(events[0]["type"], "start");
    assert!(events.iter().any(|e| e["type"] == "error"));
    assert_eq!(events.last().unwrap()["type"], "end");
    assert!(events.iter().all(|e| e["type"] != "token"));

    // The body completes only after persistence ran; an empty answer must
    // leave the ledger with the user turn alone.
    let conversation: serde_json::Value = server
        .client
        .get(format!("{}/conversations/{conversation_id}", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = conversation["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "what color is grass");
}

#[tokio::test]
async fn test_conversation_owner_isolation() {
    let server = spawn_server("unused").await;
    let owner = user();
    let stranger = user();

    let created: serde_json::Value = server
        .client
        .post(format!("{}/conversations", server.base_url))
        .header(USER_ID_HEADER, &owner)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(created["title"], "New Conversation");
    let conversation_id = created["id"].as_str().unwrap().to_string();

    // A stranger sees a 404, not a 403.
    let response = server
        .client
        .get(format!("{}/conversations/{conversation_id}", server.base_url))
        .header(USER_ID_HEADER, &stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Asking inside someone else's conversation is also a 404.
    let response = server
        .client
        .post(format!("{}/ask/stream", server.base_url))
        .header(USER_ID_HEADER, &stranger)
        .json(&serde_json::json!({
            "query": "anything",
            "conversation_id": conversation_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // No identity header at all is a 401.
    let response = server
        .client
        .get(format!("{}/conversations", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let server = spawn_server("unused").await;
    let response = server
        .client
        .post(format!("{}/ask/stream", server.base_url))
        .json(&serde_json::json!({ "query": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
