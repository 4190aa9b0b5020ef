//! datasage API server binary.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sage_api::{app, AppState};
use sage_core::defaults::{DATABASE_URL, SNAPSHOT_DIR, TOKEN_DELAY_MS, TOP_K};
use sage_core::{EmbeddingBackend, GenerationBackend, Retriever};
use sage_db::Database;
use sage_index::IndexService;
use sage_inference::{OllamaBackend, StreamCoordinator, SynthesizedTokenProducer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logging, configured via environment:
    //   LOG_FORMAT - "json" or "text" (default: "text")
    //   LOG_FILE   - path to log file (optional, enables file logging)
    //   RUST_LOG   - standard env filter (default: "sage_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sage_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("sage-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DATABASE_URL.to_string());
    let snapshot_dir =
        std::env::var("SNAPSHOT_DIR").unwrap_or_else(|_| SNAPSHOT_DIR.to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .unwrap_or(8000);
    let top_k: usize = std::env::var("SAGE_TOP_K")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(TOP_K);

    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected, migrations applied");

    // One Ollama backend serves both embedding and generation.
    let backend = Arc::new(OllamaBackend::from_env());
    info!(
        embed_model = EmbeddingBackend::model_name(backend.as_ref()),
        gen_model = GenerationBackend::model_name(backend.as_ref()),
        "Inference backend initialized"
    );

    let index = Arc::new(IndexService::open(
        &snapshot_dir,
        backend.clone() as Arc<dyn EmbeddingBackend>,
    ));

    let producer = Arc::new(SynthesizedTokenProducer::new(
        backend.clone() as Arc<dyn GenerationBackend>,
        Duration::from_millis(TOKEN_DELAY_MS),
    ));
    let coordinator = Arc::new(StreamCoordinator::new(
        index.clone() as Arc<dyn Retriever>,
        producer,
    ));

    let state = AppState {
        db,
        index,
        coordinator,
        top_k,
    };

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "datasage API listening");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
