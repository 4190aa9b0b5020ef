//! Streaming answer coordinator.
//!
//! One streaming session runs a generation worker concurrently with the
//! event consumer, connected by a bounded relay channel. The coordinator
//! owns the event lifecycle: exactly one `start`, zero or more `token`, and
//! exactly one terminal tail (`error` then `end`, or a bare `end`).
//!
//! Cancellation is cooperative: when the coordinator stops pulling (timeout
//! or consumer gone), the relay is dropped and the worker's next send fails,
//! which is its signal to abandon work. Undelivered partial output is
//! discarded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use sage_core::defaults::{RELAY_CAPACITY, STREAM_TIMEOUT_SECS, TOKEN_DELAY_MS};
use sage_core::{Error, GenerationBackend, Result, Retriever, StreamEvent};

use crate::rag::build_prompt;

/// Tuning knobs for one coordinator instance.
///
/// The event timeout is a design constant in production; it is injectable
/// here so the timeout path is testable without a 60 second wait.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum wait for the next worker event before the stream fails.
    pub event_timeout: Duration,
    /// Inter-token delay of the synthesized producer.
    pub token_delay: Duration,
    /// Capacity of the worker → coordinator relay.
    pub relay_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            event_timeout: Duration::from_secs(STREAM_TIMEOUT_SECS),
            token_delay: Duration::from_millis(TOKEN_DELAY_MS),
            relay_capacity: RELAY_CAPACITY,
        }
    }
}

/// Sending half of the worker relay.
///
/// `send` returns `false` once the coordinator has stopped listening; the
/// producer must stop producing when that happens.
pub struct TokenSink {
    tx: mpsc::Sender<WorkerEvent>,
}

impl TokenSink {
    pub async fn send(&self, token: impl Into<String>) -> bool {
        self.tx.send(WorkerEvent::Token(token.into())).await.is_ok()
    }
}

/// A generation worker that feeds tokens into the relay.
///
/// Returning `Ok(())` signals natural completion; returning an error fails
/// the stream. Implementations must stop producing once `TokenSink::send`
/// reports the relay closed.
#[async_trait]
pub trait TokenProducer: Send + Sync {
    async fn produce(&self, prompt: String, sink: TokenSink) -> Result<()>;
}

/// Token producer for generators that cannot emit incremental tokens.
///
/// Computes the full answer, then synthesizes a stream by emitting
/// whitespace-delimited words separated by single-space tokens, pausing
/// `token_delay` after each word.
pub struct SynthesizedTokenProducer {
    generator: Arc<dyn GenerationBackend>,
    token_delay: Duration,
}

impl SynthesizedTokenProducer {
    pub fn new(generator: Arc<dyn GenerationBackend>, token_delay: Duration) -> Self {
        Self {
            generator,
            token_delay,
        }
    }
}

#[async_trait]
impl TokenProducer for SynthesizedTokenProducer {
    async fn produce(&self, prompt: String, sink: TokenSink) -> Result<()> {
        let answer = self.generator.generate(&prompt).await?;

        for (i, word) in answer.split_whitespace().enumerate() {
            if i > 0 && !sink.send(" ").await {
                return Ok(());
            }
            if !sink.send(word).await {
                return Ok(());
            }
            tokio::time::sleep(self.token_delay).await;
        }
        Ok(())
    }
}

/// What the worker pushes into the relay. Natural completion is signaled by
/// the worker dropping its sender, not by a variant.
enum WorkerEvent {
    Token(String),
    Failed(String),
}

/// Drives one generation session per call and emits the event sequence.
pub struct StreamCoordinator {
    retriever: Arc<dyn Retriever>,
    producer: Arc<dyn TokenProducer>,
    config: StreamConfig,
}

impl StreamCoordinator {
    pub fn new(retriever: Arc<dyn Retriever>, producer: Arc<dyn TokenProducer>) -> Self {
        Self::with_config(retriever, producer, StreamConfig::default())
    }

    pub fn with_config(
        retriever: Arc<dyn Retriever>,
        producer: Arc<dyn TokenProducer>,
        config: StreamConfig,
    ) -> Self {
        Self {
            retriever,
            producer,
            config,
        }
    }

    /// Start one streaming session.
    ///
    /// Returns the receiving end of the event channel; the session runs in a
    /// background task and upholds the event lifecycle regardless of how the
    /// consumer behaves. Exactly one subscriber may consume the receiver.
    #[instrument(skip(self), fields(subsystem = "stream", op = "stream_answer"))]
    pub fn stream_answer(&self, query: &str, k: usize) -> mpsc::Receiver<StreamEvent> {
        let (events_tx, events_rx) = mpsc::channel(self.config.relay_capacity);
        let retriever = Arc::clone(&self.retriever);
        let producer = Arc::clone(&self.producer);
        let config = self.config.clone();
        let query = query.to_string();

        tokio::spawn(async move {
            run_session(retriever, producer, config, query, k, events_tx).await;
        });

        events_rx
    }
}

async fn run_session(
    retriever: Arc<dyn Retriever>,
    producer: Arc<dyn TokenProducer>,
    config: StreamConfig,
    query: String,
    k: usize,
    events: mpsc::Sender<StreamEvent>,
) {
    // Consumer may drop at any point; a failed send just ends the session.
    if events.send(StreamEvent::Start).await.is_err() {
        return;
    }

    let chunks = match retriever.retrieve(&query, k).await {
        Ok(chunks) => chunks,
        Err(e) => {
            debug!(subsystem = "stream", error = %e, "retrieval failed before generation");
            let _ = events.send(StreamEvent::error(e.to_string())).await;
            let _ = events.send(StreamEvent::End).await;
            return;
        }
    };

    let prompt = build_prompt(&query, &chunks);

    let (relay_tx, mut relay_rx) = mpsc::channel::<WorkerEvent>(config.relay_capacity);
    tokio::spawn(async move {
        let sink = TokenSink {
            tx: relay_tx.clone(),
        };
        if let Err(e) = producer.produce(prompt, sink).await {
            let _ = relay_tx.send(WorkerEvent::Failed(e.to_string())).await;
        }
        // Dropping relay_tx closes the channel: natural completion.
    });

    let mut token_count: u64 = 0;
    loop {
        match timeout(config.event_timeout, relay_rx.recv()).await {
            Ok(Some(WorkerEvent::Token(content))) => {
                token_count += 1;
                if events.send(StreamEvent::token(content)).await.is_err() {
                    break;
                }
            }
            Ok(Some(WorkerEvent::Failed(message))) => {
                warn!(subsystem = "stream", error = %message, "generation worker failed");
                let _ = events
                    .send(StreamEvent::error(message))
                    .await;
                let _ = events.send(StreamEvent::End).await;
                break;
            }
            Ok(None) => {
                info!(subsystem = "stream", token_count, "stream completed");
                let _ = events.send(StreamEvent::End).await;
                break;
            }
            Err(_) => {
                warn!(subsystem = "stream", token_count, "stream timed out waiting for worker");
                let _ = events
                    .send(StreamEvent::error(Error::GenerationTimeout.to_string()))
                    .await;
                let _ = events.send(StreamEvent::End).await;
                break;
            }
        }
    }

    // Dropping the relay receiver is the sole cancellation signal; the
    // worker's next send fails and it stops producing.
    drop(relay_rx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::RankedChunk;

    struct EmptyRetriever;

    #[async_trait]
    impl Retriever for EmptyRetriever {
        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RankedChunk>> {
            Err(Error::IndexUnavailable)
        }
    }

    struct FixedRetriever;

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RankedChunk>> {
            Ok(Vec::new())
        }
    }

    /// Producer that never emits anything.
    struct StalledProducer;

    #[async_trait]
    impl TokenProducer for StalledProducer {
        async fn produce(&self, _prompt: String, _sink: TokenSink) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct FailingProducer;

    #[async_trait]
    impl TokenProducer for FailingProducer {
        async fn produce(&self, _prompt: String, _sink: TokenSink) -> Result<()> {
            Err(Error::Generation("model exploded".to_string()))
        }
    }

    fn fast_config() -> StreamConfig {
        StreamConfig {
            event_timeout: Duration::from_millis(200),
            token_delay: Duration::from_millis(1),
            relay_capacity: 8,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn synthesized(answer: &str) -> Arc<dyn TokenProducer> {
        let generator = Arc::new(
            crate::mock::MockBackend::new().with_fixed_response(answer),
        );
        Arc::new(SynthesizedTokenProducer::new(
            generator,
            Duration::from_millis(1),
        ))
    }

    #[tokio::test]
    async fn test_empty_corpus_emits_start_error_end() {
        let coordinator = StreamCoordinator::with_config(
            Arc::new(EmptyRetriever),
            synthesized("unused"),
            fast_config(),
        );

        let events = collect(coordinator.stream_answer("anything", 3)).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::error("No documents ingested yet."),
                StreamEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_tokens_concatenate_to_answer() {
        let coordinator = StreamCoordinator::with_config(
            Arc::new(FixedRetriever),
            synthesized("alpha beta gamma"),
            fast_config(),
        );

        let events = collect(coordinator.stream_answer("q", 3)).await;
        assert_eq!(events.first(), Some(&StreamEvent::Start));
        assert_eq!(events.last(), Some(&StreamEvent::End));

        let answer: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(answer, "alpha beta gamma");
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_and_no_token_after_end() {
        let coordinator = StreamCoordinator::with_config(
            Arc::new(FixedRetriever),
            synthesized("one two"),
            fast_config(),
        );

        let events = collect(coordinator.stream_answer("q", 3)).await;
        let end_count = events.iter().filter(|e| **e == StreamEvent::End).count();
        assert_eq!(end_count, 1);

        let end_pos = events.iter().position(|e| *e == StreamEvent::End).unwrap();
        assert_eq!(end_pos, events.len() - 1, "end must be the final event");
    }

    #[tokio::test]
    async fn test_stalled_worker_times_out() {
        let coordinator = StreamCoordinator::with_config(
            Arc::new(FixedRetriever),
            Arc::new(StalledProducer),
            fast_config(),
        );

        let events = collect(coordinator.stream_answer("q", 3)).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::error("timeout"),
                StreamEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_worker_failure_emits_error_then_end() {
        let coordinator = StreamCoordinator::with_config(
            Arc::new(FixedRetriever),
            Arc::new(FailingProducer),
            fast_config(),
        );

        let events = collect(coordinator.stream_answer("q", 3)).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::error("Generation error: model exploded"),
                StreamEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_producer_stops_when_relay_closes() {
        // Producer keeps trying to send; once the consumer is gone its sends
        // must start failing so it can bail out.
        struct CountingProducer {
            sent: Arc<Mutex<usize>>,
        }
        use std::sync::Mutex;

        #[async_trait]
        impl TokenProducer for CountingProducer {
            async fn produce(&self, _prompt: String, sink: TokenSink) -> Result<()> {
                let mut n = 0;
                loop {
                    if !sink.send(format!("t{n}")).await {
                        break;
                    }
                    n += 1;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                if let Ok(mut sent) = self.sent.lock() {
                    *sent = n;
                }
                Ok(())
            }
        }

        let sent = Arc::new(Mutex::new(usize::MAX));
        let coordinator = StreamCoordinator::with_config(
            Arc::new(FixedRetriever),
            Arc::new(CountingProducer {
                sent: Arc::clone(&sent),
            }),
            fast_config(),
        );

        let mut rx = coordinator.stream_answer("q", 3);
        // Consume a few events then walk away.
        for _ in 0..3 {
            let _ = rx.recv().await;
        }
        drop(rx);

        // The session tears down and the producer's next send fails, letting
        // it record how far it got.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let n = *sent.lock().unwrap();
        assert_ne!(n, usize::MAX, "producer never observed cancellation");
    }
}
