//! Test helper utilities for integration tests

use async_trait::async_trait;
use futures::StreamExt;
use gateway_config::{GatewayConfig, InMemoryConfigStore};
use gateway_core::UnifiedChunk;
use gateway_orchestrator::{ChunkStream, Gateway};
use gateway_telemetry::{LlmRequestFinish, LlmRequestStart, RequestLogSink, TelemetryError};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// Request-log sink that remembers everything it is given
#[derive(Default)]
pub struct RecordingSink {
    pub starts: Mutex<Vec<LlmRequestStart>>,
    pub finishes: Mutex<Vec<(String, LlmRequestFinish)>>,
}

#[async_trait]
impl RequestLogSink for RecordingSink {
    async fn start(&self, entry: LlmRequestStart) -> Result<String, TelemetryError> {
        let id = format!("log-{}", entry.request_id);
        self.starts.lock().unwrap().push(entry);
        Ok(id)
    }

    async fn finish(&self, log_id: &str, entry: LlmRequestFinish) -> Result<(), TelemetryError> {
        self.finishes.lock().unwrap().push((log_id.to_string(), entry));
        Ok(())
    }
}

impl RecordingSink {
    /// Wait until `count` finish calls arrived (they run on spawned tasks)
    pub async fn wait_for_finishes(&self, count: usize) -> Vec<(String, LlmRequestFinish)> {
        for _ in 0..200 {
            if self.finishes.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.finishes.lock().unwrap().clone()
    }
}

/// Gateway plus the handles tests inspect
pub struct TestGateway {
    pub gateway: Gateway,
    pub store: Arc<InMemoryConfigStore>,
    pub sink: Arc<RecordingSink>,
}

impl TestGateway {
    /// Build a gateway over `config` with a recording sink
    pub fn new(config: &GatewayConfig) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryConfigStore::from_config(config).unwrap());
        let sink = Arc::new(RecordingSink::default());
        let gateway = Gateway::builder()
            .with_config(config)
            .store(store.clone())
            .request_log_sink(sink.clone())
            .build()
            .unwrap();

        Self {
            gateway,
            store,
            sink,
        }
    }
}

/// Drain a stream
pub async fn collect(stream: ChunkStream) -> Vec<UnifiedChunk> {
    stream.collect().await
}

/// Concatenated `Text` deltas
pub fn text_of(events: &[UnifiedChunk]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            UnifiedChunk::Text { delta } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

/// Concatenated `Thinking` deltas
pub fn thinking_of(events: &[UnifiedChunk]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            UnifiedChunk::Thinking { delta } => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

/// Assert the event ordering contract: one `Start` first, one terminal last
pub fn assert_event_order(events: &[UnifiedChunk]) {
    assert!(
        matches!(events.first(), Some(UnifiedChunk::Start(_))),
        "stream must open with Start: {events:?}"
    );
    let terminals = events.iter().filter(|event| event.is_terminal()).count();
    assert_eq!(terminals, 1, "exactly one terminal event expected: {events:?}");
    assert!(events.last().is_some_and(UnifiedChunk::is_terminal));
    let starts = events
        .iter()
        .filter(|event| matches!(event, UnifiedChunk::Start(_)))
        .count();
    assert_eq!(starts, 1);
}
