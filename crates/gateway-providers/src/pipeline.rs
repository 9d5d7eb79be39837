//! Streaming pipeline.
//!
//! Turns a raw upstream byte stream into unified events:
//!
//! ```text
//! bytes → SseFrameReader → adapter.parse_stream_frame → ChunkAssembler → UnifiedChunk
//! ```
//!
//! The output is exactly one `Start`, then `Text`/`Thinking` in arrival
//! order, then exactly one terminal `Done` or `Error`. Cancellation ends the
//! stream without a terminal event and drops the byte stream, which closes
//! the HTTP connection.

use crate::adapter::ProtocolAdapter;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use gateway_core::{
    SseFrameReader, StreamStart, ThinkPiece, ThinkTagStripper, TokenUsage, UnifiedChunk,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Message used when a provider error frame carries no text
pub const UNSPECIFIED_UPSTREAM_ERROR: &str = "upstream reported an error";

/// Pipeline behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Remove `<think>` spans from text deltas
    pub strip_think_tags: bool,
    /// Emit `Thinking` events for reasoning channels and stripped spans
    pub capture_thinking: bool,
    /// Fail the stream when no bytes arrive for this long
    pub idle_timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            strip_think_tags: true,
            capture_thinking: true,
            idle_timeout: None,
        }
    }
}

/// Turns frame payloads into ordered chunks and accumulates the terminal `Done`
pub struct ChunkAssembler {
    adapter: Arc<dyn ProtocolAdapter>,
    stripper: Option<ThinkTagStripper>,
    capture_thinking: bool,
    finish_reason: Option<String>,
    usage: TokenUsage,
}

impl fmt::Debug for ChunkAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkAssembler")
            .field("adapter", &self.adapter.name())
            .field("strip_think_tags", &self.stripper.is_some())
            .field("capture_thinking", &self.capture_thinking)
            .field("finish_reason", &self.finish_reason)
            .finish_non_exhaustive()
    }
}

impl ChunkAssembler {
    /// Create an assembler for one stream
    pub fn new(adapter: Arc<dyn ProtocolAdapter>, options: &PipelineOptions) -> Self {
        let stripper = options.strip_think_tags.then(|| {
            if options.capture_thinking {
                ThinkTagStripper::capturing()
            } else {
                ThinkTagStripper::new()
            }
        });

        Self {
            adapter,
            stripper,
            capture_thinking: options.capture_thinking,
            finish_reason: None,
            usage: TokenUsage::unavailable(),
        }
    }

    /// Chunks produced by one SSE data payload.
    ///
    /// A provider error frame yields a single `Error` chunk; the caller must
    /// stop reading after it.
    pub fn on_payload(&mut self, data: &str) -> Vec<UnifiedChunk> {
        let Some(frame) = self.adapter.parse_stream_frame(data) else {
            return Vec::new();
        };

        if let Some(message) = frame.error {
            let message = if message.trim().is_empty() {
                UNSPECIFIED_UPSTREAM_ERROR.to_string()
            } else {
                message
            };
            return vec![UnifiedChunk::error(message)];
        }

        let mut chunks = Vec::new();

        if let Some(thinking) = frame.thinking.filter(|t| !t.is_empty()) {
            if self.capture_thinking {
                chunks.push(UnifiedChunk::thinking(thinking));
            }
        }

        if let Some(text) = frame.text.filter(|t| !t.is_empty()) {
            match self.stripper.as_mut() {
                Some(stripper) => {
                    for piece in stripper.process(&text) {
                        match piece {
                            ThinkPiece::Text(text) => chunks.push(UnifiedChunk::text(text)),
                            ThinkPiece::Thinking(thinking) if self.capture_thinking => {
                                chunks.push(UnifiedChunk::thinking(thinking));
                            }
                            ThinkPiece::Thinking(_) => {}
                        }
                    }
                }
                None => chunks.push(UnifiedChunk::text(text)),
            }
        }

        if frame.finish_reason.is_some() {
            self.finish_reason = frame.finish_reason;
        }
        if let Some(usage) = frame.usage {
            self.usage.merge(&usage);
        }

        chunks
    }

    /// Flush held-back text and emit the terminal `Done`
    pub fn finish(&mut self) -> Vec<UnifiedChunk> {
        let mut chunks = Vec::new();
        if let Some(text) = self.stripper.as_mut().and_then(ThinkTagStripper::flush) {
            chunks.push(UnifiedChunk::text(text));
        }
        chunks.push(UnifiedChunk::Done {
            finish_reason: self.finish_reason.take(),
            usage: std::mem::take(&mut self.usage),
        });
        chunks
    }
}

/// Builds unified event streams for one adapter
pub struct StreamingPipeline {
    adapter: Arc<dyn ProtocolAdapter>,
    options: PipelineOptions,
}

impl fmt::Debug for StreamingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingPipeline")
            .field("adapter", &self.adapter.name())
            .field("options", &self.options)
            .finish()
    }
}

impl StreamingPipeline {
    /// Create a pipeline
    pub fn new(adapter: Arc<dyn ProtocolAdapter>, options: PipelineOptions) -> Self {
        Self { adapter, options }
    }

    /// Stream of unified events over an upstream byte stream.
    ///
    /// `body` is only polled while the returned stream is polled, and is
    /// dropped as soon as the stream ends or `cancel` fires.
    pub fn into_stream<S, E>(
        self,
        start: StreamStart,
        body: S,
        cancel: CancellationToken,
    ) -> BoxStream<'static, UnifiedChunk>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let idle_timeout = self.options.idle_timeout;
        let mut assembler = ChunkAssembler::new(self.adapter, &self.options);

        Box::pin(async_stream::stream! {
            yield UnifiedChunk::Start(start);

            let mut body = Box::pin(body);
            let mut reader = SseFrameReader::new();

            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!("Stream cancelled, closing upstream body");
                        return;
                    }
                    next = next_bytes(&mut body, idle_timeout) => next,
                };

                match next {
                    Ok(Some(Ok(bytes))) => {
                        for payload in reader.push(&bytes) {
                            for chunk in assembler.on_payload(&payload) {
                                if cancel.is_cancelled() {
                                    debug!("Stream cancelled mid-read, dropping buffered frames");
                                    return;
                                }
                                let terminal = chunk.is_terminal();
                                yield chunk;
                                if terminal {
                                    return;
                                }
                            }
                        }
                        if reader.is_done() {
                            for chunk in assembler.finish() {
                                if cancel.is_cancelled() {
                                    return;
                                }
                                yield chunk;
                            }
                            return;
                        }
                    }
                    Ok(Some(Err(e))) => {
                        warn!(error = %e, "Upstream stream read failed");
                        yield UnifiedChunk::error(format!("stream read failed: {e}"));
                        return;
                    }
                    Ok(None) => {
                        if let Some(payload) = reader.finish() {
                            for chunk in assembler.on_payload(&payload) {
                                if cancel.is_cancelled() {
                                    return;
                                }
                                let terminal = chunk.is_terminal();
                                yield chunk;
                                if terminal {
                                    return;
                                }
                            }
                        }
                        for chunk in assembler.finish() {
                            if cancel.is_cancelled() {
                                return;
                            }
                            yield chunk;
                        }
                        return;
                    }
                    Err(idle) => {
                        warn!(idle_timeout = ?idle, "Upstream stream went idle");
                        yield UnifiedChunk::error(format!("stream idle for more than {idle:?}"));
                        return;
                    }
                }
            }
        })
    }
}

/// Next body item, or `Err(idle)` when nothing arrived within the idle timeout
async fn next_bytes<S>(body: &mut S, idle_timeout: Option<Duration>) -> Result<Option<S::Item>, Duration>
where
    S: Stream + Unpin,
{
    match idle_timeout {
        Some(idle) => tokio::time::timeout(idle, body.next()).await.map_err(|_| idle),
        None => Ok(body.next().await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::ClaudeAdapter;
    use crate::openai::OpenAiAdapter;
    use gateway_core::{RequestId, ResolutionType, UsageSource};

    fn start() -> StreamStart {
        StreamStart {
            request_id: RequestId::from("req-1"),
            model_id: "m".to_string(),
            platform_id: "p".to_string(),
            platform_name: "P".to_string(),
            resolution_type: ResolutionType::DefaultPool,
            is_fallback: false,
            fallback_reason: None,
            pool_name: Some("pool".to_string()),
        }
    }

    fn body(parts: &[&str]) -> impl Stream<Item = Result<Bytes, String>> + Send + 'static {
        let items: Vec<Result<Bytes, String>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        futures::stream::iter(items)
    }

    async fn collect(
        adapter: Arc<dyn ProtocolAdapter>,
        options: PipelineOptions,
        parts: &[&str],
    ) -> Vec<UnifiedChunk> {
        StreamingPipeline::new(adapter, options)
            .into_stream(start(), body(parts), CancellationToken::new())
            .collect()
            .await
    }

    fn texts(chunks: &[UnifiedChunk]) -> String {
        chunks
            .iter()
            .filter_map(|c| match c {
                UnifiedChunk::Text { delta } => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_openai_stream_order_and_usage() {
        let chunks = collect(
            Arc::new(OpenAiAdapter::new()),
            PipelineOptions::default(),
            &[
                "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
                "\ndata: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
                "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2}}\n\n",
                "data: [DONE]\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
            ],
        )
        .await;

        assert!(matches!(chunks.first(), Some(UnifiedChunk::Start(_))));
        assert_eq!(texts(&chunks), "Hello");
        match chunks.last().unwrap() {
            UnifiedChunk::Done { finish_reason, usage } => {
                assert_eq!(finish_reason.as_deref(), Some("stop"));
                assert_eq!(usage.total_tokens(), Some(5));
                assert_eq!(usage.source, UsageSource::Stream);
            }
            other => panic!("unexpected terminal {other:?}"),
        }
        assert_eq!(chunks.iter().filter(|c| c.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_think_tags_split_across_frames() {
        let chunks = collect(
            Arc::new(OpenAiAdapter::new()),
            PipelineOptions::default(),
            &[
                "data: {\"choices\":[{\"delta\":{\"content\":\"<thi\"}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"nk>plan</th\"}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"ink>Answer\"}}]}\n",
                "data: [DONE]\n",
            ],
        )
        .await;

        assert_eq!(texts(&chunks), "Answer");
        assert!(chunks.contains(&UnifiedChunk::thinking("plan")));
    }

    #[tokio::test]
    async fn test_thinking_dropped_without_capture() {
        let options = PipelineOptions {
            capture_thinking: false,
            ..PipelineOptions::default()
        };
        let chunks = collect(
            Arc::new(OpenAiAdapter::new()),
            options,
            &[
                "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"r\"}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"<think>x</think>ok\"}}]}\n",
            ],
        )
        .await;

        assert!(!chunks.iter().any(|c| matches!(c, UnifiedChunk::Thinking { .. })));
        assert_eq!(texts(&chunks), "ok");
    }

    #[tokio::test]
    async fn test_tags_kept_when_stripping_disabled() {
        let options = PipelineOptions {
            strip_think_tags: false,
            ..PipelineOptions::default()
        };
        let chunks = collect(
            Arc::new(OpenAiAdapter::new()),
            options,
            &["data: {\"choices\":[{\"delta\":{\"content\":\"<think>x</think>ok\"}}]}\n"],
        )
        .await;
        assert_eq!(texts(&chunks), "<think>x</think>ok");
    }

    #[tokio::test]
    async fn test_claude_error_event_terminates() {
        let chunks = collect(
            Arc::new(ClaudeAdapter::new()),
            PipelineOptions::default(),
            &[
                "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
                "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
                "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"late\"}}\n\n",
            ],
        )
        .await;

        assert_eq!(texts(&chunks), "Hi");
        assert_eq!(chunks.last(), Some(&UnifiedChunk::error("Overloaded")));
        assert!(!chunks.iter().any(|c| matches!(c, UnifiedChunk::Done { .. })));
    }

    #[tokio::test]
    async fn test_eof_without_done_still_completes() {
        let chunks = collect(
            Arc::new(OpenAiAdapter::new()),
            PipelineOptions::default(),
            &["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"],
        )
        .await;

        assert_eq!(texts(&chunks), "tail");
        match chunks.last().unwrap() {
            UnifiedChunk::Done { usage, .. } => assert_eq!(usage.source, UsageSource::Unavailable),
            other => panic!("unexpected terminal {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_error_yields_error_chunk() {
        let items: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n")),
            Err("connection reset".to_string()),
        ];
        let chunks: Vec<_> = StreamingPipeline::new(Arc::new(OpenAiAdapter::new()), PipelineOptions::default())
            .into_stream(start(), futures::stream::iter(items), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(
            chunks.last(),
            Some(&UnifiedChunk::error("stream read failed: connection reset"))
        );
    }

    #[tokio::test]
    async fn test_cancel_stops_without_terminal() {
        let cancel = CancellationToken::new();
        let pending = futures::stream::pending::<Result<Bytes, String>>();
        let mut stream = StreamingPipeline::new(Arc::new(OpenAiAdapter::new()), PipelineOptions::default())
            .into_stream(start(), pending, cancel.clone());

        assert!(matches!(stream.next().await, Some(UnifiedChunk::Start(_))));
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_drops_frames_already_read() {
        let cancel = CancellationToken::new();
        let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n";
        let one_read = frame.repeat(3);
        let mut stream = StreamingPipeline::new(Arc::new(OpenAiAdapter::new()), PipelineOptions::default())
            .into_stream(start(), body(&[one_read.as_str()]), cancel.clone());

        assert!(matches!(stream.next().await, Some(UnifiedChunk::Start(_))));
        assert_eq!(stream.next().await, Some(UnifiedChunk::text("a")));
        cancel.cancel();

        let rest: Vec<UnifiedChunk> = stream.collect().await;
        assert!(rest.is_empty(), "events after cancel: {rest:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let options = PipelineOptions {
            idle_timeout: Some(Duration::from_secs(5)),
            ..PipelineOptions::default()
        };
        let pending = futures::stream::pending::<Result<Bytes, String>>();
        let chunks: Vec<_> = StreamingPipeline::new(Arc::new(OpenAiAdapter::new()), options)
            .into_stream(start(), pending, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[1], UnifiedChunk::Error { .. }));
    }

    #[test]
    fn test_assembler_empty_error_message() {
        let mut assembler = ChunkAssembler::new(Arc::new(OpenAiAdapter::new()), &PipelineOptions::default());
        assert_eq!(
            assembler.on_payload(r#"{"error":{"message":""}}"#),
            vec![UnifiedChunk::error(UNSPECIFIED_UPSTREAM_ERROR)]
        );
    }
}
