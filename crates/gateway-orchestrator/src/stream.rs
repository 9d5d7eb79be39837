//! Cancellable unified event streams handed to callers.

use crate::request_log::RequestLogger;
use futures::stream::{BoxStream, Stream, StreamExt};
use gateway_core::{RequestId, ResolvedTarget, UnifiedChunk};
use gateway_routing::ModelResolver;
use gateway_telemetry::LlmRequestFinish;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Single-pass stream of [`UnifiedChunk`]s for one call.
///
/// Emits `Start`, then `Text`/`Thinking` events in arrival order, then one
/// terminal `Done` or `Error`. Cancelling (or dropping) the stream stops
/// emission and drops the upstream response, closing the connection.
pub struct ChunkStream {
    request_id: RequestId,
    inner: BoxStream<'static, UnifiedChunk>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl ChunkStream {
    pub(crate) fn new(
        request_id: RequestId,
        inner: BoxStream<'static, UnifiedChunk>,
        cancel: CancellationToken,
    ) -> Self {
        let guard = cancel.clone().drop_guard();
        Self {
            request_id,
            inner,
            cancel,
            _guard: guard,
        }
    }

    /// Request this stream belongs to
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Stop the stream; no further events are emitted
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the stream was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this stream from another task
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("request_id", &self.request_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Stream for ChunkStream {
    type Item = UnifiedChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.inner.poll_next_unpin(cx)
    }
}

/// Watches a stream's events to feed health and the request log.
///
/// Mid-stream `Error` events count as failures against the resolved entry.
/// A stream that ends or is dropped without a terminal event was cancelled:
/// it records no health outcome and is logged as cancelled.
pub(crate) struct StreamObserver {
    resolver: Arc<ModelResolver>,
    target: ResolvedTarget,
    logger: RequestLogger,
    log_id: Option<String>,
    http_status: u16,
    started: Instant,
    text: String,
    finished: bool,
}

impl StreamObserver {
    pub(crate) fn new(
        resolver: Arc<ModelResolver>,
        target: ResolvedTarget,
        logger: RequestLogger,
        log_id: Option<String>,
        http_status: u16,
        started: Instant,
    ) -> Self {
        Self {
            resolver,
            target,
            logger,
            log_id,
            http_status,
            started,
            text: String::new(),
            finished: false,
        }
    }

    /// Attach the observer to a stream
    pub(crate) fn watch(mut self, events: BoxStream<'static, UnifiedChunk>) -> BoxStream<'static, UnifiedChunk> {
        Box::pin(events.inspect(move |chunk| self.on_chunk(chunk)))
    }

    fn on_chunk(&mut self, chunk: &UnifiedChunk) {
        if self.finished {
            return;
        }

        match chunk {
            UnifiedChunk::Text { delta } => {
                // UTF-8 is at most four bytes per character
                if self.text.len() < self.logger.max_body_chars().saturating_mul(4) {
                    self.text.push_str(delta);
                }
            }
            UnifiedChunk::Done { usage, .. } => {
                self.finished = true;
                let text = self.logger.truncate(&self.text);
                self.logger.finish(
                    self.log_id.take(),
                    LlmRequestFinish::succeeded(self.http_status, usage.clone(), Some(text), self.elapsed_ms()),
                );
            }
            UnifiedChunk::Error { message } => {
                self.finished = true;
                warn!(
                    platform = %self.target.platform.id,
                    model = %self.target.model_id,
                    error = %message,
                    "Stream failed after upstream accepted the request"
                );
                self.resolver.record_failure(&self.target);
                self.logger.finish(
                    self.log_id.take(),
                    LlmRequestFinish::failed(
                        Some(self.http_status),
                        "upstream_error",
                        message.clone(),
                        self.elapsed_ms(),
                    ),
                );
            }
            UnifiedChunk::Start(_) | UnifiedChunk::Thinking { .. } => {}
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Drop for StreamObserver {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!(model = %self.target.model_id, "Stream ended without a terminal event");
        let text = self.logger.truncate(&self.text);
        self.logger.finish(
            self.log_id.take(),
            LlmRequestFinish::cancelled(Some(self.http_status), Some(text), self.elapsed_ms()),
        );
    }
}
