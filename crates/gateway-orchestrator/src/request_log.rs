//! Calls into the request-log collaborator.
//!
//! `start` is awaited under a short deadline, `finish` runs on a spawned
//! task. Either failing is logged and otherwise ignored.

use chrono::Utc;
use gateway_config::RequestLogConfig;
use gateway_core::{GatewayRequest, ResolutionResult};
use gateway_telemetry::{summarize_body, truncate_for_log, LlmRequestFinish, LlmRequestStart, RequestLogSink};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Reports calls to a [`RequestLogSink`]
#[derive(Clone)]
pub struct RequestLogger {
    sink: Arc<dyn RequestLogSink>,
    config: RequestLogConfig,
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RequestLogger {
    /// Create a logger
    pub fn new(sink: Arc<dyn RequestLogSink>, config: RequestLogConfig) -> Self {
        Self { sink, config }
    }

    /// Report the start of a call; returns the sink's log id when it answered in time
    pub async fn start(&self, request: &GatewayRequest, resolution: &ResolutionResult) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        let target = resolution.target.as_ref();
        let entry = LlmRequestStart {
            request_id: request.id.clone(),
            caller_id: request.caller_id.clone(),
            capability: request.capability,
            stream: request.stream,
            model_id: target.map(|t| t.model_id.clone()),
            platform_id: target.map(|t| t.platform.id.to_string()),
            pool_name: target.and_then(|t| t.pool_name.clone()),
            resolution_type: resolution.resolution_type,
            is_fallback: resolution.is_fallback,
            fallback_reason: resolution.fallback_reason.clone(),
            expected_model: resolution.expected_model.clone(),
            expected_model_matched: resolution.matches_expected(),
            request_body: summarize_body(&request.body, self.config.max_body_chars),
            context: request.context.clone(),
            started_at: Utc::now(),
        };

        match tokio::time::timeout(self.config.start_timeout, self.sink.start(entry)).await {
            Ok(Ok(log_id)) => Some(log_id),
            Ok(Err(e)) => {
                warn!(request_id = %request.id, error = %e, "Request log start failed");
                None
            }
            Err(_) => {
                warn!(
                    request_id = %request.id,
                    timeout_ms = u64::try_from(self.config.start_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Request log start timed out"
                );
                None
            }
        }
    }

    /// Report the end of a call without waiting for the sink
    pub fn finish(&self, log_id: Option<String>, entry: LlmRequestFinish) {
        let Some(log_id) = log_id else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            debug!(log_id = %log_id, "No runtime available, dropping request log finish");
            return;
        };

        let sink = Arc::clone(&self.sink);
        handle.spawn(async move {
            if let Err(e) = sink.finish(&log_id, entry).await {
                warn!(log_id = %log_id, error = %e, "Request log finish failed");
            }
        });
    }

    /// Truncate response text for the sink
    #[must_use]
    pub fn truncate(&self, text: &str) -> String {
        truncate_for_log(text, self.config.max_body_chars)
    }

    /// Maximum characters kept from bodies
    #[must_use]
    pub fn max_body_chars(&self) -> usize {
        self.config.max_body_chars
    }
}
