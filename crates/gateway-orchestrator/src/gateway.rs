//! The gateway façade.
//!
//! One call runs: caller check → resolution → adapter or exchange request →
//! HTTP dispatch under the capability's timeout → response parsing or the
//! streaming pipeline → health feedback and request-log reporting.

use crate::dispatch::{HttpDispatcher, DEFAULT_CONNECT_TIMEOUT};
use crate::request_log::RequestLogger;
use crate::response::GatewayResponse;
use crate::stream::{ChunkStream, StreamObserver};
use futures::stream::{self, BoxStream, StreamExt};
use gateway_config::{GatewayConfig, InMemoryConfigStore, RequestLogConfig};
use gateway_core::{
    Capability, ConfigStore, EntryKey, GatewayError, GatewayRequest, GatewayRequestBuilder,
    GatewayResult, HealthSnapshot, HealthThresholds, Platform, ResolutionResult, ResolvedTarget,
    StreamStart, TokenUsage, UnifiedChunk,
};
use gateway_providers::{
    build_exchange_request, AdapterRegistry, ExchangeRegistry, ExchangeTransformer,
    MultipartInput, OutboundRequest, PipelineOptions, ProtocolAdapter, RequestOptions,
    StreamingPipeline,
};
use gateway_resilience::{run_with_timeout, HealthTracker, TimeoutConfig};
use gateway_routing::ModelResolver;
use gateway_telemetry::{LlmRequestFinish, RequestLogSink, TracingRequestLogSink};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Finish reason reported for exchange calls, which carry none
const EXCHANGE_FINISH_REASON: &str = "stop";

/// Entry point for LLM calls
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    resolver: Arc<ModelResolver>,
    adapters: AdapterRegistry,
    exchanges: ExchangeRegistry,
    timeouts: TimeoutConfig,
    pipeline: PipelineOptions,
    logger: RequestLogger,
    http: HttpDispatcher,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("adapters", &self.inner.adapters)
            .field("exchanges", &self.inner.exchanges)
            .field("timeouts", &self.inner.timeouts)
            .field("pipeline", &self.inner.pipeline)
            .finish_non_exhaustive()
    }
}

/// How a platform is spoken to
enum Route {
    Native(Arc<dyn ProtocolAdapter>),
    Exchange(Arc<dyn ExchangeTransformer>),
}

/// A resolved call that may be dispatched
struct Admitted {
    resolution: ResolutionResult,
    target: ResolvedTarget,
    log_id: Option<String>,
}

/// A parsed buffered response
struct Buffered {
    http_status: u16,
    content: String,
    raw: Option<Value>,
    usage: TokenUsage,
}

impl Gateway {
    /// Create a builder
    #[must_use]
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Gateway over an in-memory store built from `config`
    ///
    /// # Errors
    /// Returns a configuration error if the store cannot be built
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let store = InMemoryConfigStore::from_config(config)?;
        Self::builder()
            .with_config(config)
            .store(Arc::new(store))
            .build()
    }

    /// The resolver, for inspection and health administration
    #[must_use]
    pub fn resolver(&self) -> &ModelResolver {
        &self.inner.resolver
    }

    /// Resolve without dispatching
    ///
    /// # Errors
    /// Returns error only when the configuration store fails
    pub async fn resolve(
        &self,
        caller_id: &str,
        capability: Capability,
        expected_model: Option<&str>,
    ) -> GatewayResult<ResolutionResult> {
        self.inner
            .resolver
            .resolve(caller_id, capability, expected_model)
            .await
    }

    /// Return an entry to healthy
    pub fn reset_health(&self, key: &EntryKey) -> HealthSnapshot {
        self.inner.resolver.reset_health(key)
    }

    /// Health of every entry observed so far
    #[must_use]
    pub fn health_snapshots(&self) -> Vec<(EntryKey, HealthSnapshot)> {
        self.inner.resolver.health_snapshots()
    }

    /// Buffered call.
    ///
    /// # Errors
    /// - `InvalidCaller` when the caller is not registered for the capability (no network call)
    /// - `ModelNotFound` when resolution exhausts every tier
    /// - `UnsupportedPlatform` / `Transformer` when the platform cannot be spoken to
    /// - `Upstream` for non-2xx statuses, transport failures and timeouts
    #[instrument(skip_all, fields(request_id = %request.id, caller = %request.caller_id, capability = %request.capability))]
    pub async fn send(&self, mut request: GatewayRequest) -> GatewayResult<GatewayResponse> {
        request.stream = false;
        let started = Instant::now();
        let Admitted {
            resolution,
            target,
            log_id,
        } = self.admit(&request, started).await?;

        let buffered = match self.dispatch_buffered(&request, &target).await {
            Ok(buffered) => buffered,
            Err(e) => {
                self.report_failure(log_id, &e, started);
                return Err(e);
            }
        };

        let duration_ms = elapsed_ms(started);
        info!(
            model = %target.model_id,
            platform = %target.platform.id,
            status = buffered.http_status,
            duration_ms,
            "LLM call completed"
        );
        self.inner.logger.finish(
            log_id,
            LlmRequestFinish::succeeded(
                buffered.http_status,
                buffered.usage.clone(),
                Some(self.inner.logger.truncate(&buffered.content)),
                duration_ms,
            ),
        );

        Ok(GatewayResponse {
            request_id: request.id,
            content: buffered.content,
            raw: buffered.raw,
            usage: buffered.usage,
            model_id: target.model_id,
            platform_id: target.platform.id.clone(),
            pool_name: target.pool_name,
            resolution_type: resolution.resolution_type,
            is_fallback: resolution.is_fallback,
            fallback_reason: resolution.fallback_reason.clone(),
            expected_model_matched: resolution.matches_expected(),
            http_status: buffered.http_status,
            duration_ms,
        })
    }

    /// Streaming call.
    ///
    /// Failures before the upstream accepts the request are returned as
    /// errors; failures after that arrive as a terminal `Error` event.
    ///
    /// # Errors
    /// Same as [`Gateway::send`], for failures up to the response status
    #[instrument(skip_all, fields(request_id = %request.id, caller = %request.caller_id, capability = %request.capability))]
    pub async fn stream(&self, mut request: GatewayRequest) -> GatewayResult<ChunkStream> {
        request.stream = true;
        let started = Instant::now();
        let Admitted {
            resolution,
            target,
            log_id,
        } = self.admit(&request, started).await?;

        let start = resolution
            .stream_start(&request.id)
            .ok_or_else(|| GatewayError::internal("resolution has no target"))?;

        let cancel = CancellationToken::new();
        match self.open_stream(&request, &target, start, &cancel).await {
            Ok((events, http_status)) => {
                let observer = StreamObserver::new(
                    Arc::clone(&self.inner.resolver),
                    target,
                    self.inner.logger.clone(),
                    log_id,
                    http_status,
                    started,
                );
                Ok(ChunkStream::new(request.id, observer.watch(events), cancel))
            }
            Err(e) => {
                self.report_failure(log_id, &e, started);
                Err(e)
            }
        }
    }

    /// Buffered call whose body is consolidated from form fields and files.
    ///
    /// Any body already set on `request` is replaced.
    ///
    /// # Errors
    /// Same as [`Gateway::send`]
    pub async fn send_multipart(
        &self,
        request: GatewayRequestBuilder,
        input: MultipartInput,
    ) -> GatewayResult<GatewayResponse> {
        let request = request.body(input.into_json()).build()?;
        self.send(request).await
    }

    // ========================================================================
    // Call stages
    // ========================================================================

    /// Check the caller, resolve, and report the start to the request log
    async fn admit(&self, request: &GatewayRequest, started: Instant) -> GatewayResult<Admitted> {
        request.validate()?;

        let registered = self
            .inner
            .resolver
            .store()
            .caller(request.caller_id.as_str())
            .await?
            .is_some_and(|caller| caller.allows(request.capability));
        if !registered {
            warn!("Caller is not registered for the capability");
            return Err(GatewayError::invalid_caller(
                request.caller_id.as_str(),
                request.capability,
            ));
        }

        let resolution = self
            .resolve(
                request.caller_id.as_str(),
                request.capability,
                request.expected_model.as_deref(),
            )
            .await?;
        let log_id = self.inner.logger.start(request, &resolution).await;

        let Some(target) = resolution.target.clone() else {
            let error = GatewayError::model_not_found(
                resolution
                    .error
                    .clone()
                    .unwrap_or_else(|| "resolution exhausted every tier".to_string()),
            );
            self.report_failure(log_id, &error, started);
            return Err(error);
        };

        info!(
            model = %target.model_id,
            platform = %target.platform.id,
            resolution_type = %resolution.resolution_type,
            is_fallback = resolution.is_fallback,
            fallback_reason = resolution.fallback_reason.as_deref().unwrap_or("-"),
            expected_model_matched = ?resolution.matches_expected(),
            "Model resolved"
        );

        Ok(Admitted {
            resolution,
            target,
            log_id,
        })
    }

    fn route(&self, platform: &Platform) -> GatewayResult<Route> {
        if platform.is_exchange() {
            self.inner.exchanges.for_platform(platform).map(Route::Exchange)
        } else {
            self.inner.adapters.for_platform(platform).map(Route::Native)
        }
    }

    fn outbound(
        route: &Route,
        request: &GatewayRequest,
        target: &ResolvedTarget,
    ) -> GatewayResult<OutboundRequest> {
        let platform = &target.platform;
        match route {
            Route::Native(adapter) => {
                let url = adapter.build_endpoint(&platform.base_url, request.capability)?;
                adapter.build_request(
                    &url,
                    &platform.credential,
                    &request.body,
                    RequestOptions {
                        model: &target.model_id,
                        stream: request.stream,
                        enable_cache: request.enable_cache,
                    },
                )
            }
            Route::Exchange(transformer) => build_exchange_request(
                platform,
                transformer.as_ref(),
                &request.body,
                &target.model_id,
            ),
        }
    }

    async fn dispatch_buffered(
        &self,
        request: &GatewayRequest,
        target: &ResolvedTarget,
    ) -> GatewayResult<Buffered> {
        let route = self.route(&target.platform)?;
        let outbound = Self::outbound(&route, request, target)?;
        self.execute_buffered(route, &outbound, request, target).await
    }

    async fn execute_buffered(
        &self,
        route: Route,
        outbound: &OutboundRequest,
        request: &GatewayRequest,
        target: &ResolvedTarget,
    ) -> GatewayResult<Buffered> {
        let platform_id = target.platform.id.as_str();
        let timeout = self
            .inner
            .timeouts
            .timeout_for(request.capability, request.timeout);
        let http = &self.inner.http;

        let result = run_with_timeout(platform_id, timeout, async {
            let response = http.send(platform_id, outbound).await?;
            let status = response.status().as_u16();
            let body = http.read_text(platform_id, response).await?;
            Ok((status, body))
        })
        .await;
        self.record_outcome(target, &result);
        let (http_status, body) = result?;

        match route {
            Route::Native(adapter) => {
                let content = adapter.parse_non_streaming_response(&body)?;
                let usage = adapter
                    .parse_token_usage(&body)
                    .unwrap_or_else(TokenUsage::unavailable);
                Ok(Buffered {
                    http_status,
                    content,
                    raw: serde_json::from_str(&body).ok(),
                    usage,
                })
            }
            Route::Exchange(transformer) => {
                let settings = target.platform.exchange.as_ref().ok_or_else(|| {
                    GatewayError::transformer(format!(
                        "platform '{}' is not an exchange",
                        target.platform.id
                    ))
                })?;
                let json: Value = serde_json::from_str(&body).map_err(|e| {
                    GatewayError::transformer(format!("exchange response is not JSON: {e}"))
                })?;
                let transformed = transformer.transform_response(&json, &settings.transformer_config)?;
                Ok(Buffered {
                    http_status,
                    content: transformed.to_string(),
                    raw: Some(transformed),
                    usage: TokenUsage::unavailable(),
                })
            }
        }
    }

    /// Dispatch a streaming call up to the response status
    async fn open_stream(
        &self,
        request: &GatewayRequest,
        target: &ResolvedTarget,
        start: StreamStart,
        cancel: &CancellationToken,
    ) -> GatewayResult<(BoxStream<'static, UnifiedChunk>, u16)> {
        let route = self.route(&target.platform)?;
        let outbound = Self::outbound(&route, request, target)?;

        let adapter = match route {
            Route::Native(adapter) => adapter,
            exchange @ Route::Exchange(_) => {
                let buffered = self
                    .execute_buffered(exchange, &outbound, request, target)
                    .await?;
                let events = vec![
                    UnifiedChunk::Start(start),
                    UnifiedChunk::text(buffered.content),
                    UnifiedChunk::Done {
                        finish_reason: Some(EXCHANGE_FINISH_REASON.to_string()),
                        usage: buffered.usage,
                    },
                ];
                let events = stream::iter(events)
                    .take_until(cancel.clone().cancelled_owned())
                    .boxed();
                return Ok((events, buffered.http_status));
            }
        };

        let platform_id = target.platform.id.as_str();
        let timeout = self
            .inner
            .timeouts
            .timeout_for(request.capability, request.timeout);
        let result = run_with_timeout(
            platform_id,
            timeout,
            self.inner.http.send(platform_id, &outbound),
        )
        .await;
        self.record_outcome(target, &result);
        let response = result?;

        let http_status = response.status().as_u16();
        let events = StreamingPipeline::new(adapter, self.inner.pipeline).into_stream(
            start,
            response.bytes_stream(),
            cancel.clone(),
        );
        Ok((events, http_status))
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    fn record_outcome<T>(&self, target: &ResolvedTarget, result: &GatewayResult<T>) {
        match result {
            Ok(_) => {
                self.inner.resolver.record_success(target);
            }
            Err(e) if e.is_upstream_failure() => {
                self.inner.resolver.record_failure(target);
            }
            Err(_) => {}
        }
    }

    fn report_failure(&self, log_id: Option<String>, error: &GatewayError, started: Instant) {
        let status = match error {
            GatewayError::Upstream { status, .. } => *status,
            _ => None,
        };
        warn!(kind = error.kind(), error = %error, "LLM call failed");
        self.inner.logger.finish(
            log_id,
            LlmRequestFinish::failed(status, error.kind(), error.to_string(), elapsed_ms(started)),
        );
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Gateway`]
pub struct GatewayBuilder {
    store: Option<Arc<dyn ConfigStore>>,
    tracker: Option<Arc<HealthTracker>>,
    thresholds: HealthThresholds,
    adapters: AdapterRegistry,
    exchanges: ExchangeRegistry,
    timeouts: TimeoutConfig,
    pipeline: PipelineOptions,
    sink: Arc<dyn RequestLogSink>,
    request_log: RequestLogConfig,
    http: Option<HttpDispatcher>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            store: None,
            tracker: None,
            thresholds: HealthThresholds::default(),
            adapters: AdapterRegistry::with_defaults(),
            exchanges: ExchangeRegistry::with_defaults(),
            timeouts: TimeoutConfig::default(),
            pipeline: PipelineOptions::default(),
            sink: Arc::new(TracingRequestLogSink),
            request_log: RequestLogConfig::default(),
            http: None,
        }
    }
}

impl fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("has_store", &self.store.is_some())
            .field("thresholds", &self.thresholds)
            .field("timeouts", &self.timeouts)
            .field("pipeline", &self.pipeline)
            .field("request_log", &self.request_log)
            .finish_non_exhaustive()
    }
}

impl GatewayBuilder {
    /// Apply the tunables of a loaded configuration (not its store contents)
    #[must_use]
    pub fn with_config(mut self, config: &GatewayConfig) -> Self {
        self.thresholds = config.health;
        self.timeouts = config.timeouts.clone();
        self.pipeline = PipelineOptions {
            strip_think_tags: config.streaming.strip_think_tags,
            capture_thinking: config.streaming.capture_thinking,
            idle_timeout: config.streaming.idle_timeout,
        };
        self.request_log = config.request_log.clone();
        self
    }

    /// Configuration store (required)
    #[must_use]
    pub fn store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share a health tracker; overrides the thresholds
    #[must_use]
    pub fn health_tracker(mut self, tracker: Arc<HealthTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Health thresholds for a gateway-owned tracker
    #[must_use]
    pub fn health_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Protocol adapters
    #[must_use]
    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// Exchange transformers
    #[must_use]
    pub fn exchanges(mut self, exchanges: ExchangeRegistry) -> Self {
        self.exchanges = exchanges;
        self
    }

    /// Request timeouts
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Streaming pipeline options
    #[must_use]
    pub fn pipeline_options(mut self, options: PipelineOptions) -> Self {
        self.pipeline = options;
        self
    }

    /// Request-log collaborator
    #[must_use]
    pub fn request_log_sink(mut self, sink: Arc<dyn RequestLogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Request-log settings
    #[must_use]
    pub fn request_log_config(mut self, config: RequestLogConfig) -> Self {
        self.request_log = config;
        self
    }

    /// Use an existing HTTP client
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(HttpDispatcher::with_client(client));
        self
    }

    /// Build the gateway
    ///
    /// # Errors
    /// Returns a configuration error without a store, or an internal error
    /// if the HTTP client cannot be built
    pub fn build(self) -> GatewayResult<Gateway> {
        let store = self
            .store
            .ok_or_else(|| GatewayError::configuration("gateway requires a configuration store"))?;
        let tracker = self
            .tracker
            .unwrap_or_else(|| Arc::new(HealthTracker::new(self.thresholds)));
        let http = match self.http {
            Some(http) => http,
            None => HttpDispatcher::new(DEFAULT_CONNECT_TIMEOUT)?,
        };

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                resolver: Arc::new(ModelResolver::new(store, tracker)),
                adapters: self.adapters,
                exchanges: self.exchanges,
                timeouts: self.timeouts,
                pipeline: self.pipeline,
                logger: RequestLogger::new(self.sink, self.request_log),
                http,
            }),
        })
    }
}
