//! # Gateway Telemetry
//!
//! Observability for the model gateway.
//!
//! This crate provides:
//! - Structured logging setup (text or JSON, `RUST_LOG` aware)
//! - The request-log collaborator interface and its built-in sinks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod request_log;
pub mod tracing_setup;

// Re-export main types
pub use request_log::{
    summarize_body, truncate_for_log, LlmRequestFinish, LlmRequestStart, NoopRequestLogSink,
    RequestLogSink, RequestOutcome, TracingRequestLogSink,
};
pub use tracing_setup::{init_logging, LogFormat, LoggingConfig, TelemetryError};
