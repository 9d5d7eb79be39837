//! # Gateway Orchestrator
//!
//! The [`Gateway`] façade tying resolution, protocol adapters, exchanges,
//! HTTP dispatch and the streaming pipeline together.
//!
//! - [`Gateway::send`] for buffered calls
//! - [`Gateway::stream`] for cancellable [`ChunkStream`]s of unified events
//! - [`Gateway::send_multipart`] for form-style inputs
//!
//! Every dispatched call feeds its outcome back into model health and is
//! reported to the request-log collaborator.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod gateway;
pub mod request_log;
pub mod response;
pub mod stream;

// Re-export main types
pub use dispatch::{HttpDispatcher, DEFAULT_CONNECT_TIMEOUT};
pub use gateway::{Gateway, GatewayBuilder};
pub use request_log::RequestLogger;
pub use response::GatewayResponse;
pub use stream::ChunkStream;
