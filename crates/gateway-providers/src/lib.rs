//! # Gateway Providers
//!
//! Everything between a resolved model and the upstream wire format:
//! - [`ProtocolAdapter`] with OpenAI-compatible and Claude-compatible implementations
//! - [`AdapterRegistry`] mapping platform type tags to adapters
//! - The exchange layer for platforms without a native adapter
//! - The [`StreamingPipeline`] turning SSE bytes into unified chunks
//! - Upstream error message extraction

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod claude;
pub mod exchange;
pub mod openai;
pub mod pipeline;
pub mod registry;
pub mod upstream;

// Re-export main types
pub use adapter::{OutboundRequest, ProtocolAdapter, RequestOptions};
pub use claude::ClaudeAdapter;
pub use exchange::{
    build_exchange_request, AuthScheme, ExchangeRegistry, ExchangeTransformer, MultipartFile,
    MultipartInput,
};
pub use openai::OpenAiAdapter;
pub use pipeline::{ChunkAssembler, PipelineOptions, StreamingPipeline};
pub use registry::AdapterRegistry;
pub use upstream::extract_error_message;
