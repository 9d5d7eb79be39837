//! # Gateway Core
//!
//! Core types, traits, and error handling for the model gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Caller registrations, model pools, entries and platforms
//! - Health counters and the thresholds that derive health tiers from them
//! - Resolution results and unified stream chunks
//! - The configuration-store collaborator trait
//! - The SSE frame reader and `<think>` tag stripper state machines
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chunk;
pub mod error;
pub mod model;
pub mod request;
pub mod resolution;
pub mod store;
pub mod streaming;
pub mod types;

// Re-export commonly used types
pub use chunk::{StreamFrame, StreamStart, TokenUsage, UnifiedChunk, UsageSource};
pub use error::{GatewayError, GatewayResult};
pub use model::{
    CallerRegistration, EntryKey, ExchangeSettings, HealthCounters, HealthSnapshot, HealthState,
    HealthThresholds, LegacySlot, ModelEntry, ModelPool, Platform,
};
pub use request::{GatewayRequest, GatewayRequestBuilder, RequestContext};
pub use resolution::{EntrySnapshot, PoolSnapshot, ResolutionResult, ResolutionType, ResolvedTarget};
pub use store::ConfigStore;
pub use streaming::{SseFrameReader, ThinkPiece, ThinkTagStripper};
pub use types::{CallerId, Capability, PlatformId, PoolId, RequestId};
