//! Integration tests for the model gateway
//!
//! This crate provides end-to-end tests against mock upstreams covering:
//! - Model resolution tiers and health degradation
//! - OpenAI-compatible and Claude-compatible streaming
//! - Exchange platforms and multipart inputs
//! - Configuration loading, hot reload and request logging

pub mod fixtures;
pub mod helpers;
pub mod mock_providers;

// Re-export commonly used items
pub use fixtures::*;
pub use helpers::*;
pub use mock_providers::*;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod provider_tests;
#[cfg(test)]
mod routing_tests;
