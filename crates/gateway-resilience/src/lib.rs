//! # Gateway Resilience
//!
//! Resilience primitives for the model gateway:
//! - Per-entry health tracking with derived health tiers
//! - Timeout policy per capability

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod health;
pub mod timeout;

// Re-export main types
pub use health::HealthTracker;
pub use timeout::{run_with_timeout, HumanDuration, TimeoutConfig};
