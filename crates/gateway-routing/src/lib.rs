//! # Gateway Routing
//!
//! Model resolution for the model gateway.
//!
//! This crate provides:
//! - The health-aware entry selection rule applied inside one pool
//! - `ModelResolver`, which walks dedicated pools, default pools and the
//!   legacy slot, and records call outcomes against the chosen entry

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod resolver;
pub mod selector;

// Re-export main types
pub use resolver::{ModelResolver, NO_USABLE_DEDICATED_MODEL, NO_USABLE_POOLED_MODEL};
pub use selector::{rank_candidates, Candidate};
