//! tokenindex-rpc: HTTP client for the node's REST API.
//!
//! [`HttpNodeClient`] implements [`tokenindex_core::ChainClient`] and is meant
//! to be shared (behind an `Arc`) by every contract monitor.

pub mod client;
pub mod error;
pub mod policy;

pub use client::{HttpNodeClient, NodeClientConfig, API_KEY_HEADER};
pub use error::TransportError;
pub use policy::{CircuitBreakerConfig, CircuitState, RetryConfig};
