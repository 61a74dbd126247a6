//! Reliability policies applied around every node request.
//!
//! ```text
//! Request → [CircuitBreaker] → [RetryPolicy] → reqwest
//! ```

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::{RetryConfig, RetryPolicy};
