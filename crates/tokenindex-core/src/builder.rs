//! Fluent builder API for indexer configuration.
//!
//! # Example
//!
//! ```rust
//! use tokenindex_core::builder::IndexerBuilder;
//! use tokenindex_core::indexer::Network;
//!
//! let config = IndexerBuilder::new()
//!     .node_url("http://127.0.0.1:9922")
//!     .network(Network::Testnet)
//!     .contract("CF5HTwYNrZDFBG371jfTiKpNPfRpEHdgj6B")
//!     .confirmation_lag(15)
//!     .page_size(100)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.contracts.len(), 1);
//! ```

use crate::error::IndexerError;
use crate::indexer::{IndexerConfig, Network};
use crate::store::FungibleMode;

/// Fluent builder for `IndexerConfig`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the node's REST base URL.
    pub fn node_url(mut self, url: impl Into<String>) -> Self {
        self.config.node_url = url.into();
        self
    }

    /// Set the node API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn network(mut self, network: Network) -> Self {
        self.config.network = network;
        self
    }

    /// Add one tracked contract.
    pub fn contract(mut self, id: impl Into<String>) -> Self {
        self.config.contracts.push(id.into());
        self
    }

    /// Add several tracked contracts.
    pub fn contracts<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.contracts.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Set the poll interval (chain block time) in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set how many recent blocks are treated as unconfirmed.
    pub fn confirmation_lag(mut self, lag: u64) -> Self {
        self.config.confirmation_lag = lag;
        self
    }

    /// Set the number of blocks per request.
    pub fn page_size(mut self, size: u64) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn max_window_retries(mut self, n: u32) -> Self {
        self.config.max_window_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    pub fn resume_from_checkpoint(mut self, resume: bool) -> Self {
        self.config.resume_from_checkpoint = resume;
        self
    }

    pub fn fungible_mode(mut self, mode: FungibleMode) -> Self {
        self.config.fungible_mode = mode;
        self
    }

    /// Build the config without validation.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// Build and validate the config.
    pub fn build(self) -> Result<IndexerConfig, IndexerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
