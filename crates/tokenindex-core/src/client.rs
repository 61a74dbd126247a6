//! The `ChainClient` trait: what the indexer needs from a node.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::{Block, ContractInfo};

/// Read-only access to a chain node.
///
/// A single client is shared by every contract monitor, so implementations
/// must be safe for concurrent use.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch the metadata of a deployed contract.
    async fn contract_info(&self, contract_id: &str) -> Result<ContractInfo, IndexerError>;

    /// Current chain head height.
    async fn height(&self) -> Result<u64, IndexerError>;

    /// Fetch blocks `start..=end` in ascending height order.
    async fn blocks(&self, start: u64, end: u64) -> Result<Vec<Block>, IndexerError>;
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for Arc<T> {
    async fn contract_info(&self, contract_id: &str) -> Result<ContractInfo, IndexerError> {
        (**self).contract_info(contract_id).await
    }

    async fn height(&self) -> Result<u64, IndexerError> {
        (**self).height().await
    }

    async fn blocks(&self, start: u64, end: u64) -> Result<Vec<Block>, IndexerError> {
        (**self).blocks(start, end).await
    }
}
