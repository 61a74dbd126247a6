//! Error types for the tokenindex pipeline.

use thiserror::Error;

use crate::decoder::DecodeError;

/// Errors that can occur while indexing a contract.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The node answered, but with a response that retrying will not fix.
    #[error("Node error: {0}")]
    Node(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Contract {contract_id} has unsupported type '{type_name}'")]
    UnknownContractType {
        contract_id: String,
        type_name: String,
    },

    #[error("Contract {contract_id} metadata is missing field '{field}'")]
    MissingContractField { contract_id: String, field: String },

    #[error("Ownership inconsistency in {contract_id} at token {token_index}: {reason}")]
    Inconsistency {
        contract_id: String,
        token_index: u64,
        reason: String,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Indexer aborted: {reason}")]
    Aborted { reason: String },
}

impl IndexerError {
    /// Returns `true` for network-level failures that are worth retrying
    /// without advancing the cursor.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Timeout { .. })
    }

    /// Returns `true` if the error reports corrupted ownership state.
    pub fn is_inconsistency(&self) -> bool {
        matches!(self, Self::Inconsistency { .. })
    }
}
