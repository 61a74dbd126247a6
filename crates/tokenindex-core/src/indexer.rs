//! Indexer configuration and monitor state types.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::store::FungibleMode;

/// Which chain the node serves. Addresses carry the network byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Chain id byte embedded in every address.
    pub fn chain_byte(&self) -> u8 {
        match self {
            Self::Mainnet => b'M',
            Self::Testnet => b'T',
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(IndexerError::Config(format!("unknown network '{other}'"))),
        }
    }
}

/// Configuration shared by the supervisor and every contract monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Base URL of the node's REST API.
    pub node_url: String,
    /// Optional node API key, sent as the `api_key` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub network: Network,
    /// Sleep between polls once caught up (the chain block time).
    pub poll_interval_ms: u64,
    /// Most recent blocks excluded from processing.
    pub confirmation_lag: u64,
    /// Blocks fetched per request.
    pub page_size: u64,
    /// Attempts per window before a transient error becomes fatal.
    pub max_window_retries: u32,
    /// Base delay between window retries; grows linearly per attempt.
    pub retry_backoff_ms: u64,
    /// Upper bound for a single node request.
    pub request_timeout_ms: u64,
    /// Tracked contract ids.
    pub contracts: Vec<String>,
    /// Resume from a saved checkpoint instead of the deployment height.
    pub resume_from_checkpoint: bool,
    pub fungible_mode: FungibleMode,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            node_url: "http://localhost:9922".into(),
            api_key: None,
            network: Network::Mainnet,
            poll_interval_ms: 4000,
            confirmation_lag: 15,
            page_size: 100,
            max_window_retries: 5,
            retry_backoff_ms: 1000,
            request_timeout_ms: 30_000,
            contracts: Vec::new(),
            resume_from_checkpoint: true,
            fungible_mode: FungibleMode::Strict,
        }
    }
}

impl IndexerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Delay before retry number `attempt` (1-based) of a failed window.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    /// Reject configurations the monitors cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.node_url.trim().is_empty() {
            return Err(IndexerError::Config("node_url is empty".into()));
        }
        if self.contracts.is_empty() {
            return Err(IndexerError::Config("no contracts configured".into()));
        }
        if self.page_size == 0 {
            return Err(IndexerError::Config("page_size must be at least 1".into()));
        }
        let mut seen = HashSet::new();
        for id in &self.contracts {
            if id.trim().is_empty() {
                return Err(IndexerError::Config("empty contract id".into()));
            }
            if !seen.insert(id.as_str()) {
                return Err(IndexerError::Config(format!("contract {id} listed twice")));
            }
        }
        Ok(())
    }
}

/// Lifecycle state of a contract monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorState {
    /// Resolving the contract and preparing storage.
    Initializing,
    /// Fetching and applying confirmed windows.
    Polling,
    /// Caught up; waiting for the chain to advance.
    Sleeping,
    /// Stopped on an unrecoverable error. Terminal.
    Failed,
    /// Stopped by cancellation.
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Polling => write!(f, "polling"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
