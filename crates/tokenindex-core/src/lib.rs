//! tokenindex-core: the monitoring, parsing and reconciliation pipeline of
//! the token-ownership indexer.
//!
//! # Architecture
//!
//! ```text
//! Supervisor → ContractMonitor (one per contract)
//!                   ├── ChainClient       (node REST API, shared)
//!                   ├── ContractRegistry  (type → send function index)
//!                   ├── filter::is_relevant
//!                   ├── extract::extract  (via PayloadDecoder)
//!                   └── OwnershipStore    (records + checkpoint per window)
//! ```

pub mod builder;
pub mod client;
pub mod contract;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod filter;
pub mod indexer;
pub mod monitor;
pub mod store;
pub mod supervisor;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::IndexerBuilder;
pub use client::ChainClient;
pub use contract::{ContractDescriptor, ContractRegistry, ContractType};
pub use cursor::{BlockWindows, Cursor};
pub use decoder::{DecodeError, DecodedEntry, PayloadDecoder};
pub use error::IndexerError;
pub use extract::OwnershipChange;
pub use indexer::{IndexerConfig, MonitorState, Network};
pub use monitor::{ContractMonitor, PollOutcome};
pub use store::{Checkpoint, FungibleMode, MemoryOwnershipStore, OwnershipStore};
pub use supervisor::Supervisor;
pub use types::{Block, ContractInfo, Proof, Transaction};
