//! Ownership store: the persistent side of the pipeline.
//!
//! One logical table holds every tracked contract, discriminated by
//! `contract_id`, with `(contract_id, user_addr, token_idx)` unique. Each
//! window's records are applied together with the contract's progress
//! checkpoint as one atomic unit.
//!
//! Implementations: [`MemoryOwnershipStore`] here, PostgreSQL and SQLite in
//! `tokenindex-storage`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::contract::ContractDescriptor;
use crate::error::IndexerError;
use crate::extract::OwnershipChange;

/// How fungible credits for an already-present `(user, index)` pair are
/// treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FungibleMode {
    /// A second credit for the same pair is an inconsistency.
    #[default]
    Strict,
    /// The latest credit replaces the recorded amount.
    Replace,
}

impl fmt::Display for FungibleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

impl FromStr for FungibleMode {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "replace" => Ok(Self::Replace),
            other => Err(IndexerError::Config(format!(
                "unknown fungible mode '{other}' (expected strict or replace)"
            ))),
        }
    }
}

/// Persisted progress of one contract monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub contract_id: String,
    /// Next height the monitor has not processed.
    pub next_height: u64,
    /// Unix timestamp of the last commit.
    pub updated_at: i64,
}

/// Storage backend for ownership rows and monitor checkpoints.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    /// Idempotently create the tables and indexes backing `contract`.
    async fn ensure_schema(&self, contract: &ContractDescriptor) -> Result<(), IndexerError>;

    /// Apply one window of records in order and record `next_height` as the
    /// contract's checkpoint, atomically. On error nothing is applied.
    async fn apply_batch(
        &self,
        contract: &ContractDescriptor,
        records: &[OwnershipChange],
        next_height: u64,
    ) -> Result<(), IndexerError>;

    /// The saved checkpoint for `contract_id`, if any.
    async fn checkpoint(&self, contract_id: &str) -> Result<Option<Checkpoint>, IndexerError>;

    /// Token indexes currently held by `user`, ascending.
    async fn tokens_of(&self, contract_id: &str, user: &str) -> Result<Vec<u64>, IndexerError>;

    /// Last credited amount for `user` on a fungible contract.
    async fn amount_of(&self, contract_id: &str, user: &str) -> Result<Option<u64>, IndexerError>;

    /// Current holder of a non-fungible token index.
    async fn owner_of(
        &self,
        contract_id: &str,
        token_index: u64,
    ) -> Result<Option<String>, IndexerError>;
}

// ─── Transfer reconciliation ──────────────────────────────────────────────────

/// What to do with a transfer whose sender row was not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    /// The token has no recorded owner yet; insert the recipient.
    Insert,
    /// The recipient already holds the token; the transfer is a replay.
    AlreadyApplied,
}

/// Decide how to apply a transfer when deleting `(sender, index)` removed
/// nothing. `current_owner` is whoever holds the token index right now.
///
/// Any owner other than the recipient means the transfer is being applied
/// out of order.
pub fn reconcile_missing_sender(
    contract_id: &str,
    sender: &str,
    recipient: &str,
    token_index: u64,
    current_owner: Option<&str>,
) -> Result<TransferAction, IndexerError> {
    match current_owner {
        None => Ok(TransferAction::Insert),
        Some(owner) if owner == recipient => Ok(TransferAction::AlreadyApplied),
        Some(owner) => Err(IndexerError::Inconsistency {
            contract_id: contract_id.to_string(),
            token_index,
            reason: format!("transfer from {sender} to {recipient} but token is held by {owner}"),
        }),
    }
}

/// Error for a strict-mode credit that collides with an existing row.
pub fn duplicate_credit(contract_id: &str, recipient: &str, token_index: u64) -> IndexerError {
    IndexerError::Inconsistency {
        contract_id: contract_id.to_string(),
        token_index,
        reason: format!("duplicate credit for {recipient}"),
    }
}

// ─── In-memory store ──────────────────────────────────────────────────────────

type RowKey = (String, String, u64);

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// `(contract, user, index) -> amount` (`None` for non-fungible rows).
    rows: BTreeMap<RowKey, Option<u64>>,
    checkpoints: HashMap<String, Checkpoint>,
}

impl MemoryState {
    fn owner_of(&self, contract_id: &str, token_index: u64) -> Option<&str> {
        self.rows
            .keys()
            .find(|(c, _, idx)| c == contract_id && *idx == token_index)
            .map(|(_, user, _)| user.as_str())
    }

    fn apply(&mut self, change: &OwnershipChange, mode: FungibleMode) -> Result<(), IndexerError> {
        match change {
            OwnershipChange::Transfer {
                sender,
                recipient,
                contract_id,
                token_index,
            } => {
                let sender_key = (contract_id.clone(), sender.clone(), *token_index);
                if self.rows.remove(&sender_key).is_none() {
                    let owner = self.owner_of(contract_id, *token_index);
                    let action = reconcile_missing_sender(
                        contract_id,
                        sender,
                        recipient,
                        *token_index,
                        owner,
                    )?;
                    if action == TransferAction::AlreadyApplied {
                        return Ok(());
                    }
                }
                self.rows
                    .entry((contract_id.clone(), recipient.clone(), *token_index))
                    .or_insert(None);
                Ok(())
            }
            OwnershipChange::Credit {
                recipient,
                contract_id,
                token_index,
                amount,
            } => {
                let key = (contract_id.clone(), recipient.clone(), *token_index);
                if let Some(existing) = self.rows.get_mut(&key) {
                    match mode {
                        FungibleMode::Replace => *existing = Some(*amount),
                        FungibleMode::Strict => {
                            return Err(duplicate_credit(contract_id, recipient, *token_index));
                        }
                    }
                } else {
                    self.rows.insert(key, Some(*amount));
                }
                Ok(())
            }
        }
    }
}

/// In-memory ownership store with the same semantics as the SQL backends.
#[derive(Debug, Default)]
pub struct MemoryOwnershipStore {
    mode: FungibleMode,
    state: Mutex<MemoryState>,
}

impl MemoryOwnershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fungible_mode(mode: FungibleMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Total number of ownership rows across all contracts.
    pub fn row_count(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    /// Seed a holding directly, bypassing transfer semantics.
    pub fn seed_holding(&self, contract_id: &str, user: &str, token_index: u64) {
        self.state
            .lock()
            .unwrap()
            .rows
            .insert((contract_id.into(), user.into(), token_index), None);
    }
}

#[async_trait]
impl OwnershipStore for MemoryOwnershipStore {
    async fn ensure_schema(&self, _contract: &ContractDescriptor) -> Result<(), IndexerError> {
        Ok(())
    }

    async fn apply_batch(
        &self,
        contract: &ContractDescriptor,
        records: &[OwnershipChange],
        next_height: u64,
    ) -> Result<(), IndexerError> {
        let mut state = self.state.lock().unwrap();
        let mut staged = state.clone();
        for record in records {
            staged.apply(record, self.mode)?;
        }
        staged.checkpoints.insert(
            contract.id.clone(),
            Checkpoint {
                contract_id: contract.id.clone(),
                next_height,
                updated_at: chrono::Utc::now().timestamp(),
            },
        );
        *state = staged;
        Ok(())
    }

    async fn checkpoint(&self, contract_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.state.lock().unwrap().checkpoints.get(contract_id).cloned())
    }

    async fn tokens_of(&self, contract_id: &str, user: &str) -> Result<Vec<u64>, IndexerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rows
            .keys()
            .filter(|(c, u, _)| c == contract_id && u == user)
            .map(|(_, _, idx)| *idx)
            .collect())
    }

    async fn amount_of(&self, contract_id: &str, user: &str) -> Result<Option<u64>, IndexerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rows
            .get(&(contract_id.to_string(), user.to_string(), 0))
            .copied()
            .flatten())
    }

    async fn owner_of(
        &self,
        contract_id: &str,
        token_index: u64,
    ) -> Result<Option<String>, IndexerError> {
        let state = self.state.lock().unwrap();
        Ok(state.owner_of(contract_id, token_index).map(str::to_string))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
