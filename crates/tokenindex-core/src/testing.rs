//! Test doubles shared by the core unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::ChainClient;
use crate::decoder::{DecodeError, DecodedEntry, PayloadDecoder};
use crate::error::IndexerError;
use crate::types::{Block, ContractInfo, Proof, Transaction, EXEC_CONTRACT_TX_TYPE};

/// Decodes `"recipient,value"` into `[Address(recipient), Amount(value)]`.
pub struct FakeDecoder;

impl PayloadDecoder for FakeDecoder {
    fn decode(&self, payload: &str) -> Result<Vec<DecodedEntry>, DecodeError> {
        let mut parts = payload.split(',');
        let mut entries = Vec::new();
        if let Some(recipient) = parts.next() {
            entries.push(DecodedEntry::Address(recipient.to_string()));
        }
        for part in parts {
            let value = part
                .parse::<u64>()
                .map_err(|_| DecodeError::Base58(payload.to_string()))?;
            entries.push(DecodedEntry::Amount(value));
        }
        Ok(entries)
    }
}

/// A successful send invocation from `sender` carrying `recipient,value`.
pub fn send_tx(
    contract_id: &str,
    function_index: u16,
    sender: &str,
    recipient: &str,
    value: u64,
) -> Transaction {
    Transaction {
        id: Some(format!("tx-{sender}-{recipient}-{value}")),
        tx_type: Some(EXEC_CONTRACT_TX_TYPE),
        status: Some("Success".into()),
        contract_id: Some(contract_id.into()),
        function_index: Some(function_index),
        function_data: Some(format!("{recipient},{value}")),
        proofs: vec![Proof {
            proof_type: Some("Curve25519".into()),
            public_key: None,
            address: Some(sender.into()),
        }],
    }
}

fn minting_tx() -> Transaction {
    Transaction {
        id: Some("mint".into()),
        tx_type: Some(5),
        ..Default::default()
    }
}

#[derive(Default)]
struct ChainState {
    head: u64,
    contracts: HashMap<String, ContractInfo>,
    blocks: BTreeMap<u64, Vec<Transaction>>,
    info_calls: usize,
    block_requests: Vec<(u64, u64)>,
    failing_block_requests: u32,
}

/// An in-memory chain whose head and contents are set by the test.
///
/// Heights without scripted transactions hold only a minting entry.
#[derive(Default)]
pub struct ScriptedChain {
    state: Mutex<ChainState>,
}

impl ScriptedChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.set_head(head);
        chain
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn add_contract(&self, id: &str, type_name: &str, height: u64) {
        self.state.lock().unwrap().contracts.insert(
            id.to_string(),
            ContractInfo {
                contract_id: id.to_string(),
                contract_type: Some(type_name.to_string()),
                height: Some(height),
                transaction_id: None,
            },
        );
    }

    pub fn add_tx(&self, height: u64, tx: Transaction) {
        self.state
            .lock()
            .unwrap()
            .blocks
            .entry(height)
            .or_default()
            .push(tx);
    }

    /// Make the next `n` block requests fail with a transient error.
    pub fn fail_next_block_requests(&self, n: u32) {
        self.state.lock().unwrap().failing_block_requests = n;
    }

    pub fn info_calls(&self) -> usize {
        self.state.lock().unwrap().info_calls
    }

    pub fn block_requests(&self) -> Vec<(u64, u64)> {
        self.state.lock().unwrap().block_requests.clone()
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn contract_info(&self, contract_id: &str) -> Result<ContractInfo, IndexerError> {
        let mut state = self.state.lock().unwrap();
        state.info_calls += 1;
        state
            .contracts
            .get(contract_id)
            .cloned()
            .ok_or_else(|| IndexerError::Rpc(format!("HTTP 404 for contract {contract_id}")))
    }

    async fn height(&self) -> Result<u64, IndexerError> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn blocks(&self, start: u64, end: u64) -> Result<Vec<Block>, IndexerError> {
        let mut state = self.state.lock().unwrap();
        state.block_requests.push((start, end));
        if state.failing_block_requests > 0 {
            state.failing_block_requests -= 1;
            return Err(IndexerError::Timeout { ms: 30_000 });
        }
        Ok((start..=end)
            .map(|height| {
                let mut transactions = vec![minting_tx()];
                if let Some(txs) = state.blocks.get(&height) {
                    transactions.extend(txs.iter().cloned());
                }
                Block {
                    height,
                    transaction_count: transactions.len() as u32,
                    transactions,
                }
            })
            .collect())
    }
}
