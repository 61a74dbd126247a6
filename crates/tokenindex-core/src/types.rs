//! Shared chain data types, as served by the node's REST API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Transaction type tag for "execute contract function".
pub const EXEC_CONTRACT_TX_TYPE: u8 = 9;

/// Status string of a successfully executed transaction.
pub const TX_STATUS_SUCCESS: &str = "Success";

// ─── Block ────────────────────────────────────────────────────────────────────

/// A block with its full transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height.
    pub height: u64,
    /// Number of transactions reported by the node.
    #[serde(rename = "transaction count", default)]
    pub transaction_count: u32,
    /// Transactions in block order. An entry that is not a transaction
    /// object is kept as an empty (never relevant) transaction.
    #[serde(default, deserialize_with = "lenient_seq")]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Blocks holding only the mandatory minting entry cannot contain
    /// contract invocations.
    pub fn may_contain_invocations(&self) -> bool {
        self.transaction_count > 1
    }
}

// ─── Transaction ──────────────────────────────────────────────────────────────

/// A transaction as returned inside a block.
///
/// Every field is optional: non-contract transactions carry none of the
/// contract fields, and a missing field only means "not relevant".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub tx_type: Option<u8>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub contract_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub function_index: Option<u16>,
    #[serde(default, deserialize_with = "lenient")]
    pub function_data: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub proofs: Vec<Proof>,
}

impl Transaction {
    /// Returns `true` if the node reports the transaction as executed.
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(TX_STATUS_SUCCESS)
    }

    /// The effective sender: the address of the first proof.
    pub fn sender(&self) -> Option<&str> {
        self.proofs.first().and_then(|p| p.address.as_deref())
    }

    /// Transaction id, or `"<unknown>"` for logging.
    pub fn id_or_unknown(&self) -> &str {
        self.id.as_deref().unwrap_or("<unknown>")
    }
}

/// A signer proof attached to a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(default, deserialize_with = "lenient")]
    pub proof_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub public_key: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub address: Option<String>,
}

// ─── Lenient field decoding ───────────────────────────────────────────────────
//
// Blocks carry every kind of transaction. A field of an unexpected shape
// reads as absent instead of failing the whole block.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Elements that do not decode become `T::default()`, keeping positions.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| T::deserialize(item).unwrap_or_default())
        .collect())
}

// ─── ContractInfo ─────────────────────────────────────────────────────────────

/// Raw contract metadata from `/contract/info/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub contract_id: String,
    #[serde(rename = "type", default)]
    pub contract_type: Option<String>,
    /// Height of the block that registered the contract.
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_deserializes_node_response() {
        let json = serde_json::json!({
            "height": 510,
            "transaction count": 2,
            "transactions": [
                { "type": 5, "id": "mint", "amount": 900000000 },
                {
                    "type": 9,
                    "id": "tx1",
                    "status": "Success",
                    "contractId": "CF5HTwYNrZDFBG371jfTiKpNPfRpEHdgj6B",
                    "functionIndex": 2,
                    "functionData": "14Vfj",
                    "proofs": [{
                        "proofType": "Curve25519",
                        "publicKey": "pk",
                        "address": "AU6BNRK34SLuc27evpzJbAswB6ntHV2hmjD"
                    }]
                }
            ]
        });
        let block: Block = serde_json::from_value(json).unwrap();
        assert_eq!(block.height, 510);
        assert!(block.may_contain_invocations());

        let mint = &block.transactions[0];
        assert_eq!(mint.tx_type, Some(5));
        assert!(mint.contract_id.is_none());
        assert!(mint.sender().is_none());

        let exec = &block.transactions[1];
        assert!(exec.is_success());
        assert_eq!(exec.function_index, Some(2));
        assert_eq!(exec.sender(), Some("AU6BNRK34SLuc27evpzJbAswB6ntHV2hmjD"));
    }

    #[test]
    fn failed_status_is_not_success() {
        let tx: Transaction =
            serde_json::from_value(serde_json::json!({ "status": "ContractInvalidCaller" }))
                .unwrap();
        assert!(!tx.is_success());
        assert!(!Transaction::default().is_success());
    }

    #[test]
    fn malformed_neighbour_does_not_fail_the_block() {
        use crate::contract::{ContractDescriptor, ContractType};
        use crate::extract::{extract, OwnershipChange};
        use crate::filter::is_relevant;
        use crate::testing::FakeDecoder;

        let json = serde_json::json!({
            "height": 511,
            "transaction count": 4,
            "transactions": [
                { "type": 9, "contractId": "CFother", "functionIndex": "2", "status": 1 },
                "garbage",
                {
                    "type": 9,
                    "status": "Success",
                    "contractId": "CFnft",
                    "functionIndex": 2,
                    "functionData": "B,7",
                    "proofs": [{ "address": "A", "publicKey": 42 }]
                },
                { "type": "nine", "proofs": "none" }
            ]
        });
        let block: Block = serde_json::from_value(json).unwrap();
        assert_eq!(block.transactions.len(), 4);

        let odd = &block.transactions[0];
        assert_eq!(odd.tx_type, Some(9));
        assert_eq!(odd.function_index, None);
        assert_eq!(odd.status, None);
        assert_eq!(block.transactions[1], Transaction::default());
        assert!(block.transactions[3].proofs.is_empty());

        let nft = ContractDescriptor::new("CFnft", ContractType::Nft, 500);
        let changes: Vec<OwnershipChange> = block
            .transactions
            .iter()
            .filter(|tx| is_relevant(tx, &nft))
            .map(|tx| extract(tx, &nft, &FakeDecoder).unwrap())
            .collect();
        assert_eq!(
            changes,
            vec![OwnershipChange::Transfer {
                sender: "A".into(),
                recipient: "B".into(),
                contract_id: "CFnft".into(),
                token_index: 7,
            }]
        );
    }

    #[test]
    fn single_transaction_block_is_skippable() {
        let block = Block {
            height: 1,
            transaction_count: 1,
            transactions: vec![Transaction::default()],
        };
        assert!(!block.may_contain_invocations());
    }
}
