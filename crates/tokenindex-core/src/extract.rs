//! Record extractor: turns a qualifying transaction into an ownership
//! change.

use serde::{Deserialize, Serialize};

use crate::contract::ContractDescriptor;
use crate::decoder::{Arguments, DecodeError, PayloadDecoder};
use crate::types::Transaction;

/// Argument positions in a send payload.
const RECIPIENT_ARG: usize = 0;
const VALUE_ARG: usize = 1;

/// An ownership change extracted from one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnershipChange {
    /// A non-fungible unit moved from `sender` to `recipient`.
    Transfer {
        sender: String,
        recipient: String,
        contract_id: String,
        token_index: u64,
    },
    /// A fungible credit of `amount` to `recipient`. Fungible contracts
    /// carry a single token, so `token_index` is always 0.
    Credit {
        recipient: String,
        contract_id: String,
        token_index: u64,
        amount: u64,
    },
}

impl OwnershipChange {
    pub fn contract_id(&self) -> &str {
        match self {
            Self::Transfer { contract_id, .. } | Self::Credit { contract_id, .. } => contract_id,
        }
    }

    pub fn token_index(&self) -> u64 {
        match self {
            Self::Transfer { token_index, .. } | Self::Credit { token_index, .. } => *token_index,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Self::Transfer { recipient, .. } | Self::Credit { recipient, .. } => recipient,
        }
    }
}

/// Extract the ownership change carried by `tx`.
///
/// `tx` must already have passed [`crate::filter::is_relevant`].
pub fn extract(
    tx: &Transaction,
    contract: &ContractDescriptor,
    decoder: &dyn PayloadDecoder,
) -> Result<OwnershipChange, DecodeError> {
    let payload = tx
        .function_data
        .as_deref()
        .ok_or(DecodeError::MissingField("functionData"))?;
    let args = decoder.decode(payload)?;
    let recipient = args.address_arg(RECIPIENT_ARG)?.to_string();

    if contract.is_non_fungible() {
        let token_index = args.u64_arg(VALUE_ARG)?;
        let sender = tx
            .sender()
            .ok_or(DecodeError::MissingField("proofs[0].address"))?
            .to_string();
        Ok(OwnershipChange::Transfer {
            sender,
            recipient,
            contract_id: contract.id.clone(),
            token_index,
        })
    } else {
        let amount = args.u64_arg(VALUE_ARG)?;
        Ok(OwnershipChange::Credit {
            recipient,
            contract_id: contract.id.clone(),
            token_index: 0,
            amount,
        })
    }
}
