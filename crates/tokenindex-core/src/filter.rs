//! Transaction filter: selects successful "send" invocations on a tracked
//! contract.

use crate::contract::ContractDescriptor;
use crate::types::{Transaction, EXEC_CONTRACT_TX_TYPE};

/// Returns `true` iff `tx` is a successful send-function call on `contract`.
///
/// Missing fields never match: unrelated transactions are expected noise.
pub fn is_relevant(tx: &Transaction, contract: &ContractDescriptor) -> bool {
    tx.is_success()
        && tx.tx_type == Some(EXEC_CONTRACT_TX_TYPE)
        && tx.contract_id.as_deref() == Some(contract.id.as_str())
        && tx.function_index == Some(contract.send_function_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractType;

    fn nft() -> ContractDescriptor {
        ContractDescriptor::new("CFnft", ContractType::Nft, 500)
    }

    fn send_tx() -> Transaction {
        Transaction {
            id: Some("tx".into()),
            tx_type: Some(EXEC_CONTRACT_TX_TYPE),
            status: Some("Success".into()),
            contract_id: Some("CFnft".into()),
            function_index: Some(2),
            function_data: Some("payload".into()),
            proofs: vec![],
        }
    }

    #[test]
    fn accepts_matching_send() {
        assert!(is_relevant(&send_tx(), &nft()));
    }

    #[test]
    fn rejects_each_mismatch() {
        let contract = nft();

        let mut tx = send_tx();
        tx.status = Some("Failed".into());
        assert!(!is_relevant(&tx, &contract), "status");

        let mut tx = send_tx();
        tx.tx_type = Some(4);
        assert!(!is_relevant(&tx, &contract), "type");

        let mut tx = send_tx();
        tx.contract_id = Some("CFother".into());
        assert!(!is_relevant(&tx, &contract), "contract");

        let mut tx = send_tx();
        tx.function_index = Some(0);
        assert!(!is_relevant(&tx, &contract), "function");
    }

    #[test]
    fn function_index_must_match_exactly() {
        let contract = nft();
        for index in [1, 3] {
            let mut tx = send_tx();
            tx.function_index = Some(index);
            assert!(!is_relevant(&tx, &contract), "index {index}");
        }
    }

    #[test]
    fn missing_fields_are_not_relevant() {
        let contract = nft();
        assert!(!is_relevant(&Transaction::default(), &contract));

        let mut tx = send_tx();
        tx.function_index = None;
        assert!(!is_relevant(&tx, &contract));
    }
}
