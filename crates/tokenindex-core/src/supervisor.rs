//! Monitor supervisor: runs one [`ContractMonitor`] per tracked contract
//! and owns their shared lifecycle.
//!
//! The first monitor failure cancels every other monitor; once all have
//! stopped, that first error is returned. External cancellation stops all
//! monitors and returns `Ok(())`.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::client::ChainClient;
use crate::contract::ContractRegistry;
use crate::decoder::PayloadDecoder;
use crate::error::IndexerError;
use crate::indexer::IndexerConfig;
use crate::monitor::ContractMonitor;
use crate::store::OwnershipStore;

pub struct Supervisor {
    config: IndexerConfig,
    client: Arc<dyn ChainClient>,
    store: Arc<dyn OwnershipStore>,
    decoder: Arc<dyn PayloadDecoder>,
    registry: Arc<ContractRegistry>,
}

impl Supervisor {
    pub fn new(
        config: IndexerConfig,
        client: Arc<dyn ChainClient>,
        store: Arc<dyn OwnershipStore>,
        decoder: Arc<dyn PayloadDecoder>,
    ) -> Self {
        Self {
            config,
            client,
            store,
            decoder,
            registry: Arc::new(ContractRegistry::new()),
        }
    }

    /// Run all monitors until `cancel` fires or one of them fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), IndexerError> {
        self.config.validate()?;

        let monitors_token = cancel.child_token();
        let mut tasks = JoinSet::new();
        for contract_id in &self.config.contracts {
            let mut monitor = ContractMonitor::new(
                contract_id.clone(),
                self.config.clone(),
                self.client.clone(),
                self.store.clone(),
                self.decoder.clone(),
                self.registry.clone(),
            );
            let token = monitors_token.clone();
            let id = contract_id.clone();
            tasks.spawn(async move { (id, monitor.run(token).await) });
        }
        tracing::info!(monitors = tasks.len(), "Supervisor started");

        let mut first_error: Option<IndexerError> = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((_, Ok(()))) => None,
                Ok((contract, Err(e))) => Some((contract, e)),
                Err(join_err) => Some((
                    "<unknown>".to_string(),
                    IndexerError::Aborted {
                        reason: format!("monitor task panicked: {join_err}"),
                    },
                )),
            };

            if let Some((contract, e)) = failure {
                if first_error.is_none() {
                    tracing::error!(
                        contract = %contract,
                        error = %e,
                        "Monitor failed, stopping all monitors"
                    );
                    monitors_token.cancel();
                    first_error = Some(e);
                } else {
                    tracing::warn!(contract = %contract, error = %e, "Additional monitor failure");
                }
            }
        }

        drop(self.client);
        tracing::info!("All monitors stopped, chain client released");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::builder::IndexerBuilder;
    use crate::store::MemoryOwnershipStore;
    use crate::testing::{send_tx, FakeDecoder, ScriptedChain};

    fn supervisor(
        chain: Arc<ScriptedChain>,
        store: Arc<MemoryOwnershipStore>,
        ids: &[&str],
    ) -> Supervisor {
        let config = IndexerBuilder::new()
            .contracts(ids.iter().copied())
            .poll_interval_ms(10)
            .retry_backoff_ms(1)
            .build_config();
        Supervisor::new(config, chain, store, Arc::new(FakeDecoder))
    }

    #[tokio::test]
    async fn external_cancellation_stops_cleanly() {
        let chain = Arc::new(ScriptedChain::new(600));
        chain.add_contract("CFa", "NonFungibleContract", 500);
        chain.add_contract("CFb", "TokenContract", 500);
        chain.add_tx(510, send_tx("CFa", 2, "A", "B", 7));
        chain.add_tx(520, send_tx("CFb", 3, "A", "C", 1_000));
        let store = Arc::new(MemoryOwnershipStore::new());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            supervisor(chain.clone(), store.clone(), &["CFa", "CFb"]).run(cancel.clone()),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        handle.await.unwrap().unwrap();
        assert_eq!(store.owner_of("CFa", 7).await.unwrap().as_deref(), Some("B"));
        assert_eq!(store.amount_of("CFb", "C").await.unwrap(), Some(1_000));
    }

    #[tokio::test]
    async fn first_failure_stops_everyone() {
        let chain = Arc::new(ScriptedChain::new(600));
        chain.add_contract("CFa", "NonFungibleContract", 500);
        chain.add_contract("CFbad", "LockContract", 500);
        let store = Arc::new(MemoryOwnershipStore::new());

        let cancel = CancellationToken::new();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            supervisor(chain, store, &["CFa", "CFbad"]).run(cancel.clone()),
        )
        .await
        .expect("supervisor should stop after a monitor failure");

        assert!(matches!(
            result,
            Err(IndexerError::UnknownContractType { ref contract_id, .. }) if contract_id == "CFbad"
        ));
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let chain = Arc::new(ScriptedChain::new(600));
        let store = Arc::new(MemoryOwnershipStore::new());
        let err = supervisor(chain, store, &[])
            .run(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Config(_)));
    }
}
