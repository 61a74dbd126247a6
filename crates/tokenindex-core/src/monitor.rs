//! Contract monitor: the polling state machine for one tracked contract.
//!
//! # Lifecycle
//! `Initializing` resolves the contract, prepares storage and positions the
//! cursor (saved checkpoint or deployment height).
//!
//! `Polling` reads the head, computes the confirmed range
//! `[cursor, head - lag]` and walks it in fixed-size windows. Every window
//! is fetched, filtered, extracted and committed (records plus checkpoint)
//! before the next one is requested.
//!
//! `Sleeping` waits one block time, then polls again. `Failed` and
//! `Stopped` are terminal.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::ChainClient;
use crate::contract::{ContractDescriptor, ContractRegistry};
use crate::cursor::{BlockWindows, Cursor};
use crate::decoder::PayloadDecoder;
use crate::error::IndexerError;
use crate::extract::{extract, OwnershipChange};
use crate::filter::is_relevant;
use crate::indexer::{IndexerConfig, MonitorState};
use crate::store::OwnershipStore;
use crate::types::Block;

/// Statistics of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Chain head observed at the start of the cycle.
    pub head: u64,
    /// Confirmed range scanned, if any.
    pub range: Option<(u64, u64)>,
    pub windows: u64,
    pub blocks: u64,
    /// Transactions that produced an ownership change.
    pub matched: u64,
    /// Relevant transactions skipped because their payload did not decode.
    pub skipped: u64,
    /// `true` if cancellation stopped the cycle before the range was done.
    pub interrupted: bool,
}

/// Drives the pipeline for a single contract.
pub struct ContractMonitor {
    contract_id: String,
    client: Arc<dyn ChainClient>,
    store: Arc<dyn OwnershipStore>,
    decoder: Arc<dyn PayloadDecoder>,
    registry: Arc<ContractRegistry>,
    config: IndexerConfig,
    state: MonitorState,
    contract: Option<ContractDescriptor>,
    cursor: Cursor,
    buffer: Vec<OwnershipChange>,
}

impl ContractMonitor {
    pub fn new(
        contract_id: impl Into<String>,
        config: IndexerConfig,
        client: Arc<dyn ChainClient>,
        store: Arc<dyn OwnershipStore>,
        decoder: Arc<dyn PayloadDecoder>,
        registry: Arc<ContractRegistry>,
    ) -> Self {
        Self {
            contract_id: contract_id.into(),
            client,
            store,
            decoder,
            registry,
            config,
            state: MonitorState::Initializing,
            contract: None,
            cursor: Cursor::new(0),
            buffer: Vec::new(),
        }
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn contract(&self) -> Option<&ContractDescriptor> {
        self.contract.as_ref()
    }

    /// Resolve the contract, ensure storage and position the cursor.
    pub async fn initialize(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<ContractDescriptor, IndexerError> {
        self.state = MonitorState::Initializing;
        match self.try_initialize(cancel).await {
            Ok(contract) => Ok(contract),
            Err(e) => {
                self.state = MonitorState::Failed;
                Err(e)
            }
        }
    }

    async fn try_initialize(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<ContractDescriptor, IndexerError> {
        let client = self.client.clone();
        let registry = self.registry.clone();
        let id = self.contract_id.clone();
        let contract = self
            .retry_transient("contract_info", cancel, || {
                let client = client.clone();
                let registry = registry.clone();
                let id = id.clone();
                async move { registry.resolve(client.as_ref(), &id).await }
            })
            .await?;

        self.store.ensure_schema(&contract).await?;

        let mut start = contract.deploy_height;
        if self.config.resume_from_checkpoint {
            if let Some(cp) = self.store.checkpoint(&contract.id).await? {
                if cp.next_height > start {
                    tracing::info!(
                        contract = %contract.id,
                        next_height = cp.next_height,
                        "Resuming from checkpoint"
                    );
                    start = cp.next_height;
                }
            }
        }
        self.cursor = Cursor::new(start);

        tracing::info!(
            contract = %contract.id,
            contract_type = %contract.contract_type,
            send_index = contract.send_function_index,
            start,
            "Monitor initialized"
        );
        self.contract = Some(contract.clone());
        self.state = MonitorState::Polling;
        Ok(contract)
    }

    /// Run one polling cycle over the currently confirmed range.
    ///
    /// Cancellation is honoured between windows and during retry backoff;
    /// a window is never committed partially.
    pub async fn poll_once(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, IndexerError> {
        let contract = if let Some(c) = self.contract.clone() {
            c
        } else {
            self.initialize(cancel).await?
        };
        self.state = MonitorState::Polling;

        let result = self.scan_confirmed(&contract, cancel).await;
        if result.is_err() {
            self.state = MonitorState::Failed;
        }
        result
    }

    async fn scan_confirmed(
        &mut self,
        contract: &ContractDescriptor,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, IndexerError> {
        let client = self.client.clone();
        let head = self
            .retry_transient("height", cancel, || {
                let client = client.clone();
                async move { client.height().await }
            })
            .await?;

        let mut outcome = PollOutcome {
            head,
            ..Default::default()
        };
        let Some((start, end)) = self.cursor.pending_range(head, self.config.confirmation_lag)
        else {
            tracing::debug!(
                contract = %contract.id,
                head,
                next_height = self.cursor.next_height,
                "No new confirmed blocks"
            );
            return Ok(outcome);
        };
        outcome.range = Some((start, end));

        for (window_start, window_end) in BlockWindows::new(start, end, self.config.page_size) {
            if cancel.is_cancelled() {
                outcome.interrupted = true;
                break;
            }
            self.process_window(contract, window_start, window_end, cancel, &mut outcome)
                .await?;
            self.cursor.advance_past(window_end);
            outcome.windows += 1;
        }

        Ok(outcome)
    }

    async fn process_window(
        &mut self,
        contract: &ContractDescriptor,
        start: u64,
        end: u64,
        cancel: &CancellationToken,
        outcome: &mut PollOutcome,
    ) -> Result<(), IndexerError> {
        let client = self.client.clone();
        let blocks = self
            .retry_transient("blocks", cancel, || {
                let client = client.clone();
                async move {
                    let blocks = client.blocks(start, end).await?;
                    check_window(start, end, blocks)
                }
            })
            .await?;

        outcome.blocks += blocks.len() as u64;
        for block in blocks.iter().filter(|b| b.may_contain_invocations()) {
            for tx in block.transactions.iter().filter(|tx| is_relevant(tx, contract)) {
                match extract(tx, contract, self.decoder.as_ref()) {
                    Ok(change) => {
                        outcome.matched += 1;
                        self.buffer.push(change);
                    }
                    Err(e) => {
                        outcome.skipped += 1;
                        tracing::warn!(
                            contract = %contract.id,
                            height = block.height,
                            tx = tx.id_or_unknown(),
                            error = %e,
                            "Skipping undecodable transaction"
                        );
                    }
                }
            }
        }

        // The buffer is emptied whether or not the flush succeeds.
        let records = std::mem::take(&mut self.buffer);
        self.store
            .apply_batch(contract, &records, end + 1)
            .await
            .map_err(|e| {
                tracing::error!(
                    contract = %contract.id,
                    from = start,
                    to = end,
                    records = records.len(),
                    error = %e,
                    "Failed to apply window"
                );
                e
            })?;

        tracing::info!(
            contract = %contract.id,
            from = start,
            to = end,
            records = records.len(),
            "Window applied"
        );
        Ok(())
    }

    /// Run the monitor until cancelled or failed.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), IndexerError> {
        if self.contract.is_none() {
            match self.initialize(&cancel).await {
                Ok(_) => {}
                Err(_) if cancel.is_cancelled() => {
                    self.stop();
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.poll_once(&cancel).await {
                Ok(outcome) => {
                    if outcome.range.is_some() {
                        tracing::debug!(
                            contract = %self.contract_id,
                            head = outcome.head,
                            windows = outcome.windows,
                            blocks = outcome.blocks,
                            matched = outcome.matched,
                            skipped = outcome.skipped,
                            "Poll cycle complete"
                        );
                    }
                }
                Err(_) if cancel.is_cancelled() => break,
                Err(e) => {
                    tracing::error!(
                        contract = %self.contract_id,
                        next_height = self.cursor.next_height,
                        error = %e,
                        "Monitor failed"
                    );
                    return Err(e);
                }
            }

            self.state = MonitorState::Sleeping;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        self.stop();
        Ok(())
    }

    fn stop(&mut self) {
        self.state = MonitorState::Stopped;
        tracing::info!(
            contract = %self.contract_id,
            next_height = self.cursor.next_height,
            "Monitor stopped"
        );
    }

    /// Retry `op` on transient errors with linear backoff. Cancellation
    /// during a backoff ends the retries with `Aborted`.
    async fn retry_transient<T, F, Fut>(
        &self,
        what: &str,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, IndexerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_window_retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay(attempt);
                    tracing::warn!(
                        contract = %self.contract_id,
                        request = what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient error, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(IndexerError::Aborted {
                                reason: format!("cancelled while retrying {what}: {e}"),
                            });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Reject a window the node returned incompletely or out of order.
fn check_window(start: u64, end: u64, blocks: Vec<Block>) -> Result<Vec<Block>, IndexerError> {
    let expected = end - start + 1;
    if blocks.len() as u64 != expected {
        return Err(IndexerError::Rpc(format!(
            "requested blocks {start}..={end}, node returned {}",
            blocks.len()
        )));
    }
    for (offset, block) in blocks.iter().enumerate() {
        let height = start + offset as u64;
        if block.height != height {
            return Err(IndexerError::Rpc(format!(
                "expected block {height}, node returned {}",
                block.height
            )));
        }
    }
    Ok(blocks)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
