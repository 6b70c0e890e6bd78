pub mod metrics;

// std
use std::sync::Arc;
use std::time::Instant;
// crates
use beacon_core::block::SignedBeaconBlock;
use beacon_core::da::SidecarFetcher;
use beacon_core::merkle::HashTreeRoot;
use beacon_core::state::BeaconState;
use beacon_core::{ChainConfig, ForkSeq, Root, Slot};
use beacon_da_verifier::{DataAvailability, DataAvailabilityChecker, NotAvailableReason};
use beacon_ledger::{
    state_transition, LedgerError, SignatureVerifier, Transition, TransitionContext,
    TransitionOpts,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use tracing_futures::Instrument;
// internal
pub use metrics::BlockImportMetrics;

/// Signature handling and data availability policy of an import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockImportOpts {
    /// Verify signatures one by one instead of leaving them to the external
    /// batch verifier.
    pub disable_bls_batch_verify: bool,
    /// Every signature is already known to be valid.
    pub valid_signatures: bool,
    /// The proposer signature is already known to be valid.
    pub valid_proposer_signature: bool,
    /// Import blocks whose blobs are not available yet instead of failing.
    pub optimistic_data_availability: bool,
}

impl BlockImportOpts {
    /// Checks run by the transition of a block at `fork`. The post-state root
    /// is compared by the pipeline itself.
    pub fn transition_opts(&self, fork: ForkSeq) -> TransitionOpts {
        let batch = !self.disable_bls_batch_verify;
        TransitionOpts {
            verify_state_root: false,
            verify_proposer: !batch && !self.valid_signatures && !self.valid_proposer_signature,
            verify_signatures: !batch && !self.valid_signatures,
            verify_blobs: fork.has_blobs(),
        }
    }
}

#[derive(Debug)]
pub struct ImportedBlock {
    pub slot: Slot,
    pub block_root: Root,
    pub post_state: BeaconState,
    /// Proposer balance after the block minus before it.
    pub proposer_balance_delta: i128,
    /// `None` for blocks without blobs.
    pub data_availability: Option<DataAvailability>,
}

#[derive(Debug, Error)]
pub enum BlockImportError {
    #[error(
        "Invalid state root at slot {slot}: block declares {}, transition produced {}",
        const_hex::encode(.expected),
        const_hex::encode(.actual)
    )]
    InvalidStateRoot {
        slot: Slot,
        block_root: Root,
        expected: Root,
        actual: Root,
        pre_state: Box<BeaconState>,
        post_state: Box<BeaconState>,
    },
    #[error("Invalid block at slot {slot}: {source}")]
    InvalidBlock {
        slot: Slot,
        block_root: Root,
        #[source]
        source: LedgerError,
    },
    #[error("Blobs of the block at slot {slot} are not available: {reason:?}")]
    DataNotAvailable {
        slot: Slot,
        block_root: Root,
        reason: NotAvailableReason,
    },
    #[error("Could not fetch the sidecar of the block at slot {slot}: {source}")]
    SidecarFetch {
        slot: Slot,
        block_root: Root,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Import aborted after {} blocks", .imported.len())]
    Aborted { imported: Vec<ImportedBlock> },
}

/// Verifies a parent linked run of blocks, one after the other.
///
/// Each block starts from the post-state of the previous one. Sidecars of
/// blob carrying blocks are fetched by block root before their transition.
pub struct BlockImportPipeline<Fetcher> {
    config: Arc<ChainConfig>,
    verifier: Arc<dyn SignatureVerifier>,
    data_availability: Arc<DataAvailabilityChecker>,
    fetcher: Fetcher,
    opts: BlockImportOpts,
    metrics: Option<BlockImportMetrics>,
}

impl<Fetcher: SidecarFetcher> BlockImportPipeline<Fetcher> {
    pub fn new(
        config: Arc<ChainConfig>,
        verifier: Arc<dyn SignatureVerifier>,
        data_availability: Arc<DataAvailabilityChecker>,
        fetcher: Fetcher,
        opts: BlockImportOpts,
    ) -> Self {
        Self {
            config,
            verifier,
            data_availability,
            fetcher,
            opts,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: BlockImportMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Import `blocks` on top of `state` inside a `block_import` span.
    pub async fn import_blocks(
        &self,
        state: BeaconState,
        blocks: &[SignedBeaconBlock],
        cancel: &CancellationToken,
    ) -> Result<Vec<ImportedBlock>, BlockImportError> {
        let span = tracing::debug_span!("block_import", blocks = blocks.len());
        self.import_blocks_in(state, blocks, cancel, span).await
    }

    /// Import `blocks` with every event recorded under `span`.
    pub async fn import_blocks_in(
        &self,
        state: BeaconState,
        blocks: &[SignedBeaconBlock],
        cancel: &CancellationToken,
        span: Span,
    ) -> Result<Vec<ImportedBlock>, BlockImportError> {
        self.run(state, blocks, cancel).instrument(span).await
    }

    async fn run(
        &self,
        mut pre_state: BeaconState,
        blocks: &[SignedBeaconBlock],
        cancel: &CancellationToken,
    ) -> Result<Vec<ImportedBlock>, BlockImportError> {
        let mut imported = Vec::with_capacity(blocks.len());
        for (index, signed_block) in blocks.iter().enumerate() {
            let imported_block = self.import_block(&pre_state, signed_block).await?;
            pre_state = imported_block.post_state.clone();
            imported.push(imported_block);

            if index + 1 == blocks.len() {
                break;
            }
            if cancel.is_cancelled() {
                tracing::info!(imported = imported.len(), "block import cancelled");
                return Err(BlockImportError::Aborted { imported });
            }
            tokio::task::yield_now().await;
        }
        Ok(imported)
    }

    async fn import_block(
        &self,
        pre_state: &BeaconState,
        signed_block: &SignedBeaconBlock,
    ) -> Result<ImportedBlock, BlockImportError> {
        let block = &signed_block.message;
        let slot = block.slot;
        let block_root = signed_block.block_root();
        let fork = block.fork();

        let sidecar = if fork.has_blobs() {
            self.fetcher
                .fetch_sidecar(block_root)
                .await
                .map_err(|error| BlockImportError::SidecarFetch {
                    slot,
                    block_root,
                    source: Box::new(error),
                })?
        } else {
            None
        };

        let ctx = TransitionContext::new(&self.config, self.verifier.as_ref())
            .with_data_availability(&self.data_availability);
        let started = Instant::now();
        let transition = state_transition(
            ctx,
            pre_state.clone(),
            signed_block,
            sidecar.as_ref(),
            self.opts.transition_opts(fork),
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(started.elapsed());
        }
        let Transition {
            state: post_state,
            data_availability,
        } = transition.map_err(|source| {
            tracing::debug!(%slot, %source, "block rejected");
            BlockImportError::InvalidBlock {
                slot,
                block_root,
                source,
            }
        })?;

        let actual = post_state.hash_tree_root();
        if actual != block.state_root {
            return Err(BlockImportError::InvalidStateRoot {
                slot,
                block_root,
                expected: block.state_root,
                actual,
                pre_state: Box::new(pre_state.clone()),
                post_state: Box::new(post_state),
            });
        }

        if let (Some(metrics), Some(availability)) = (&self.metrics, &data_availability) {
            metrics.record_availability(availability);
        }
        let data_availability = match data_availability {
            Some(DataAvailability::NotAvailable(reason))
                if !self.opts.optimistic_data_availability =>
            {
                return Err(BlockImportError::DataNotAvailable {
                    slot,
                    block_root,
                    reason,
                });
            }
            other => other,
        };

        let proposer = block.proposer_index;
        let before = pre_state.balance(proposer).unwrap_or_default();
        let after = post_state.balance(proposer).unwrap_or_default();
        if let Some(metrics) = &self.metrics {
            metrics.record_imported();
        }
        tracing::debug!(
            %slot,
            root = %const_hex::encode(block_root),
            available = ?data_availability.as_ref().map(DataAvailability::is_available),
            "imported block"
        );
        Ok(ImportedBlock {
            slot,
            block_root,
            post_state,
            proposer_balance_delta: i128::from(after) - i128::from(before),
            data_availability,
        })
    }
}
