// std
use std::sync::Arc;
// crates
use beacon_block_import::{BlockImportOpts, BlockImportPipeline, ImportedBlock};
use beacon_core::da::{BlobsSidecar, SidecarFetcher};
use beacon_core::ChainConfig;
use beacon_da_network::{
    handle_incoming_stream, request_blobs_sidecars_by_range, BlobsSidecarsByRangeRequest,
    BlockSummary, ChainAncestry, RangeSyncError, RangeSyncResponder,
};
use beacon_da_storage::backends::sled::SledBackendSettings;
use beacon_da_storage::backends::StorageBackend;
use beacon_da_verifier::DataAvailabilityChecker;
use beacon_kzg::testutils::MINIMAL_SETTINGS;
use beacon_ledger::BlstVerifier;
use beacon_tracing::TracingSettings;
use serde::{Deserialize, Serialize};
use tokio_util::compat::TokioAsyncReadCompatExt;

/// Everything a node needs to import blocks and serve their blobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    pub chain: ChainConfig,
    #[serde(default)]
    pub import: BlockImportOpts,
    pub storage: SledBackendSettings,
    #[serde(default)]
    pub tracing: TracingSettings,
}

/// Head chain made of the blocks a node imported, in import order.
pub struct ImportedChain(Vec<BlockSummary>);

impl ImportedChain {
    pub fn new(imported: &[ImportedBlock]) -> Self {
        Self(
            imported
                .iter()
                .map(|block| BlockSummary {
                    slot: block.slot,
                    block_root: block.block_root,
                })
                .collect(),
        )
    }
}

impl ChainAncestry for ImportedChain {
    fn ancestors_from_head(&self) -> Box<dyn Iterator<Item = BlockSummary> + Send + '_> {
        Box::new(self.0.iter().rev().copied())
    }
}

pub fn pipeline<Fetcher: SidecarFetcher>(
    config: &ChainConfig,
    fetcher: Fetcher,
    opts: BlockImportOpts,
) -> BlockImportPipeline<Fetcher> {
    BlockImportPipeline::new(
        Arc::new(config.clone()),
        Arc::new(BlstVerifier),
        Arc::new(DataAvailabilityChecker::new(MINIMAL_SETTINGS.clone())),
        fetcher,
        opts,
    )
}

/// Run one range request against `responder` over an in-memory duplex pipe.
/// Returns what the server reported and what the client received.
pub async fn range_request<Backend: StorageBackend>(
    responder: RangeSyncResponder<Backend>,
    request: BlobsSidecarsByRangeRequest,
) -> (
    Result<usize, RangeSyncError>,
    Result<Vec<BlobsSidecar>, RangeSyncError>,
) {
    let (client, server) = tokio::io::duplex(4096);
    let server = tokio::spawn(async move {
        let mut stream = server.compat();
        handle_incoming_stream(&mut stream, &responder).await
    });
    let mut client = client.compat();
    let received = request_blobs_sidecars_by_range(&mut client, &request).await;
    let served = server.await.expect("range sync server task");
    (served, received)
}
