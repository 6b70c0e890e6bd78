// std
use std::sync::Arc;
// crates
use beacon_block_import::{BlockImportError, BlockImportOpts};
use beacon_core::block::SignedBeaconBlock;
use beacon_core::{ChainConfig, ForkSeq, Slot};
use beacon_da_network::{BlobsSidecarsByRangeRequest, RangeStrategy, RangeSyncResponder};
use beacon_da_storage::backends::mock::MockStorage;
use beacon_da_storage::backends::sled::{SledBackend, SledBackendSettings};
use beacon_da_storage::BlobSidecarStore;
use beacon_ledger::testutils::TestChain;
use tests::{pipeline, range_request, ImportedChain, NodeSettings};
use tokio_util::sync::CancellationToken;
// internal

fn strict() -> BlockImportOpts {
    BlockImportOpts {
        disable_bls_batch_verify: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn imported_blobs_are_served_to_a_syncing_peer() {
    let mut chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Eip4844), 16);
    let genesis = chain.genesis().clone();
    let produced = chain.extend(1..=6, 1);
    let blocks: Vec<SignedBeaconBlock> = produced.iter().map(|p| p.block.clone()).collect();

    // the serving node received sidecars over gossip and keeps them on disk
    let directory = tempfile::tempdir().unwrap();
    let store = BlobSidecarStore::<SledBackend>::from_settings(SledBackendSettings {
        db_path: directory.path().join("sidecars"),
    })
    .unwrap();
    for sidecar in produced.iter().filter_map(|p| p.sidecar.as_ref()) {
        store.put(sidecar).await.unwrap();
    }
    let imported = pipeline(&chain.config, store.clone(), strict())
        .import_blocks(genesis.clone(), &blocks, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(imported.len(), 6);
    assert!(imported
        .iter()
        .all(|block| block.data_availability.as_ref().unwrap().is_available()));
    assert_eq!(
        imported.last().unwrap().post_state,
        *chain.head_state()
    );

    let responder = RangeSyncResponder::new(store, Arc::new(ImportedChain::new(&imported)));
    let (served, received) =
        range_request(responder, BlobsSidecarsByRangeRequest::new(Slot::new(2), 3)).await;
    assert_eq!(served.unwrap(), 3);
    let synced = received.unwrap();
    let expected: Vec<_> = produced[1..4]
        .iter()
        .map(|p| p.sidecar.clone().unwrap())
        .collect();
    assert_eq!(synced, expected);

    // the syncing node imports the same blocks with the blobs it downloaded
    let peer_store = BlobSidecarStore::new(MockStorage::default());
    for sidecar in &synced {
        peer_store.put(sidecar).await.unwrap();
    }
    let state_at_slot_one = imported[0].post_state.clone();
    let peer_imported = pipeline(&chain.config, peer_store.clone(), strict())
        .import_blocks(state_at_slot_one, &blocks[1..4], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(peer_imported.len(), 3);
    for (peer, origin) in peer_imported.iter().zip(&imported[1..4]) {
        assert_eq!(peer.post_state, origin.post_state);
        assert!(peer.data_availability.as_ref().unwrap().is_available());
    }

    // slot 5 was not part of the synced range
    let error = pipeline(&chain.config, peer_store, strict())
        .import_blocks(
            imported[3].post_state.clone(),
            &blocks[4..],
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        BlockImportError::DataNotAvailable { slot, .. } if slot == Slot::new(5)
    ));
}

#[tokio::test]
async fn slot_scan_serves_orphaned_sidecars() {
    let mut chain = TestChain::new(ChainConfig::minimal_at(ForkSeq::Eip4844), 16);
    let orphan = chain.produce_block(Slot::new(1), 1);
    let produced = chain.extend(1..=2, 1);

    let store = BlobSidecarStore::new(MockStorage::default());
    for sidecar in produced
        .iter()
        .chain(std::iter::once(&orphan))
        .filter_map(|p| p.sidecar.as_ref())
    {
        store.put(sidecar).await.unwrap();
    }
    let request = BlobsSidecarsByRangeRequest::new(Slot::new(1), 2);

    let scan = RangeSyncResponder::with_strategy(store.clone(), RangeStrategy::SlotScan);
    let (_, received) = range_request(scan, request).await;
    assert_eq!(received.unwrap().len(), 3);

    let imported = pipeline(&chain.config, store.clone(), strict())
        .import_blocks(
            chain.genesis().clone(),
            &produced.iter().map(|p| p.block.clone()).collect::<Vec<_>>(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let canonical = RangeSyncResponder::new(store, Arc::new(ImportedChain::new(&imported)));
    let (_, received) = range_request(canonical, request).await;
    let roots: Vec<_> = received
        .unwrap()
        .iter()
        .map(|sidecar| sidecar.beacon_block_root)
        .collect();
    assert_eq!(
        roots,
        produced
            .iter()
            .map(|p| p.block.block_root())
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn zero_count_request_is_refused() {
    let store = BlobSidecarStore::new(MockStorage::default());
    let responder = RangeSyncResponder::with_strategy(store, RangeStrategy::SlotScan);
    let (served, received) =
        range_request(responder, BlobsSidecarsByRangeRequest::new(Slot::new(1), 0)).await;
    assert!(served.is_err());
    assert!(received.is_err());
}

#[test]
fn node_settings_from_yaml() {
    let settings: NodeSettings = serde_yaml::from_str(
        r#"
chain:
  preset: minimal
  seconds_per_slot: 6
  altair_fork_epoch: 0
  bellatrix_fork_epoch: 0
  capella_fork_epoch: 0
  eip4844_fork_epoch: 2
import:
  disable_bls_batch_verify: true
storage:
  db_path: /tmp/beacon/sidecars
tracing:
  logger: Stderr
  level: DEBUG
"#,
    )
    .unwrap();
    assert_eq!(settings.chain.fork_at_slot(Slot::new(16)), ForkSeq::Eip4844);
    assert!(settings.import.disable_bls_batch_verify);
    assert!(!settings.import.optimistic_data_availability);
    assert!(matches!(
        settings.tracing.logger,
        beacon_tracing::LoggerLayer::Stderr
    ));
}
