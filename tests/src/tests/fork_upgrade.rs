// crates
use beacon_block_import::BlockImportOpts;
use beacon_core::block::SignedBeaconBlock;
use beacon_core::config::PresetName;
use beacon_core::{ChainConfig, Epoch, ForkSeq, Slot};
use beacon_da_storage::backends::mock::MockStorage;
use beacon_da_storage::BlobSidecarStore;
use beacon_ledger::testutils::TestChain;
use tests::pipeline;
use tokio_util::sync::CancellationToken;
// internal

fn capella_then_blobs() -> ChainConfig {
    ChainConfig {
        preset: PresetName::Minimal,
        seconds_per_slot: 6,
        altair_fork_epoch: Epoch::new(0),
        bellatrix_fork_epoch: Epoch::new(0),
        capella_fork_epoch: Epoch::new(0),
        eip4844_fork_epoch: Epoch::new(1),
    }
}

#[tokio::test]
async fn import_crosses_the_blob_fork() {
    let config = capella_then_blobs();
    let slots_per_epoch = config.preset().slots_per_epoch;
    let mut chain = TestChain::new(config, 16);
    let genesis = chain.genesis().clone();
    let last_slot = slots_per_epoch + 2;
    let produced = chain.extend(1..=last_slot, 1);

    let store = BlobSidecarStore::new(MockStorage::default());
    for sidecar in produced.iter().filter_map(|p| p.sidecar.as_ref()) {
        store.put(sidecar).await.unwrap();
    }
    let blocks: Vec<SignedBeaconBlock> = produced.iter().map(|p| p.block.clone()).collect();
    let opts = BlockImportOpts {
        disable_bls_batch_verify: true,
        ..Default::default()
    };
    let imported = pipeline(&chain.config, store, opts)
        .import_blocks(genesis, &blocks, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(imported.len() as u64, last_slot);
    for block in &imported {
        let fork = block.post_state.fork;
        if block.slot < Slot::new(slots_per_epoch) {
            assert_eq!(fork, ForkSeq::Capella);
            assert!(block.data_availability.is_none());
        } else {
            assert_eq!(fork, ForkSeq::Eip4844);
            assert!(block.data_availability.as_ref().unwrap().is_available());
        }
    }
    assert_eq!(imported.last().unwrap().post_state, *chain.head_state());
}
