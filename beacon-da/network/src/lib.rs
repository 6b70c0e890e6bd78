pub mod messages;
pub mod packing;
pub mod protocol;
pub mod responder;

// crates
use beacon_core::wire;
use beacon_da_storage::StorageError;
use libp2p::PeerId;
use thiserror::Error;
// internal
pub use messages::{BlobsSidecarsByRangeRequest, RespStatus, ResponseChunk};
pub use protocol::{
    handle_incoming_stream, request_blobs_sidecars_by_range, RangeSyncClient, RangeSyncServer,
    BLOBS_SIDECARS_BY_RANGE_PROTOCOL,
};
pub use responder::{BlockSummary, ChainAncestry, RangeStrategy, RangeSyncResponder};

#[derive(Debug, Error)]
pub enum RangeSyncError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Could not read sidecars: {0}")]
    Storage(#[from] StorageError),
    #[error("Could not decode sidecar: {0}")]
    Decode(#[from] wire::Error),
    #[error("Stream disconnected: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error dialing peer [{peer_id}]: {message}")]
    OpenStream { peer_id: PeerId, message: String },
    #[error("Peer answered {status}: {message}")]
    Remote { status: RespStatus, message: String },
    #[error("Peer sent more than the {count} requested sidecars")]
    TooManyChunks { count: u64 },
}
