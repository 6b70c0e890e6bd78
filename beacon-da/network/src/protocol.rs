// std
use std::io;
// crates
use beacon_core::da::BlobsSidecar;
use beacon_da_storage::backends::StorageBackend;
use beacon_da_storage::StorageError;
use futures::{AsyncRead, AsyncWrite, AsyncWriteExt, StreamExt};
use libp2p::{PeerId, StreamProtocol};
use libp2p_stream::{AlreadyRegistered, Control, IncomingStreams};
use tracing::{debug, error};
// internal
use crate::messages::{BlobsSidecarsByRangeRequest, RespStatus, ResponseChunk};
use crate::packing::{pack, unpack_from_reader, unpack_next};
use crate::responder::RangeSyncResponder;
use crate::RangeSyncError;

pub const BLOBS_SIDECARS_BY_RANGE_PROTOCOL: StreamProtocol =
    StreamProtocol::new("/beacon/req/blobs_sidecars_by_range/1");

async fn write_chunk<W>(writer: &mut W, chunk: &ResponseChunk) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = pack(chunk)?;
    writer.write_all(&bytes).await
}

/// Serve a single request on an inbound stream, then close it.
///
/// Returns the number of sidecars sent. Request and storage errors are also
/// reported to the remote as an error chunk before closing.
pub async fn handle_incoming_stream<S, Backend>(
    stream: &mut S,
    responder: &RangeSyncResponder<Backend>,
) -> Result<usize, RangeSyncError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    Backend: StorageBackend,
{
    let result = serve(stream, responder).await;
    if let Err(error) = &result {
        if let Some(status) = error.status() {
            write_chunk(stream, &ResponseChunk::error(status, error.to_string())).await?;
        }
    }
    stream.flush().await?;
    stream.close().await?;
    result
}

async fn serve<S, Backend>(
    stream: &mut S,
    responder: &RangeSyncResponder<Backend>,
) -> Result<usize, RangeSyncError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    Backend: StorageBackend,
{
    let request: BlobsSidecarsByRangeRequest = unpack_from_reader(stream)
        .await
        .map_err(|error| match error.kind() {
            io::ErrorKind::InvalidData => RangeSyncError::InvalidRequest(error.to_string()),
            _ => RangeSyncError::Io(error),
        })?;
    debug!(start_slot = %request.start_slot, count = request.count, "blobs sidecars by range request");
    let mut sidecars = responder.respond(&request)?;
    let mut sent = 0;
    while let Some(sidecar) = sidecars.next().await {
        write_chunk(stream, &ResponseChunk::Success(sidecar?)).await?;
        sent += 1;
    }
    Ok(sent)
}

/// Write `request` and read sidecars until the remote closes the stream.
pub async fn request_blobs_sidecars_by_range<S>(
    stream: &mut S,
    request: &BlobsSidecarsByRangeRequest,
) -> Result<Vec<BlobsSidecar>, RangeSyncError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&pack(request)?).await?;
    stream.flush().await?;

    let mut sidecars = Vec::new();
    while let Some(chunk) = unpack_next::<ResponseChunk, _>(stream).await? {
        match chunk {
            ResponseChunk::Success(bytes) => {
                if sidecars.len() as u64 >= request.count {
                    return Err(RangeSyncError::TooManyChunks {
                        count: request.count,
                    });
                }
                sidecars.push(BlobsSidecar::decode(&bytes)?);
            }
            ResponseChunk::Error { status, message } => {
                return Err(RangeSyncError::Remote { status, message });
            }
        }
    }
    Ok(sidecars)
}

/// Accepts inbound range requests and serves each one on its own task.
pub struct RangeSyncServer<Backend> {
    incoming_streams: IncomingStreams,
    responder: RangeSyncResponder<Backend>,
}

impl<Backend: StorageBackend> RangeSyncServer<Backend> {
    pub fn new(
        control: &mut Control,
        responder: RangeSyncResponder<Backend>,
    ) -> Result<Self, AlreadyRegistered> {
        let incoming_streams = control.accept(BLOBS_SIDECARS_BY_RANGE_PROTOCOL)?;
        Ok(Self {
            incoming_streams,
            responder,
        })
    }

    /// Runs until the swarm drops the protocol registration.
    pub async fn run(mut self) {
        while let Some((peer_id, mut stream)) = self.incoming_streams.next().await {
            let responder = self.responder.clone();
            tokio::spawn(async move {
                match handle_incoming_stream(&mut stream, &responder).await {
                    Ok(sent) => debug!(%peer_id, sent, "served blobs sidecars by range"),
                    Err(error) => error!(%peer_id, "blobs sidecars by range failed: {error}"),
                }
            });
        }
    }
}

#[derive(Clone)]
pub struct RangeSyncClient {
    control: Control,
}

impl RangeSyncClient {
    pub fn new(control: Control) -> Self {
        Self { control }
    }

    pub async fn blobs_sidecars_by_range(
        &mut self,
        peer_id: PeerId,
        request: BlobsSidecarsByRangeRequest,
    ) -> Result<Vec<BlobsSidecar>, RangeSyncError> {
        let mut stream = self
            .control
            .open_stream(peer_id, BLOBS_SIDECARS_BY_RANGE_PROTOCOL)
            .await
            .map_err(|error| RangeSyncError::OpenStream {
                peer_id,
                message: error.to_string(),
            })?;
        let sidecars = request_blobs_sidecars_by_range(&mut stream, &request).await?;
        if let Err(error) = stream.close().await {
            debug!(%peer_id, "error closing range sync stream: {error}");
        }
        Ok(sidecars)
    }
}

impl RangeSyncError {
    /// Status sent back to the remote for errors raised while serving.
    pub fn status(&self) -> Option<RespStatus> {
        match self {
            Self::InvalidRequest(_) => Some(RespStatus::InvalidRequest),
            // store unreachable
            Self::Storage(StorageError::Backend(_)) => Some(RespStatus::ResourceUnavailable),
            Self::Storage(_) | Self::Decode(_) => Some(RespStatus::ServerError),
            Self::Io(_) | Self::OpenStream { .. } | Self::Remote { .. } => None,
            Self::TooManyChunks { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use beacon_core::Slot;
    use futures::io::Cursor;
    use libp2p::identity::Keypair;
    use libp2p::swarm::SwarmEvent;
    use libp2p::{quic, Multiaddr, Swarm, SwarmBuilder};

    use super::*;
    use crate::responder::tests::populated_store;
    use crate::responder::RangeStrategy;

    /// Reads from a fixed buffer and records every write.
    #[derive(Default)]
    struct MemoryStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        closed: bool,
    }

    impl MemoryStream {
        fn with_input(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                ..Default::default()
            }
        }
    }

    impl AsyncRead for MemoryStream {
        fn poll_read(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut [u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.get_mut().input).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for MemoryStream {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.get_mut().output).poll_write(cx, buf)
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.get_mut().closed = true;
            Poll::Ready(Ok(()))
        }
    }

    async fn serve_request(
        request: &BlobsSidecarsByRangeRequest,
        strategy_scan: bool,
    ) -> (Result<usize, RangeSyncError>, MemoryStream) {
        let (store, ancestry) = populated_store().await;
        let responder = if strategy_scan {
            RangeSyncResponder::with_strategy(store, RangeStrategy::SlotScan)
        } else {
            RangeSyncResponder::new(store, ancestry)
        };
        let mut stream = MemoryStream::with_input(pack(request).unwrap());
        let result = handle_incoming_stream(&mut stream, &responder).await;
        (result, stream)
    }

    #[tokio::test]
    async fn server_and_client_agree() {
        let request = BlobsSidecarsByRangeRequest::new(Slot::new(1), 3);
        let (result, server_stream) = serve_request(&request, false).await;
        assert_eq!(result.unwrap(), 3);
        assert!(server_stream.closed);

        let mut client_stream = MemoryStream::with_input(server_stream.output);
        let sidecars = request_blobs_sidecars_by_range(&mut client_stream, &request)
            .await
            .unwrap();
        let slots: Vec<u64> = sidecars
            .iter()
            .map(|sidecar| sidecar.beacon_block_slot.as_u64())
            .collect();
        assert_eq!(slots, vec![1, 2, 3]);
        assert_eq!(client_stream.output, pack(&request).unwrap());
    }

    #[tokio::test]
    async fn empty_range_closes_without_chunks() {
        let request = BlobsSidecarsByRangeRequest::new(Slot::new(100), 5);
        for strategy_scan in [true, false] {
            let (result, server_stream) = serve_request(&request, strategy_scan).await;
            assert_eq!(result.unwrap(), 0);
            assert!(server_stream.output.is_empty());
            assert!(server_stream.closed);
        }
    }

    #[tokio::test]
    async fn invalid_request_gets_status() {
        let request = BlobsSidecarsByRangeRequest::new(Slot::new(1), 0);
        let (result, server_stream) = serve_request(&request, false).await;
        assert!(matches!(result, Err(RangeSyncError::InvalidRequest(_))));

        let mut client_stream = MemoryStream::with_input(server_stream.output);
        let error = request_blobs_sidecars_by_range(&mut client_stream, &request)
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            RangeSyncError::Remote {
                status: RespStatus::InvalidRequest,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn garbage_request_is_invalid() {
        let (store, ancestry) = populated_store().await;
        let responder = RangeSyncResponder::new(store, ancestry);
        let mut garbage = 3u32.to_be_bytes().to_vec();
        garbage.extend_from_slice(&[1, 2, 3]);
        let mut stream = MemoryStream::with_input(garbage);
        let result = handle_incoming_stream(&mut stream, &responder).await;
        assert!(matches!(result, Err(RangeSyncError::InvalidRequest(_))));
        assert!(!stream.output.is_empty());
    }

    #[tokio::test]
    async fn client_rejects_excess_chunks() {
        let served = BlobsSidecarsByRangeRequest::new(Slot::new(1), 3);
        let (_, server_stream) = serve_request(&served, false).await;
        let asked = BlobsSidecarsByRangeRequest::new(Slot::new(1), 2);
        let mut client_stream = MemoryStream::with_input(server_stream.output);
        let error = request_blobs_sidecars_by_range(&mut client_stream, &asked)
            .await
            .unwrap_err();
        assert!(matches!(error, RangeSyncError::TooManyChunks { count: 2 }));
    }

    #[test]
    fn statuses_for_serving_errors() {
        let unreachable = RangeSyncError::Storage(StorageError::Backend(Box::new(
            io::Error::other("database closed"),
        )));
        assert_eq!(
            unreachable.status(),
            Some(RespStatus::ResourceUnavailable)
        );
        let corrupt = RangeSyncError::Storage(StorageError::CorruptIndex("slot".into()));
        assert_eq!(corrupt.status(), Some(RespStatus::ServerError));
        let dropped = RangeSyncError::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(dropped.status(), None);
    }

    fn range_sync_swarm(key: Keypair) -> Swarm<libp2p_stream::Behaviour> {
        SwarmBuilder::with_existing_identity(key)
            .with_tokio()
            .with_other_transport(|key| quic::tokio::Transport::new(quic::Config::new(key)))
            .unwrap()
            .with_behaviour(|_| libp2p_stream::Behaviour::new())
            .unwrap()
            .with_swarm_config(|cfg| {
                cfg.with_idle_connection_timeout(Duration::from_secs(u64::MAX))
            })
            .build()
    }

    #[tokio::test]
    async fn range_sync_between_two_peers() {
        let server_key = Keypair::generate_ed25519();
        let server_peer = PeerId::from_public_key(&server_key.public());
        let mut server_swarm = range_sync_swarm(server_key);
        let mut client_swarm = range_sync_swarm(Keypair::generate_ed25519());

        let (store, ancestry) = populated_store().await;
        let server = RangeSyncServer::new(
            &mut server_swarm.behaviour().new_control(),
            RangeSyncResponder::new(store, ancestry),
        )
        .unwrap();
        tokio::spawn(server.run());

        server_swarm
            .listen_on("/ip4/127.0.0.1/udp/0/quic-v1".parse().unwrap())
            .unwrap();
        let address: Multiaddr = loop {
            if let SwarmEvent::NewListenAddr { address, .. } =
                server_swarm.select_next_some().await
            {
                break address;
            }
        };
        tokio::spawn(async move {
            loop {
                let event = server_swarm.select_next_some().await;
                debug!("server swarm: {event:?}");
            }
        });

        client_swarm
            .dial(address.with_p2p(server_peer).unwrap())
            .unwrap();
        let connected = async {
            loop {
                if let SwarmEvent::ConnectionEstablished { peer_id, .. } =
                    client_swarm.select_next_some().await
                {
                    if peer_id == server_peer {
                        break;
                    }
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), connected)
            .await
            .unwrap();
        let mut client = RangeSyncClient::new(client_swarm.behaviour().new_control());
        tokio::spawn(async move {
            loop {
                let event = client_swarm.select_next_some().await;
                debug!("client swarm: {event:?}");
            }
        });

        let sidecars = tokio::time::timeout(
            Duration::from_secs(10),
            client.blobs_sidecars_by_range(
                server_peer,
                BlobsSidecarsByRangeRequest::new(Slot::new(1), 3),
            ),
        )
        .await
        .unwrap()
        .unwrap();
        let slots: Vec<u64> = sidecars
            .iter()
            .map(|sidecar| sidecar.beacon_block_slot.as_u64())
            .collect();
        assert_eq!(slots, vec![1, 2, 3]);

        let error = tokio::time::timeout(
            Duration::from_secs(10),
            client.blobs_sidecars_by_range(
                server_peer,
                BlobsSidecarsByRangeRequest::new(Slot::new(1), 0),
            ),
        )
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(
            error,
            RangeSyncError::Remote {
                status: RespStatus::InvalidRequest,
                ..
            }
        ));
    }
}
