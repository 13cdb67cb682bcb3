//! In-process peer substrate.
//!
//! Every [`SimNetwork`] attached to a [`SimHub`] can open streams to every
//! other registered peer. A stream is an in-memory duplex pipe; the remote
//! side is handed to the target's [`InboundHandler`] on a spawned task.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use futures::future::BoxFuture;
use libp2p::{Multiaddr, PeerId, StreamProtocol, identity::Keypair};
use parking_lot::{Mutex, RwLock};
use shardline_api::{PeerDirectory, PeerNetwork};
use shardline_net_proto::{P2PRequest, P2PResponse, read_request, write_response};
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

/// Stream type of [`SimNetwork`].
pub type SimStream = Compat<tokio::io::DuplexStream>;

/// Serves one inbound stream: `(remote peer, protocol, stream)`.
pub type InboundHandler =
    Arc<dyn Fn(PeerId, StreamProtocol, SimStream) -> BoxFuture<'static, ()> + Send + Sync>;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Shared registry of simulated peers.
#[derive(Default)]
pub struct SimHub {
    handlers: RwLock<HashMap<PeerId, InboundHandler>>,
    stalled: RwLock<HashSet<PeerId>>,
    opened: Mutex<Vec<(PeerId, PeerId, Vec<Multiaddr>)>>,
}

impl std::fmt::Debug for SimHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimHub")
            .field("peers", &self.handlers.read().len())
            .finish_non_exhaustive()
    }
}

impl SimHub {
    /// Empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a node with a fresh identity.
    pub fn network(self: &Arc<Self>) -> Arc<SimNetwork> {
        self.network_with_keypair(Keypair::generate_ed25519())
    }

    /// Attach a node with the given identity.
    pub fn network_with_keypair(self: &Arc<Self>, keypair: Keypair) -> Arc<SimNetwork> {
        Arc::new(SimNetwork {
            hub: self.clone(),
            keypair,
            connected: RwLock::new(Vec::new()),
        })
    }

    /// Serve inbound streams for `peer` with `handler`.
    pub fn register(&self, peer: PeerId, handler: InboundHandler) {
        self.handlers.write().insert(peer, handler);
    }

    /// Serve `peer` by verifying each request and answering with `respond`.
    pub fn register_responder<F>(&self, peer: PeerId, respond: F)
    where
        F: Fn(PeerId, P2PRequest) -> P2PResponse + Send + Sync + 'static,
    {
        let respond = Arc::new(respond);
        self.register(
            peer,
            Arc::new(move |remote, _protocol, mut stream| {
                let respond = respond.clone();
                Box::pin(async move {
                    let Ok(signed) = read_request(&mut stream).await else {
                        return;
                    };
                    let response = match signed.verify(&remote) {
                        Ok(request) => respond(remote, request),
                        Err(err) => P2PResponse::error(err),
                    };
                    let _ = write_response(&mut stream, &response).await;
                })
            }),
        );
    }

    /// Make stream opens to `peer` hang forever.
    pub fn stall(&self, peer: PeerId) {
        self.stalled.write().insert(peer);
    }

    /// Streams opened so far as `(from, to, dialed addresses)`.
    pub fn opened_streams(&self) -> Vec<(PeerId, PeerId, Vec<Multiaddr>)> {
        self.opened.lock().clone()
    }
}

/// One node's view of a [`SimHub`].
pub struct SimNetwork {
    hub: Arc<SimHub>,
    keypair: Keypair,
    connected: RwLock<Vec<PeerId>>,
}

impl std::fmt::Debug for SimNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimNetwork")
            .field("peer", &self.keypair.public().to_peer_id())
            .finish_non_exhaustive()
    }
}

impl SimNetwork {
    /// Report `peers` as connected.
    pub fn set_connected(&self, peers: Vec<PeerId>) {
        *self.connected.write() = peers;
    }

    /// The hub this node is attached to.
    pub fn hub(&self) -> &Arc<SimHub> {
        &self.hub
    }
}

impl PeerDirectory for SimNetwork {
    fn connected_peers(&self) -> Vec<PeerId> {
        self.connected.read().clone()
    }
}

#[async_trait]
impl PeerNetwork for SimNetwork {
    type Stream = SimStream;

    fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    async fn open_stream(
        &self,
        peer: PeerId,
        addrs: Vec<Multiaddr>,
        protocol: StreamProtocol,
    ) -> std::io::Result<Self::Stream> {
        let local = self.local_peer_id();
        self.hub.opened.lock().push((local, peer, addrs));

        let stalled = self.hub.stalled.read().contains(&peer);
        if stalled {
            std::future::pending::<()>().await;
        }
        let handler = self.hub.handlers.read().get(&peer).cloned();
        let Some(handler) = handler else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("peer {peer} is not reachable"),
            ));
        };

        let (ours, theirs) = tokio::io::duplex(PIPE_CAPACITY);
        tokio::spawn(handler(local, protocol, theirs.compat()));
        Ok(ours.compat())
    }
}
