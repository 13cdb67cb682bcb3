//! The peer networking substrate.

use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite};
use libp2p::{Multiaddr, PeerId, StreamProtocol, identity::Keypair};

use crate::PeerDirectory;

/// Transport providing authenticated streams between peers.
///
/// The remote peer id of every stream is authenticated by the substrate,
/// which is what request signature checks are bound to.
#[async_trait]
pub trait PeerNetwork: PeerDirectory + 'static {
    /// Bidirectional byte stream for one request.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// This node's identity key.
    fn keypair(&self) -> &Keypair;

    /// This node's peer id.
    fn local_peer_id(&self) -> PeerId {
        self.keypair().public().to_peer_id()
    }

    /// Open a stream to `peer` speaking `protocol`, dialing `addrs` if not
    /// already connected.
    async fn open_stream(
        &self,
        peer: PeerId,
        addrs: Vec<Multiaddr>,
        protocol: StreamProtocol,
    ) -> std::io::Result<Self::Stream>;
}
