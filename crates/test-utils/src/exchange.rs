//! Scripted chunk exchange.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shardline_api::{ExchangeError, ExchangeOutcome, LookupContext, PeerExchange};
use shardline_primitives::{BlockBodies, ChunkKey, PeerId};

/// How a scripted peer answers a chunk request.
#[derive(Debug, Clone)]
pub enum PeerBehavior {
    /// Return these bodies.
    Body(BlockBodies),
    /// Redirect to these peers.
    Redirect(Vec<PeerId>),
    /// Answer with an error string.
    Remote(String),
    /// Never answer; only the lookup context ends the request.
    Stall,
}

/// [`PeerExchange`] answering from a per-peer script and logging every
/// query. Unscripted peers fail with a dial error.
#[derive(Debug, Default)]
pub struct ScriptedExchange {
    behaviors: RwLock<HashMap<PeerId, PeerBehavior>>,
    log: Mutex<Vec<PeerId>>,
}

impl ScriptedExchange {
    /// Exchange where every peer is unreachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `peer`.
    pub fn with(self, peer: PeerId, behavior: PeerBehavior) -> Self {
        self.set(peer, behavior);
        self
    }

    /// Script or re-script `peer`.
    pub fn set(&self, peer: PeerId, behavior: PeerBehavior) {
        self.behaviors.write().insert(peer, behavior);
    }

    /// Every queried peer, in query order.
    pub fn queries(&self) -> Vec<PeerId> {
        self.log.lock().clone()
    }

    /// Number of times `peer` was queried.
    pub fn query_count(&self, peer: &PeerId) -> usize {
        self.log.lock().iter().filter(|p| *p == peer).count()
    }
}

#[async_trait]
impl PeerExchange for ScriptedExchange {
    async fn exchange(
        &self,
        ctx: &LookupContext,
        peer: PeerId,
        _key: &ChunkKey,
    ) -> Result<ExchangeOutcome, ExchangeError> {
        self.log.lock().push(peer);
        let behavior = self.behaviors.read().get(&peer).cloned();
        match behavior {
            Some(PeerBehavior::Body(bodies)) => Ok(ExchangeOutcome::Body(bodies)),
            Some(PeerBehavior::Redirect(peers)) => Ok(ExchangeOutcome::Redirect(peers)),
            Some(PeerBehavior::Remote(message)) => Err(ExchangeError::Remote { message }),
            Some(PeerBehavior::Stall) => match ctx.run(std::future::pending::<()>()).await {
                Ok(()) => Err(ExchangeError::Cancelled),
                Err(interrupted) => Err(interrupted.into()),
            },
            None => Err(ExchangeError::Dial {
                peer,
                reason: "connection refused".to_string(),
            }),
        }
    }
}
