//! In-memory address book (does not persist across restarts).

use std::{collections::HashMap, sync::Arc, time::Duration};

use libp2p::{Multiaddr, PeerId};
use parking_lot::RwLock;
use shardline_api::{AddressBook, deadline_after};
use shardline_tasks::TaskExecutor;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, info, trace};

/// Default period between sweeps of expired addresses.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Addresses of remote peers, each expiring independently.
#[derive(Debug, Default)]
pub struct MemoryAddressBook {
    peers: RwLock<HashMap<PeerId, HashMap<Multiaddr, Instant>>>,
}

impl MemoryAddressBook {
    /// Create an empty address book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of peers with at least one address entry, expired or not.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether the book holds no entries.
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Remove expired addresses and peers left without any.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut peers = self.peers.write();
        peers.retain(|_, addrs| {
            addrs.retain(|_, expires| *expires > now);
            !addrs.is_empty()
        });
    }

    /// Spawn a loop on `executor` that calls [`Self::prune`] every
    /// `interval` until shutdown.
    pub fn spawn_prune_loop(self: Arc<Self>, interval: Duration, executor: &TaskExecutor) -> JoinHandle<()> {
        executor.spawn_with_graceful_shutdown_signal("address_book_prune", move |shutdown| async move {
            info!(?interval, "address book prune loop started");
            let mut shutdown = std::pin::pin!(shutdown);
            loop {
                tokio::select! {
                    guard = &mut shutdown => {
                        debug!("address book prune loop shutting down");
                        drop(guard);
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        self.prune();
                        trace!(peers = self.len(), "address book pruned");
                    }
                }
            }
        })
    }
}

impl AddressBook for MemoryAddressBook {
    fn add_addrs(&self, peer: PeerId, addrs: Vec<Multiaddr>, ttl: Duration) {
        if addrs.is_empty() {
            return;
        }
        let expires = deadline_after(ttl);
        let mut peers = self.peers.write();
        let entry = peers.entry(peer).or_default();
        for addr in addrs {
            let slot = entry.entry(addr).or_insert(expires);
            *slot = (*slot).max(expires);
        }
        trace!(%peer, count = entry.len(), "address book updated");
    }

    fn addrs(&self, peer: &PeerId) -> Vec<Multiaddr> {
        let now = Instant::now();
        self.peers
            .read()
            .get(peer)
            .map(|addrs| {
                addrs
                    .iter()
                    .filter(|(_, expires)| **expires > now)
                    .map(|(addr, _)| addr.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardline_tasks::TaskManager;

    fn addr(n: u8) -> Multiaddr {
        format!("/ip4/127.0.0.{n}/tcp/13803").parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_addresses_expire() {
        let book = MemoryAddressBook::new();
        let peer = PeerId::random();
        book.add_addrs(peer, vec![addr(1)], Duration::from_secs(3600));
        assert_eq!(book.addrs(&peer), vec![addr(1)]);

        tokio::time::advance(Duration::from_secs(3601)).await;
        assert!(book.addrs(&peer).is_empty());

        book.prune();
        assert!(book.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readding_keeps_later_expiry() {
        let book = MemoryAddressBook::new();
        let peer = PeerId::random();
        book.add_addrs(peer, vec![addr(1)], Duration::from_secs(3600));
        book.add_addrs(peer, vec![addr(1), addr(2)], Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(book.addrs(&peer), vec![addr(1)]);
        assert_eq!(book.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_ttl_never_expires() {
        let book = MemoryAddressBook::new();
        let peer = PeerId::random();
        book.add_addrs(peer, vec![addr(1)], Duration::MAX);
        book.add_addrs(peer, vec![addr(1)], Duration::from_secs(u64::MAX));

        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        book.prune();
        assert_eq!(book.addrs(&peer), vec![addr(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_loop_drops_expired_peers() {
        let manager = TaskManager::current();
        let book = Arc::new(MemoryAddressBook::new());
        let (stale, fresh) = (PeerId::random(), PeerId::random());
        book.add_addrs(stale, vec![addr(1)], Duration::from_secs(30));
        book.add_addrs(fresh, vec![addr(2)], Duration::from_secs(3600));

        book.clone().spawn_prune_loop(Duration::from_secs(60), &manager.executor());
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(book.len(), 1);
        assert_eq!(book.addrs(&fresh), vec![addr(2)]);

        assert!(manager.graceful_shutdown_with_timeout(Duration::from_secs(5)).await);
    }

    #[test]
    fn test_unknown_peer_has_no_addresses() {
        let book = MemoryAddressBook::new();
        book.add_addrs(PeerId::random(), Vec::new(), Duration::from_secs(1));
        assert!(book.is_empty());
        assert!(book.addrs(&PeerId::random()).is_empty());
    }
}
