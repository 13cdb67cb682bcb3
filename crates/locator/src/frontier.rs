//! Lookup frontier.

use std::collections::HashSet;

use shardline_primitives::PeerId;

/// Peers queried so far plus the candidates for the next round.
///
/// Once queried, a peer never becomes a candidate again. Candidates are
/// unique, so a peer named by several redirects in one round is asked once.
#[derive(Debug, Clone, Default)]
pub struct SearchFrontier {
    queried: HashSet<PeerId>,
    candidates: Vec<PeerId>,
}

impl SearchFrontier {
    /// Frontier seeded with `seeds`, with `local` already marked queried.
    pub fn new(local: PeerId, seeds: impl IntoIterator<Item = PeerId>) -> Self {
        let mut frontier = Self::default();
        frontier.queried.insert(local);
        frontier.extend(seeds);
        frontier
    }

    /// Add candidates, skipping queried and already pending peers.
    pub fn extend(&mut self, peers: impl IntoIterator<Item = PeerId>) {
        for peer in peers {
            if !self.queried.contains(&peer) && !self.candidates.contains(&peer) {
                self.candidates.push(peer);
            }
        }
    }

    /// Take every pending candidate and mark it queried.
    pub fn take_round(&mut self) -> Vec<PeerId> {
        let round = std::mem::take(&mut self.candidates);
        self.queried.extend(round.iter().copied());
        round
    }

    /// Whether no candidate is pending.
    pub fn is_exhausted(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Whether `peer` has been queried (or is the local node).
    pub fn is_queried(&self, peer: &PeerId) -> bool {
        self.queried.contains(peer)
    }

    /// Number of peers marked queried, including the local node.
    pub fn queried_len(&self) -> usize {
        self.queried.len()
    }
}
