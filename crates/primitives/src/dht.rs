//! Identifiers in the DHT key space and the XOR metric over them.

use std::fmt;

use libp2p::PeerId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Size of a DHT identifier in bytes.
pub const DHT_ID_SIZE: usize = 32;

/// Fixed-width identifier used for peer-distance comparisons.
///
/// Chunks map into the space by hashing their content hash, peers by hashing
/// the byte encoding of their [`PeerId`]. Both use SHA-256 so the two sets of
/// identifiers are comparable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DhtId([u8; DHT_ID_SIZE]);

impl DhtId {
    /// Wrap raw identifier bytes.
    pub const fn new(bytes: [u8; DHT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Identifier of a chunk with the given content hash.
    pub fn from_content_hash(hash: &[u8]) -> Self {
        Self(Sha256::digest(hash).into())
    }

    /// Identifier of a peer.
    pub fn from_peer(peer: &PeerId) -> Self {
        Self(Sha256::digest(peer.to_bytes()).into())
    }

    /// XOR distance to `other`.
    pub fn distance(&self, other: &DhtId) -> DhtDistance {
        let mut out = [0u8; DHT_ID_SIZE];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a ^ b;
        }
        DhtDistance(out)
    }
}

impl From<[u8; DHT_ID_SIZE]> for DhtId {
    fn from(bytes: [u8; DHT_ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for DhtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for DhtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DhtId({})", hex::encode(self.0))
    }
}

/// XOR distance between two identifiers, ordered big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DhtDistance([u8; DHT_ID_SIZE]);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id_from_prefix(prefix: &[u8]) -> DhtId {
        let mut bytes = [0u8; DHT_ID_SIZE];
        bytes[..prefix.len()].copy_from_slice(prefix);
        DhtId::new(bytes)
    }

    #[test]
    fn test_distance_ordering() {
        let target = id_from_prefix(&[0x21]);
        let near = id_from_prefix(&[0x20]);
        let far = id_from_prefix(&[0x80]);
        assert!(target.distance(&near) < target.distance(&far));
        assert_eq!(target.distance(&target), DhtDistance([0; DHT_ID_SIZE]));
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        assert_eq!(DhtId::from_content_hash(b"h1"), DhtId::from_content_hash(b"h1"));
        assert_ne!(DhtId::from_content_hash(b"h1"), DhtId::from_content_hash(b"h2"));
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            let (a, b) = (DhtId::new(a), DhtId::new(b));
            prop_assert_eq!(a.distance(&b), b.distance(&a));
        }
    }
}
