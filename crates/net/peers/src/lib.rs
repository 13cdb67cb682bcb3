//! Peer address tracking.
//!
//! Addresses learned from redirects are only useful for a while, so each
//! entry carries its own expiry and lookups ignore expired ones.

mod book;

pub use book::{DEFAULT_PRUNE_INTERVAL, MemoryAddressBook};
