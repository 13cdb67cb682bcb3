//! Estimates how far the local chain lags the network.
//!
//! The [`HealthMonitor`] samples the latest header of connected peers and
//! keeps the lag behind the highest one in a single atomic. Sync checks
//! requested by peers refresh it; health checks only read it. Sharding
//! nodes additionally refresh it on a fixed interval in the background.

mod config;
mod monitor;

pub use config::{DEFAULT_MAX_QUERY, DEFAULT_UPDATE_INTERVAL, HealthConfig};
pub use monitor::{FALL_BEHIND_UNKNOWN, HealthMonitor};
