//! Node configuration handling.
//!
//! Configuration is split into submodules:
//! - `protocol` - lookup, backfill, health and routing settings
//! - `network` - outbound request timeouts
//!
//! Every field has a default, so an empty file is a valid configuration.

mod network;
mod protocol;

pub use network::ExchangeSettings;
pub use protocol::{BackfillSettings, HealthSettings, LocatorSettings, TopologySettings};

use std::{fs, path::Path, time::Duration};

use eyre::{Result, WrapErr};
use libp2p::{Multiaddr, PeerId, multiaddr::Protocol};
use serde::{Deserialize, Serialize};
use shardline_backfill::BackfillConfig;
use shardline_health::HealthConfig;
use shardline_locator::LocatorConfig;
use shardline_net_client::ExchangeConfig;
use shardline_observability::{LoggingConfig, MetricsConfig};
use shardline_primitives::NodeRole;
use shardline_topology::TopologyConfig;

/// Invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A full node address cannot be dialed by peer id.
    #[error("full node address {addr} does not end in /p2p/<peer id>")]
    MissingPeerId {
        /// The offending address.
        addr: Multiaddr,
    },

    /// A count that must be positive is zero.
    #[error("{field} must be at least 1")]
    Zero {
        /// Name of the setting.
        field: &'static str,
    },
}

/// A full node as configured: its peer id and the address to dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullNodeAddr {
    /// Peer id taken from the trailing `/p2p` component.
    pub peer_id: PeerId,
    /// The address without the `/p2p` component.
    pub addr: Multiaddr,
}

impl TryFrom<&Multiaddr> for FullNodeAddr {
    type Error = ConfigError;

    fn try_from(addr: &Multiaddr) -> Result<Self, Self::Error> {
        let mut dial = addr.clone();
        match dial.pop() {
            Some(Protocol::P2p(peer_id)) => Ok(Self {
                peer_id,
                addr: dial,
            }),
            _ => Err(ConfigError::MissingPeerId { addr: addr.clone() }),
        }
    }
}

/// Configuration for a Shardline node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Full nodes keep all history and never run sharded lookups.
    pub role: NodeRole,

    /// Test networks do not retry failed lookups.
    pub testnet: bool,

    /// Chunk lookup
    pub locator: LocatorSettings,

    /// Outbound request timeouts
    pub exchange: ExchangeSettings,

    /// Sync sampling
    pub health: HealthSettings,

    /// Routing table refresh
    pub topology: TopologySettings,

    /// History backfill
    pub backfill: BackfillSettings,

    /// Full nodes asked when a sharded lookup fails, as
    /// `<address>/p2p/<peer id>`.
    pub full_nodes: Vec<Multiaddr>,

    /// Logging
    pub logging: LoggingConfig,

    /// Prometheus exporter
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    /// Parse a TOML configuration.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).wrap_err("invalid node configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).wrap_err_with(|| format!("failed to load {}", path.display()))
    }

    /// Load the configuration from `path`, or the defaults if it does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the configuration to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check values that would make a component unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("locator.alpha", self.locator.alpha),
            ("locator.max_attempts", self.locator.max_attempts),
            ("locator.max_concurrent_queries", self.locator.max_concurrent_queries),
            ("health.max_query", self.health.max_query),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        self.full_node_addrs().map(|_| ())
    }

    /// Configured full nodes.
    pub fn full_node_addrs(&self) -> Result<Vec<FullNodeAddr>, ConfigError> {
        self.full_nodes.iter().map(FullNodeAddr::try_from).collect()
    }

    /// Runtime lookup configuration.
    pub fn locator_config(&self) -> Result<LocatorConfig, ConfigError> {
        let full_nodes = self
            .full_node_addrs()?
            .into_iter()
            .map(|full| full.peer_id)
            .collect();
        Ok(LocatorConfig::default()
            .with_alpha(self.locator.alpha)
            .with_max_attempts(self.locator.max_attempts)
            .with_retry_interval(Duration::from_secs(self.locator.retry_interval_secs))
            .with_lookup_budget(Duration::from_secs(self.locator.lookup_budget_secs))
            .with_max_concurrent_queries(self.locator.max_concurrent_queries)
            .with_role(self.role)
            .with_testnet(self.testnet)
            .with_full_nodes(full_nodes))
    }

    /// Runtime request client configuration.
    pub fn exchange_config(&self) -> ExchangeConfig {
        self.exchange.to_config()
    }

    /// Runtime health monitor configuration.
    pub fn health_config(&self) -> HealthConfig {
        self.health.to_config()
    }

    /// Runtime routing table configuration.
    pub fn topology_config(&self) -> TopologyConfig {
        self.topology.to_config(self.health.healthy_fall_behind)
    }

    /// Runtime backfill configuration.
    pub fn backfill_config(&self) -> BackfillConfig {
        self.backfill.to_config()
    }
}
