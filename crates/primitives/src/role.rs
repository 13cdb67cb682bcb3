use serde::{Deserialize, Serialize};

/// Node role determining storage duties.
///
/// Full nodes keep complete history and serve as the last-resort source for
/// sharded lookups. Sharding nodes keep a subset of chunks and locate the
/// rest through the DHT.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeRole {
    /// Archival node retaining complete history.
    Full,

    /// Node storing only the chunks it is responsible for.
    #[default]
    Sharding,
}

impl NodeRole {
    /// Returns true for archival nodes.
    pub fn is_full(&self) -> bool {
        matches!(self, NodeRole::Full)
    }

    /// Returns true if this role keeps the fall-behind estimate current.
    pub fn tracks_health(&self) -> bool {
        matches!(self, NodeRole::Sharding)
    }

    /// Returns true if this role retries lookups and falls back to full nodes.
    pub fn retries_lookups(&self) -> bool {
        matches!(self, NodeRole::Sharding)
    }
}
