//! Request client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardline_net_client::{
    DEFAULT_DIAL_TIMEOUT, DEFAULT_READ_DEADLINE, DEFAULT_REDIRECT_TTL, DEFAULT_REQUEST_TIMEOUT,
    ExchangeConfig,
};

/// Timeouts of outbound requests, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeSettings {
    /// Opening a stream to a peer.
    pub dial_timeout_secs: u64,
    /// Writing a chunk request and reading its response.
    pub read_deadline_secs: u64,
    /// How long addresses learned from redirects stay valid.
    pub redirect_ttl_secs: u64,
    /// Whole round trip of header, health and record requests.
    pub request_timeout_secs: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            dial_timeout_secs: DEFAULT_DIAL_TIMEOUT.as_secs(),
            read_deadline_secs: DEFAULT_READ_DEADLINE.as_secs(),
            redirect_ttl_secs: DEFAULT_REDIRECT_TTL.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl ExchangeSettings {
    pub(crate) fn to_config(&self) -> ExchangeConfig {
        ExchangeConfig::default()
            .with_dial_timeout(Duration::from_secs(self.dial_timeout_secs))
            .with_read_deadline(Duration::from_secs(self.read_deadline_secs))
            .with_redirect_ttl(Duration::from_secs(self.redirect_ttl_secs))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}
