//! Client timeouts.

use std::time::Duration;

/// Default time allowed to open a stream.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default time allowed to write a request and read the response.
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Default validity of addresses learned from redirects.
pub const DEFAULT_REDIRECT_TTL: Duration = Duration::from_secs(60 * 60);

/// Default bound on header, record and health requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`NetworkClient`](crate::NetworkClient).
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Time allowed to open a stream.
    pub dial_timeout: Duration,
    /// Time allowed to write the request and read the full response.
    pub read_deadline: Duration,
    /// Validity of addresses learned from redirects.
    pub redirect_ttl: Duration,
    /// Bound on a single header, record or health request.
    pub request_timeout: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            read_deadline: DEFAULT_READ_DEADLINE,
            redirect_ttl: DEFAULT_REDIRECT_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ExchangeConfig {
    /// Set the stream open timeout.
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the response read deadline.
    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.read_deadline = deadline;
        self
    }

    /// Set the redirect address TTL.
    pub fn with_redirect_ttl(mut self, ttl: Duration) -> Self {
        self.redirect_ttl = ttl;
        self
    }

    /// Set the timeout for header, record and health requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
