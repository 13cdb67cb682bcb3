//! Observability for Shardline nodes.
//!
//! - [`initialize_logging`] installs the global `tracing` subscriber.
//! - [`install_prometheus_recorder`] installs the global `metrics` recorder
//!   and serves it over HTTP.

mod logging;
mod prometheus;

pub use logging::{LOG_FILE_NAME, LoggingConfig, initialize_logging};
pub use prometheus::{MetricsConfig, install_prometheus_recorder};
pub use tracing_appender::non_blocking::WorkerGuard;
