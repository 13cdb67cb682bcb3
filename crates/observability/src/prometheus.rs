//! Prometheus metrics recorder.

use std::{net::SocketAddr, time::Duration};

use eyre::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use shardline_tasks::TaskExecutor;
use tracing::{debug, info, warn};

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics` on this address. Metrics are not recorded when unset.
    pub listen: Option<SocketAddr>,
    /// Seconds between histogram upkeep passes.
    pub upkeep_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen: None,
            upkeep_interval_secs: 5,
        }
    }
}

impl MetricsConfig {
    /// Serve metrics on `addr`.
    pub fn with_listen(mut self, addr: SocketAddr) -> Self {
        self.listen = Some(addr);
        self
    }
}

/// Install the global Prometheus recorder and spawn its HTTP exporter and
/// upkeep loop on `executor`.
///
/// Returns `None` without installing anything when no listen address is
/// configured.
pub fn install_prometheus_recorder(
    config: &MetricsConfig,
    executor: &TaskExecutor,
) -> eyre::Result<Option<PrometheusHandle>> {
    let Some(listen) = config.listen else {
        debug!("metrics listener not configured");
        return Ok(None);
    };

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(listen)
        .build()
        .wrap_err("failed to build prometheus recorder")?;
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|_| eyre::eyre!("a global metrics recorder is already installed"))?;

    executor.spawn(async move {
        if let Err(err) = exporter.await {
            warn!(?err, "prometheus exporter stopped");
        }
    });

    let upkeep = handle.clone();
    let interval = Duration::from_secs(config.upkeep_interval_secs.max(1));
    executor.spawn_with_graceful_shutdown_signal("prometheus_upkeep", move |shutdown| {
        async move {
            let mut shutdown = std::pin::pin!(shutdown);
            loop {
                tokio::select! {
                    guard = &mut shutdown => {
                        drop(guard);
                        break;
                    }
                    _ = tokio::time::sleep(interval) => upkeep.run_upkeep(),
                }
            }
        }
    });

    info!(%listen, "serving prometheus metrics");
    Ok(Some(handle))
}
