// src/proxy/selector.rs
use super::prober::{ProbeOutcome, Prober};
use crate::metrics::MetricsCollector;
use std::sync::Arc;
use tracing::{info, warn};

/// First-match host selection over a fixed, ordered mirror list.
pub struct HostSelector {
    hosts: Arc<[String]>,
    prober: Arc<dyn Prober>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HostSelector {
    pub fn new(
        hosts: impl Into<Arc<[String]>>,
        prober: Arc<dyn Prober>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            hosts: hosts.into(),
            prober,
            metrics,
        }
    }

    /// Probe hosts in list order and return the resolved URL of the first one that
    /// has `path`. Hosts after the winner are not contacted. `None` when every host
    /// misses or is unreachable.
    pub async fn select(&self, path: &str) -> Option<String> {
        for host in self.hosts.iter() {
            let result = self.prober.probe(host, path).await;

            if let Some(metrics) = &self.metrics {
                metrics.record_probe(host, result.outcome.label());
            }

            match &result.outcome {
                ProbeOutcome::Available(status) => {
                    info!(url = %result.resolved_url, status = status.as_u16(), "good HEAD response");
                    return Some(result.resolved_url);
                }
                ProbeOutcome::Missing(status) => {
                    info!(url = %result.resolved_url, status = status.as_u16(), "bad HEAD response");
                }
                ProbeOutcome::Unreachable(reason) => {
                    warn!(url = %result.resolved_url, %reason, "HEAD request failed");
                }
            }
        }

        None
    }
}
