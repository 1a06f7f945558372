// src/metrics/collector.rs
use anyhow::Result;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Client-facing requests
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,

    // Mirror probes
    pub probes_total: IntCounterVec,

    // Upstream fetches
    pub fetches_total: IntCounterVec,
    pub fetch_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new("failover_requests_total", "Total number of client requests"),
            &["method", "status_code"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "failover_request_duration_seconds",
                "Time until response headers were ready",
            ),
            &["method", "status_code"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let probes_total = IntCounterVec::new(
            Opts::new("failover_probes_total", "Mirror existence checks by outcome"),
            &["host", "outcome"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let fetches_total = IntCounterVec::new(
            Opts::new("failover_fetches_total", "Upstream fetches by result"),
            &["result"],
        )?;
        registry.register(Box::new(fetches_total.clone()))?;

        let fetch_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "failover_fetch_duration_seconds",
                "Time to receive upstream response headers",
            ),
            &["result"],
        )?;
        registry.register(Box::new(fetch_duration_seconds.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            probes_total,
            fetches_total,
            fetch_duration_seconds,
        })
    }

    pub fn record_request(&self, method: &str, status_code: u16, duration: std::time::Duration) {
        let status = status_code.to_string();
        self.requests_total
            .with_label_values(&[method, &status])
            .inc();

        self.request_duration_seconds
            .with_label_values(&[method, &status])
            .observe(duration.as_secs_f64());
    }

    pub fn record_probe(&self, host: &str, outcome: &str) {
        self.probes_total.with_label_values(&[host, outcome]).inc();
    }

    pub fn record_fetch(&self, success: bool, duration: std::time::Duration) {
        let result = if success { "success" } else { "failure" };
        self.fetches_total.with_label_values(&[result]).inc();

        self.fetch_duration_seconds
            .with_label_values(&[result])
            .observe(duration.as_secs_f64());
    }
}

// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
