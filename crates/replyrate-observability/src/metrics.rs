//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for ReplyRate:
//! - Aggregate fetch counts by period field and outcome
//! - Aggregate fetch latency
//! - Dashboard refresh, debounce and supersede counts

use prometheus::{Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for ReplyRate
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Aggregate fetches by field (period/period_compare) and outcome (success/failure)
    pub fetches_total: CounterVec,
    /// Aggregate fetch duration by field
    pub fetch_duration_seconds: HistogramVec,

    /// Filter submissions received from the form
    pub filter_changes_total: Counter,
    /// Refreshes actually started after debouncing
    pub refreshes_total: Counter,
    /// In-flight refreshes cancelled by a newer selection
    pub refreshes_superseded_total: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let fetches_total = CounterVec::new(
            Opts::new("replyrate_fetches_total", "Total number of aggregate fetches"),
            &["field", "outcome"],
        )?;

        let fetch_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "replyrate_fetch_duration_seconds",
                "Aggregate fetch duration in seconds",
            )
            // Aggregations are slow; buckets reach well past the default 10s
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
            &["field"],
        )?;

        let filter_changes_total = Counter::with_opts(Opts::new(
            "replyrate_filter_changes_total",
            "Total number of filter submissions",
        ))?;

        let refreshes_total = Counter::with_opts(Opts::new(
            "replyrate_refreshes_total",
            "Total number of dashboard refreshes started",
        ))?;

        let refreshes_superseded_total = Counter::with_opts(Opts::new(
            "replyrate_refreshes_superseded_total",
            "Total number of in-flight refreshes cancelled by a newer selection",
        ))?;

        registry.register(Box::new(fetches_total.clone()))?;
        registry.register(Box::new(fetch_duration_seconds.clone()))?;
        registry.register(Box::new(filter_changes_total.clone()))?;
        registry.register(Box::new(refreshes_total.clone()))?;
        registry.register(Box::new(refreshes_superseded_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            fetches_total,
            fetch_duration_seconds,
            filter_changes_total,
            refreshes_total,
            refreshes_superseded_total,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one finished aggregate fetch
    pub fn record_fetch(&self, field: &str, success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "failure" };
        self.fetches_total.with_label_values(&[field, outcome]).inc();
        self.fetch_duration_seconds
            .with_label_values(&[field])
            .observe(duration_secs);
    }

    pub fn record_filter_change(&self) {
        self.filter_changes_total.inc();
    }

    pub fn record_refresh(&self) {
        self.refreshes_total.inc();
    }

    pub fn record_superseded(&self) {
        self.refreshes_superseded_total.inc();
    }
}
