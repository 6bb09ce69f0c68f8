//! Prometheus metrics for the WDI dashboard.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Metrics collector for the repository, the loader and the API.
///
/// Each instance owns its own registry, so several collectors can coexist
/// in one process.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    fetch_requests: IntCounter,
    fetch_errors: IntCounterVec,
    fetch_rows: IntCounter,
    fetch_latency: HistogramVec,
    api_requests: IntCounter,
    api_errors: IntCounter,
    api_latency: HistogramVec,
    observations_loaded: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let fetch_requests = IntCounter::new(
            "wdi_fetch_requests_total",
            "Total number of indicator repository fetches",
        )?;
        let fetch_errors = IntCounterVec::new(
            Opts::new(
                "wdi_fetch_errors_total",
                "Total number of failed repository fetches by error kind",
            ),
            &["kind"],
        )?;
        let fetch_rows = IntCounter::new(
            "wdi_fetch_rows_total",
            "Total number of rows returned by repository fetches",
        )?;
        let fetch_latency = HistogramVec::new(
            HistogramOpts::new(
                "wdi_fetch_latency_seconds",
                "Repository query latency in seconds",
            ),
            &["operation"],
        )?;
        let api_requests = IntCounter::new(
            "wdi_worldbank_requests_total",
            "Total number of World Bank API requests",
        )?;
        let api_errors = IntCounter::new(
            "wdi_worldbank_errors_total",
            "Total number of failed World Bank API attempts",
        )?;
        let api_latency = HistogramVec::new(
            HistogramOpts::new(
                "wdi_worldbank_latency_seconds",
                "World Bank API call latency in seconds",
            ),
            &["endpoint"],
        )?;
        let observations_loaded = IntCounter::new(
            "wdi_observations_loaded_total",
            "Total number of observations written by the loader",
        )?;

        registry.register(Box::new(fetch_requests.clone()))?;
        registry.register(Box::new(fetch_errors.clone()))?;
        registry.register(Box::new(fetch_rows.clone()))?;
        registry.register(Box::new(fetch_latency.clone()))?;
        registry.register(Box::new(api_requests.clone()))?;
        registry.register(Box::new(api_errors.clone()))?;
        registry.register(Box::new(api_latency.clone()))?;
        registry.register(Box::new(observations_loaded.clone()))?;

        Ok(Self {
            registry,
            fetch_requests,
            fetch_errors,
            fetch_rows,
            fetch_latency,
            api_requests,
            api_errors,
            api_latency,
            observations_loaded,
        })
    }

    /// Increment the fetch counter.
    pub fn inc_fetch_requests(&self) {
        self.fetch_requests.inc();
    }

    /// Increment the fetch error counter for an error kind
    /// (e.g. "connectivity", "schema", "database").
    pub fn inc_fetch_errors(&self, kind: &str) {
        self.fetch_errors.with_label_values(&[kind]).inc();
    }

    /// Add to the returned rows counter.
    pub fn inc_fetch_rows(&self, count: u64) {
        self.fetch_rows.inc_by(count);
    }

    /// Record repository query latency.
    pub fn observe_fetch_latency(&self, operation: &str, duration_secs: f64) {
        self.fetch_latency
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    /// Increment the World Bank request counter.
    pub fn inc_api_requests(&self) {
        self.api_requests.inc();
    }

    /// Increment the World Bank error counter.
    pub fn inc_api_errors(&self) {
        self.api_errors.inc();
    }

    /// Record World Bank API latency.
    pub fn observe_api_latency(&self, endpoint: &str, duration_secs: f64) {
        self.api_latency
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    /// Add to the loaded observations counter.
    pub fn inc_observations_loaded(&self, count: u64) {
        self.observations_loaded.inc_by(count);
    }

    /// Get Prometheus metrics as a string.
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
