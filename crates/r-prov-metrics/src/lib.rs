//! ---
//! prov_section: "03-persistence-logging"
//! prov_subsection: "module"
//! prov_type: "source"
//! prov_scope: "code"
//! prov_description: "Metrics collection and export utilities."
//! prov_version: "v0.0.0-prealpha"
//! prov_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use r_prov_common::MetricsConfig;
use tracing::{debug, error};

/// Shared registry type used across crates.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Encode every registered family in the prometheus text exposition format.
pub fn render(registry: &Registry) -> Result<String> {
    let families = registry.gather();
    TextEncoder::new()
        .encode_to_string(&families)
        .map_err(|err| {
            error!(error = %err, "failed to encode metrics");
            err
        })
        .context("metrics encoding error")
}

/// Metrics published by the adapter orchestration pipeline.
#[derive(Clone)]
pub struct AdapterMetrics {
    registry: SharedRegistry,
    requests_total: IntCounterVec,
    retries_total: IntCounterVec,
    outcomes_total: IntCounterVec,
}

impl AdapterMetrics {
    /// Register the adapter metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "r_prov_adapter_requests_total",
                "Requests accepted by the adapter pipeline",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let retries_total = IntCounterVec::new(
            Opts::new(
                "r_prov_adapter_retries_total",
                "Backend command retries scheduled after a retryable failure",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let outcomes_total = IntCounterVec::new(
            Opts::new(
                "r_prov_adapter_outcomes_total",
                "Requests reaching a terminal stage",
            ),
            &["operation", "stage"],
        )?;
        registry.register(Box::new(outcomes_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            retries_total,
            outcomes_total,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_request(&self, operation: &str) {
        self.requests_total.with_label_values(&[operation]).inc();
    }

    pub fn inc_retry(&self, operation: &str) {
        self.retries_total.with_label_values(&[operation]).inc();
    }

    /// Record the terminal stage (`finished` or `failed`) reached by a request.
    pub fn record_outcome(&self, operation: &str, stage: &str) {
        self.outcomes_total
            .with_label_values(&[operation, stage])
            .inc();
    }
}

impl std::fmt::Debug for AdapterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterMetrics").finish_non_exhaustive()
    }
}

/// Metrics published by the closure execution drivers and the trust cache.
#[derive(Clone)]
pub struct DriverMetrics {
    launches_total: IntCounterVec,
    removals_total: IntCounterVec,
    trust_refreshes_total: IntCounterVec,
    trust_certificates: IntGauge,
}

impl DriverMetrics {
    /// Register the driver metric family against the provided registry.
    pub fn new(registry: &Registry) -> Result<Self> {
        let launches_total = IntCounterVec::new(
            Opts::new(
                "r_prov_closures_launches_total",
                "Execution container launch requests",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(launches_total.clone()))?;

        let removals_total = IntCounterVec::new(
            Opts::new(
                "r_prov_closures_removals_total",
                "Execution container removals attempted",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(removals_total.clone()))?;

        let trust_refreshes_total = IntCounterVec::new(
            Opts::new(
                "r_prov_trust_refreshes_total",
                "Trust certificate cache refreshes",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(trust_refreshes_total.clone()))?;

        let trust_certificates = IntGauge::new(
            "r_prov_trust_certificates",
            "Certificates in the published trust bundle",
        )?;
        registry.register(Box::new(trust_certificates.clone()))?;

        Ok(Self {
            launches_total,
            removals_total,
            trust_refreshes_total,
            trust_certificates,
        })
    }

    /// Count an execution container launch.
    pub fn record_launch(&self, success: bool) {
        self.launches_total
            .with_label_values(&[outcome_label(success)])
            .inc();
    }

    /// Count an execution container removal.
    pub fn record_removal(&self, success: bool) {
        self.removals_total
            .with_label_values(&[outcome_label(success)])
            .inc();
    }

    /// Record a trust refresh and, when it succeeded, the published bundle size.
    pub fn record_trust_refresh(&self, certificates: Option<usize>) {
        self.trust_refreshes_total
            .with_label_values(&[outcome_label(certificates.is_some())])
            .inc();
        if let Some(count) = certificates {
            self.trust_certificates
                .set(i64::try_from(count).unwrap_or(i64::MAX));
        }
    }
}

impl std::fmt::Debug for DriverMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverMetrics").finish_non_exhaustive()
    }
}

/// Adapter and driver metrics sharing one registry.
#[derive(Debug, Clone)]
pub struct ProvMetrics {
    pub adapter: AdapterMetrics,
    pub driver: DriverMetrics,
}

impl ProvMetrics {
    /// Register both bundles on a fresh registry, or return `None` when the
    /// `[metrics]` section disables collection.
    pub fn from_config(config: &MetricsConfig) -> Result<Option<Self>> {
        if !config.enabled {
            debug!("metrics collection disabled by configuration");
            return Ok(None);
        }
        let registry = new_registry();
        let driver = DriverMetrics::new(&registry).context("registering driver metrics")?;
        let adapter = AdapterMetrics::new(registry).context("registering adapter metrics")?;
        Ok(Some(Self { adapter, driver }))
    }

    pub fn registry(&self) -> SharedRegistry {
        self.adapter.registry()
    }

    /// Render every metric family in the shared registry.
    pub fn render(&self) -> Result<String> {
        render(&self.registry())
    }
}

fn outcome_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_metrics_render() {
        let registry = new_registry();
        let metrics = AdapterMetrics::new(registry.clone()).unwrap();
        metrics.inc_request("CREATE");
        metrics.inc_retry("CREATE");
        metrics.inc_retry("CREATE");
        metrics.record_outcome("CREATE", "finished");

        let text = render(&registry).unwrap();
        assert!(text.contains("r_prov_adapter_requests_total{operation=\"CREATE\"} 1"));
        assert!(text.contains("r_prov_adapter_retries_total{operation=\"CREATE\"} 2"));
        assert!(text.contains("stage=\"finished\""));
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = new_registry();
        AdapterMetrics::new(registry.clone()).unwrap();
        assert!(AdapterMetrics::new(registry).is_err());
    }

    #[test]
    fn driver_metrics_track_trust_bundle_size() {
        let registry = new_registry();
        let metrics = DriverMetrics::new(&registry).unwrap();
        metrics.record_trust_refresh(Some(3));
        metrics.record_trust_refresh(None);
        metrics.record_launch(true);
        metrics.record_removal(false);

        let text = render(&registry).unwrap();
        assert!(text.contains("r_prov_trust_certificates 3"));
        assert!(text.contains("r_prov_trust_refreshes_total{outcome=\"failure\"} 1"));
        assert!(text.contains("r_prov_closures_removals_total{outcome=\"failure\"} 1"));
    }

    #[test]
    fn disabled_configuration_builds_no_metrics() {
        let config = MetricsConfig { enabled: false };
        assert!(ProvMetrics::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn enabled_configuration_shares_one_registry() {
        let metrics = ProvMetrics::from_config(&MetricsConfig::default())
            .unwrap()
            .expect("metrics enabled by default");
        metrics.adapter.inc_request("LIST");
        metrics.driver.record_launch(true);

        let text = metrics.render().unwrap();
        assert!(text.contains("r_prov_adapter_requests_total{operation=\"LIST\"} 1"));
        assert!(text.contains("r_prov_closures_launches_total{outcome=\"success\"} 1"));
    }
}
