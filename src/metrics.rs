use prometheus::{histogram_opts, opts, HistogramVec, IntCounterVec, Registry};
use tokio::time::Instant;

use crate::federation::Degradation;
use crate::Error;

#[derive(Clone)]
pub struct Metrics {
    pub passes: IntCounterVec,
    pub failures: IntCounterVec,
    pub degraded: IntCounterVec,
    pub cache_lookups: IntCounterVec,
    pub pass_duration: HistogramVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let pass_duration = HistogramVec::new(
            histogram_opts!(
                "hub_monitor_pass_duration_seconds",
                "The duration of aggregation passes in seconds"
            )
            .buckets(vec![0.1, 0.5, 1., 5., 15., 30., 60., 120.]),
            &["scope"],
        )
        .unwrap();
        let passes = IntCounterVec::new(
            opts!("hub_monitor_passes_total", "aggregation passes"),
            &["scope", "outcome"],
        )
        .unwrap();
        let failures = IntCounterVec::new(
            opts!("hub_monitor_pass_errors_total", "failed aggregation passes"),
            &["scope", "error"],
        )
        .unwrap();
        let degraded = IntCounterVec::new(
            opts!("hub_monitor_degraded_queries_total", "sub-queries that failed without failing their pass"),
            &["query"],
        )
        .unwrap();
        let cache_lookups = IntCounterVec::new(
            opts!("hub_monitor_cache_lookups_total", "result cache lookups"),
            &["result"],
        )
        .unwrap();
        Metrics {
            passes,
            failures,
            degraded,
            cache_lookups,
            pass_duration,
        }
    }
}

impl Metrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.pass_duration.clone()))?;
        registry.register(Box::new(self.passes.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.degraded.clone()))?;
        registry.register(Box::new(self.cache_lookups.clone()))?;
        Ok(self)
    }

    pub fn pass_failure(&self, scope: &str, e: &Error) {
        self.failures
            .with_label_values(&[scope, e.metric_label().as_ref()])
            .inc()
    }

    pub fn degradation(&self, degradation: &Degradation) {
        self.degraded
            .with_label_values(&[degradation.query.as_str()])
            .inc()
    }

    pub fn cache_lookup(&self, hit: bool) {
        self.cache_lookups
            .with_label_values(&[if hit { "hit" } else { "miss" }])
            .inc()
    }

    /// Time a pass; the outcome is counted when the measurer finishes
    pub fn pass(&self, scope: &'static str) -> PassMeasurer {
        PassMeasurer {
            start: Instant::now(),
            scope,
            metrics: self.clone(),
        }
    }
}

/// Records the duration and outcome of one aggregation pass
pub struct PassMeasurer {
    start: Instant,
    scope: &'static str,
    metrics: Metrics,
}

impl PassMeasurer {
    pub fn finish<T>(self, result: &Result<T, Error>) {
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metrics
            .pass_duration
            .with_label_values(&[self.scope])
            .observe(duration);
        let outcome = match result {
            Ok(_) => "success",
            Err(Error::Cancelled) => "cancelled",
            Err(e) => {
                self.metrics.pass_failure(self.scope, e);
                "error"
            }
        };
        self.metrics
            .passes
            .with_label_values(&[self.scope, outcome])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_counts() {
        let registry = Registry::new();
        let metrics = Metrics::default().register(&registry).unwrap();

        metrics.pass("hubs").finish::<()>(&Ok(()));
        metrics.pass("hubs").finish::<()>(&Err(Error::HubNotFound("x".into())));
        metrics.cache_lookup(true);

        assert_eq!(metrics.passes.with_label_values(&["hubs", "success"]).get(), 1);
        assert_eq!(metrics.passes.with_label_values(&["hubs", "error"]).get(), 1);
        assert_eq!(
            metrics.failures.with_label_values(&["hubs", "hubnotfound"]).get(),
            1
        );
        assert_eq!(metrics.cache_lookups.with_label_values(&["hit"]).get(), 1);
        assert!(Metrics::default().register(&registry).is_err(), "duplicate registration");
    }
}
