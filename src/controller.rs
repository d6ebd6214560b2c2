use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::federation::{
    Aggregator, AggregatorConfig, ClientFactory, ClusterApi, Degradation, DiagnosticSink,
};
use crate::service::{Cache, FederationService};
use crate::Metrics;

/// Degradations kept for the diagnostics endpoint
const RECENT_DEGRADATIONS: usize = 64;

/// A degradation with the time it was recorded
#[derive(Clone, Debug, Serialize)]
pub struct Observed {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub degradation: Degradation,
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostics {
    pub started_at: DateTime<Utc>,
    pub last_event: Option<DateTime<Utc>>,
    pub degraded_total: u64,
    /// Most recent first
    pub recent: VecDeque<Observed>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            last_event: None,
            degraded_total: 0,
            recent: VecDeque::with_capacity(RECENT_DEGRADATIONS),
        }
    }
}

impl Diagnostics {
    fn push(&mut self, observed: Observed) {
        self.last_event = Some(observed.at);
        self.degraded_total += 1;
        self.recent.push_front(observed);
        self.recent.truncate(RECENT_DEGRADATIONS);
    }
}

/// Diagnostic sink that logs, counts and remembers degradations
#[derive(Clone)]
pub struct Recorder {
    diagnostics: Arc<RwLock<Diagnostics>>,
    metrics: Metrics,
}

#[async_trait]
impl DiagnosticSink for Recorder {
    async fn record(&self, degradation: Degradation) {
        warn!(
            cluster = %degradation.cluster,
            query = %degradation.query,
            "degraded: {}",
            degradation.message
        );
        self.metrics.degradation(&degradation);
        self.diagnostics.write().await.push(Observed {
            at: Utc::now(),
            degradation,
        });
    }
}

/// State shared between the aggregation passes and the web server
#[derive(Clone)]
pub struct State {
    /// Diagnostics populated by the recorder
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
    metrics: Metrics,
}

impl State {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = prometheus::Registry::default();
        let metrics = Metrics::default().register(&registry)?;
        Ok(Self {
            diagnostics: Default::default(),
            registry,
            metrics,
        })
    }

    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    pub fn recorder(&self) -> Recorder {
        Recorder {
            diagnostics: self.diagnostics.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Wire an aggregator that reports into this state behind `cache`
    pub fn service(
        &self,
        global: Arc<dyn ClusterApi>,
        factory: Arc<dyn ClientFactory>,
        config: AggregatorConfig,
        cache: Arc<Cache>,
    ) -> FederationService {
        let aggregator = Aggregator::new(global, factory, Arc::new(self.recorder()), config);
        FederationService::new(aggregator, cache, self.metrics.clone())
    }
}
