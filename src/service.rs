//! Cache-fronted entry point to the aggregator.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{CacheKey, ResultCache};
use crate::federation::{Aggregator, PassContext};
use crate::models::ClusterRecord;
use crate::{Metrics, Result};

#[derive(Clone, Debug)]
pub enum Cached {
    Hubs(Arc<Vec<ClusterRecord>>),
    Hub(Arc<ClusterRecord>),
    Spokes(Arc<Vec<ClusterRecord>>),
}

pub type Cache = ResultCache<CacheKey, Cached>;

/// Serves hub and spoke queries, running an aggregation pass on a cache miss.
///
/// Results of passes that were cancelled or hit their deadline are returned
/// but never cached.
#[derive(Clone)]
pub struct FederationService {
    aggregator: Aggregator,
    cache: Arc<Cache>,
    metrics: Metrics,
}

impl FederationService {
    pub fn new(aggregator: Aggregator, cache: Arc<Cache>, metrics: Metrics) -> Self {
        Self {
            aggregator,
            cache,
            metrics,
        }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    async fn cached(&self, key: &CacheKey) -> Option<Cached> {
        let hit = self.cache.get(key).await;
        self.metrics.cache_lookup(hit.is_some());
        if hit.is_some() {
            debug!(%key, "cache hit");
        }
        hit
    }

    async fn store(&self, ctx: &PassContext, key: CacheKey, value: Cached) {
        if ctx.is_done() {
            debug!(%key, "pass interrupted, not cached");
            return;
        }
        self.cache.set(key, value).await;
    }

    pub async fn list_hubs(&self, ctx: &PassContext) -> Result<Arc<Vec<ClusterRecord>>> {
        if let Some(Cached::Hubs(hubs)) = self.cached(&CacheKey::AllHubs).await {
            return Ok(hubs);
        }

        let measurer = self.metrics.pass("hubs");
        let result = self.aggregator.list_hubs(ctx).await;
        measurer.finish(&result);

        let hubs = Arc::new(result?);
        self.store(ctx, CacheKey::AllHubs, Cached::Hubs(hubs.clone())).await;
        Ok(hubs)
    }

    pub async fn get_hub(&self, ctx: &PassContext, name: &str) -> Result<Arc<ClusterRecord>> {
        let key = CacheKey::Hub(name.to_string());
        if let Some(Cached::Hub(hub)) = self.cached(&key).await {
            return Ok(hub);
        }

        let measurer = self.metrics.pass("hub");
        let result = self.aggregator.get_hub(ctx, name).await;
        measurer.finish(&result);

        let hub = Arc::new(result?);
        self.store(ctx, key, Cached::Hub(hub.clone())).await;
        Ok(hub)
    }

    pub async fn list_spokes_of(&self, ctx: &PassContext, hub: &str) -> Result<Arc<Vec<ClusterRecord>>> {
        let key = CacheKey::Spokes(hub.to_string());
        if let Some(Cached::Spokes(spokes)) = self.cached(&key).await {
            return Ok(spokes);
        }

        let measurer = self.metrics.pass("spokes");
        let result = self.aggregator.list_spokes_of(ctx, hub).await;
        measurer.finish(&result);

        let spokes = Arc::new(result?);
        self.store(ctx, key, Cached::Spokes(spokes.clone())).await;
        Ok(spokes)
    }

    /// Forget every cached result so the next query runs a fresh pass
    pub async fn refresh(&self) {
        self.cache.clear().await;
        info!("cache cleared");
    }
}
