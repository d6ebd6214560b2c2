use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::federation::AggregatorConfig;

/// Federation monitor for a global hub, its hubs and their spokes
#[derive(Parser, Clone, Debug)]
#[command(name = "hub-monitor", version, about, long_about = None)]
pub struct Settings {
    /// Port the API server listens on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Kubeconfig of the global hub; in-cluster or default discovery otherwise
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Lifetime of cached aggregation results
    #[arg(long, env = "CACHE_TTL_SECONDS", default_value_t = 1800)]
    pub cache_ttl_seconds: u64,

    /// Interval between sweeps of expired cache entries
    #[arg(long, env = "CACHE_SWEEP_SECONDS", default_value_t = 60)]
    pub cache_sweep_seconds: u64,

    /// Hubs enriched concurrently within one pass
    #[arg(long, env = "HUB_CONCURRENCY", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub hub_concurrency: u16,

    /// Spokes enriched concurrently per hub
    #[arg(long, env = "SPOKE_CONCURRENCY", default_value_t = 8, value_parser = clap::value_parser!(u16).range(1..))]
    pub spoke_concurrency: u16,

    /// Upper bound on a single request's aggregation pass
    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", default_value_t = 120)]
    pub request_timeout_seconds: u64,
}

impl Settings {
    pub fn aggregation(&self) -> AggregatorConfig {
        AggregatorConfig {
            hub_concurrency: self.hub_concurrency.into(),
            spoke_concurrency: self.spoke_concurrency.into(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_seconds.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
