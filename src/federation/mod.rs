//! Discovery and aggregation across the global hub, its hubs and their spokes.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

pub mod aggregator;
pub mod client;
pub mod context;
mod enrich;

#[cfg(test)]
pub(crate) mod fixtures;

pub use aggregator::Aggregator;
pub use client::{CallError, ClientFactory, ClusterApi, KubeClientFactory, KubeClusterApi};
pub use context::PassContext;

/// Remote sub-queries a pass may issue
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Query {
    Credential,
    Connect,
    ManagedClusters,
    Policies,
    BareMetalHosts,
    Operators,
    ClusterVersion,
    ConsoleRoute,
    GitopsRoutes,
    Nodes,
    Namespaces,
}

impl Query {
    pub fn as_str(&self) -> &'static str {
        match self {
            Query::Credential => "credential",
            Query::Connect => "connect",
            Query::ManagedClusters => "managed-clusters",
            Query::Policies => "policies",
            Query::BareMetalHosts => "bare-metal-hosts",
            Query::Operators => "operators",
            Query::ClusterVersion => "cluster-version",
            Query::ConsoleRoute => "console-route",
            Query::GitopsRoutes => "gitops-routes",
            Query::Nodes => "nodes",
            Query::Namespaces => "namespaces",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sub-query that failed without failing the pass
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Degradation {
    pub cluster: String,
    pub query: Query,
    pub message: String,
}

impl Degradation {
    pub fn new(cluster: impl Into<String>, query: Query, error: impl fmt::Display) -> Self {
        Self {
            cluster: cluster.into(),
            query,
            message: error.to_string(),
        }
    }
}

/// Receives every degraded sub-query of a pass
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn record(&self, degradation: Degradation);
}

/// Sink that only logs
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

#[async_trait]
impl DiagnosticSink for LogSink {
    async fn record(&self, degradation: Degradation) {
        warn!(
            cluster = %degradation.cluster,
            query = %degradation.query,
            "degraded: {}",
            degradation.message
        );
    }
}

/// Fan-out bounds for one pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub hub_concurrency: usize,
    pub spoke_concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            hub_concurrency: 4,
            spoke_concurrency: 8,
        }
    }
}
