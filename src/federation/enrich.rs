//! Per-pass enrichment of hub and spoke records.
//!
//! Every remote call goes through [`Pass::fetch`], which applies the pass
//! context and turns failures into degradations with a default value.

use std::future::Future;
use std::sync::Arc;

use futures::{stream, StreamExt};
use kube::ResourceExt;
use tracing::{debug, info};

use crate::convert::{
    route_url, to_bare_metal_node, to_cluster_record, to_node_record, to_operator_record,
    to_policy_record, with_cluster_version,
};
use crate::credentials::{self, CredentialError, CredentialSource};
use crate::models::{ClusterRecord, ClusterStatus, NodeRecord, OperatorRecord, PolicyRecord};
use crate::predicates::is_spoke_of;
use crate::{Error, Result};

use super::client::{CallResult, ClientFactory, ClusterApi};
use super::{AggregatorConfig, Degradation, DiagnosticSink, PassContext, Query};

pub static CONSOLE_NAMESPACE: &str = "openshift-console";
pub static CONSOLE_ROUTE: &str = "console";
pub static GITOPS_NAMESPACE: &str = "openshift-gitops";

/// Client for a remote cluster and the endpoint it was built for
pub(super) struct Remote {
    pub(super) api: Arc<dyn ClusterApi>,
    pub(super) server: String,
}

/// Borrowed state of one aggregation pass
pub(super) struct Pass<'a> {
    pub(super) ctx: &'a PassContext,
    pub(super) global: &'a dyn ClusterApi,
    pub(super) factory: &'a dyn ClientFactory,
    pub(super) sink: &'a dyn DiagnosticSink,
    pub(super) config: AggregatorConfig,
}

impl Pass<'_> {
    pub(super) async fn degrade(&self, cluster: &str, query: Query, error: impl std::fmt::Display) {
        self.sink.record(Degradation::new(cluster, query, error)).await;
    }

    /// Unwrap a sub-query result, reporting failures other than cancellation
    pub(super) async fn settle<T>(&self, cluster: &str, query: Query, result: CallResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) if e.is_cancellation() => {
                debug!(cluster, %query, "skipped: {e}");
                None
            }
            Err(e) => {
                self.degrade(cluster, query, e).await;
                None
            }
        }
    }

    pub(super) async fn fetch<T, F>(&self, cluster: &str, query: Query, call: F) -> Option<T>
    where
        F: Future<Output = CallResult<T>>,
    {
        let result = self.ctx.call(call).await;
        self.settle(cluster, query, result).await
    }

    /// Resolve the credential of `name` stored on `store` and build a client
    pub(super) async fn connect(&self, store: &dyn ClusterApi, name: &str) -> Result<Remote> {
        let source = CredentialSource::secret(name);
        let credential = self.ctx.call(credentials::resolve(store, &source)).await?;
        if self.ctx.is_done() {
            return Err(Error::Cancelled);
        }
        let api = self.factory.connect(&credential).await?;
        Ok(Remote {
            api,
            server: credential.server,
        })
    }

    /// Like [`Pass::connect`], with failures reported as degradations
    pub(super) async fn try_connect(&self, store: &dyn ClusterApi, name: &str) -> Option<Remote> {
        match self.connect(store, name).await {
            Ok(remote) => Some(remote),
            Err(e) => {
                self.connect_failed(name, e).await;
                None
            }
        }
    }

    async fn connect_failed(&self, name: &str, error: Error) {
        match error {
            Error::Cancelled => {}
            e @ Error::Credential(_) => self.degrade(name, Query::Credential, e).await,
            e => self.degrade(name, Query::Connect, e).await,
        }
    }

    pub(super) async fn policies(&self, store: &dyn ClusterApi, cluster: &str) -> Vec<PolicyRecord> {
        self.fetch(cluster, Query::Policies, store.list_policies(cluster))
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(to_policy_record)
            .collect()
    }

    pub(super) async fn bare_metal_nodes(&self, store: &dyn ClusterApi, cluster: &str) -> Vec<NodeRecord> {
        self.fetch(cluster, Query::BareMetalHosts, store.list_bare_metal_hosts(cluster))
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(to_bare_metal_node)
            .collect()
    }

    pub(super) async fn operators(&self, api: &dyn ClusterApi, cluster: &str) -> Vec<OperatorRecord> {
        self.fetch(cluster, Query::Operators, api.list_operators())
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(to_operator_record)
            .collect()
    }

    /// Policies and bare-metal hosts kept for `hub` in its namespace on the global hub
    pub(super) async fn global_hub_data(&self, hub: &mut ClusterRecord) {
        let (policies, nodes) = futures::join!(
            self.policies(self.global, &hub.name),
            self.bare_metal_nodes(self.global, &hub.name),
        );
        hub.policies_info = policies;
        hub.nodes_info = nodes;
    }

    /// Clusters reported by `hub` that qualify as its spokes, unenriched
    pub(super) async fn spokes_of(&self, api: &dyn ClusterApi, hub: &str) -> CallResult<Vec<ClusterRecord>> {
        let clusters = self.ctx.call(api.list_managed_clusters()).await?;
        Ok(clusters
            .iter()
            .filter(|c| is_spoke_of(&c.name_any(), c.labels(), hub))
            .filter_map(|c| to_cluster_record(c, Some(hub)))
            .collect())
    }

    /// Overlay everything the hub itself reports onto its record
    pub(super) async fn hub_remote(&self, hub: &mut ClusterRecord, remote: &Remote) {
        let name = hub.name.clone();
        let api = remote.api.as_ref();
        hub.cluster_info.api_url = remote.server.clone();
        let (versions, console, gitops, nodes, spokes, operators) = futures::join!(
            self.fetch(&name, Query::ClusterVersion, api.list_cluster_versions()),
            self.fetch(&name, Query::ConsoleRoute, api.get_route(CONSOLE_NAMESPACE, CONSOLE_ROUTE)),
            self.fetch(&name, Query::GitopsRoutes, api.list_routes(GITOPS_NAMESPACE)),
            self.fetch(&name, Query::Nodes, api.list_nodes()),
            async { self.settle(&name, Query::ManagedClusters, self.spokes_of(api, &name).await).await },
            self.operators(api, &name),
        );

        if let Some(version) = versions.as_ref().and_then(|v| v.first()) {
            hub.cluster_info = with_cluster_version(std::mem::take(&mut hub.cluster_info), version);
        }
        if let Some(url) = console.flatten().as_ref().and_then(route_url) {
            info!(hub = %name, url = %url, "console route");
            hub.cluster_info.console_url = url;
        }
        if let Some(url) = gitops.unwrap_or_default().iter().find_map(route_url) {
            hub.cluster_info.gitops_url = url;
        }

        let nodes = nodes.unwrap_or_default();
        if !nodes.is_empty() {
            hub.status = ClusterStatus::Connected;
        }
        if let Some(info) = nodes.first().and_then(|n| n.status.as_ref()?.node_info.as_ref()) {
            hub.version = info.kubelet_version.clone();
            hub.cluster_info.kubernetes_version = info.kubelet_version.clone();
        }
        hub.nodes_info.extend(nodes.iter().map(to_node_record));

        hub.operators_info = operators;
        if let Some(spokes) = spokes {
            hub.managed_clusters = self.enrich_spokes(api, spokes).await;
        }
    }

    pub(super) async fn enrich_spokes(&self, hub_api: &dyn ClusterApi, spokes: Vec<ClusterRecord>) -> Vec<ClusterRecord> {
        stream::iter(spokes.into_iter().map(|spoke| self.enrich_spoke(hub_api, spoke)))
            .buffered(self.config.spoke_concurrency.max(1))
            .collect()
            .await
    }

    /// Policies and hosts from the spoke's namespace on its hub, operators from the spoke
    async fn enrich_spoke(&self, hub_api: &dyn ClusterApi, mut spoke: ClusterRecord) -> ClusterRecord {
        let (policies, nodes, operators) = futures::join!(
            self.policies(hub_api, &spoke.name),
            self.bare_metal_nodes(hub_api, &spoke.name),
            self.spoke_operators(hub_api, &spoke.name),
        );
        spoke.policies_info = policies;
        spoke.nodes_info = nodes;
        spoke.operators_info = operators;
        spoke
    }

    async fn spoke_operators(&self, hub_api: &dyn ClusterApi, spoke: &str) -> Vec<OperatorRecord> {
        match self.connect(hub_api, spoke).await {
            Ok(remote) => self.operators(remote.api.as_ref(), spoke).await,
            Err(Error::Credential(CredentialError::NotFound { .. })) => {
                debug!(spoke, "no stored credential on hub");
                Vec::new()
            }
            Err(e) => {
                self.connect_failed(spoke, e).await;
                Vec::new()
            }
        }
    }
}
