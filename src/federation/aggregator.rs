use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::{stream, StreamExt};
use kube::api::DynamicObject;
use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::convert::to_cluster_record;
use crate::credentials::{self, is_monitor_managed};
use crate::models::{ClusterInfo, ClusterRecord, ClusterStatus};
use crate::predicates::{assign_owner, is_hub, is_spoke_of};
use crate::{telemetry, Error, Result};

use super::client::{ClientFactory, ClusterApi};
use super::enrich::Pass;
use super::{AggregatorConfig, DiagnosticSink, PassContext, Query};

pub static UNMANAGED_TYPE_LABEL: (&str, &str) = ("type", "unmanaged");
pub static MANUAL_SOURCE_ANNOTATION: (&str, &str) = ("source", "manual");
pub static EXTERNAL_PLATFORM: &str = "External";

static RESERVED_NAMESPACES: [&str; 5] = [
    "default",
    "kube-system",
    "kube-public",
    "kube-node-lease",
    "openshift",
];
static RESERVED_PREFIXES: [&str; 2] = ["openshift-", "kube-"];

fn is_reserved_namespace(name: &str) -> bool {
    RESERVED_NAMESPACES.contains(&name) || RESERVED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Hub candidates in name order, each with the non-hub clusters it owns
fn partition(clusters: &[DynamicObject]) -> Vec<(ClusterRecord, Vec<ClusterRecord>)> {
    let mut hubs: Vec<ClusterRecord> = clusters
        .iter()
        .filter(|c| is_hub(c.labels()))
        .filter_map(|c| to_cluster_record(c, None))
        .collect();
    hubs.sort_by(|a, b| a.name.cmp(&b.name));
    hubs.dedup_by(|a, b| a.name == b.name);

    let names: Vec<&str> = hubs.iter().map(|h| h.name.as_str()).collect();
    let mut owned: BTreeMap<&str, Vec<ClusterRecord>> = BTreeMap::new();
    for cluster in clusters.iter().filter(|c| !is_hub(c.labels())) {
        let name = cluster.name_any();
        match assign_owner(cluster.labels(), &names) {
            Some(hub) if is_spoke_of(&name, cluster.labels(), hub) => {
                if let Some(record) = to_cluster_record(cluster, Some(hub)) {
                    owned.entry(hub).or_default().push(record);
                }
            }
            _ => debug!(cluster = %name, "no owning hub, dropped"),
        }
    }

    let mut owned: BTreeMap<String, Vec<ClusterRecord>> = owned
        .into_iter()
        .map(|(hub, spokes)| (hub.to_string(), spokes))
        .collect();
    hubs.into_iter()
        .map(|hub| {
            let spokes = owned.remove(&hub.name).unwrap_or_default();
            (hub, spokes)
        })
        .collect()
}

/// Base record of a hub known only through a monitor-managed credential
fn unmanaged_hub(name: &str) -> ClusterRecord {
    ClusterRecord {
        name: name.to_string(),
        namespace: name.to_string(),
        status: ClusterStatus::External,
        version: "Unknown".to_string(),
        cluster_info: ClusterInfo {
            platform: EXTERNAL_PLATFORM.to_string(),
            ..Default::default()
        },
        labels: BTreeMap::from([(
            UNMANAGED_TYPE_LABEL.0.to_string(),
            UNMANAGED_TYPE_LABEL.1.to_string(),
        )]),
        annotations: BTreeMap::from([(
            MANUAL_SOURCE_ANNOTATION.0.to_string(),
            MANUAL_SOURCE_ANNOTATION.1.to_string(),
        )]),
        ..Default::default()
    }
}

/// Discovers hubs and spokes reachable from the global hub.
///
/// Only enumeration on the global hub (and, for targeted queries, reaching
/// the requested hub) can fail a pass. Every other failing sub-query leaves a
/// default in the record and is reported to the [`DiagnosticSink`].
#[derive(Clone)]
pub struct Aggregator {
    global: Arc<dyn ClusterApi>,
    factory: Arc<dyn ClientFactory>,
    sink: Arc<dyn DiagnosticSink>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(
        global: Arc<dyn ClusterApi>,
        factory: Arc<dyn ClientFactory>,
        sink: Arc<dyn DiagnosticSink>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            global,
            factory,
            sink,
            config,
        }
    }

    fn pass<'a>(&'a self, ctx: &'a PassContext) -> Pass<'a> {
        Pass {
            ctx,
            global: self.global.as_ref(),
            factory: self.factory.as_ref(),
            sink: self.sink.as_ref(),
            config: self.config,
        }
    }

    /// Every managed hub followed by every unmanaged hub
    #[instrument(skip_all, fields(trace_id = display(telemetry::get_trace_id())))]
    pub async fn list_hubs(&self, ctx: &PassContext) -> Result<Vec<ClusterRecord>> {
        let pass = self.pass(ctx);
        let clusters = ctx
            .call(self.global.list_managed_clusters())
            .await
            .map_err(Error::enumerate)?;

        let mut hubs: Vec<ClusterRecord> = stream::iter(
            partition(&clusters)
                .into_iter()
                .map(|(hub, spokes)| managed_hub(&pass, hub, spokes)),
        )
        .buffered(self.config.hub_concurrency.max(1))
        .collect()
        .await;

        let known: BTreeSet<String> = hubs.iter().map(|h| h.name.clone()).collect();
        hubs.extend(discover_unmanaged(&pass, &known).await);

        if hubs.is_empty() && ctx.is_done() {
            return Err(Error::Cancelled);
        }
        info!(hubs = hubs.len(), "listed hubs");
        Ok(hubs)
    }

    /// One hub, managed or unmanaged, with its spokes
    #[instrument(skip(self, ctx), fields(trace_id = display(telemetry::get_trace_id())))]
    pub async fn get_hub(&self, ctx: &PassContext, name: &str) -> Result<ClusterRecord> {
        let pass = self.pass(ctx);
        let managed = ctx
            .call(self.global.get_managed_cluster(name))
            .await
            .map_err(Error::enumerate)?;

        let mut hub = match managed.filter(|c| is_hub(c.labels())) {
            Some(cluster) => {
                let mut hub = to_cluster_record(&cluster, None)
                    .ok_or_else(|| Error::HubNotFound(name.to_string()))?;
                pass.global_hub_data(&mut hub).await;
                hub
            }
            None => {
                let secret = ctx
                    .call(credentials::stored_credential(self.global.as_ref(), name))
                    .await?;
                if !secret.as_ref().is_some_and(is_monitor_managed) {
                    return Err(Error::HubNotFound(name.to_string()));
                }
                let mut hub = unmanaged_hub(name);
                pass.global_hub_data(&mut hub).await;
                hub
            }
        };

        let remote = pass.connect(self.global.as_ref(), name).await?;
        pass.hub_remote(&mut hub, &remote).await;
        Ok(hub)
    }

    /// Spokes of `hub` as the hub itself reports them
    #[instrument(skip(self, ctx), fields(trace_id = display(telemetry::get_trace_id())))]
    pub async fn list_spokes_of(&self, ctx: &PassContext, hub: &str) -> Result<Vec<ClusterRecord>> {
        let pass = self.pass(ctx);
        let remote = pass.connect(self.global.as_ref(), hub).await?;
        let api = remote.api.as_ref();
        let spokes = pass
            .spokes_of(api, hub)
            .await
            .map_err(|source| Error::unreachable(hub, source))?;
        Ok(pass.enrich_spokes(api, spokes).await)
    }
}

async fn managed_hub(pass: &Pass<'_>, mut hub: ClusterRecord, spokes: Vec<ClusterRecord>) -> ClusterRecord {
    hub.managed_clusters = spokes;
    pass.global_hub_data(&mut hub).await;
    if let Some(remote) = pass.try_connect(pass.global, &hub.name).await {
        pass.hub_remote(&mut hub, &remote).await;
    }
    hub
}

/// Hubs registered by hand: namespaces holding a monitor-managed credential
async fn discover_unmanaged(pass: &Pass<'_>, known: &BTreeSet<String>) -> Vec<ClusterRecord> {
    let Some(namespaces) = pass
        .fetch("global", Query::Namespaces, pass.global.list_namespaces())
        .await
    else {
        return Vec::new();
    };

    let candidates = namespaces
        .into_iter()
        .filter(|ns| !known.contains(ns) && !is_reserved_namespace(ns));
    stream::iter(candidates.map(|ns| unmanaged_candidate(pass, ns)))
        .buffered(pass.config.hub_concurrency.max(1))
        .filter_map(|hub| async move { hub })
        .collect()
        .await
}

async fn unmanaged_candidate(pass: &Pass<'_>, name: String) -> Option<ClusterRecord> {
    let lookup = pass
        .ctx
        .call(credentials::stored_credential(pass.global, &name))
        .await;
    let secret = match lookup {
        Ok(secret) => secret?,
        Err(credentials::CredentialError::Lookup(e)) => {
            pass.settle::<()>(&name, Query::Credential, Err(e)).await;
            return None;
        }
        Err(e) => {
            pass.degrade(&name, Query::Credential, e).await;
            return None;
        }
    };
    if !is_monitor_managed(&secret) {
        return None;
    }

    info!(hub = %name, "found unmanaged hub");
    let mut hub = unmanaged_hub(&name);
    pass.global_hub_data(&mut hub).await;
    if let Some(remote) = pass.try_connect(pass.global, &name).await {
        pass.hub_remote(&mut hub, &remote).await;
    }
    Some(hub)
}
