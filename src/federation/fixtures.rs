//! In-memory clusters for aggregation tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, NodeStatus, NodeSystemInfo, Secret};
use k8s_openapi::ByteString;
use kube::api::{DynamicObject, ObjectMeta};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::credentials::{
    kubeconfig_secret_name, RemoteCredential, CREATED_BY_LABEL, CREATED_BY_MONITOR, KUBECONFIG_KEY,
};

use super::client::{CallError, CallResult, ClientFactory, ClusterApi, ConnectError, ConnectResult};
use super::{Degradation, DiagnosticSink};

fn server(cluster: &str) -> String {
    format!("https://{cluster}.test:6443")
}

#[derive(Clone, Default)]
pub struct FakeCluster {
    pub managed_clusters: Vec<DynamicObject>,
    pub policies: BTreeMap<String, Vec<DynamicObject>>,
    pub bare_metal_hosts: BTreeMap<String, Vec<DynamicObject>>,
    pub operators: Vec<DynamicObject>,
    pub cluster_versions: Vec<DynamicObject>,
    pub routes: BTreeMap<String, Vec<DynamicObject>>,
    pub nodes: Vec<Node>,
    pub namespaces: Vec<String>,
    pub secrets: BTreeMap<(String, String), Secret>,
    /// Query keys (`kind` or `kind:namespace`) that fail
    pub failing: BTreeSet<String>,
    /// Token cancelled when the keyed query is served
    pub cancel_on: Option<(String, CancellationToken)>,
}

fn namespace_of(obj: &DynamicObject) -> String {
    obj.metadata.namespace.clone().unwrap_or_default()
}

impl FakeCluster {
    pub fn fail(&mut self, key: &str) {
        self.failing.insert(key.to_string());
    }

    pub fn add_policy(&mut self, policy: DynamicObject) {
        self.policies.entry(namespace_of(&policy)).or_default().push(policy);
    }

    pub fn add_bare_metal_host(&mut self, host: DynamicObject) {
        self.bare_metal_hosts.entry(namespace_of(&host)).or_default().push(host);
    }

    pub fn add_route(&mut self, route: DynamicObject) {
        self.routes.entry(namespace_of(&route)).or_default().push(route);
    }

    pub fn add_secret(&mut self, secret: Secret) {
        let key = (
            secret.metadata.namespace.clone().unwrap_or_default(),
            secret.metadata.name.clone().unwrap_or_default(),
        );
        self.secrets.insert(key, secret);
    }

    /// Cancel `token` while answering the query for `key`; the query itself succeeds
    pub fn cancel_after(&mut self, key: &str, token: CancellationToken) {
        self.cancel_on = Some((key.to_string(), token));
    }

    fn check(&self, key: String) -> CallResult<()> {
        if let Some((trigger, token)) = &self.cancel_on {
            if *trigger == key {
                token.cancel();
            }
        }
        if self.failing.contains(&key) {
            return Err(CallError::Unavailable(key));
        }
        Ok(())
    }

    fn namespaced(map: &BTreeMap<String, Vec<DynamicObject>>, namespace: &str) -> Vec<DynamicObject> {
        map.get(namespace).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_managed_clusters(&self) -> CallResult<Vec<DynamicObject>> {
        self.check("managed-clusters".into())?;
        Ok(self.managed_clusters.clone())
    }

    async fn get_managed_cluster(&self, name: &str) -> CallResult<Option<DynamicObject>> {
        self.check("managed-clusters".into())?;
        Ok(self
            .managed_clusters
            .iter()
            .find(|c| c.metadata.name.as_deref() == Some(name))
            .cloned())
    }

    async fn list_policies(&self, namespace: &str) -> CallResult<Vec<DynamicObject>> {
        self.check(format!("policies:{namespace}"))?;
        Ok(Self::namespaced(&self.policies, namespace))
    }

    async fn list_bare_metal_hosts(&self, namespace: &str) -> CallResult<Vec<DynamicObject>> {
        self.check(format!("baremetalhosts:{namespace}"))?;
        Ok(Self::namespaced(&self.bare_metal_hosts, namespace))
    }

    async fn list_operators(&self) -> CallResult<Vec<DynamicObject>> {
        self.check("operators".into())?;
        Ok(self.operators.clone())
    }

    async fn list_cluster_versions(&self) -> CallResult<Vec<DynamicObject>> {
        self.check("clusterversions".into())?;
        Ok(self.cluster_versions.clone())
    }

    async fn get_route(&self, namespace: &str, name: &str) -> CallResult<Option<DynamicObject>> {
        self.check(format!("routes:{namespace}"))?;
        Ok(Self::namespaced(&self.routes, namespace)
            .into_iter()
            .find(|r| r.metadata.name.as_deref() == Some(name)))
    }

    async fn list_routes(&self, namespace: &str) -> CallResult<Vec<DynamicObject>> {
        self.check(format!("routes:{namespace}"))?;
        Ok(Self::namespaced(&self.routes, namespace))
    }

    async fn list_nodes(&self) -> CallResult<Vec<Node>> {
        self.check("nodes".into())?;
        Ok(self.nodes.clone())
    }

    async fn list_namespaces(&self) -> CallResult<Vec<String>> {
        self.check("namespaces".into())?;
        Ok(self.namespaces.clone())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> CallResult<Option<Secret>> {
        self.check(format!("secrets:{namespace}"))?;
        Ok(self
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }
}

/// Hands out the fake cluster registered for a credential's server
pub struct FakeFactory {
    clusters: BTreeMap<String, Arc<FakeCluster>>,
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn connect(&self, credential: &RemoteCredential) -> ConnectResult<Arc<dyn ClusterApi>> {
        let cluster: Arc<dyn ClusterApi> = self
            .clusters
            .get(&credential.server)
            .map(|c| c.clone() as Arc<dyn ClusterApi>)
            .ok_or_else(|| ConnectError::Kubeconfig {
                cluster: credential.cluster.clone(),
                reason: format!("unknown server {}", credential.server),
            })?;
        Ok(cluster)
    }
}

/// The global hub plus every remote cluster reachable by credential
#[derive(Default)]
pub struct World {
    pub global: Arc<FakeCluster>,
    remotes: BTreeMap<String, Arc<FakeCluster>>,
}

impl World {
    pub fn global_mut(&mut self) -> &mut FakeCluster {
        Arc::get_mut(&mut self.global).expect("global hub already shared")
    }

    pub fn remote_mut(&mut self, name: &str) -> &mut FakeCluster {
        self.remotes
            .get_mut(name)
            .and_then(Arc::get_mut)
            .expect("remote cluster registered and unshared")
    }

    fn store_mut(&mut self, store: &str) -> &mut FakeCluster {
        if store == "global" {
            self.global_mut()
        } else {
            self.remote_mut(store)
        }
    }

    /// Register `cluster` under `name`, with its monitor-managed credential kept on `store`
    pub fn add_remote(&mut self, name: &str, cluster: FakeCluster, store: &str) {
        self.remotes.insert(name.to_string(), Arc::new(cluster));
        self.store_mut(store).add_secret(kubeconfig_secret(name, true));
    }

    pub fn add_unlabelled_credential(&mut self, name: &str, store: &str) {
        self.store_mut(store).add_secret(kubeconfig_secret(name, false));
    }

    pub fn factory(&self) -> Arc<FakeFactory> {
        Arc::new(FakeFactory {
            clusters: self
                .remotes
                .iter()
                .map(|(name, cluster)| (server(name), cluster.clone()))
                .collect(),
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    recorded: Mutex<Vec<Degradation>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<Degradation> {
        std::mem::take(&mut *self.recorded.lock().unwrap())
    }
}

#[async_trait]
impl DiagnosticSink for RecordingSink {
    async fn record(&self, degradation: Degradation) {
        self.recorded.lock().unwrap().push(degradation);
    }
}

pub fn kubeconfig(cluster: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Config
current-context: {cluster}
clusters:
- name: {cluster}
  cluster:
    server: {server}
contexts:
- name: {cluster}
  context:
    cluster: {cluster}
    user: admin
users:
- name: admin
  user:
    token: sha256~{cluster}
"#,
        server = server(cluster)
    )
}

pub fn kubeconfig_secret(cluster: &str, monitor_managed: bool) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(kubeconfig_secret_name(cluster)),
            namespace: Some(cluster.to_string()),
            labels: monitor_managed.then(|| {
                BTreeMap::from([(CREATED_BY_LABEL.to_string(), CREATED_BY_MONITOR.to_string())])
            }),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            KUBECONFIG_KEY.to_string(),
            ByteString(kubeconfig(cluster).into_bytes()),
        )])),
        ..Default::default()
    }
}

fn object(value: serde_json::Value) -> DynamicObject {
    serde_json::from_value(value).unwrap()
}

pub fn managed_cluster(name: &str, labels: &[(&str, &str)]) -> DynamicObject {
    let labels: BTreeMap<&str, &str> = labels.iter().copied().collect();
    object(json!({
        "apiVersion": "cluster.open-cluster-management.io/v1",
        "kind": "ManagedCluster",
        "metadata": {"name": name, "labels": labels},
        "status": {
            "conditions": [{"type": "ManagedClusterConditionAvailable", "status": "True"}],
            "version": {"kubernetes": "v1.28.0"}
        }
    }))
}

pub fn policy(namespace: &str, name: &str, states: &[&str]) -> DynamicObject {
    let details: Vec<_> = states.iter().map(|s| json!({"compliant": s})).collect();
    object(json!({
        "apiVersion": "policy.open-cluster-management.io/v1",
        "kind": "Policy",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"remediationAction": "inform"},
        "status": {"compliant": "NonCompliant", "details": details}
    }))
}

pub fn bare_metal_host(namespace: &str, name: &str, ram_mebibytes: u64) -> DynamicObject {
    object(json!({
        "apiVersion": "metal3.io/v1alpha1",
        "kind": "BareMetalHost",
        "metadata": {"name": name, "namespace": namespace},
        "status": {
            "poweredOn": true,
            "provisioning": {"state": "provisioned"},
            "hardware": {"ramMebibytes": ram_mebibytes}
        }
    }))
}

pub fn cluster_version(version: &str, cluster_id: &str) -> DynamicObject {
    object(json!({
        "apiVersion": "config.openshift.io/v1",
        "kind": "ClusterVersion",
        "metadata": {"name": "version"},
        "spec": {"clusterID": cluster_id},
        "status": {"desired": {"version": version}}
    }))
}

pub fn route(namespace: &str, name: &str, host: &str) -> DynamicObject {
    object(json!({
        "apiVersion": "route.openshift.io/v1",
        "kind": "Route",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"host": host}
    }))
}

pub fn csv(name: &str) -> DynamicObject {
    object(json!({
        "apiVersion": "operators.coreos.com/v1alpha1",
        "kind": "ClusterServiceVersion",
        "metadata": {"name": name, "namespace": "openshift-operators"},
        "spec": {"displayName": name, "version": "1.0.0"},
        "status": {"phase": "Succeeded"}
    }))
}

pub fn node(name: &str, kubelet_version: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            node_info: Some(NodeSystemInfo {
                kubelet_version: kubelet_version.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
