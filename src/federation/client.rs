//! Cluster API seam and the kube-rs backed client factory.
//!
//! The aggregator only talks to clusters through [`ClusterApi`], which lets
//! tests substitute in-memory clusters while production code uses real API
//! calls.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Secret};
use kube::api::{Api, DynamicObject, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config, ResourceExt};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::api::ResourceRegistry;
use crate::credentials::{AuthMethod, CaSource, RemoteCredential};

pub type CallResult<T> = std::result::Result<T, CallError>;

#[derive(Error, Debug)]
pub enum CallError {
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("cluster unavailable: {0}")]
    Unavailable(String),

    #[error("call cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl CallError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CallError::Cancelled | CallError::DeadlineExceeded)
    }
}

/// Queries the aggregator issues against a single cluster
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_managed_clusters(&self) -> CallResult<Vec<DynamicObject>>;

    async fn get_managed_cluster(&self, name: &str) -> CallResult<Option<DynamicObject>>;

    async fn list_policies(&self, namespace: &str) -> CallResult<Vec<DynamicObject>>;

    async fn list_bare_metal_hosts(&self, namespace: &str) -> CallResult<Vec<DynamicObject>>;

    /// Installed operators across all namespaces
    async fn list_operators(&self) -> CallResult<Vec<DynamicObject>>;

    async fn list_cluster_versions(&self) -> CallResult<Vec<DynamicObject>>;

    async fn get_route(&self, namespace: &str, name: &str) -> CallResult<Option<DynamicObject>>;

    async fn list_routes(&self, namespace: &str) -> CallResult<Vec<DynamicObject>>;

    async fn list_nodes(&self) -> CallResult<Vec<Node>>;

    async fn list_namespaces(&self) -> CallResult<Vec<String>>;

    async fn get_secret(&self, namespace: &str, name: &str) -> CallResult<Option<Secret>>;
}

/// [`ClusterApi`] over a kube-rs client
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
    registry: Arc<ResourceRegistry>,
}

impl KubeClusterApi {
    pub fn new(client: Client, registry: Arc<ResourceRegistry>) -> Self {
        Self { client, registry }
    }

    fn dynamic(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }

    async fn list_dynamic(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
    ) -> CallResult<Vec<DynamicObject>> {
        Ok(self
            .dynamic(resource, namespace)
            .list(&ListParams::default())
            .await?
            .items)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_managed_clusters(&self) -> CallResult<Vec<DynamicObject>> {
        self.list_dynamic(&self.registry.managed_clusters, None).await
    }

    async fn get_managed_cluster(&self, name: &str) -> CallResult<Option<DynamicObject>> {
        Ok(self
            .dynamic(&self.registry.managed_clusters, None)
            .get_opt(name)
            .await?)
    }

    async fn list_policies(&self, namespace: &str) -> CallResult<Vec<DynamicObject>> {
        self.list_dynamic(&self.registry.policies, Some(namespace)).await
    }

    async fn list_bare_metal_hosts(&self, namespace: &str) -> CallResult<Vec<DynamicObject>> {
        self.list_dynamic(&self.registry.bare_metal_hosts, Some(namespace))
            .await
    }

    async fn list_operators(&self) -> CallResult<Vec<DynamicObject>> {
        self.list_dynamic(&self.registry.cluster_service_versions, None)
            .await
    }

    async fn list_cluster_versions(&self) -> CallResult<Vec<DynamicObject>> {
        self.list_dynamic(&self.registry.cluster_versions, None).await
    }

    async fn get_route(&self, namespace: &str, name: &str) -> CallResult<Option<DynamicObject>> {
        Ok(self
            .dynamic(&self.registry.routes, Some(namespace))
            .get_opt(name)
            .await?)
    }

    async fn list_routes(&self, namespace: &str) -> CallResult<Vec<DynamicObject>> {
        self.list_dynamic(&self.registry.routes, Some(namespace)).await
    }

    async fn list_nodes(&self) -> CallResult<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        Ok(nodes.list(&ListParams::default()).await?.items)
    }

    async fn list_namespaces(&self) -> CallResult<Vec<String>> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(namespaces
            .list(&ListParams::default())
            .await?
            .items
            .iter()
            .map(ResourceExt::name_any)
            .collect())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> CallResult<Option<Secret>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(secrets.get_opt(name).await?)
    }
}

pub type ConnectResult<T> = std::result::Result<T, ConnectError>;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("invalid client configuration for {cluster}: {reason}")]
    Kubeconfig { cluster: String, reason: String },

    #[error("client construction for {cluster} failed: {source}")]
    Client {
        cluster: String,
        #[source]
        source: kube::Error,
    },
}

/// Builds clients for remote clusters from resolved credentials
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Bind a client to the credential's endpoint, trust material and auth.
    ///
    /// Connectivity is not probed here; failures surface on the first query.
    async fn connect(&self, credential: &RemoteCredential) -> ConnectResult<Arc<dyn ClusterApi>>;
}

#[derive(Clone, Default)]
pub struct KubeClientFactory {
    registry: Arc<ResourceRegistry>,
}

impl KubeClientFactory {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self { registry }
    }
}

/// Render a single-context kubeconfig carrying only the selected auth method.
pub fn minimal_kubeconfig(credential: &RemoteCredential) -> Value {
    let mut cluster = Map::new();
    cluster.insert("server".into(), json!(credential.server));
    match &credential.ca {
        Some(CaSource::Data(data)) => {
            cluster.insert("certificate-authority-data".into(), json!(data));
        }
        Some(CaSource::File(path)) => {
            cluster.insert("certificate-authority".into(), json!(path));
        }
        None => {}
    }
    if credential.insecure_skip_tls_verify {
        cluster.insert("insecure-skip-tls-verify".into(), json!(true));
    }
    if let Some(server_name) = &credential.tls_server_name {
        cluster.insert("tls-server-name".into(), json!(server_name));
    }

    let user = match &credential.auth {
        Some(AuthMethod::ClientCertificate {
            certificate_data,
            key_data,
        }) => json!({
            "client-certificate-data": certificate_data,
            "client-key-data": key_data,
        }),
        Some(AuthMethod::Token(token)) => json!({ "token": token }),
        Some(AuthMethod::TokenFile(path)) => json!({ "tokenFile": path }),
        Some(AuthMethod::Basic { username, password }) => json!({
            "username": username,
            "password": password,
        }),
        None => json!({}),
    };

    let name = &credential.cluster;
    json!({
        "apiVersion": "v1",
        "kind": "Config",
        "current-context": name,
        "clusters": [{ "name": name, "cluster": cluster }],
        "users": [{ "name": name, "user": user }],
        "contexts": [{ "name": name, "context": { "cluster": name, "user": name } }],
    })
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    async fn connect(&self, credential: &RemoteCredential) -> ConnectResult<Arc<dyn ClusterApi>> {
        let cluster = credential.cluster.clone();
        let invalid = |reason: String| ConnectError::Kubeconfig {
            cluster: cluster.clone(),
            reason,
        };

        let kubeconfig: Kubeconfig = serde_json::from_value(minimal_kubeconfig(credential))
            .map_err(|e| invalid(e.to_string()))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| invalid(e.to_string()))?;
        let client = Client::try_from(config).map_err(|source| ConnectError::Client {
            cluster: cluster.clone(),
            source,
        })?;

        debug!(cluster = %cluster, server = %credential.server, "built remote client");
        Ok(Arc::new(KubeClusterApi::new(client, self.registry.clone())))
    }
}
