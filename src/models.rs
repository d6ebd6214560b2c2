use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status reported for a hub or spoke
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClusterStatus {
    Ready,
    NotReady,
    #[default]
    Unknown,
    /// A remote client was built and the cluster answered the node query
    Connected,
    /// A hub known only through a manually stored credential
    External,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    pub last_transition_time: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ClusterInfo {
    #[serde(rename = "clusterID")]
    pub cluster_id: String,
    #[serde(rename = "kubernetesVersion")]
    pub kubernetes_version: String,
    pub platform: String,
    pub region: String,
    #[serde(rename = "openshiftVersion")]
    pub openshift_version: String,
    #[serde(rename = "consoleURL")]
    pub console_url: String,
    #[serde(rename = "gitopsURL")]
    pub gitops_url: String,
    #[serde(rename = "apiURL")]
    pub api_url: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A hub or a spoke, as assembled by one aggregation pass.
///
/// Node, policy and operator collections hold whatever was collected; an empty
/// collection means the sub-query failed or returned nothing.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    pub name: String,
    pub namespace: String,
    pub status: ClusterStatus,
    pub version: String,
    pub conditions: Vec<Condition>,
    pub cluster_info: ClusterInfo,
    pub nodes_info: Vec<NodeRecord>,
    pub policies_info: Vec<PolicyRecord>,
    pub operators_info: Vec<OperatorRecord>,
    /// Spokes of a hub, in discovery order. Always empty for spokes.
    pub managed_clusters: Vec<ClusterRecord>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ClusterRecord {
    pub fn is_hub(&self) -> bool {
        self.hub_name.is_none()
    }
}

/// Which object kind a node record was built from
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeSource {
    #[default]
    Node,
    BareMetalHost,
}

impl NodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeSource::Node => "Node",
            NodeSource::BareMetalHost => "BareMetalHost",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    pub cpu: String,
    pub memory: String,
    pub storage: String,
    pub ephemeral_storage: String,
    pub pods: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub name: String,
    pub status: String,
    pub role: String,
    #[serde(rename = "internalIP")]
    pub internal_ip: String,
    #[serde(rename = "externalIP")]
    pub external_ip: String,
    pub kernel_version: String,
    pub os_image: String,
    pub container_runtime: String,
    pub kubelet_version: String,
    pub conditions: Vec<Condition>,
    pub capacity: ResourceList,
    pub allocatable: ResourceList,
    pub source: NodeSource,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
    pub name: String,
    pub namespace: String,
    pub remediation_action: String,
    pub compliance_state: String,
    pub severity: String,
    pub categories: Vec<String>,
    pub standards: Vec<String>,
    pub controls: Vec<String>,
    pub violations: usize,
    pub disabled: bool,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorRecord {
    pub name: String,
    pub display_name: String,
    pub version: String,
    pub namespace: String,
    pub phase: String,
    pub provider: String,
    pub created_at: Option<DateTime<Utc>>,
}
