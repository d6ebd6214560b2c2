use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Node, NodeCondition};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;

use crate::models::{Condition, NodeRecord, NodeSource, ResourceList};

use super::{created_at, DATA_SOURCE_ANNOTATION};

static ROLE_LABELS: [(&str, &str); 3] = [
    ("node-role.kubernetes.io/master", "master"),
    ("node-role.kubernetes.io/control-plane", "control-plane"),
    ("node-role.kubernetes.io/worker", "worker"),
];

fn role(labels: &BTreeMap<String, String>) -> &'static str {
    ROLE_LABELS
        .iter()
        .find(|(label, _)| labels.contains_key(*label))
        .map(|(_, role)| *role)
        .unwrap_or("worker")
}

fn resource_list(quantities: Option<&BTreeMap<String, Quantity>>) -> ResourceList {
    let get = |key: &str| {
        quantities
            .and_then(|q| q.get(key))
            .map(|q| q.0.clone())
            .unwrap_or_default()
    };
    ResourceList {
        cpu: get("cpu"),
        memory: get("memory"),
        storage: get("storage"),
        ephemeral_storage: get("ephemeral-storage"),
        pods: get("pods"),
    }
}

fn condition(c: &NodeCondition) -> Condition {
    Condition {
        type_: c.type_.clone(),
        status: c.status.clone(),
        reason: c.reason.clone().unwrap_or_default(),
        message: c.message.clone().unwrap_or_default(),
        last_transition_time: c.last_transition_time.as_ref().map(|t| t.0),
    }
}

pub fn to_node_record(node: &Node) -> NodeRecord {
    let labels = node.labels().clone();
    let mut annotations = node.annotations().clone();
    annotations.insert(
        DATA_SOURCE_ANNOTATION.to_string(),
        NodeSource::Node.as_str().to_string(),
    );

    let status = node.status.as_ref();
    let conditions: Vec<Condition> = status
        .and_then(|s| s.conditions.as_ref())
        .map(|cs| cs.iter().map(condition).collect())
        .unwrap_or_default();
    let ready = conditions
        .iter()
        .find(|c| c.type_ == "Ready")
        .map(|c| if c.status == "True" { "Ready" } else { "NotReady" })
        .unwrap_or("Unknown");

    let mut record = NodeRecord {
        name: node.name_any(),
        status: ready.to_string(),
        role: role(&labels).to_string(),
        capacity: resource_list(status.and_then(|s| s.capacity.as_ref())),
        allocatable: resource_list(status.and_then(|s| s.allocatable.as_ref())),
        source: NodeSource::Node,
        conditions,
        labels,
        annotations,
        created_at: created_at(&node.metadata),
        ..Default::default()
    };

    for address in status.and_then(|s| s.addresses.as_ref()).into_iter().flatten() {
        match address.type_.as_str() {
            "InternalIP" => record.internal_ip = address.address.clone(),
            "ExternalIP" => record.external_ip = address.address.clone(),
            _ => {}
        }
    }

    if let Some(info) = status.and_then(|s| s.node_info.as_ref()) {
        record.kernel_version = info.kernel_version.clone();
        record.os_image = info.os_image.clone();
        record.container_runtime = info.container_runtime_version.clone();
        record.kubelet_version = info.kubelet_version.clone();
    }

    record
}
