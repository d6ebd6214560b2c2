use kube::api::DynamicObject;

use crate::api::Document;
use crate::models::{ClusterInfo, ClusterRecord, ClusterStatus};

use super::{annotations, conditions, created_at, labels, name};

pub static AVAILABLE_CONDITION: &str = "ManagedClusterConditionAvailable";

pub static PLATFORM_CLAIM: &str = "platform.open-cluster-management.io";
pub static REGION_CLAIM: &str = "region.open-cluster-management.io";
pub static OPENSHIFT_VERSION_CLAIM: &str = "version.openshift.io";
pub static CONSOLE_URL_CLAIM: &str = "consoleurl.cluster.open-cluster-management.io";
pub static KUBE_VERSION_CLAIM: &str = "kubeversion.open-cluster-management.io";
pub static CONFIGURATION_VERSION_LABEL: &str = "configuration-version";

fn claims<'a>(doc: Document<'a>) -> impl Iterator<Item = (&'a str, &'a str)> {
    doc.array_at(&["status", "clusterClaims"])
        .iter()
        .map(Document::new)
        .filter_map(|claim| Some((claim.str_at(&["name"])?, claim.str_at(&["value"])?)))
}

pub fn cluster_status(doc: Document<'_>) -> ClusterStatus {
    doc.array_at(&["status", "conditions"])
        .iter()
        .map(Document::new)
        .find(|c| c.str_at(&["type"]) == Some(AVAILABLE_CONDITION))
        .map(|c| match c.str_at(&["status"]) {
            Some("True") => ClusterStatus::Ready,
            _ => ClusterStatus::NotReady,
        })
        .unwrap_or_default()
}

pub fn cluster_version(doc: Document<'_>) -> String {
    doc.str_at(&["status", "version", "kubernetes"])
        .filter(|v| !v.is_empty())
        .or_else(|| {
            claims(doc)
                .find(|(name, _)| *name == OPENSHIFT_VERSION_CLAIM)
                .map(|(_, value)| value)
        })
        .unwrap_or("Unknown")
        .to_string()
}

pub fn cluster_info(obj: &DynamicObject) -> ClusterInfo {
    let doc = Document::new(&obj.data);
    let mut info = ClusterInfo {
        cluster_id: obj.metadata.uid.clone().unwrap_or_default(),
        kubernetes_version: doc.string_or(&["status", "version", "kubernetes"], ""),
        region: obj
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(CONFIGURATION_VERSION_LABEL))
            .cloned()
            .unwrap_or_default(),
        created_at: created_at(&obj.metadata),
        ..Default::default()
    };

    for (claim, value) in claims(doc) {
        let value = value.to_string();
        match claim {
            c if c == PLATFORM_CLAIM => info.platform = value,
            c if c == REGION_CLAIM && info.region.is_empty() => info.region = value,
            c if c == OPENSHIFT_VERSION_CLAIM => info.openshift_version = value,
            c if c == CONSOLE_URL_CLAIM => info.console_url = value,
            c if c == KUBE_VERSION_CLAIM => info.kubernetes_version = value,
            _ => {}
        }
    }

    info
}

/// Record for a managed cluster object. `hub` names the owner of a spoke.
pub fn to_cluster_record(obj: &DynamicObject, hub: Option<&str>) -> Option<ClusterRecord> {
    let name = name(obj)?;
    let doc = Document::new(&obj.data);

    Some(ClusterRecord {
        namespace: name.clone(),
        name,
        status: cluster_status(doc),
        version: cluster_version(doc),
        conditions: conditions(doc),
        cluster_info: cluster_info(obj),
        labels: labels(&obj.metadata),
        annotations: annotations(&obj.metadata),
        hub_name: hub.map(str::to_string),
        created_at: created_at(&obj.metadata),
        ..Default::default()
    })
}

/// Overlay OpenShift version and cluster ID from a ClusterVersion object
pub fn with_cluster_version(mut info: ClusterInfo, cluster_version: &DynamicObject) -> ClusterInfo {
    let doc = Document::new(&cluster_version.data);
    if let Some(version) = doc.str_at(&["status", "desired", "version"]) {
        info.openshift_version = version.to_string();
    }
    if let Some(id) = doc.str_at(&["spec", "clusterID"]) {
        info.cluster_id = id.to_string();
    }
    info
}

pub fn route_url(route: &DynamicObject) -> Option<String> {
    Document::new(&route.data)
        .str_at(&["spec", "host"])
        .filter(|host| !host.is_empty())
        .map(|host| format!("https://{host}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn managed_cluster(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn managed_cluster_conversion() {
        let obj = managed_cluster(json!({
            "apiVersion": "cluster.open-cluster-management.io/v1",
            "kind": "ManagedCluster",
            "metadata": {
                "name": "sno-1",
                "uid": "1234",
                "labels": {"managed-by": "hub-a", "configuration-version": "4.16-v1"},
                "creationTimestamp": "2024-05-01T10:00:00Z"
            },
            "status": {
                "conditions": [
                    {"type": "HubAcceptedManagedCluster", "status": "True"},
                    {"type": "ManagedClusterConditionAvailable", "status": "True",
                     "reason": "ManagedClusterAvailable", "message": "ok",
                     "lastTransitionTime": "2024-05-01T10:05:00Z"}
                ],
                "version": {"kubernetes": "v1.29.6"},
                "clusterClaims": [
                    {"name": "platform.open-cluster-management.io", "value": "BareMetal"},
                    {"name": "region.open-cluster-management.io", "value": "eu-west"},
                    {"name": "version.openshift.io", "value": "4.16.3"},
                    {"name": "consoleurl.cluster.open-cluster-management.io", "value": "https://console"}
                ]
            }
        }));

        let record = to_cluster_record(&obj, Some("hub-a")).unwrap();
        assert_eq!(record.namespace, "sno-1");
        assert_eq!(record.status, ClusterStatus::Ready);
        assert_eq!(record.version, "v1.29.6");
        assert_eq!(record.conditions.len(), 2);
        assert!(record.conditions[1].last_transition_time.is_some());
        assert_eq!(record.hub_name.as_deref(), Some("hub-a"));
        assert_eq!(record.cluster_info.platform, "BareMetal");
        // label wins over the region claim
        assert_eq!(record.cluster_info.region, "4.16-v1");
        assert_eq!(record.cluster_info.openshift_version, "4.16.3");
        assert_eq!(record.cluster_info.cluster_id, "1234");
    }

    #[test]
    fn sparse_cluster_defaults() {
        let obj = managed_cluster(json!({
            "apiVersion": "cluster.open-cluster-management.io/v1",
            "kind": "ManagedCluster",
            "metadata": {"name": "bare"},
            "status": {"clusterClaims": [{"name": "version.openshift.io", "value": "4.14.1"}]}
        }));

        let record = to_cluster_record(&obj, None).unwrap();
        assert_eq!(record.status, ClusterStatus::Unknown);
        assert_eq!(record.version, "4.14.1");
        assert!(record.conditions.is_empty());

        let unavailable = managed_cluster(json!({
            "apiVersion": "cluster.open-cluster-management.io/v1",
            "kind": "ManagedCluster",
            "metadata": {"name": "down"},
            "status": {"conditions": [{"type": "ManagedClusterConditionAvailable", "status": "Unknown"}]}
        }));
        let record = to_cluster_record(&unavailable, None).unwrap();
        assert_eq!(record.status, ClusterStatus::NotReady);
        assert_eq!(record.version, "Unknown");
    }

    #[test]
    fn cluster_version_and_routes() {
        let cv = managed_cluster(json!({
            "apiVersion": "config.openshift.io/v1",
            "kind": "ClusterVersion",
            "metadata": {"name": "version"},
            "spec": {"clusterID": "abc-123"},
            "status": {"desired": {"version": "4.16.3"}}
        }));
        let info = with_cluster_version(ClusterInfo::default(), &cv);
        assert_eq!(info.cluster_id, "abc-123");
        assert_eq!(info.openshift_version, "4.16.3");

        let route = managed_cluster(json!({
            "apiVersion": "route.openshift.io/v1",
            "kind": "Route",
            "metadata": {"name": "console", "namespace": "openshift-console"},
            "spec": {"host": "console.apps.hub-a"}
        }));
        assert_eq!(route_url(&route).as_deref(), Some("https://console.apps.hub-a"));
    }
}
