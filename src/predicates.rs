//! Label heuristics classifying managed clusters as hubs or spokes.

use std::collections::BTreeMap;

pub static CLUSTERSET_LABEL: &str = "cluster.open-cluster-management.io/clusterset";
pub static MULTICLUSTER_HUB_ADDON_LABEL: &str =
    "feature.open-cluster-management.io/addon-multicluster-hub";
pub static VENDOR_LABEL: &str = "vendor";
pub static HUB_LABEL: &str = "hub";
pub static MANAGED_BY_LABEL: &str = "managed-by";

pub static GLOBAL_HUB_CLUSTERSET: &str = "global-hub";
pub static ADDON_AVAILABLE: &str = "available";
pub static OPENSHIFT_VENDOR: &str = "OpenShift";

/// Name under which every hub registers itself
pub static LOCAL_CLUSTER: &str = "local-cluster";

type Labels = BTreeMap<String, String>;

fn label_is(labels: &Labels, key: &str, value: &str) -> bool {
    labels.get(key).is_some_and(|v| v == value)
}

pub fn is_hub(labels: &Labels) -> bool {
    label_is(labels, CLUSTERSET_LABEL, GLOBAL_HUB_CLUSTERSET)
        || label_is(labels, MULTICLUSTER_HUB_ADDON_LABEL, ADDON_AVAILABLE)
        || (label_is(labels, VENDOR_LABEL, OPENSHIFT_VENDOR) && labels.contains_key(HUB_LABEL))
}

pub fn belongs_to_hub(labels: &Labels, hub: &str) -> bool {
    label_is(labels, MANAGED_BY_LABEL, hub) || label_is(labels, CLUSTERSET_LABEL, hub)
}

/// Pick the owning hub of a non-hub cluster.
///
/// An explicit `managed-by` match takes precedence over a clusterset match;
/// within the same kind of match the first hub in `hubs` order wins.
pub fn assign_owner<'h>(labels: &Labels, hubs: &[&'h str]) -> Option<&'h str> {
    hubs.iter()
        .find(|hub| label_is(labels, MANAGED_BY_LABEL, hub))
        .or_else(|| hubs.iter().find(|hub| label_is(labels, CLUSTERSET_LABEL, hub)))
        .copied()
}

/// Whether a cluster listed on a hub should be reported as one of its spokes
pub fn is_spoke_of(name: &str, labels: &Labels, hub: &str) -> bool {
    name != hub && name != LOCAL_CLUSTER && !is_hub(labels)
}
