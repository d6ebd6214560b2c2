use kube::api::GroupVersionKind;
use kube::discovery::ApiResource;

/// Identities of the loosely-typed resource kinds the monitor queries.
///
/// Passed explicitly into the client factory so remote clusters serving a
/// different storage version can be targeted without touching shared state.
#[derive(Clone, Debug)]
pub struct ResourceRegistry {
    pub managed_clusters: ApiResource,
    pub policies: ApiResource,
    pub bare_metal_hosts: ApiResource,
    pub cluster_service_versions: ApiResource,
    pub cluster_versions: ApiResource,
    pub routes: ApiResource,
}

fn resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self {
            managed_clusters: resource(
                "cluster.open-cluster-management.io",
                "v1",
                "ManagedCluster",
                "managedclusters",
            ),
            policies: resource(
                "policy.open-cluster-management.io",
                "v1",
                "Policy",
                "policies",
            ),
            bare_metal_hosts: resource("metal3.io", "v1alpha1", "BareMetalHost", "baremetalhosts"),
            cluster_service_versions: resource(
                "operators.coreos.com",
                "v1alpha1",
                "ClusterServiceVersion",
                "clusterserviceversions",
            ),
            cluster_versions: resource(
                "config.openshift.io",
                "v1",
                "ClusterVersion",
                "clusterversions",
            ),
            routes: resource("route.openshift.io", "v1", "Route", "routes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_identities() {
        let registry = ResourceRegistry::default();
        assert_eq!(
            registry.managed_clusters.api_version,
            "cluster.open-cluster-management.io/v1"
        );
        assert_eq!(registry.bare_metal_hosts.plural, "baremetalhosts");
        assert_eq!(registry.cluster_service_versions.kind, "ClusterServiceVersion");
        assert_eq!(registry.routes.group, "route.openshift.io");
    }
}
