//! Pure, total conversions from loosely-typed cluster objects to records.
//!
//! Missing or oddly shaped fields default; only an object without a name is
//! skipped entirely.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::api::{DynamicObject, ObjectMeta};

use crate::api::Document;
use crate::models::Condition;

pub mod baremetal;
pub mod cluster;
pub mod node;
pub mod operator;
pub mod policy;

pub use baremetal::to_bare_metal_node;
pub use cluster::{route_url, to_cluster_record, with_cluster_version};
pub use node::to_node_record;
pub use operator::to_operator_record;
pub use policy::to_policy_record;

/// Annotation mirroring [`crate::models::NodeSource`] on node records
pub static DATA_SOURCE_ANNOTATION: &str = "data-source";

pub(crate) fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub(crate) fn created_at(meta: &ObjectMeta) -> Option<DateTime<Utc>> {
    meta.creation_timestamp.as_ref().map(|t| t.0)
}

pub(crate) fn labels(meta: &ObjectMeta) -> BTreeMap<String, String> {
    meta.labels.clone().unwrap_or_default()
}

pub(crate) fn annotations(meta: &ObjectMeta) -> BTreeMap<String, String> {
    meta.annotations.clone().unwrap_or_default()
}

pub(crate) fn name(obj: &DynamicObject) -> Option<String> {
    obj.metadata.name.clone().filter(|n| !n.is_empty())
}

/// `status.conditions` in the metav1.Condition shape
pub(crate) fn conditions(doc: Document<'_>) -> Vec<Condition> {
    doc.array_at(&["status", "conditions"])
        .iter()
        .map(Document::new)
        .map(|c| Condition {
            type_: c.string_or(&["type"], ""),
            status: c.string_or(&["status"], ""),
            reason: c.string_or(&["reason"], ""),
            message: c.string_or(&["message"], ""),
            last_transition_time: c.str_at(&["lastTransitionTime"]).and_then(parse_time),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_parse_or_default() {
        assert!(parse_time("2024-05-01T10:00:00Z").is_some());
        assert!(parse_time("yesterday").is_none());
    }
}
