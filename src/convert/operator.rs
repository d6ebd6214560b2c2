use kube::api::DynamicObject;

use crate::api::Document;
use crate::models::OperatorRecord;

use super::{created_at, name};

/// Operator summary from a ClusterServiceVersion
pub fn to_operator_record(csv: &DynamicObject) -> Option<OperatorRecord> {
    let name = name(csv)?;
    let doc = Document::new(&csv.data);

    Some(OperatorRecord {
        display_name: doc
            .str_at(&["spec", "displayName"])
            .filter(|d| !d.is_empty())
            .unwrap_or(&name)
            .to_string(),
        version: doc.string_or(&["spec", "version"], ""),
        namespace: csv.metadata.namespace.clone().unwrap_or_default(),
        phase: doc.string_or(&["status", "phase"], ""),
        provider: doc.string_or(&["spec", "provider", "name"], ""),
        created_at: created_at(&csv.metadata),
        name,
    })
}
