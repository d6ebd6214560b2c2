use chrono::{DateTime, Utc};
use kube::api::DynamicObject;

use crate::api::Document;
use crate::models::PolicyRecord;

use super::{annotations, created_at, labels, name, parse_time};

pub static SEVERITY_ANNOTATION: &str = "policy.open-cluster-management.io/severity";
pub static CATEGORIES_ANNOTATION: &str = "policy.open-cluster-management.io/categories";
pub static STANDARDS_ANNOTATION: &str = "policy.open-cluster-management.io/standards";
pub static CONTROLS_ANNOTATION: &str = "policy.open-cluster-management.io/controls";

pub static LATEST_MESSAGE_ANNOTATION: &str = "latest-status-message";
pub static LATEST_TIMESTAMP_ANNOTATION: &str = "latest-status-timestamp";

static DEFAULT_SEVERITY: &str = "medium";

fn split_list(value: Option<&String>) -> Vec<String> {
    value
        .into_iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Most recent history entry of the first compliance detail
fn latest_status(doc: Document<'_>) -> Option<(&str, DateTime<Utc>, &str)> {
    let first = doc.array_at(&["status", "details"]).first().map(Document::new)?;
    first
        .array_at(&["history"])
        .iter()
        .map(Document::new)
        .filter_map(|entry| {
            let raw = entry.str_at(&["lastTimestamp"])?;
            Some((raw, parse_time(raw)?, entry.str_at(&["message"]).unwrap_or_default()))
        })
        .max_by_key(|(_, time, _)| *time)
}

pub fn to_policy_record(obj: &DynamicObject) -> Option<PolicyRecord> {
    let name = name(obj)?;
    let doc = Document::new(&obj.data);
    let mut annotations = annotations(&obj.metadata);

    if let Some((raw, _, message)) = latest_status(doc).filter(|(_, _, m)| !m.is_empty()) {
        annotations.insert(LATEST_MESSAGE_ANNOTATION.into(), message.to_string());
        annotations.insert(LATEST_TIMESTAMP_ANNOTATION.into(), raw.to_string());
    }

    let violations = doc
        .array_at(&["status", "details"])
        .iter()
        .filter_map(|d| Document::new(d).str_at(&["compliant"]))
        .filter(|state| *state != "Compliant")
        .count();

    Some(PolicyRecord {
        name,
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        remediation_action: doc.string_or(&["spec", "remediationAction"], ""),
        compliance_state: doc.string_or(&["status", "compliant"], ""),
        severity: annotations
            .get(SEVERITY_ANNOTATION)
            .cloned()
            .unwrap_or_else(|| DEFAULT_SEVERITY.to_string()),
        categories: split_list(annotations.get(CATEGORIES_ANNOTATION)),
        standards: split_list(annotations.get(STANDARDS_ANNOTATION)),
        controls: split_list(annotations.get(CONTROLS_ANNOTATION)),
        violations,
        disabled: doc.bool_at(&["spec", "disabled"]).unwrap_or(false),
        labels: labels(&obj.metadata),
        created_at: created_at(&obj.metadata),
        annotations,
    })
}
