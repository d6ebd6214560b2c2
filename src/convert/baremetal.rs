//! BareMetalHost inventory folded into the node shape.
//!
//! Hardware details that have no field on [`NodeRecord`] land in annotations.

use kube::api::DynamicObject;

use crate::api::Document;
use crate::models::{Condition, NodeRecord, NodeSource};

use super::{created_at, labels, name, DATA_SOURCE_ANNOTATION};

pub static BAREMETAL_ROLE: &str = "baremetal";
pub static POWERED_OFF_STATUS: &str = "Ready (PoweredOff)";

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

pub fn to_bare_metal_node(obj: &DynamicObject) -> Option<NodeRecord> {
    let name = name(obj)?;
    let doc = Document::new(&obj.data);
    let mut node = NodeRecord {
        name,
        role: BAREMETAL_ROLE.to_string(),
        source: NodeSource::BareMetalHost,
        labels: labels(&obj.metadata),
        created_at: created_at(&obj.metadata),
        ..Default::default()
    };
    node.annotations.insert(
        DATA_SOURCE_ANNOTATION.to_string(),
        NodeSource::BareMetalHost.as_str().to_string(),
    );
    if let Some(bmc) = doc.str_at(&["spec", "bmc", "address"]) {
        node.annotations.insert("bmc-address".into(), bmc.to_string());
    }

    node.status = match doc.str_at(&["status", "provisioning", "state"]) {
        Some("provisioned") => "Ready".to_string(),
        Some(state) if !state.is_empty() => state.to_string(),
        _ => "Unknown".to_string(),
    };
    let provisioned = node.status == "Ready";
    match doc.bool_at(&["status", "poweredOn"]) {
        Some(true) => {
            node.annotations.insert("power-status".into(), "on".into());
        }
        Some(false) => {
            node.annotations.insert("power-status".into(), "off".into());
            if provisioned {
                node.status = POWERED_OFF_STATUS.to_string();
            }
        }
        None => {}
    }

    if let Some(hw) = doc.object_at(&["status", "hardware"]) {
        hardware(&mut node, hw);
    }

    if provisioned {
        node.conditions.push(Condition {
            type_: "Ready".to_string(),
            status: "True".to_string(),
            reason: "BMHProvisioned".to_string(),
            message: "BareMetalHost is provisioned and ready".to_string(),
            last_transition_time: node.created_at,
        });
    }

    Some(node)
}

fn hardware(node: &mut NodeRecord, hw: Document<'_>) {
    let annotations = &mut node.annotations;

    if let Some(cores) = positive(hw.number_at(&["cpu", "count"])) {
        let cores = cores as u64;
        node.capacity.cpu = format!("{cores} cores");
        node.allocatable.cpu = node.capacity.cpu.clone();
        annotations.insert("cpu-cores".into(), cores.to_string());
    }
    if let Some(arch) = hw.str_at(&["cpu", "arch"]) {
        node.kernel_version = arch.to_string();
        annotations.insert("cpu-arch".into(), arch.to_string());
    }
    if let Some(mhz) = positive(hw.number_at(&["cpu", "clockMegahertz"])) {
        annotations.insert("cpu-clock-mhz".into(), format!("{mhz:.0}"));
    }
    if let Some(model) = hw.str_at(&["cpu", "model"]) {
        annotations.insert("cpu-model".into(), model.to_string());
    }

    if let Some(mib) = positive(hw.number_at(&["ramMebibytes"])) {
        node.capacity.memory = format!("{:.0}Gi", mib / 1024.0);
        node.allocatable.memory = node.capacity.memory.clone();
    }

    let disks: Vec<Document<'_>> = hw
        .array_at(&["storage"])
        .iter()
        .filter(|d| d.is_object())
        .map(Document::new)
        .collect();
    let mut total_bytes = 0.0;
    let mut detail_index = 0;
    for disk in &disks {
        let Some(bytes) = positive(disk.number_at(&["sizeBytes"])) else {
            continue;
        };
        total_bytes += bytes;
        detail_index += 1;
        annotations.insert(
            format!("disk-{detail_index}"),
            format!(
                "{} {:.0}Gi ({})",
                disk.str_at(&["type"]).unwrap_or("Unknown"),
                bytes / GIB,
                disk.str_at(&["model"]).unwrap_or_default()
            ),
        );
    }
    if !disks.is_empty() {
        annotations.insert("disk-count".into(), disks.len().to_string());
    }
    if total_bytes > 0.0 {
        let total = total_bytes / GIB;
        node.capacity.storage = format!("{total:.0}Gi ({} disks)", disks.len());
        node.allocatable.storage = format!("{total:.0}Gi");
    }

    if let Some(nics) = hw.at(&["nics"]).and_then(|n| n.as_array()) {
        let nics: Vec<Document<'_>> = nics.iter().map(Document::new).collect();
        annotations.insert("nic-count".into(), nics.len().to_string());

        if let Some(primary) = nics
            .iter()
            .find(|nic| nic.str_at(&["ip"]).is_some_and(|ip| !ip.is_empty()))
        {
            node.internal_ip = primary.string_or(&["ip"], "");
            if let Some(mac) = primary.str_at(&["mac"]) {
                annotations.insert("primary-mac".into(), mac.to_string());
            }
            if let Some(nic) = primary.str_at(&["name"]) {
                annotations.insert("primary-nic".into(), nic.to_string());
            }
        }

        let macs: Vec<&str> = nics.iter().filter_map(|nic| nic.str_at(&["mac"])).collect();
        if !macs.is_empty() {
            annotations.insert("all-macs".into(), macs.join(","));
        }
    }

    for (field, key) in [
        ("manufacturer", "manufacturer"),
        ("productName", "product-name"),
        ("serialNumber", "serial-number"),
    ] {
        if let Some(value) = hw.str_at(&["systemVendor", field]) {
            annotations.insert(key.into(), value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn host(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn provisioned_host_inventory() {
        let obj = host(json!({
            "apiVersion": "metal3.io/v1alpha1",
            "kind": "BareMetalHost",
            "metadata": {"name": "worker-0", "namespace": "sno-1", "creationTimestamp": "2024-05-01T10:00:00Z"},
            "spec": {"bmc": {"address": "redfish://10.1.0.4/redfish/v1/Systems/1"}},
            "status": {
                "poweredOn": true,
                "provisioning": {"state": "provisioned"},
                "hardware": {
                    "cpu": {"count": 64, "arch": "x86_64", "clockMegahertz": 2400.0, "model": "Xeon"},
                    "ramMebibytes": 16384,
                    "storage": [
                        {"sizeBytes": 480103981056u64, "type": "SSD", "model": "Dell"},
                        {"sizeBytes": "960197124096", "type": "NVME", "model": "Samsung"}
                    ],
                    "nics": [
                        {"name": "eno1", "mac": "aa:bb", "ip": ""},
                        {"name": "eno2", "mac": "cc:dd", "ip": "10.1.0.20"}
                    ],
                    "systemVendor": {"manufacturer": "Dell Inc.", "productName": "R640", "serialNumber": "XYZ"}
                }
            }
        }));

        let node = to_bare_metal_node(&obj).unwrap();
        assert_eq!(node.status, "Ready");
        assert_eq!(node.role, "baremetal");
        assert_eq!(node.source, NodeSource::BareMetalHost);
        assert_eq!(node.capacity.cpu, "64 cores");
        assert_eq!(node.capacity.memory, "16Gi");
        assert_eq!(node.allocatable.memory, "16Gi");
        assert_eq!(node.capacity.storage, "1341Gi (2 disks)");
        assert_eq!(node.kernel_version, "x86_64");
        assert_eq!(node.internal_ip, "10.1.0.20");

        let a = &node.annotations;
        assert_eq!(a["data-source"], "BareMetalHost");
        assert_eq!(a["power-status"], "on");
        assert_eq!(a["cpu-clock-mhz"], "2400");
        assert_eq!(a["disk-count"], "2");
        assert_eq!(a["disk-1"], "SSD 447Gi (Dell)");
        assert_eq!(a["nic-count"], "2");
        assert_eq!(a["primary-nic"], "eno2");
        assert_eq!(a["primary-mac"], "cc:dd");
        assert_eq!(a["all-macs"], "aa:bb,cc:dd");
        assert_eq!(a["product-name"], "R640");
        assert_eq!(node.conditions[0].reason, "BMHProvisioned");
    }

    #[test]
    fn powered_off_and_unprovisioned_hosts() {
        let off = host(json!({
            "apiVersion": "metal3.io/v1alpha1",
            "kind": "BareMetalHost",
            "metadata": {"name": "worker-1"},
            "status": {"poweredOn": false, "provisioning": {"state": "provisioned"}}
        }));
        let node = to_bare_metal_node(&off).unwrap();
        assert_eq!(node.status, "Ready (PoweredOff)");
        assert_eq!(node.annotations["power-status"], "off");

        let fresh = host(json!({
            "apiVersion": "metal3.io/v1alpha1",
            "kind": "BareMetalHost",
            "metadata": {"name": "worker-2"},
            "status": {"provisioning": {"state": "inspecting"}}
        }));
        let node = to_bare_metal_node(&fresh).unwrap();
        assert_eq!(node.status, "inspecting");
        assert!(node.conditions.is_empty());

        let bare = host(json!({
            "apiVersion": "metal3.io/v1alpha1",
            "kind": "BareMetalHost",
            "metadata": {"name": "worker-3"}
        }));
        assert_eq!(to_bare_metal_node(&bare).unwrap().status, "Unknown");
    }
}
