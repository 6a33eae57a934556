//! # Google Compute Engine (GCE) Data Types
//!
//! Rust structs modelling the JSON objects exchanged with the Compute Engine
//! API: the `instances.insert` request body, disk and address listings, zone
//! operations, and the created instance.
//!
//! For detailed information on each field, refer to the official GCE API documentation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Represents the request body for creating a new GCE virtual machine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRequest {
    /// The name of the instance.
    pub name: String,
    /// A brief description of the instance.
    pub description: String,
    /// Full URL of the machine type.
    #[serde(rename = "machineType")]
    pub machine_type: String,
    /// The disks attached to the instance.
    pub disks: Vec<AttachedDisk>,
    /// Network tags, used to target firewall rules.
    pub tags: Tags,
    /// Metadata key/value pairs available to the instance.
    pub metadata: Metadata,
    /// The network interfaces for the instance.
    #[serde(rename = "networkInterfaces")]
    pub network_interfaces: Vec<NetworkInterface>,
    /// The service accounts associated with the instance.
    #[serde(rename = "serviceAccounts")]
    pub service_accounts: Vec<ServiceAccountRef>,
}

/// A disk attached to the instance, either existing (`source`) or created
/// alongside it (`initialize_params`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedDisk {
    #[serde(rename = "autoDelete")]
    pub auto_delete: bool,
    pub boot: bool,
    #[serde(rename = "deviceName", default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(rename = "type")]
    pub disk_type: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(
        rename = "initializeParams",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub initialize_params: Option<InitializeParams>,
}

/// Parameters for initializing a disk from a source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "diskName")]
    pub disk_name: String,
    #[serde(rename = "sourceImage")]
    pub source_image: String,
    /// Sent as a string, as the API encodes int64 fields.
    #[serde(rename = "diskSizeGb")]
    pub disk_size_gb: String,
    /// Omitted to use the provider's default disk type.
    #[serde(rename = "diskType", default, skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
}

/// Instance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub items: Vec<MetadataItem>,
}

/// A single metadata key-value pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

/// A network interface for the instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub network: String,
    #[serde(rename = "accessConfigs")]
    pub access_configs: Vec<AccessConfig>,
}

/// Configuration for external network access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(rename = "type")]
    pub config_type: String,
    pub name: String,
    /// Omitted for an ephemeral, provider-allocated address.
    #[serde(rename = "natIP", default, skip_serializing_if = "Option::is_none")]
    pub nat_ip: Option<String>,
}

/// A reference to a service account and its scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountRef {
    pub email: String,
    pub scopes: Vec<String>,
}

/// A list of network tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tags {
    pub items: Vec<String>,
}

/// A persistent disk, as returned by `disks.list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    #[serde(rename = "selfLink", default)]
    pub self_link: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct DiskList {
    #[serde(default)]
    pub items: Vec<Disk>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A static IP address, as returned by `addresses.aggregatedList`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// `RESERVED`, `RESERVING` or `IN_USE`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// Addresses in one scope (`regions/<region>` or `global`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressesScopedList {
    #[serde(default)]
    pub addresses: Vec<Address>,
}

/// Addresses across every scope of a project, keyed by scope name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressAggregatedList {
    #[serde(default)]
    pub items: BTreeMap<String, AddressesScopedList>,
    #[serde(rename = "nextPageToken", default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl AddressAggregatedList {
    /// Every address in scope-key order.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.items.values().flat_map(|scoped| scoped.addresses.iter())
    }

    /// Folds another page into this one.
    pub fn merge(&mut self, page: AddressAggregatedList) {
        for (scope, list) in page.items {
            self.items
                .entry(scope)
                .or_default()
                .addresses
                .extend(list.addresses);
        }
    }
}

/// Lifecycle state of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    /// Anything else the provider might send.
    Unrecognized(String),
}

impl From<String> for OperationStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => OperationStatus::Pending,
            "RUNNING" => OperationStatus::Running,
            "DONE" => OperationStatus::Done,
            _ => OperationStatus::Unrecognized(s),
        }
    }
}

impl From<OperationStatus> for String {
    fn from(s: OperationStatus) -> Self {
        s.as_str().to_string()
    }
}

impl OperationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::Running => "RUNNING",
            OperationStatus::Done => "DONE",
            OperationStatus::Unrecognized(s) => s,
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error reported by a finished operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl std::fmt::Display for OperationErrorItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(loc) = &self.location {
            write!(f, " (at {})", loc)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

/// A zone operation. Each poll yields a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub status: OperationStatus,
    #[serde(rename = "operationType", default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(rename = "targetLink", default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationErrors>,
}

impl Operation {
    /// Errors reported by the operation, empty if none.
    pub fn errors(&self) -> &[OperationErrorItem] {
        self.error
            .as_ref()
            .map(|e| e.errors.as_slice())
            .unwrap_or_default()
    }
}

/// A VM instance as described by `instances.get`.
///
/// Only the fields the workflow inspects are typed; the rest is kept so the
/// full description can be logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "selfLink", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Instance {
    /// External IP of the first access config on the first interface.
    pub fn nat_ip(&self) -> Option<&str> {
        self.rest
            .get("networkInterfaces")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|ni| ni.get("accessConfigs"))
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|ac| ac.get("natIP"))
            .and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_status_is_a_closed_set() {
        let op: Operation =
            serde_json::from_str(r#"{"name": "op-1", "status": "RUNNING"}"#).unwrap();
        assert_eq!(op.status, OperationStatus::Running);
        assert!(op.errors().is_empty());

        let op: Operation =
            serde_json::from_str(r#"{"name": "op-1", "status": "ABORTING"}"#).unwrap();
        assert_eq!(
            op.status,
            OperationStatus::Unrecognized("ABORTING".to_string())
        );
        assert_eq!(op.status.to_string(), "ABORTING");
    }

    #[test]
    fn operation_errors_are_exposed() {
        let op: Operation = serde_json::from_str(
            r#"{
                "name": "op-2",
                "status": "DONE",
                "error": {"errors": [
                    {"code": "QUOTA_EXCEEDED", "message": "Quota 'CPUS' exceeded."},
                    {"code": "X", "location": "disks[0]"}
                ]}
            }"#,
        )
        .unwrap();
        assert_eq!(op.errors().len(), 2);
        assert_eq!(op.errors()[0].to_string(), "QUOTA_EXCEEDED: Quota 'CPUS' exceeded.");
        assert_eq!(op.errors()[1].to_string(), "X (at disks[0])");
    }

    #[test]
    fn aggregated_addresses_flatten_all_scopes() {
        let list: AddressAggregatedList = serde_json::from_str(
            r#"{"items": {
                "regions/us-central1": {"addresses": [
                    {"name": "farmer-ip", "address": "203.0.113.9", "status": "RESERVED"}
                ]},
                "regions/europe-west1": {"warning": {"code": "NO_RESULTS_ON_PAGE"}}
            }}"#,
        )
        .unwrap();
        let names: Vec<_> = list.addresses().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["farmer-ip"]);
    }

    #[test]
    fn new_disk_omits_unset_fields() {
        let disk = AttachedDisk {
            auto_delete: true,
            boot: true,
            device_name: None,
            disk_type: "PERSISTENT".to_string(),
            mode: "READ_WRITE".to_string(),
            source: None,
            initialize_params: Some(InitializeParams {
                disk_name: "farmer-coreos-stateless-pd".to_string(),
                source_image: "img".to_string(),
                disk_size_gb: "50".to_string(),
                disk_type: None,
            }),
        };
        let v = serde_json::to_value(&disk).unwrap();
        assert!(v.get("source").is_none());
        assert!(v["initializeParams"].get("diskType").is_none());
        assert_eq!(v["initializeParams"]["diskSizeGb"], "50");
    }

    #[test]
    fn instance_nat_ip_reads_first_access_config() {
        let inst: Instance = serde_json::from_str(
            r#"{
                "name": "farmer",
                "status": "RUNNING",
                "networkInterfaces": [{"accessConfigs": [{"natIP": "203.0.113.9"}]}]
            }"#,
        )
        .unwrap();
        assert_eq!(inst.nat_ip(), Some("203.0.113.9"));
        assert_eq!(inst.status.as_deref(), Some("RUNNING"));
    }
}
