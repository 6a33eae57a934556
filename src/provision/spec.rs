//! Assembles the `instances.insert` request for the coordinator VM.

use crate::config::ProvisionConfig;
use crate::error::ProvisionError;
use crate::gcp::gce::{
    AccessConfig, InstanceRequest, Metadata, MetadataItem, NetworkInterface, ServiceAccountRef,
    Tags,
};
use crate::provision::disk::DiskDescriptor;
use crate::provision::network::NetworkAddress;

/// Upper bound on a single metadata value, per the compute API docs.
pub const MAX_CLOUD_CONFIG: usize = 32 << 10;

/// Firewall-rule targets attached to every coordinator.
pub const INSTANCE_TAGS: [&str; 3] = ["http-server", "https-server", "allow-ssh"];

const DESCRIPTION: &str = "Go Builder";

/// Substitutes the coordinator URL into `template` and appends the SSH keys.
///
/// Fails with [`ProvisionError::ConfigTooLarge`] if the result would be
/// rejected by the provider.
pub fn render_cloud_config(
    template: &str,
    coordinator_url: &str,
    ssh_keys: &[String],
) -> Result<String, ProvisionError> {
    let mut config = template.replacen("$COORDINATOR", coordinator_url, 1);
    if !ssh_keys.is_empty() {
        config.push_str("\nssh_authorized_keys:\n");
        for key in ssh_keys {
            config.push_str(&format!("    - {}\n", key.trim()));
        }
    }
    if config.len() > MAX_CLOUD_CONFIG {
        return Err(ProvisionError::ConfigTooLarge {
            size: config.len(),
            limit: MAX_CLOUD_CONFIG,
        });
    }
    Ok(config)
}

/// Everything about the instance that does not depend on provider lookups.
#[derive(Debug, Clone)]
pub struct InstanceSpec<'a> {
    pub name: &'a str,
    pub machine_type_url: String,
    pub network_url: String,
    pub service_scopes: &'a [String],
    pub cloud_config_template: &'a str,
    pub coordinator_url: &'a str,
    pub ssh_keys: &'a [String],
}

impl<'a> InstanceSpec<'a> {
    pub fn from_config(cfg: &'a ProvisionConfig) -> Self {
        InstanceSpec {
            name: &cfg.instance_name,
            machine_type_url: cfg.machine_type_url(),
            network_url: cfg.network_url(),
            service_scopes: &cfg.service_scopes,
            cloud_config_template: &cfg.cloud_config_template,
            coordinator_url: &cfg.coordinator_url,
            ssh_keys: &cfg.ssh_public_keys,
        }
    }

    pub fn user_data(&self) -> Result<String, ProvisionError> {
        render_cloud_config(
            self.cloud_config_template,
            self.coordinator_url,
            self.ssh_keys,
        )
    }

    /// Assembles the request around an already rendered startup config.
    pub fn assemble(
        &self,
        disk: &DiskDescriptor,
        nat: &NetworkAddress,
        user_data: String,
    ) -> InstanceRequest {
        InstanceRequest {
            name: self.name.to_string(),
            description: DESCRIPTION.to_string(),
            machine_type: self.machine_type_url.clone(),
            disks: vec![disk.to_attached()],
            tags: Tags {
                items: INSTANCE_TAGS.iter().map(|t| t.to_string()).collect(),
            },
            metadata: Metadata {
                items: vec![MetadataItem {
                    key: "user-data".to_string(),
                    value: user_data,
                }],
            },
            network_interfaces: vec![NetworkInterface {
                network: self.network_url.clone(),
                access_configs: vec![AccessConfig {
                    config_type: "ONE_TO_ONE_NAT".to_string(),
                    name: "External NAT".to_string(),
                    nat_ip: nat.nat_ip().map(str::to_string),
                }],
            }],
            service_accounts: vec![ServiceAccountRef {
                email: "default".to_string(),
                scopes: self.service_scopes.to_vec(),
            }],
        }
    }
}
