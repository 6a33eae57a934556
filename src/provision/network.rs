//! Picks the external NAT IP for the instance.

use tracing::info;

use crate::error::ProvisionError;
use crate::gcp::gce::ComputeApi;

/// External address to put on the instance's access config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkAddress {
    Static(String),
    /// Let the provider allocate an ephemeral address.
    Unassigned,
}

impl NetworkAddress {
    pub fn nat_ip(&self) -> Option<&str> {
        match self {
            NetworkAddress::Static(ip) => Some(ip),
            NetworkAddress::Unassigned => None,
        }
    }
}

/// Resolves the NAT IP: `explicit_ip` if non-empty, otherwise the first
/// `RESERVED` address named `<instance_name>-ip` anywhere in the project,
/// otherwise [`NetworkAddress::Unassigned`].
///
/// Scopes are scanned in key order; if several regions reserved the same name
/// the first one wins.
pub async fn resolve_nat_ip(
    api: &dyn ComputeApi,
    project: &str,
    explicit_ip: &str,
    instance_name: &str,
) -> Result<NetworkAddress, ProvisionError> {
    if !explicit_ip.is_empty() {
        return Ok(NetworkAddress::Static(explicit_ip.to_string()));
    }

    let list = api
        .aggregated_addresses(project)
        .await
        .map_err(|source| ProvisionError::Resolution {
            call: "listing addresses",
            source,
        })?;

    let want = format!("{}-ip", instance_name);
    match list
        .addresses()
        .find(|a| a.name == want && a.status == "RESERVED")
    {
        Some(addr) => {
            info!(name = %addr.name, ip = %addr.address, "using reserved address");
            Ok(NetworkAddress::Static(addr.address.clone()))
        }
        None => {
            info!(name = %want, "no reserved address; using an ephemeral IP");
            Ok(NetworkAddress::Unassigned)
        }
    }
}
