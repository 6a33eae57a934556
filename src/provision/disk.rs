//! Chooses between re-attaching the persistent boot disk and creating a new one.

use tracing::info;

use crate::error::ProvisionError;
use crate::gcp::gce::{AttachedDisk, ComputeApi, InitializeParams};

/// Inputs to disk resolution.
#[derive(Debug, Clone)]
pub struct DiskRequest {
    pub name: String,
    pub reuse: bool,
    /// Disk type URL used when `ssd` is set.
    pub ssd_disk_type: Option<String>,
    pub size_gb: u64,
    pub source_image: String,
}

/// The boot disk for the new instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskDescriptor {
    /// An existing disk, attached read-write and kept when the instance is deleted.
    Existing { name: String, source: String },
    /// A fresh disk initialized from an image.
    New {
        name: String,
        source_image: String,
        size_gb: u64,
        /// `None` uses the provider's default type.
        disk_type: Option<String>,
        auto_delete: bool,
    },
}

impl DiskDescriptor {
    pub fn name(&self) -> &str {
        match self {
            DiskDescriptor::Existing { name, .. } | DiskDescriptor::New { name, .. } => name,
        }
    }

    pub fn auto_delete(&self) -> bool {
        match self {
            DiskDescriptor::Existing { .. } => false,
            DiskDescriptor::New { auto_delete, .. } => *auto_delete,
        }
    }

    /// Boot disk entry for the instance request.
    pub fn to_attached(&self) -> AttachedDisk {
        match self {
            DiskDescriptor::Existing { name, source } => AttachedDisk {
                auto_delete: false,
                boot: true,
                device_name: Some(name.clone()),
                disk_type: "PERSISTENT".to_string(),
                mode: "READ_WRITE".to_string(),
                source: Some(source.clone()),
                initialize_params: None,
            },
            DiskDescriptor::New {
                name,
                source_image,
                size_gb,
                disk_type,
                auto_delete,
            } => AttachedDisk {
                auto_delete: *auto_delete,
                boot: true,
                device_name: None,
                disk_type: "PERSISTENT".to_string(),
                mode: "READ_WRITE".to_string(),
                source: None,
                initialize_params: Some(InitializeParams {
                    disk_name: name.clone(),
                    source_image: source_image.clone(),
                    disk_size_gb: size_gb.to_string(),
                    disk_type: disk_type.clone(),
                }),
            },
        }
    }
}

/// Resolves the boot disk.
///
/// With `reuse`, the zone's disks are listed and the first one named
/// `req.name` is attached. A failed listing is fatal; it never falls back to
/// a fresh disk.
pub async fn resolve_disk(
    api: &dyn ComputeApi,
    project: &str,
    zone: &str,
    req: &DiskRequest,
) -> Result<DiskDescriptor, ProvisionError> {
    if req.reuse {
        let disks = api
            .list_disks(project, zone)
            .await
            .map_err(|source| ProvisionError::Resolution {
                call: "listing disks",
                source,
            })?;
        if let Some(disk) = disks.into_iter().find(|d| d.name == req.name) {
            info!(disk = %disk.name, "reusing existing disk");
            return Ok(DiskDescriptor::Existing {
                name: disk.name,
                source: disk.self_link,
            });
        }
        info!(disk = %req.name, "no existing disk; creating one");
    }

    Ok(DiskDescriptor::New {
        name: req.name.clone(),
        source_image: req.source_image.clone(),
        size_gb: req.size_gb,
        disk_type: req.ssd_disk_type.clone(),
        auto_delete: !req.reuse,
    })
}
