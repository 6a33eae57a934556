//! Immutable run configuration, built once from the command line.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ProvisionError;

use crate::gcp::auth::{CLOUD_PLATFORM_SCOPE, COMPUTE_SCOPE, DEVSTORAGE_FULL_CONTROL_SCOPE};
use crate::gcp::gce::GCE_API_BASE;

pub const PROD_PROJECT: &str = "symbolic-datum-552";
pub const STAGING_PROJECT: &str = "go-dashboard-dev";
pub const PROD_COORDINATOR_URL: &str = "https://storage.googleapis.com/go-builder-data/coordinator";
pub const STAGING_COORDINATOR_URL: &str =
    "https://storage.googleapis.com/dev-go-builder-data/coordinator";

pub const DEFAULT_ZONE: &str = "us-central1-f";
pub const DEFAULT_MACHINE_TYPE: &str = "n1-standard-4";
pub const DEFAULT_INSTANCE_NAME: &str = "farmer";
pub const DEFAULT_DISK_SIZE_GB: u64 = 50;
pub const DEFAULT_SOURCE_IMAGE: &str = "https://www.googleapis.com/compute/v1/projects/coreos-cloud/global/images/coreos-stable-723-3-0-v20150804";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Cloud-config that installs the coordinator as a systemd unit restarting
/// forever. `$COORDINATOR` is replaced with the binary URL.
pub const BASE_CLOUD_CONFIG: &str = r#"#cloud-config
coreos:
  update:
    group: stable
    reboot-strategy: off
  units:
    - name: gobuild.service
      command: start
      content: |
        [Unit]
        Description=Go Builders
        After=docker.service
        Requires=docker.service

        [Service]
        ExecStartPre=/bin/bash -c 'mkdir -p /opt/bin && curl -s -o /opt/bin/coordinator.tmp $COORDINATOR && install -m 0755 /opt/bin/coordinator{.tmp,}'
        ExecStart=/opt/bin/coordinator
        RestartSec=10s
        Restart=always
        StartLimitInterval=0
        Type=simple

        [Install]
        WantedBy=multi-user.target
"#;

/// Selects between the production cluster and the dev cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Production,
    Staging,
}

impl Mode {
    pub fn from_staging(staging: bool) -> Self {
        if staging {
            Mode::Staging
        } else {
            Mode::Production
        }
    }

    pub fn default_project(&self) -> &'static str {
        match self {
            Mode::Production => PROD_PROJECT,
            Mode::Staging => STAGING_PROJECT,
        }
    }

    pub fn default_coordinator_url(&self) -> &'static str {
        match self {
            Mode::Production => PROD_COORDINATOR_URL,
            Mode::Staging => STAGING_COORDINATOR_URL,
        }
    }

    /// Prefix for the OAuth client and token cache files.
    pub fn credential_prefix(&self) -> &'static str {
        match self {
            Mode::Production => "",
            Mode::Staging => "staging-",
        }
    }
}

/// Service-account scopes granted to the coordinator VM by default.
pub fn default_service_scopes() -> Vec<String> {
    [DEVSTORAGE_FULL_CONTROL_SCOPE, COMPUTE_SCOPE, CLOUD_PLATFORM_SCOPE]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Everything one provisioning run needs.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub mode: Mode,
    pub project: String,
    pub zone: String,
    pub machine_type: String,
    pub instance_name: String,
    /// SSH public keys to authorize, already read from disk.
    pub ssh_public_keys: Vec<String>,
    /// Explicit external IP; empty means look up `<instance>-ip`.
    pub static_ip: String,
    pub reuse_disk: bool,
    pub ssd: bool,
    pub disk_size_gb: u64,
    pub source_image: String,
    pub coordinator_url: String,
    pub cloud_config_template: String,
    pub service_scopes: Vec<String>,
    pub poll_interval: Duration,
    /// Bound on total time spent polling; `None` polls until the operation ends.
    pub op_timeout: Option<Duration>,
    /// Directory holding the OAuth client files and token cache.
    pub credential_dir: PathBuf,
}

impl ProvisionConfig {
    /// Reference defaults for `mode`.
    pub fn new(mode: Mode) -> Self {
        ProvisionConfig {
            mode,
            project: mode.default_project().to_string(),
            zone: DEFAULT_ZONE.to_string(),
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
            ssh_public_keys: Vec::new(),
            static_ip: String::new(),
            reuse_disk: true,
            ssd: true,
            disk_size_gb: DEFAULT_DISK_SIZE_GB,
            source_image: DEFAULT_SOURCE_IMAGE.to_string(),
            coordinator_url: mode.default_coordinator_url().to_string(),
            cloud_config_template: BASE_CLOUD_CONFIG.to_string(),
            service_scopes: default_service_scopes(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            op_timeout: None,
            credential_dir: PathBuf::from("."),
        }
    }

    fn project_url(&self) -> String {
        format!("{}/projects/{}", GCE_API_BASE, self.project)
    }

    pub fn machine_type_url(&self) -> String {
        format!(
            "{}/zones/{}/machineTypes/{}",
            self.project_url(),
            self.zone,
            self.machine_type
        )
    }

    pub fn ssd_disk_type_url(&self) -> String {
        format!("{}/zones/{}/diskTypes/pd-ssd", self.project_url(), self.zone)
    }

    pub fn network_url(&self) -> String {
        format!("{}/global/networks/default", self.project_url())
    }

    /// Name of the boot disk, stable across re-creations.
    pub fn disk_name(&self) -> String {
        format!("{}-coreos-stateless-pd", self.instance_name)
    }
}

/// Reads one SSH public key file, trimmed.
pub fn load_ssh_public_key(path: &Path) -> Result<String, ProvisionError> {
    let text = fs::read_to_string(path).map_err(|source| ProvisionError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let key = text.trim();
    if key.is_empty() {
        return Err(ProvisionError::InvalidFlag {
            flag: "ssh-public-key",
            reason: format!("{} is empty", path.display()),
        });
    }
    Ok(key.to_string())
}

/// Accepts an empty string (look up a reserved address) or a dotted IPv4 address.
pub fn validate_static_ip(ip: &str) -> Result<String, ProvisionError> {
    let ip = ip.trim();
    if ip.is_empty() {
        return Ok(String::new());
    }
    ip.parse::<Ipv4Addr>()
        .map(|addr| addr.to_string())
        .map_err(|e| ProvisionError::InvalidFlag {
            flag: "static-ip",
            reason: format!("{:?}: {}", ip, e),
        })
}
