use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};
use tracing::{info, warn};

use buildfarm::config::{
    DEFAULT_DISK_SIZE_GB, DEFAULT_INSTANCE_NAME, DEFAULT_MACHINE_TYPE, DEFAULT_ZONE, Mode,
    ProvisionConfig, load_ssh_public_key, validate_static_ip,
};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project to create the instance in [default: depends on --staging]
    #[arg(long)]
    project: Option<String>,
    #[arg(long, default_value = DEFAULT_ZONE)]
    zone: String,
    #[arg(long = "machinetype", default_value = DEFAULT_MACHINE_TYPE)]
    machine_type: String,
    #[arg(long, default_value = DEFAULT_INSTANCE_NAME)]
    instance_name: String,
    /// SSH public key file to authorize; may be repeated
    #[arg(long = "ssh-public-key")]
    ssh_public_keys: Vec<PathBuf>,
    /// External IP to use. If empty, the reserved `<instance>-ip` address or an ephemeral one.
    #[arg(long, default_value = "")]
    static_ip: String,
    /// Re-attach the existing boot disk between re-creations
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    reuse_disk: bool,
    /// Use a solid state disk
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    ssd: bool,
    #[arg(long, default_value_t = DEFAULT_DISK_SIZE_GB)]
    disk_size_gb: u64,
    /// Coordinator binary URL [default: depends on --staging]
    #[arg(long)]
    coord: Option<String>,
    /// Use the dev cluster's project, coordinator and `staging-` token files
    #[arg(long)]
    staging: bool,
    /// Seconds between operation polls (at least 1)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: u64,
    /// Give up waiting on the operation after this many seconds
    #[arg(long)]
    op_timeout: Option<u64>,
    /// Directory holding the OAuth client files and token cache
    #[arg(long, default_value = ".")]
    credential_dir: PathBuf,
}

impl CreateArgs {
    pub fn into_config(self) -> Result<ProvisionConfig> {
        let mode = Mode::from_staging(self.staging);
        let mut cfg = ProvisionConfig::new(mode);
        if let Some(project) = self.project {
            if project.is_empty() {
                anyhow::bail!("missing --project");
            }
            cfg.project = project;
        }
        if let Some(coord) = self.coord {
            cfg.coordinator_url = coord;
        }
        cfg.zone = self.zone;
        cfg.machine_type = self.machine_type;
        cfg.instance_name = self.instance_name;
        cfg.static_ip = validate_static_ip(&self.static_ip)?;
        cfg.ssh_public_keys = self
            .ssh_public_keys
            .iter()
            .map(|p| load_ssh_public_key(p))
            .collect::<Result<_, _>>()?;
        cfg.reuse_disk = self.reuse_disk;
        cfg.ssd = self.ssd;
        cfg.disk_size_gb = self.disk_size_gb;
        cfg.poll_interval = Duration::from_secs(self.poll_interval);
        cfg.op_timeout = self.op_timeout.map(Duration::from_secs);
        cfg.credential_dir = self.credential_dir;
        Ok(cfg)
    }
}

pub async fn run(args: CreateArgs) -> Result<()> {
    let cfg = args.into_config()?;

    let instance = cfg.instance_name.clone();
    let _ = ctrlc::set_handler(move || {
        warn!(
            instance = %instance,
            "interrupted; an already submitted insert keeps running on the provider"
        );
        std::process::exit(130);
    });

    let staging = cfg.mode == Mode::Staging;
    info!(
        project = %cfg.project,
        zone = %cfg.zone,
        instance = %cfg.instance_name,
        staging,
        "provisioning coordinator"
    );
    let out = buildfarm::provision::run(&cfg)
        .await
        .with_context(|| format!("provisioning {} in {}", cfg.instance_name, cfg.project))?;
    info!(
        instance = %out.instance.name,
        disk = out.disk.name(),
        "done"
    );
    Ok(())
}
