//! The one-shot provisioning workflow.
//!
//! Steps run strictly in order: render and size-check the startup config,
//! resolve the boot disk, resolve the NAT IP, submit `instances.insert`, poll
//! the returned operation, and fetch the created instance.

pub mod disk;
pub mod network;
pub mod poller;
pub mod spec;

#[cfg(test)]
pub(crate) mod fake;

use tracing::{info, warn};

use crate::config::ProvisionConfig;
use crate::error::ProvisionError;
use crate::gcp::auth::CredentialChain;
use crate::gcp::gce::{ComputeApi, ComputeClient, Instance, Operation};
use crate::gcp::types::Credential;

pub use disk::{DiskDescriptor, DiskRequest, resolve_disk};
pub use network::{NetworkAddress, resolve_nat_ip};
pub use poller::{OperationPoller, PollStep, Sleeper, TokioSleeper};
pub use spec::{InstanceSpec, MAX_CLOUD_CONFIG, render_cloud_config};

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub disk: DiskDescriptor,
    pub address: NetworkAddress,
    pub operation: Operation,
    pub instance: Instance,
}

/// Obtains the credential for a run from the standard source chain.
pub async fn acquire_credential(cfg: &ProvisionConfig) -> Result<Credential, ProvisionError> {
    let chain = CredentialChain::standard(&cfg.credential_dir, cfg.mode.credential_prefix());
    Ok(chain.acquire().await?)
}

/// Creates the coordinator instance described by `cfg`.
pub async fn provision(
    api: &dyn ComputeApi,
    sleeper: &dyn Sleeper,
    cfg: &ProvisionConfig,
) -> Result<Provisioned, ProvisionError> {
    let spec = InstanceSpec::from_config(cfg);
    // Checked before any request is made.
    let user_data = spec.user_data()?;

    let disk = resolve_disk(
        api,
        &cfg.project,
        &cfg.zone,
        &DiskRequest {
            name: cfg.disk_name(),
            reuse: cfg.reuse_disk,
            ssd_disk_type: cfg.ssd.then(|| cfg.ssd_disk_type_url()),
            size_gb: cfg.disk_size_gb,
            source_image: cfg.source_image.clone(),
        },
    )
    .await?;

    let address = resolve_nat_ip(api, &cfg.project, &cfg.static_ip, &cfg.instance_name).await?;

    let request = spec.assemble(&disk, &address, user_data);

    info!(instance = %cfg.instance_name, zone = %cfg.zone, "creating instance");
    let submitted = api
        .insert_instance(&cfg.project, &cfg.zone, &request)
        .await
        .map_err(|source| ProvisionError::Submission {
            instance: cfg.instance_name.clone(),
            source,
        })?;
    info!(operation = %submitted.name, "created; waiting on operation");

    let operation = OperationPoller::new(api, sleeper, &cfg.project, &cfg.zone, cfg.poll_interval)
        .with_timeout(cfg.op_timeout)
        .wait(&submitted.name)
        .await?;

    let instance = api
        .get_instance(&cfg.project, &cfg.zone, &cfg.instance_name)
        .await
        .map_err(|source| ProvisionError::InstanceFetch {
            instance: cfg.instance_name.clone(),
            source,
        })?;
    match serde_json::to_string_pretty(&instance) {
        Ok(json) => info!("instance created:\n{}", json),
        Err(e) => warn!(error = %e, "could not render instance description"),
    }
    match instance.nat_ip() {
        Some(ip) => info!(instance = %instance.name, ip = %ip, "instance is up"),
        None => info!(instance = %instance.name, "instance is up without an external IP"),
    }

    Ok(Provisioned {
        disk,
        address,
        operation,
        instance,
    })
}

/// Acquires a credential and provisions against the real API.
pub async fn run(cfg: &ProvisionConfig) -> Result<Provisioned, ProvisionError> {
    let credential = acquire_credential(cfg).await?;
    let api = ComputeClient::new(&credential);
    provision(&api, &TokioSleeper, cfg).await
}
