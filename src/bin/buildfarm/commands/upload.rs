use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use buildfarm::release::{self, DEFAULT_BUCKET, DEFAULT_REGISTER_URL, ReleaseConfig};

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Release files, e.g. go1.5.linux-amd64.tar.gz
    #[arg(name = "FILE", required = true)]
    files: Vec<PathBuf>,
    /// User registering the files
    #[arg(long, env = "USER")]
    user: String,
    /// Registration key file [default: ~/.gobuildkey-<user>]
    #[arg(long)]
    key_file: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_BUCKET)]
    bucket: String,
    /// Service account key for the bucket [default: ~/keys/golang-org.service.json]
    #[arg(long)]
    service_key: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_REGISTER_URL)]
    upload_url: String,
}

pub async fn run(args: UploadArgs) -> Result<()> {
    let cfg = ReleaseConfig {
        user: args.user,
        key_file: args.key_file,
        bucket: args.bucket,
        service_key: args.service_key,
        register_url: args.upload_url,
    };
    let files = release::upload(&cfg, &args.files)
        .await
        .context("uploading release files")?;
    info!(count = files.len(), "all files uploaded");
    Ok(())
}
