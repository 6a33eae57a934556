use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "buildfarm", about = "Build farm operations: coordinator VM and release uploads")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the coordinator VM on Compute Engine
    Create(commands::create::CreateArgs),

    /// Upload release artifacts and register them on the downloads page
    Upload(commands::upload::UploadArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Create(args) => commands::create::run(args).await,
        Commands::Upload(args) => commands::upload::run(args).await,
    }
}

mod commands;
