use anyhow::Result;
use checkin_hw::Camera;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod feed;
mod input;
mod register;
mod scan;

#[derive(Parser)]
#[command(name = "checkin", about = "Face recognition attendance check-in")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the camera and check in recognized faces
    Scan,
    /// Register a new employee from five face photos
    Register {
        /// Employee name (prompted for when omitted)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List V4L2 capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = config::Config::from_env();
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Scan => scan::run(&config).await?,
        Commands::Register { name } => register::run(&config, name).await?,
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}
