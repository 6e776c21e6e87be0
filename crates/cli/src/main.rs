//! In-Place Pod Resize CLI
//!
//! A command-line tool for inspecting and resizing the workload managed
//! by a resize agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, resources};

/// In-Place Pod Resize CLI
#[derive(Parser)]
#[command(name = "ippr")]
#[command(author, version, about = "CLI for the In-Place Pod Resize agent", long_about = None)]
pub struct Cli {
    /// Agent URL (falls back to IPPR_API_URL, then ~/.config/ippr/config.json)
    #[arg(long, env = "IPPR_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show CPU request and limit
    Cpu,

    /// Show memory request and limit
    Memory,

    /// Show total container restarts
    Restarts,

    /// Pin CPU and/or memory to a new value (request = limit)
    Patch {
        /// New CPU quantity (e.g. 500m, 2)
        #[arg(long)]
        cpu: Option<String>,

        /// New memory quantity (e.g. 256Mi, 1Gi)
        #[arg(long)]
        memory: Option<String>,
    },

    /// Show agent health and readiness
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        output::print_error(&format!("{:#}", err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let api_url = config::Config::load()?.resolve_api_url(cli.api_url.as_deref());
    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Cpu => resources::show_cpu(&client, cli.format).await?,
        Commands::Memory => resources::show_memory(&client, cli.format).await?,
        Commands::Restarts => resources::show_restarts(&client, cli.format).await?,
        Commands::Patch { cpu, memory } => {
            resources::patch_resources(&client, cpu, memory, cli.format).await?
        }
        Commands::Health => health::show_health(&client, cli.format).await?,
    }

    Ok(())
}
