//! Throughput Monitor CLI
//!
//! A command-line tool for querying samples, time-per-unit points, fitted
//! cost models and producer status from a running throughput monitor.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{model, samples, status};

const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Throughput Monitor CLI
#[derive(Parser)]
#[command(name = "tpm")]
#[command(author, version, about = "CLI for the Throughput Monitor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via TPM_API_URL env var)
    #[arg(long, env = "TPM_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show recent samples (counts and time per unit)
    Samples {
        /// Number of most recent samples
        #[arg(short, default_value_t = 20)]
        n: usize,
    },

    /// Show (count, time per unit) points of a target
    Points {
        /// Target name (files, chunks, candidates, clones)
        #[arg(long, short)]
        target: String,

        /// Number of most recent samples to scan
        #[arg(short, default_value_t = 1000)]
        n: usize,
    },

    /// Show the latest fitted cost model of a target
    Model {
        /// Target name (files, chunks, candidates, clones)
        #[arg(long, short)]
        target: String,
    },

    /// Show the latest producer status update
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let file_config = config::Config::load()?;

    // Flag or env var, then config file, then default
    let api_url = cli
        .api_url
        .or(file_config.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let format = match cli.format {
        Some(format) => format,
        None => file_config
            .default_format
            .as_deref()
            .and_then(|f| output::OutputFormat::from_str(f, true).ok())
            .unwrap_or_default(),
    };

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Samples { n } => samples::show_samples(&client, n, format).await?,
        Commands::Points { target, n } => {
            samples::show_points(&client, &target, n, format).await?
        }
        Commands::Model { target } => model::show_model(&client, &target, format).await?,
        Commands::Status => status::show_status(&client, format).await?,
    }

    Ok(())
}
