//! Producer status command

use anyhow::Result;
use colored::Colorize;

use crate::client::ApiClient;
use crate::output::{print_info, print_json, OutputFormat};

/// Show the most recent producer status entry
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status = client.status().await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => match (status.timestamp, status.message) {
            (Some(ts), message) => {
                println!(
                    "{} {}",
                    ts.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    message.unwrap_or_default()
                );
            }
            (None, _) => print_info("No status updates recorded yet"),
        },
    }

    Ok(())
}
