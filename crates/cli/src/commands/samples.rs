//! Sample and time-per-unit commands

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeSet;
use tabled::{builder::Builder, settings::Style, Tabled};

use crate::client::{ApiClient, SampleRow};
use crate::output::{format_tpu, print_info, print_json, print_table, OutputFormat};

/// Row for the scatter points table
#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "N")]
    n: u64,
    #[tabled(rename = "Time/unit")]
    tpu: String,
}

/// Show the most recent samples
pub async fn show_samples(client: &ApiClient, n: usize, format: OutputFormat) -> Result<()> {
    let response = client.samples(n).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            if response.samples.is_empty() {
                print_info("No samples recorded yet");
                return Ok(());
            }
            println!("{}", samples_table(&response.samples));
        }
    }

    Ok(())
}

/// One column pair (count, time/unit) per target seen in the samples
fn samples_table(samples: &[SampleRow]) -> String {
    let targets: BTreeSet<&str> = samples
        .iter()
        .flat_map(|s| s.counts.keys().map(String::as_str))
        .collect();

    let mut builder = Builder::default();
    let mut header = vec!["Time".to_string()];
    for target in &targets {
        header.push(target.to_string());
        header.push(format!("{} s/unit", target));
    }
    builder.push_record(header);

    for sample in samples {
        let mut record = vec![sample.ts.format("%Y-%m-%d %H:%M:%S").to_string()];
        for target in &targets {
            record.push(
                sample
                    .counts
                    .get(*target)
                    .map(u64::to_string)
                    .unwrap_or_else(|| "-".to_string()),
            );
            record.push(format_tpu(sample.time_per_unit.get(*target).copied().flatten()));
        }
        builder.push_record(record);
    }

    builder.build().with(Style::rounded()).to_string()
}

/// Show (count, time-per-unit) points of one target
pub async fn show_points(
    client: &ApiClient,
    target: &str,
    n: usize,
    format: OutputFormat,
) -> Result<()> {
    let response = client.tpu_points(target, n).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            println!(
                "{} {} ({} points)",
                "Time per unit for".bold(),
                response.target.cyan(),
                response.points.len()
            );
            let rows: Vec<PointRow> = response
                .points
                .iter()
                .map(|p| PointRow {
                    n: p.n,
                    tpu: format_tpu(Some(p.tpu)),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
