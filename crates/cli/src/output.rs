//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an optional float, `-` when absent
pub fn format_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "-".to_string(),
    }
}

/// Format seconds per unit with a unit suffix
pub fn format_tpu(tpu: Option<f64>) -> String {
    match tpu {
        Some(v) if v >= 1.0 => format!("{:.2}s", v),
        Some(v) => format!("{:.2}ms", v * 1000.0),
        None => "-".to_string(),
    }
}

/// Color an R² value by fit quality
pub fn color_r2(r2: Option<f64>) -> String {
    let formatted = format_opt(r2, 4);
    match r2 {
        Some(v) if v >= 0.9 => formatted.green().to_string(),
        Some(v) if v >= 0.6 => formatted.yellow().to_string(),
        Some(_) => formatted.red().to_string(),
        None => formatted,
    }
}

/// Color the preferred model name
pub fn color_model(kind: &str) -> String {
    match kind {
        "linear" => kind.green().to_string(),
        "exponential" => kind.yellow().to_string(),
        "insufficient" => kind.red().to_string(),
        _ => kind.to_string(),
    }
}
