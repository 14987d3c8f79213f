//! Fitted model command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, ModelResponse};
use crate::output::{color_model, color_r2, format_opt, print_json, print_warning, OutputFormat};

/// Show the latest fitted model of a target
pub async fn show_model(client: &ApiClient, target: &str, format: OutputFormat) -> Result<()> {
    let model = client.model(target).await?;

    match format {
        OutputFormat::Json => print_json(&model)?,
        OutputFormat::Table => print_model(&model),
    }

    Ok(())
}

fn print_model(model: &ModelResponse) {
    if !model.has_fit() {
        print_warning(&format!(
            "No model fitted for {} yet",
            model.target.cyan()
        ));
        return;
    }

    println!("{} {}", "Cost model for".bold(), model.target.cyan());
    println!("{}", "=".repeat(50));
    if let Some(ts) = model.ts {
        println!("Fitted at:              {}", ts.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(n) = model.n_points {
        println!("Points:                 {}", n);
    }
    println!(
        "Preferred:              {}",
        color_model(model.preferred.as_deref().unwrap_or("insufficient"))
    );
    println!();

    let linear = model.linear.clone().unwrap_or_default();
    println!("{}", "Linear  tpu = a + b·N".bold());
    println!("{}", "-".repeat(50));
    println!("a:                      {}", format_opt(linear.a, 6));
    println!("b:                      {}", format_opt(linear.b, 8));
    println!("R²:                     {}", color_r2(linear.r2));
    println!();

    let exponential = model.exponential.clone().unwrap_or_default();
    println!("{}", "Exponential  tpu = c·e^(d·N)".bold());
    println!("{}", "-".repeat(50));
    println!("c:                      {}", format_opt(exponential.c, 6));
    println!("d:                      {}", format_opt(exponential.d, 8));
    println!("R²:                     {}", color_r2(exponential.r2));
    println!();

    let trend = model.trend.clone().unwrap_or_default();
    println!(
        "Trend slope (last k):   {}",
        format_opt(trend.slope_last_k, 8)
    );
}
