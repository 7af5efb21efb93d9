//! Compare command: structural diff between two branches.

use anyhow::{Context, Result};
use console::style;
use saga_core::SagaRepo;

/// Compare two branches' resolved states.
pub fn run(branch_a: &str, branch_b: &str, format: &str) -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;
    let diff = repo.compare(branch_a, branch_b)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }

    if diff.is_empty() {
        println!(
            "{} Branches {} and {} resolve to identical container sets",
            style("✓").green(),
            style(branch_a).cyan(),
            style(branch_b).cyan()
        );
        return Ok(());
    }

    if !diff.only_in_a.is_empty() {
        println!("{}", style(format!("Only in {}:", branch_a)).bold());
        for id in &diff.only_in_a {
            println!("  {} {}", style("+").green(), id);
        }
    }

    if !diff.only_in_b.is_empty() {
        println!("{}", style(format!("Only in {}:", branch_b)).bold());
        for id in &diff.only_in_b {
            println!("  {} {}", style("+").green(), id);
        }
    }

    if !diff.different.is_empty() {
        println!("{}", style("Different:").bold());
        for delta in &diff.different {
            println!("  {} {}", style("~").yellow(), delta.container);
            for field in &delta.fields {
                println!(
                    "      {}: {} {} {}",
                    field.field,
                    render(&field.a),
                    style("→").cyan(),
                    render(&field.b)
                );
            }
        }
    }

    Ok(())
}

fn render(value: &Option<serde_json::Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "(unset)".to_string(),
    }
}
