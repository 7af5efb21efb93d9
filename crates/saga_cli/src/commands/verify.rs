//! Store verification command.

use anyhow::{Context, Result};
use console::style;
use saga_core::SagaRepo;

/// Verify the forest invariant over the whole store.
pub fn run() -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;
    let report = repo.verify()?;

    println!("{}", style("Verification Report:").bold());
    println!(
        "  Events checked:    {}",
        style(report.events_checked).cyan()
    );
    if !report.dangling_parents.is_empty() {
        println!(
            "  Dangling parents:  {}",
            style(report.dangling_parents.len()).red()
        );
        for (event, parent) in &report.dangling_parents {
            println!("    {} event {} → missing {}", style("×").red(), event, parent);
        }
    }
    if !report.cyclic_events.is_empty() {
        println!(
            "  Cyclic events:     {}",
            style(report.cyclic_events.len()).red()
        );
        for event in &report.cyclic_events {
            println!("    {} event {}", style("×").red(), event);
        }
    }

    println!(
        "  Branches checked:  {}",
        style(report.branches_checked).cyan()
    );
    if !report.branches_dangling.is_empty() {
        println!(
            "  Dangling heads:    {}",
            style(report.branches_dangling.len()).yellow()
        );
        for name in &report.branches_dangling {
            println!("    {} {}", style("⚠").yellow(), name);
        }
    }

    println!();
    if report.has_issues() {
        println!("{}", style(&report.summary()).yellow().bold());
    } else {
        println!(
            "{} {}",
            style("✓").green(),
            style(&report.summary()).green()
        );
    }

    Ok(())
}
