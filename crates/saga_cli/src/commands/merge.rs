//! Merge and fork-era commands.

use anyhow::{Context, Result};
use console::style;
use saga_core::{ContainerId, SagaRepo};

/// Merge a source branch into a target branch.
pub fn run(source: &str, target: &str) -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;
    let outcome = repo.merge(source, target)?;

    if outcome.committed {
        println!(
            "{} Merged {} into {} ({} events replayed)",
            style("✓").green(),
            style(source).cyan(),
            style(target).cyan(),
            outcome.replayed.len()
        );
        return Ok(());
    }

    println!(
        "{} Merge of {} into {} has conflicts; nothing was written",
        style("✗").red(),
        style(source).cyan(),
        style(target).cyan()
    );
    for id in &outcome.conflicts {
        println!("  {} {}", style("!").red(), id);
    }
    println!();
    println!(
        "  {} Resolve each container (append the chosen side's values on {}) and retry",
        style("→").cyan(),
        target
    );

    Ok(())
}

/// Fork an era for one container.
pub fn fork_era(branch: &str, container: &str, era: &str) -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;

    let container = ContainerId::new(container);
    let created = repo.fork_era(branch, &container, era)?;

    println!(
        "{} Forked era {} from {} around {}",
        style("✓").green(),
        style(&created.name).cyan(),
        style(branch).cyan(),
        container
    );
    if let Some(fork) = created.forked_at {
        println!("  Fork point: event {}", fork);
    }

    Ok(())
}
