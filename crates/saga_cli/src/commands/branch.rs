//! Branch management commands.

use anyhow::{Context, Result};
use console::style;
use saga_core::{EventId, SagaRepo};

/// List all branches with their heads and event counts.
pub fn list() -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;

    for branch in repo.branches()? {
        let head = branch
            .head
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let fork = branch
            .source_branch
            .as_deref()
            .map(|source| format!(" (from {})", source))
            .unwrap_or_default();

        println!(
            "{:<24} head {:<8} {:>6} events  [{}]{}",
            style(&branch.name).cyan(),
            head,
            branch.event_count,
            branch.status,
            fork
        );
    }

    Ok(())
}

/// Create a branch forked at an event.
///
/// With no explicit fork point, forks at the source branch's current head.
pub fn create(name: &str, at: Option<u64>, from: &str) -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;

    let parent_event = match at {
        Some(id) => Some(EventId::from_u64(id)),
        None => repo.branch(from)?.head,
    };

    let branch = repo.create_branch(name, parent_event, Some(from))?;

    match branch.forked_at {
        Some(fork) => println!(
            "{} Created branch {} at event {} (from {})",
            style("✓").green(),
            style(&branch.name).cyan(),
            fork,
            from
        ),
        None => println!(
            "{} Created branch {} with no history (from {})",
            style("✓").green(),
            style(&branch.name).cyan(),
            from
        ),
    }

    Ok(())
}

/// Discard a branch pointer.
pub fn discard(name: &str) -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;

    repo.discard_branch(name)?;
    println!(
        "{} Discarded branch {} (its events remain in the log)",
        style("✓").green(),
        style(name).cyan()
    );

    Ok(())
}
