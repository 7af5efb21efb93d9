//! Append command for recording events.

use anyhow::{Context, Result};
use console::style;
use saga_core::{ContainerId, SagaRepo};

/// Append one event under a branch.
pub fn run(branch: &str, container: &str, event_type: &str, payload: &str) -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;

    let payload: serde_json::Value =
        serde_json::from_str(payload).context("payload is not valid JSON")?;

    let container = ContainerId::new(container);
    let event_id = repo.append_event(branch, &container, event_type, payload)?;

    println!(
        "{} Appended event {} ({} on {})",
        style("✓").green(),
        style(event_id).cyan(),
        event_type,
        style(branch).cyan()
    );

    Ok(())
}
