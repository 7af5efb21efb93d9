//! Checkout command: materialize a branch's container set.

use anyhow::{Context, Result};
use console::style;
use saga_core::{ContainerState, SagaRepo};

/// Resolve a branch head and print the container set.
pub fn run(branch: &str, format: &str) -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;
    let snapshot = repo.checkout(branch)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        return Ok(());
    }

    println!(
        "{} {} ({} containers)",
        style("Branch").bold(),
        style(branch).cyan(),
        snapshot.len()
    );

    for (id, state) in snapshot.iter() {
        println!("  {:<28} [{}] {}", style(id).cyan(), state.kind(), label(state));
    }

    Ok(())
}

/// Human label for a container: its name or title.
fn label(state: &ContainerState) -> String {
    match state {
        ContainerState::World(w) => w.name.clone(),
        ContainerState::Scene(s) => s.title.clone(),
        ContainerState::Character(c) => c.name.clone(),
        ContainerState::Location(l) => l.name.clone(),
    }
}
