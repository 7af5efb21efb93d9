//! Init command for creating a new saga repository.

use anyhow::Result;
use console::style;
use saga_core::{SagaRepo, DEFAULT_BRANCH};

/// Initialize a new saga repository in the current directory.
pub fn run() -> Result<()> {
    let repo = SagaRepo::init(".")?;

    println!(
        "{} Initialized saga repository in {}",
        style("✓").green(),
        repo.root().join(".saga").display()
    );
    println!("  Root branch: {}", style(DEFAULT_BRANCH).cyan());

    Ok(())
}
