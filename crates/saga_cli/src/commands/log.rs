//! Log command: show a branch's event history.

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use console::style;
use saga_core::SagaRepo;

/// Print a branch's event chain, newest-first.
pub fn run(branch: &str, limit: Option<usize>) -> Result<()> {
    let repo = SagaRepo::open(".").context("not a saga repository")?;
    let history = repo.history(branch, limit)?;

    if history.is_empty() {
        println!("Branch {} has no history", style(branch).cyan());
        return Ok(());
    }

    for event in &history {
        let when = Local
            .timestamp_opt(event.timestamp_unix as i64, 0)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{} {:<18} {:<24} {} (on {})",
            style(format!("#{}", event.id)).cyan(),
            event.kind(),
            event.container.to_string(),
            when,
            event.branch
        );
    }

    Ok(())
}
