use anyhow::{Context, Result};
use aptkit::ChangeLog;
use colored::Colorize;

use crate::Context as AppContext;
use crate::state::{ChangesState, SystemState};
use crate::ui;

/// Show or clear the accumulated change log.
pub fn changes(ctx: &AppContext, json: bool, clear: bool) -> Result<()> {
    let mut state = ChangesState::load()?;

    if clear {
        state.packages.clear();
        state.save().context("Failed to save change log")?;
        if !ctx.quiet {
            ui::success("Cleared recorded changes");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&state.packages)?);
        return Ok(());
    }

    ui::header("Recorded Changes");
    print_change_log(&state.packages);
    Ok(())
}

fn print_change_log(log: &ChangeLog) {
    if log.is_empty() {
        ui::dim("No changes recorded yet");
        return;
    }

    if !log.added.is_empty() {
        ui::section(&format!("Installed ({})", log.added.len()));
        for (name, version) in &log.added {
            println!("  {} {} {}", "+".green(), name, version.dimmed());
        }
    }

    if !log.updated.is_empty() {
        ui::section(&format!("Upgraded ({})", log.updated.len()));
        for (name, change) in &log.updated {
            println!(
                "  {} {} {} → {}",
                "~".blue(),
                name,
                change.from.dimmed(),
                change.to
            );
        }
    }

    if !log.removed.is_empty() {
        ui::section(&format!("Removed ({})", log.removed.len()));
        for (name, version) in &log.removed {
            println!("  {} {} {}", "-".red(), name, version.dimmed());
        }
    }
}

/// Show the package snapshot from the last sync.
pub fn state(_ctx: &AppContext, json: bool) -> Result<()> {
    let state = SystemState::load()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    ui::header("Package Snapshot");
    match state.last_updated {
        Some(when) => ui::kv("Last sync", &when.to_rfc3339()),
        None => {
            ui::dim("No sync recorded yet. Run 'pkgsync sync' first.");
            return Ok(());
        }
    }
    ui::kv("Installed", &ui::count(state.packages.len(), "package"));

    println!();
    let width = state.packages.keys().map(String::len).max().unwrap_or(0);
    for (name, version) in &state.packages {
        println!("  {name:<width$}  {}", version.dimmed());
    }
    Ok(())
}
