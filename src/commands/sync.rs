//! Install declared packages and record what changed.

use anyhow::{Context, Result};
use aptkit::audit::{self, ReconcileCallback};
use aptkit::{Outcome, PackageChange, PackageSpec, Report};
use colored::Colorize;
use std::path::Path;

use super::{create_client, print_failure, resolve_specs};
use crate::Context as AppContext;
use crate::cli::InputArgs;
use crate::paths;
use crate::state::{ChangesState, SystemState};
use crate::ui;

/// Prints audit lines to stdout as they happen.
struct PrintCallback;

impl ReconcileCallback for PrintCallback {
    fn on_offline(&self) {
        println!("{}", audit::OFFLINE_WARNING);
    }

    fn on_install_command(&self, command: &str) {
        println!("{}", audit::install_line(command));
    }

    fn on_remove_command(&self, command: &str) {
        println!("{}", audit::remove_line(command));
    }

    fn on_lookup_warning(&self, external: &str, error: &aptkit::Error) {
        println!("{}", audit::lookup_warning_line(external));
        log::debug!("lookup error for {external}: {error}");
    }

    fn on_change(&self, change: &PackageChange) {
        println!("{}", audit::change_line(change));
    }
}

pub fn run(ctx: &AppContext, args: InputArgs) -> Result<()> {
    if !ctx.quiet {
        ui::header("Syncing Packages");
    }

    let specs = resolve_specs(&args)?;
    let client = create_client()?;

    let outcome = sync_with(&client, &paths::state_dir()?, &specs, &PrintCallback)?;

    if let Outcome::Reconciled(report) = outcome
        && !ctx.quiet
    {
        print_summary(&report);
    }
    Ok(())
}

/// Reconcile and persist the snapshot and change log under `state_dir`.
///
/// Both state files are loaded before anything is installed. Nothing is
/// written when the run is offline or fails.
fn sync_with(
    client: &aptkit::Client,
    state_dir: &Path,
    specs: &[PackageSpec],
    callback: &dyn ReconcileCallback,
) -> Result<Outcome> {
    let mut state = SystemState::load_from(state_dir)?;
    let mut changes = ChangesState::load_from(state_dir)?;

    let outcome = match client.reconcile(specs, &mut changes.packages, callback) {
        Ok(outcome) => outcome,
        Err(e) => {
            print_failure(&e);
            return Err(e).context("Package sync failed");
        }
    };

    if let Outcome::Reconciled(report) = &outcome {
        state.set_packages(report.installed_after.clone());
        state
            .save_to(state_dir)
            .context("Failed to save package snapshot")?;
        changes
            .save_to(state_dir)
            .context("Failed to save change log")?;
    }

    Ok(outcome)
}

fn print_summary(report: &Report) {
    println!();
    println!("{}", "─".repeat(50).dimmed());
    println!(
        "  {} installed, {} upgraded, {} removed",
        report.diff.added.len().to_string().green(),
        report.diff.updated.len().to_string().blue(),
        report.diff.removed.len().to_string().red(),
    );
    ui::kv("Retained", &ui::count(report.retained.len(), "package"));

    if !report.to_remove.is_empty() {
        ui::warn(&format!(
            "{} not in the declared list (not removed)",
            ui::count(report.to_remove.len(), "installed package")
        ));
    }

    println!();
    ui::success("Sync complete!");
}
