use anyhow::{Context, Result};
use colored::Colorize;

use super::{create_client, print_failure, resolve_specs};
use crate::Context as AppContext;
use crate::cli::InputArgs;
use crate::progress;
use crate::ui;

pub fn run(ctx: &AppContext, args: InputArgs) -> Result<()> {
    ui::header("Package Plan");

    let specs = resolve_specs(&args)?;
    let client = create_client()?;

    let pb = progress::spinner("Resolving dependencies...");
    let plan = match client.plan(&specs) {
        Ok(plan) => plan,
        Err(e) => {
            progress::finish_error(&pb, "Dependency resolution failed");
            print_failure(&e);
            return Err(e).context("Could not compute plan");
        }
    };
    progress::finish_success(
        &pb,
        &format!("Retaining {}", ui::count(plan.retained.len(), "package")),
    );

    ui::section("Install");
    println!("  {}", plan.install_command.bold());

    if !plan.skipped_externals.is_empty() {
        ui::section("Externals without dependency info");
        ui::list(&plan.skipped_externals, 72);
    }

    if plan.to_remove.is_empty() {
        println!();
        ui::success("Every installed package is declared or a dependency");
        return Ok(());
    }

    ui::section(&format!(
        "Not declared ({})",
        ui::count(plan.to_remove.len(), "package")
    ));
    if ctx.verbose > 0 || plan.to_remove.len() <= 40 {
        ui::list(&plan.to_remove, 72);
    } else {
        ui::dim("Use -v to list them");
    }

    if let Some(command) = &plan.remove_command {
        println!();
        ui::info("Removal is never run automatically. To prune by hand:");
        println!("  {}", command.dimmed());
    }

    Ok(())
}
