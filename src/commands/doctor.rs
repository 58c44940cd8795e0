use anyhow::Result;
use aptkit::backend::apt;
use colored::Colorize;
use std::path::Path;

use crate::Context;
use crate::config;
use crate::paths;
use crate::ui;

struct Issue {
    category: &'static str,
    summary: String,
    fix_cmd: Option<String>,
}

pub fn run(_ctx: &Context) -> Result<()> {
    ui::header("System Health Check");

    let mut issues: Vec<Issue> = Vec::new();

    check_tools(&mut issues);
    check_directories(&mut issues);

    println!();
    if issues.is_empty() {
        ui::success("All checks passed!");
    } else {
        print_issue_summary(&issues);
    }

    Ok(())
}

fn print_issue_summary(issues: &[Issue]) {
    let label = if issues.len() == 1 { "Issue" } else { "Issues" };
    ui::header(&format!("{} {label} Found", issues.len()));

    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}  {} {}",
            format!("{}.", i + 1).bold(),
            issue.summary,
            format!("[{}]", issue.category).dimmed()
        );
        if let Some(cmd) = &issue.fix_cmd {
            println!("      {} {}", "$".dimmed(), cmd.bold());
        }
    }
}

fn check_tools(issues: &mut Vec<Issue>) {
    ui::section("Required Commands");

    let missing = apt::missing_tools();
    for tool in apt::REQUIRED_TOOLS {
        if missing.contains(&tool) {
            println!("  {} {} {}", "✗".red(), tool, "(missing)".red());
            issues.push(Issue {
                category: "Required Commands",
                summary: format!("{tool} is not installed"),
                fix_cmd: Some(format!("sudo apt-get install {}", install_package(tool))),
            });
        } else {
            println!("  {} {}", "✓".green(), tool);
        }
    }
}

/// Debian package that ships a tool
fn install_package(tool: &str) -> &str {
    match tool {
        "apt-get" | "apt" => "apt",
        other => other,
    }
}

fn check_directories(issues: &mut Vec<Issue>) {
    ui::section("Directories");

    match paths::config_dir() {
        Ok(dir) => {
            match config::find_manifest(&dir) {
                Some(manifest) => {
                    println!("  {} manifest {}", "✓".green(), manifest.display());
                }
                None => {
                    println!(
                        "  {} manifest {}",
                        "⚠".yellow(),
                        "(none; pass --package/--group/--external)".yellow()
                    );
                    issues.push(Issue {
                        category: "Directories",
                        summary: format!("No {}.toml in {}", config::MANIFEST_NAME, dir.display()),
                        fix_cmd: Some(format!("$EDITOR {}", dir.join("packages.toml").display())),
                    });
                }
            }
        }
        Err(e) => issues.push(Issue {
            category: "Directories",
            summary: format!("Could not determine config directory: {e}"),
            fix_cmd: None,
        }),
    }

    match paths::state_dir() {
        Ok(dir) => report_state_dir(&dir),
        Err(e) => issues.push(Issue {
            category: "Directories",
            summary: format!("Could not determine state directory: {e}"),
            fix_cmd: None,
        }),
    }
}

fn report_state_dir(dir: &Path) {
    if dir.exists() {
        println!("  {} state {}", "✓".green(), dir.display());
    } else {
        println!(
            "  {} state {} {}",
            "○".dimmed(),
            dir.display(),
            "(created on first sync)".dimmed()
        );
    }
}
