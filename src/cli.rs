use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pkgsync")]
#[command(version)]
#[command(about = "Reconcile installed apt packages against a declared list", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install declared packages and record what changed
    Sync(InputArgs),

    /// Show what sync would install and which packages fall outside the list
    Plan(InputArgs),

    /// Show changes accumulated across syncs
    Changes {
        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// Clear the accumulated changes
        #[arg(long, conflicts_with = "json")]
        clear: bool,
    },

    /// Show the package snapshot from the last sync
    State {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that apt tooling and directories are available
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Args, Debug, Default)]
pub struct InputArgs {
    /// Manifest file (defaults to packages.toml or packages.json in the config dir)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Additional package to install and retain (repeatable)
    #[arg(short, long = "package", value_name = "NAME")]
    pub packages: Vec<String>,

    /// Additional group to install and retain (repeatable)
    #[arg(short, long = "group", value_name = "NAME")]
    pub groups: Vec<String>,

    /// Additional externally installed name to retain (repeatable)
    #[arg(short, long = "external", value_name = "NAME")]
    pub externals: Vec<String>,
}

impl InputArgs {
    /// Whether any spec was given on the command line
    pub fn has_specs(&self) -> bool {
        !(self.packages.is_empty() && self.groups.is_empty() && self.externals.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "pkgsync", "sync", "-p", "git", "--package", "curl", "-g", "build-essential", "-e",
            "docker-ce",
        ])
        .unwrap();

        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.packages, vec!["git", "curl"]);
        assert_eq!(args.groups, vec!["build-essential"]);
        assert_eq!(args.externals, vec!["docker-ce"]);
        assert!(args.file.is_none());
        assert!(args.has_specs());
    }

    #[test]
    fn test_verbose_is_global_and_counted() {
        let cli = Cli::try_parse_from(["pkgsync", "plan", "-vv", "--file", "p.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let Command::Plan(args) = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(args.file, Some(PathBuf::from("p.toml")));
        assert!(!args.has_specs());
    }

    #[test]
    fn test_changes_clear_conflicts_with_json() {
        assert!(Cli::try_parse_from(["pkgsync", "changes", "--json", "--clear"]).is_err());
    }
}
