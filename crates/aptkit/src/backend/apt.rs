//! Real apt backend using `apt-get`, `apt` and `apt-rdepends`.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::InstalledSet;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Tools the apt backend shells out to.
pub const REQUIRED_TOOLS: [&str; 3] = ["apt-get", "apt", "apt-rdepends"];

/// Backend that executes real apt commands.
pub struct AptBackend {
    apt_get: PathBuf,
    apt: PathBuf,
    /// Optional at construction so installs still work without it
    rdepends: Option<PathBuf>,
}

impl AptBackend {
    /// Create a new AptBackend.
    ///
    /// Returns an error if `apt-get` or `apt` is not on PATH.
    pub fn new() -> Result<Self> {
        let apt_get = find_tool("apt-get")?;
        let apt = find_tool("apt")?;
        let rdepends = find_tool("apt-rdepends").ok();
        if rdepends.is_none() {
            log::warn!("apt-rdepends not found; dependency lookups will fail");
        }
        Ok(Self {
            apt_get,
            apt,
            rdepends,
        })
    }

    /// Run a command and capture its output.
    fn run(&self, program: &Path, args: &[&str]) -> Result<Output> {
        log::debug!("running {} {}", program.display(), args.join(" "));
        Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::CommandFailed {
                message: format!("failed to execute {}: {}", program.display(), e),
                stderr: String::new(),
            })
    }

    /// Run a command with stdout passed through to the terminal.
    ///
    /// stderr is captured for error categorization and echoed afterwards.
    fn run_passthru(&self, program: &Path, args: &[&str]) -> Result<()> {
        log::debug!("running {} {}", program.display(), args.join(" "));
        let output = Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::InstallCommand {
                message: format!("failed to execute {}: {}", program.display(), e),
                stderr: String::new(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            eprint!("{stderr}");
        }

        if !output.status.success() {
            return Err(Error::InstallCommand {
                message: format!(
                    "{} {} exited with {}",
                    program.display(),
                    args.join(" "),
                    output.status
                ),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Backend for AptBackend {
    fn refresh_index(&self) -> Result<()> {
        let output = self.run(&self.apt_get, &["update"])?;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                message: "apt-get update failed".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn list_installed(&self) -> Result<InstalledSet> {
        let output = self
            .run(&self.apt, &["list", "--installed"])
            .map_err(|e| Error::Query {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Query {
                message: format!(
                    "apt list --installed exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(parse_installed_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn resolve_dependencies(&self, name: &str) -> Result<BTreeSet<String>> {
        let lookup_error = || Error::DependencyLookup {
            name: name.to_string(),
        };

        let Some(rdepends) = &self.rdepends else {
            return Err(lookup_error());
        };

        let output = self.run(rdepends, &["-p", name]).map_err(|e| {
            log::debug!("apt-rdepends {name}: {e}");
            lookup_error()
        })?;

        if !output.status.success() {
            log::debug!("apt-rdepends {name} exited with {}", output.status);
            return Err(lookup_error());
        }

        parse_rdepends(&String::from_utf8_lossy(&output.stdout)).ok_or_else(lookup_error)
    }

    fn install(&self, names: &[String]) -> Result<()> {
        self.run_passthru(&self.apt_get, &["update"])?;

        let mut args = vec!["install", "-y"];
        args.extend(names.iter().map(String::as_str));
        self.run_passthru(&self.apt_get, &args)
    }

    fn install_command(&self, names: &[String]) -> String {
        render_install_command(names)
    }

    fn remove_command(&self, names: &[String]) -> String {
        render_remove_command(names)
    }
}

/// Find a tool on PATH.
fn find_tool(tool: &str) -> Result<PathBuf> {
    which::which(tool).map_err(|_| Error::ToolNotFound(tool.to_string()))
}

/// Tools from [`REQUIRED_TOOLS`] that are not on PATH.
pub fn missing_tools() -> Vec<&'static str> {
    REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_err())
        .collect()
}

/// Render the install command as a shell line.
pub fn render_install_command(names: &[String]) -> String {
    format!("apt-get update && apt-get install -y {}", names.join(" "))
        .trim_end()
        .to_string()
}

/// Render the removal command as a shell line.
pub fn render_remove_command(names: &[String]) -> String {
    format!("apt-get remove -y {}", names.join(" "))
        .trim_end()
        .to_string()
}

/// Parse `apt list --installed` output into name -> version.
///
/// Lines look like `git/jammy-updates,now 1:2.34.1-1ubuntu1.10 amd64 [installed]`.
/// Fields are split on every `/` and space; the first is the name, the
/// third the version. Shorter lines (the `Listing...` banner) are skipped.
/// A repeated name keeps its last version.
pub fn parse_installed_list(stdout: &str) -> InstalledSet {
    let mut installed = InstalledSet::new();

    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let fields: Vec<&str> = line.split(['/', ' ']).collect();
        if fields.len() < 3 || fields[0].is_empty() {
            continue;
        }
        installed.insert(fields[0].to_string(), fields[2].to_string());
    }

    installed
}

/// Parse `apt-rdepends -p` output into the sorted set of dependency names.
///
/// Every line mentioning `Depends` contributes its second token:
///
/// ```text
/// git
///   Depends: libc6 (>= 2.34) [Installed]
///   PreDepends: perl [Installed]
/// ```
///
/// Returns `None` when a `Depends` line has no target.
pub fn parse_rdepends(stdout: &str) -> Option<BTreeSet<String>> {
    let mut deps = BTreeSet::new();

    for line in stdout.lines().filter(|l| l.contains("Depends")) {
        let target = line.split_whitespace().nth(1)?;
        let target = target.trim();
        if !target.is_empty() {
            deps.insert(target.to_string());
        }
    }

    Some(deps)
}
