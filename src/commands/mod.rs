pub mod changes;
pub mod doctor;
pub mod plan;
pub mod sync;

use anyhow::{Result, bail};
use aptkit::PackageSpec;
use std::path::Path;

use crate::cli::InputArgs;
use crate::config::{self, PackagesManifest};
use crate::paths;
use crate::ui;

/// Collect specs from the manifest and command-line flags.
///
/// Manifest entries come first, then `--group`, `--package` and
/// `--external` in that order.
pub fn resolve_specs(args: &InputArgs) -> Result<Vec<PackageSpec>> {
    resolve_specs_in(args, &paths::config_dir()?)
}

fn resolve_specs_in(args: &InputArgs, config_dir: &Path) -> Result<Vec<PackageSpec>> {
    let manifest_path = match &args.file {
        Some(file) => Some(file.clone()),
        None => config::find_manifest(config_dir),
    };

    let mut specs = match &manifest_path {
        Some(path) => {
            ui::dim(&format!("Using: {}", path.display()));
            PackagesManifest::load(path)?.specs()
        }
        None if args.has_specs() => Vec::new(),
        None => bail!(
            "No packages manifest found in {}\n\n  Create {}.toml there, or pass --package/--group/--external",
            config_dir.display(),
            config::MANIFEST_NAME
        ),
    };

    specs.extend(non_empty(&args.groups).map(PackageSpec::group));
    specs.extend(non_empty(&args.packages).map(PackageSpec::package));
    specs.extend(non_empty(&args.externals).map(PackageSpec::external));

    log::debug!("resolved {} specs", specs.len());
    Ok(specs)
}

fn non_empty(names: &[String]) -> impl Iterator<Item = &String> {
    names.iter().filter(|name| !name.is_empty())
}

/// Create an aptkit client, turning a missing tool into a hint.
fn create_client() -> Result<aptkit::Client> {
    match aptkit::Client::new() {
        Ok(client) => Ok(client),
        Err(aptkit::Error::ToolNotFound(tool)) => bail!(
            "{tool} is not installed.\n\n  pkgsync manages Debian/Ubuntu systems and needs apt on PATH"
        ),
        Err(e) => Err(anyhow::Error::new(e).context("Failed to initialize apt client")),
    }
}

/// Print the category and advice for an apt failure.
fn print_failure(e: &aptkit::Error) {
    let category = e.category();
    ui::error(&format!("{}: {e}", category.description()));
    ui::dim(category.advice());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_then_flags() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("packages.toml"),
            r#"packages = ["git", { external = "docker-ce" }]"#,
        )
        .unwrap();

        let args = InputArgs {
            packages: vec!["curl".to_string()],
            groups: vec!["build-essential".to_string()],
            ..Default::default()
        };
        let specs = resolve_specs_in(&args, dir.path()).unwrap();

        assert_eq!(
            specs,
            vec![
                PackageSpec::package("git"),
                PackageSpec::external("docker-ce"),
                PackageSpec::group("build-essential"),
                PackageSpec::package("curl"),
            ]
        );
    }

    #[test]
    fn test_flags_without_manifest() {
        let dir = TempDir::new().unwrap();
        let args = InputArgs {
            externals: vec!["code".to_string()],
            ..Default::default()
        };

        let specs = resolve_specs_in(&args, dir.path()).unwrap();
        assert_eq!(specs, vec![PackageSpec::external("code")]);
    }

    #[test]
    fn test_empty_flag_names_are_dropped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("packages.toml"), r#"packages = ["", "git"]"#).unwrap();

        let args = InputArgs {
            packages: vec![String::new(), "curl".to_string()],
            groups: vec![String::new()],
            externals: vec![String::new()],
            ..Default::default()
        };
        let specs = resolve_specs_in(&args, dir.path()).unwrap();

        assert_eq!(
            specs,
            vec![PackageSpec::package("git"), PackageSpec::package("curl")]
        );
    }

    #[test]
    fn test_no_manifest_and_no_flags_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve_specs_in(&InputArgs::default(), dir.path()).unwrap_err();

        assert!(err.to_string().contains("No packages manifest found"));
    }

    #[test]
    fn test_explicit_file_overrides_config_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("packages.toml"), r#"packages = ["git"]"#).unwrap();
        let other = dir.path().join("other.json");
        fs::write(&other, r#"{"packages": [{"group": "xorg"}]}"#).unwrap();

        let args = InputArgs {
            file: Some(other),
            ..Default::default()
        };
        let specs = resolve_specs_in(&args, dir.path()).unwrap();
        assert_eq!(specs, vec![PackageSpec::group("xorg")]);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let args = InputArgs {
            file: Some(dir.path().join("absent.toml")),
            ..Default::default()
        };

        assert!(resolve_specs_in(&args, dir.path()).is_err());
    }
}
