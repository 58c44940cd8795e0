//! Backend abstraction for package manager operations.
//!
//! The [`Backend`] trait is the capability set reconciliation needs: refresh
//! the index, list what is installed, resolve dependencies, and install.
//! There is no removal operation; removal commands are only rendered.
//!
//! # Testing
//!
//! Use [`MockBackend`] to drive reconciliation without a real package manager:
//!
//! ```
//! use aptkit::backend::{Backend, MockBackend};
//!
//! let mock = MockBackend::new()
//!     .with_installed([("git", "1.0")])
//!     .with_dependencies("git", ["libc6", "perl"]);
//!
//! assert_eq!(mock.list_installed().unwrap().len(), 1);
//! assert!(mock.resolve_dependencies("git").unwrap().contains("perl"));
//! ```

pub mod apt;

use crate::error::{Error, Result};
use crate::types::InstalledSet;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Backend trait for package manager operations.
pub trait Backend: Send + Sync {
    /// Refresh the package index. Doubles as the connectivity probe.
    fn refresh_index(&self) -> Result<()>;

    /// Snapshot installed package names and versions.
    ///
    /// # Errors
    ///
    /// Returns `Error::Query` if the listing command is unavailable or fails.
    fn list_installed(&self) -> Result<InstalledSet>;

    /// Transitive dependency names of a package, sorted and de-duplicated.
    ///
    /// # Errors
    ///
    /// Returns `Error::DependencyLookup` if the query fails.
    fn resolve_dependencies(&self, name: &str) -> Result<BTreeSet<String>>;

    /// Member names of a group (meta-package).
    ///
    /// apt treats meta-packages like any other package, so by default this
    /// is a dependency query reported as a group failure.
    fn resolve_group(&self, group: &str) -> Result<BTreeSet<String>> {
        self.resolve_dependencies(group)
            .map_err(|e| Error::GroupLookup {
                group: group.to_string(),
                message: e.to_string(),
            })
    }

    /// Install the given names in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallCommand` if the install fails.
    fn install(&self, names: &[String]) -> Result<()>;

    /// Shell rendering of the install command for `names`.
    fn install_command(&self, names: &[String]) -> String;

    /// Shell rendering of a removal command for `names`. Never executed.
    fn remove_command(&self, names: &[String]) -> String;
}

/// A call observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `refresh_index`
    RefreshIndex,
    /// `list_installed`
    ListInstalled,
    /// `resolve_dependencies(name)`
    ResolveDependencies(String),
    /// `resolve_group(name)`
    ResolveGroup(String),
    /// `install(names)`
    Install(Vec<String>),
}

#[derive(Debug, Default)]
struct MockState {
    online: bool,
    installed: InstalledSet,
    installed_after_install: Option<InstalledSet>,
    dependencies: HashMap<String, BTreeSet<String>>,
    failing_lookups: HashSet<String>,
    install_error: Option<String>,
    calls: Vec<Call>,
}

/// In-memory backend for testing.
///
/// Online by default. The installed set switches to the post-install
/// snapshot once `install` succeeds.
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                online: true,
                ..MockState::default()
            })),
        }
    }
}

impl MockBackend {
    /// Create an online mock with nothing installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether the index refresh succeeds.
    #[must_use]
    pub fn with_online(self, online: bool) -> Self {
        self.state.lock().unwrap().online = online;
        self
    }

    /// Set the installed snapshot seen before install.
    #[must_use]
    pub fn with_installed<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.state.lock().unwrap().installed = to_installed(pairs);
        self
    }

    /// Set the installed snapshot seen after a successful install.
    #[must_use]
    pub fn with_installed_after<'a>(
        self,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        self.state.lock().unwrap().installed_after_install = Some(to_installed(pairs));
        self
    }

    /// Configure the dependencies (or group members) of a name.
    #[must_use]
    pub fn with_dependencies<'a>(
        self,
        name: &str,
        deps: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .dependencies
            .insert(name.to_string(), deps.into_iter().map(String::from).collect());
        self
    }

    /// Make dependency lookups for `name` fail.
    #[must_use]
    pub fn with_failing_lookup(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_lookups
            .insert(name.to_string());
        self
    }

    /// Make `install` fail with the given stderr.
    #[must_use]
    pub fn with_install_error(self, stderr: &str) -> Self {
        self.state.lock().unwrap().install_error = Some(stderr.to_string());
        self
    }

    /// Calls observed so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn lookup(&self, name: &str) -> Option<BTreeSet<String>> {
        let state = self.state.lock().unwrap();
        if state.failing_lookups.contains(name) {
            return None;
        }
        Some(state.dependencies.get(name).cloned().unwrap_or_default())
    }
}

impl Backend for MockBackend {
    fn refresh_index(&self) -> Result<()> {
        self.record(Call::RefreshIndex);
        if self.state.lock().unwrap().online {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                message: "index refresh failed".to_string(),
                stderr: "Temporary failure resolving 'archive.ubuntu.com'".to_string(),
            })
        }
    }

    fn list_installed(&self) -> Result<InstalledSet> {
        self.record(Call::ListInstalled);
        Ok(self.state.lock().unwrap().installed.clone())
    }

    fn resolve_dependencies(&self, name: &str) -> Result<BTreeSet<String>> {
        self.record(Call::ResolveDependencies(name.to_string()));
        self.lookup(name).ok_or_else(|| Error::DependencyLookup {
            name: name.to_string(),
        })
    }

    fn resolve_group(&self, group: &str) -> Result<BTreeSet<String>> {
        self.record(Call::ResolveGroup(group.to_string()));
        self.lookup(group).ok_or_else(|| Error::GroupLookup {
            group: group.to_string(),
            message: "mock lookup failure".to_string(),
        })
    }

    fn install(&self, names: &[String]) -> Result<()> {
        self.record(Call::Install(names.to_vec()));
        let mut state = self.state.lock().unwrap();
        if let Some(stderr) = &state.install_error {
            return Err(Error::InstallCommand {
                message: "apt-get install exited with status 100".to_string(),
                stderr: stderr.clone(),
            });
        }
        if let Some(after) = state.installed_after_install.take() {
            state.installed = after;
        }
        Ok(())
    }

    fn install_command(&self, names: &[String]) -> String {
        apt::render_install_command(names)
    }

    fn remove_command(&self, names: &[String]) -> String {
        apt::render_remove_command(names)
    }
}

fn to_installed<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> InstalledSet {
    pairs
        .into_iter()
        .map(|(name, version)| (name.to_string(), version.to_string()))
        .collect()
}
