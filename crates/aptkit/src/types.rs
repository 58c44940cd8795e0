//! Core types for apt package reconciliation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Installed package name to version.
pub type InstalledSet = BTreeMap<String, String>;

/// A desired item from the package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageSpec {
    /// Regular package, installed and retained
    Package(String),
    /// Meta-package whose members are retained
    Group(String),
    /// Retained and tracked, but installed by other means
    External(String),
}

impl PackageSpec {
    /// Create a package spec.
    pub fn package(name: impl Into<String>) -> Self {
        Self::Package(name.into())
    }

    /// Create a group spec.
    pub fn group(name: impl Into<String>) -> Self {
        Self::Group(name.into())
    }

    /// Create an external spec.
    pub fn external(name: impl Into<String>) -> Self {
        Self::External(name.into())
    }

    /// The name this spec refers to.
    pub fn name(&self) -> &str {
        match self {
            Self::Package(name) | Self::Group(name) | Self::External(name) => name,
        }
    }

    /// Manifest key for this kind of spec.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::Group(_) => "group",
            Self::External(_) => "external",
        }
    }
}

impl std::fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.name())
    }
}

/// A manifest entry as written by the user.
///
/// A bare string is shorthand for `{ package = "..." }`. Every key present in
/// a table yields its own spec; a table with none of the keys yields nothing.
/// Empty names are dropped in both forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecEntry {
    /// Plain package name
    Name(String),
    /// Table with any of `package`, `group`, `external`
    Table {
        /// Package name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        package: Option<String>,
        /// Group name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        /// External package name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external: Option<String>,
    },
}

impl SpecEntry {
    /// Normalize this entry into zero or more specs.
    pub fn to_specs(&self) -> Vec<PackageSpec> {
        match self {
            SpecEntry::Name(name) if name.is_empty() => Vec::new(),
            SpecEntry::Name(name) => vec![PackageSpec::Package(name.clone())],
            SpecEntry::Table {
                package,
                group,
                external,
            } => {
                let mut specs = Vec::new();
                if let Some(name) = package.as_deref().filter(|n| !n.is_empty()) {
                    specs.push(PackageSpec::package(name));
                }
                if let Some(name) = group.as_deref().filter(|n| !n.is_empty()) {
                    specs.push(PackageSpec::group(name));
                }
                if let Some(name) = external.as_deref().filter(|n| !n.is_empty()) {
                    specs.push(PackageSpec::external(name));
                }
                specs
            }
        }
    }
}

impl From<PackageSpec> for SpecEntry {
    fn from(spec: PackageSpec) -> Self {
        match spec {
            PackageSpec::Package(name) => SpecEntry::Name(name),
            PackageSpec::Group(name) => SpecEntry::Table {
                package: None,
                group: Some(name),
                external: None,
            },
            PackageSpec::External(name) => SpecEntry::Table {
                package: None,
                group: None,
                external: Some(name),
            },
        }
    }
}

/// Normalize manifest entries, preserving order.
pub fn normalize(entries: &[SpecEntry]) -> Vec<PackageSpec> {
    entries.iter().flat_map(SpecEntry::to_specs).collect()
}

/// Specs split by kind, each list in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partitioned {
    /// Group names
    pub groups: Vec<String>,
    /// Package names
    pub packages: Vec<String>,
    /// External names
    pub externals: Vec<String>,
}

impl Partitioned {
    /// Split specs into groups, packages and externals.
    pub fn from_specs(specs: &[PackageSpec]) -> Self {
        let mut parts = Self::default();
        for spec in specs {
            match spec {
                PackageSpec::Group(name) => parts.groups.push(name.clone()),
                PackageSpec::Package(name) => parts.packages.push(name.clone()),
                PackageSpec::External(name) => parts.externals.push(name.clone()),
            }
        }
        parts
    }

    /// Names passed to the install command: groups first, then packages.
    pub fn install_targets(&self) -> Vec<String> {
        self.groups.iter().chain(&self.packages).cloned().collect()
    }
}

/// Names that must survive removal pruning.
///
/// Only grows during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedSet {
    names: BTreeSet<String>,
}

impl RetainedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain a name.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Retain every name in `names`.
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
    }

    /// Whether a name is retained.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Sorted copy of the current names.
    pub fn snapshot(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    /// Iterate retained names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    /// Number of retained names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Installed names not retained, sorted.
    pub fn removal_candidates(&self, installed: &InstalledSet) -> Vec<String> {
        installed
            .keys()
            .filter(|name| !self.contains(name))
            .cloned()
            .collect()
    }
}

/// A version transition for an upgraded (or downgraded) package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChange {
    /// Version before the run
    pub from: String,
    /// Version after the run
    pub to: String,
}

/// Classified changes between two installed-set snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDiff {
    /// Newly installed packages
    #[serde(default)]
    pub added: BTreeMap<String, String>,
    /// Packages whose version changed
    #[serde(default)]
    pub updated: BTreeMap<String, VersionChange>,
    /// Packages no longer installed
    #[serde(default)]
    pub removed: BTreeMap<String, String>,
}

impl PackageDiff {
    /// Whether anything changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed packages.
    pub fn total(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Package changes accumulated across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    /// Installed packages
    #[serde(default)]
    pub added: BTreeMap<String, String>,
    /// Upgraded packages
    #[serde(default)]
    pub updated: BTreeMap<String, VersionChange>,
    /// Removed packages
    #[serde(default)]
    pub removed: BTreeMap<String, String>,
}

impl ChangeLog {
    /// Create an empty change log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one run's diff. Later entries overwrite earlier ones per name.
    pub fn record(&mut self, diff: &PackageDiff) {
        self.added
            .extend(diff.added.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.updated
            .extend(diff.updated.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.removed
            .extend(diff.removed.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&mut self) {
        self.added.clear();
        self.updated.clear();
        self.removed.clear();
    }
}

/// A single classified package change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageChange {
    /// Present after, absent before
    Installed {
        /// Package name
        name: String,
        /// Installed version
        version: String,
    },
    /// Present in both with different versions
    Upgraded {
        /// Package name
        name: String,
        /// Previous version
        from: String,
        /// New version
        to: String,
    },
    /// Present before, absent after
    Removed {
        /// Package name
        name: String,
        /// Version that was installed
        version: String,
    },
}

impl PackageChange {
    /// Package name affected by this change.
    pub fn name(&self) -> &str {
        match self {
            Self::Installed { name, .. } | Self::Upgraded { name, .. } | Self::Removed { name, .. } => {
                name
            }
        }
    }
}

/// Everything a successful reconciliation observed.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// The install command line that was executed
    pub install_command: String,
    /// Names protected from removal
    pub retained: RetainedSet,
    /// Installed names outside the retained set
    pub to_remove: Vec<String>,
    /// Removal command that would prune `to_remove` (never executed)
    pub remove_command: Option<String>,
    /// Installed set after the install step
    pub installed_after: InstalledSet,
    /// Changes between the before and after snapshots
    pub diff: PackageDiff,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Package index unreachable; nothing was done
    Offline,
    /// The run completed
    Reconciled(Report),
}

impl Outcome {
    /// The report, if the run completed.
    pub fn report(&self) -> Option<&Report> {
        match self {
            Outcome::Offline => None,
            Outcome::Reconciled(report) => Some(report),
        }
    }
}

/// Read-only preview of a reconciliation.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Install command that `reconcile` would run
    pub install_command: String,
    /// Names protected from removal
    pub retained: RetainedSet,
    /// Installed names outside the retained set
    pub to_remove: Vec<String>,
    /// Removal command that would prune `to_remove`
    pub remove_command: Option<String>,
    /// External names whose dependency lookup failed
    pub skipped_externals: Vec<String>,
}
