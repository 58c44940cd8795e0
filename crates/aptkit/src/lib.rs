//! # aptkit
//!
//! Pure Rust library for reconciling an apt-managed machine against a
//! declared package list.
//!
//! This crate provides functionality for:
//! - Normalizing package, group and external specs from a manifest
//! - Reading the installed package set and resolving dependencies
//! - Installing desired packages and computing the retained set
//! - Diffing installed state before and after, and accumulating a change log
//!
//! ## Example
//!
//! ```no_run
//! use aptkit::{ChangeLog, Client, PackageSpec};
//! use aptkit::audit::LogCallback;
//!
//! let client = Client::new().expect("apt not available");
//! let specs = vec![PackageSpec::package("git"), PackageSpec::group("build-essential")];
//!
//! let mut changes = ChangeLog::new();
//! let outcome = client.reconcile(&specs, &mut changes, &LogCallback).expect("reconcile failed");
//! if let Some(report) = outcome.report() {
//!     println!("{} packages installed", report.installed_after.len());
//! }
//! ```
//!
//! ## Removal
//!
//! Packages outside the retained set are reported with a rendered removal
//! command. Nothing in this crate executes it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod backend;
pub mod diff;
pub mod error;
pub mod reconcile;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::{
    ChangeLog, InstalledSet, Outcome, PackageChange, PackageDiff, PackageSpec, Plan, Report,
    RetainedSet, SpecEntry, VersionChange,
};

use audit::ReconcileCallback;
use backend::{Backend, apt::AptBackend};
use std::collections::BTreeSet;

/// High-level client for apt reconciliation.
///
/// The client wraps a backend and exposes the individual queries as well as
/// the full reconciliation run.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a new Client with the apt backend.
    ///
    /// Returns an error if `apt-get` or `apt` is not installed.
    pub fn new() -> Result<Self> {
        let backend = AptBackend::new()?;
        Ok(Self {
            backend: Box::new(backend),
        })
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Check whether the package index can be refreshed.
    pub fn is_online(&self) -> bool {
        reconcile::is_online(self.backend.as_ref())
    }

    /// Snapshot installed packages.
    pub fn installed(&self) -> Result<InstalledSet> {
        self.backend.list_installed()
    }

    /// Dependencies of a single package.
    pub fn dependencies_of(&self, name: &str) -> Result<BTreeSet<String>> {
        self.backend.resolve_dependencies(name)
    }

    /// Members of a group (meta-package).
    pub fn dependencies_of_group(&self, group: &str) -> Result<BTreeSet<String>> {
        self.backend.resolve_group(group)
    }

    /// Run a full reconciliation. See [`reconcile::reconcile`].
    pub fn reconcile(
        &self,
        specs: &[PackageSpec],
        changes: &mut ChangeLog,
        callback: &dyn ReconcileCallback,
    ) -> Result<Outcome> {
        reconcile::reconcile(self.backend.as_ref(), specs, changes, callback)
    }

    /// Preview a reconciliation. See [`reconcile::plan`].
    pub fn plan(&self, specs: &[PackageSpec]) -> Result<Plan> {
        reconcile::plan(self.backend.as_ref(), specs)
    }
}
