//! Audit log lines emitted during reconciliation.
//!
//! The line prefixes are stable; downstream tooling greps for them.

use crate::error::Error;
use crate::types::PackageChange;

/// Printed when the package index cannot be refreshed.
pub const OFFLINE_WARNING: &str = "WARNING: network offline / apt not working. Skipping packages.";

/// Format the install command line.
pub fn install_line(command: &str) -> String {
    format!("PACMAN-INSTALL-COMMAND: {command}")
}

/// Format the (never executed) removal command line.
pub fn remove_line(command: &str) -> String {
    format!("PACMAN-REMOVE-COMMAND: {command}")
}

/// Format the warning for an external whose dependencies could not be resolved.
pub fn lookup_warning_line(external: &str) -> String {
    format!("PACKAGE-LOOKUP-DEPS: WARNING: error looking up deps for EXTERNAL({external}); ignoring")
}

/// Format a single package change.
pub fn change_line(change: &PackageChange) -> String {
    match change {
        PackageChange::Installed { name, version } => format!("PACKAGE-INSTALLED: {name}@{version}"),
        PackageChange::Upgraded { from, to, .. } => format!("PACKAGE-UPGRADED: {from} -> {to}"),
        PackageChange::Removed { name, version } => format!("PACKAGE-REMOVED: {name}@{version}"),
    }
}

/// Receives audit events as reconciliation progresses.
pub trait ReconcileCallback {
    /// The connectivity probe failed; the run is skipped.
    fn on_offline(&self);

    /// About to run the install command.
    fn on_install_command(&self, command: &str);

    /// A removal command was computed (it is not executed).
    fn on_remove_command(&self, command: &str);

    /// Dependency lookup failed for an external; it is retained anyway.
    fn on_lookup_warning(&self, external: &str, error: &Error);

    /// A package changed between the before and after snapshots.
    fn on_change(&self, change: &PackageChange);
}

/// Callback that discards every event.
pub struct NoCallback;

impl ReconcileCallback for NoCallback {
    fn on_offline(&self) {}
    fn on_install_command(&self, _command: &str) {}
    fn on_remove_command(&self, _command: &str) {}
    fn on_lookup_warning(&self, _external: &str, _error: &Error) {}
    fn on_change(&self, _change: &PackageChange) {}
}

/// Callback that routes audit lines through the `log` facade.
pub struct LogCallback;

impl ReconcileCallback for LogCallback {
    fn on_offline(&self) {
        log::warn!("{OFFLINE_WARNING}");
    }

    fn on_install_command(&self, command: &str) {
        log::info!("{}", install_line(command));
    }

    fn on_remove_command(&self, command: &str) {
        log::info!("{}", remove_line(command));
    }

    fn on_lookup_warning(&self, external: &str, error: &Error) {
        log::warn!("{}", lookup_warning_line(external));
        log::debug!("lookup error for {external}: {error}");
    }

    fn on_change(&self, change: &PackageChange) {
        log::info!("{}", change_line(change));
    }
}
