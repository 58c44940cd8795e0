//! Reconciliation of the installed package set against desired specs.
//!
//! A run installs the desired packages and groups, computes the set of names
//! to retain, renders (but never executes) a removal of everything else, and
//! records what changed between the before and after snapshots.
//!
//! The retained set is a single expansion pass: desired names plus their
//! direct dependency query results. Dependencies discovered by that pass are
//! not expanded again.

use crate::audit::ReconcileCallback;
use crate::backend::Backend;
use crate::diff;
use crate::error::Result;
use crate::types::{ChangeLog, Outcome, Partitioned, PackageSpec, Plan, Report, RetainedSet};

/// Whether the package index can be refreshed.
pub fn is_online(backend: &dyn Backend) -> bool {
    match backend.refresh_index() {
        Ok(()) => true,
        Err(e) => {
            log::debug!("index refresh failed: {e}");
            false
        }
    }
}

/// Build the retained set for partitioned specs.
///
/// Group and package lookups are fatal. External lookups are best-effort:
/// each failure is passed to `on_external_failure` and the name is still
/// retained.
pub fn build_retained_set(
    backend: &dyn Backend,
    parts: &Partitioned,
    mut on_external_failure: impl FnMut(&str, &crate::Error),
) -> Result<RetainedSet> {
    let mut retained = RetainedSet::new();

    for group in &parts.groups {
        retained.extend(backend.resolve_group(group)?);
    }

    retained.extend(parts.packages.iter().cloned());

    for name in retained.snapshot() {
        retained.extend(backend.resolve_dependencies(&name)?);
    }

    for external in &parts.externals {
        retained.insert(external.clone());
        match backend.resolve_dependencies(external) {
            Ok(deps) => retained.extend(deps),
            Err(e) => on_external_failure(external, &e),
        }
    }

    Ok(retained)
}

/// Reconcile the system against `specs`.
///
/// Returns [`Outcome::Offline`] without touching anything if the index
/// refresh fails. Otherwise installs, computes removal candidates, diffs,
/// and records the diff into `changes`. Persisting the returned
/// `installed_after` and `changes` is up to the caller.
///
/// # Errors
///
/// Listing, install, group and package lookup failures abort the run before
/// `changes` is modified.
pub fn reconcile(
    backend: &dyn Backend,
    specs: &[PackageSpec],
    changes: &mut ChangeLog,
    callback: &dyn ReconcileCallback,
) -> Result<Outcome> {
    if !is_online(backend) {
        callback.on_offline();
        return Ok(Outcome::Offline);
    }

    let parts = Partitioned::from_specs(specs);
    log::debug!(
        "reconciling {} groups, {} packages, {} externals",
        parts.groups.len(),
        parts.packages.len(),
        parts.externals.len()
    );

    let installed_before = backend.list_installed()?;

    let targets = parts.install_targets();
    let install_command = backend.install_command(&targets);
    callback.on_install_command(&install_command);
    backend.install(&targets)?;

    let retained = build_retained_set(backend, &parts, |name, e| {
        callback.on_lookup_warning(name, e);
    })?;

    let to_remove = retained.removal_candidates(&backend.list_installed()?);
    let remove_command = if to_remove.is_empty() {
        None
    } else {
        let command = backend.remove_command(&to_remove);
        callback.on_remove_command(&command);
        Some(command)
    };

    let installed_after = backend.list_installed()?;

    let diff = diff::diff_installed(&installed_before, &installed_after);
    for change in diff::changes(&diff) {
        callback.on_change(&change);
    }
    changes.record(&diff);

    Ok(Outcome::Reconciled(Report {
        install_command,
        retained,
        to_remove,
        remove_command,
        installed_after,
        diff,
    }))
}

/// Preview a reconciliation without installing or recording anything.
pub fn plan(backend: &dyn Backend, specs: &[PackageSpec]) -> Result<Plan> {
    let parts = Partitioned::from_specs(specs);
    let install_command = backend.install_command(&parts.install_targets());

    let mut skipped_externals = Vec::new();
    let retained = build_retained_set(backend, &parts, |name, e| {
        log::warn!("{}", crate::audit::lookup_warning_line(name));
        log::debug!("lookup error for {name}: {e}");
        skipped_externals.push(name.to_string());
    })?;

    let to_remove = retained.removal_candidates(&backend.list_installed()?);
    let remove_command = (!to_remove.is_empty()).then(|| backend.remove_command(&to_remove));

    Ok(Plan {
        install_command,
        retained,
        to_remove,
        remove_command,
        skipped_externals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::audit::NoCallback;
    use crate::backend::{Call, MockBackend};
    use crate::types::PackageChange;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingCallback {
        lines: RefCell<Vec<String>>,
    }

    impl ReconcileCallback for RecordingCallback {
        fn on_offline(&self) {
            self.lines.borrow_mut().push("offline".to_string());
        }
        fn on_install_command(&self, command: &str) {
            self.lines
                .borrow_mut()
                .push(crate::audit::install_line(command));
        }
        fn on_remove_command(&self, command: &str) {
            self.lines.borrow_mut().push(crate::audit::remove_line(command));
        }
        fn on_lookup_warning(&self, external: &str, _error: &Error) {
            self.lines
                .borrow_mut()
                .push(crate::audit::lookup_warning_line(external));
        }
        fn on_change(&self, change: &PackageChange) {
            self.lines.borrow_mut().push(crate::audit::change_line(change));
        }
    }

    fn specs() -> Vec<PackageSpec> {
        vec![
            PackageSpec::package("git"),
            PackageSpec::group("build-essential"),
        ]
    }

    #[test]
    fn test_reconcile_records_added_package() {
        let backend = MockBackend::new()
            .with_installed([("git", "1.0")])
            .with_installed_after([("git", "1.0"), ("make", "4.3")])
            .with_dependencies("build-essential", ["make"]);
        let mut changes = ChangeLog::new();

        let outcome = reconcile(&backend, &specs(), &mut changes, &NoCallback).unwrap();

        assert_eq!(changes.added.len(), 1);
        assert_eq!(changes.added["make"], "4.3");
        assert!(changes.updated.is_empty());
        assert!(changes.removed.is_empty());

        let report = outcome.report().unwrap();
        assert_eq!(
            report.install_command,
            "apt-get update && apt-get install -y build-essential git"
        );
        assert_eq!(report.installed_after.len(), 2);
        assert!(report.to_remove.is_empty());
        assert!(report.remove_command.is_none());
    }

    #[test]
    fn test_reconcile_offline_does_nothing() {
        let backend = MockBackend::new()
            .with_online(false)
            .with_installed([("git", "1.0")]);
        let callback = RecordingCallback::default();
        let mut changes = ChangeLog::new();

        let outcome = reconcile(&backend, &specs(), &mut changes, &callback).unwrap();

        assert!(matches!(outcome, Outcome::Offline));
        assert_eq!(backend.calls(), vec![Call::RefreshIndex]);
        assert!(changes.is_empty());
        assert_eq!(*callback.lines.borrow(), vec!["offline".to_string()]);
    }

    #[test]
    fn test_reconcile_external_lookup_failure_is_not_fatal() {
        let backend = MockBackend::new()
            .with_installed([("libfoo", "2.0")])
            .with_installed_after([("libfoo", "2.0"), ("curl", "7.81")])
            .with_failing_lookup("libfoo");
        let callback = RecordingCallback::default();
        let mut changes = ChangeLog::new();

        let outcome = reconcile(
            &backend,
            &[PackageSpec::external("libfoo")],
            &mut changes,
            &callback,
        )
        .unwrap();

        let report = outcome.report().unwrap();
        assert!(report.retained.contains("libfoo"));
        assert_eq!(changes.added["curl"], "7.81");
        assert!(callback.lines.borrow().contains(
            &"PACKAGE-LOOKUP-DEPS: WARNING: error looking up deps for EXTERNAL(libfoo); ignoring"
                .to_string()
        ));
    }

    #[test]
    fn test_reconcile_externals_are_not_installed() {
        let backend = MockBackend::new();
        let mut changes = ChangeLog::new();

        reconcile(
            &backend,
            &[PackageSpec::external("libfoo"), PackageSpec::package("git")],
            &mut changes,
            &NoCallback,
        )
        .unwrap();

        assert!(backend.calls().contains(&Call::Install(vec!["git".to_string()])));
    }

    #[test]
    fn test_reconcile_package_lookup_failure_aborts_before_diff() {
        let backend = MockBackend::new()
            .with_installed([("git", "1.0")])
            .with_installed_after([("git", "1.1")])
            .with_failing_lookup("git");
        let mut changes = ChangeLog::new();

        let err = reconcile(&backend, &specs(), &mut changes, &NoCallback).unwrap_err();

        assert!(matches!(err, Error::DependencyLookup { ref name } if name == "git"));
        assert!(changes.is_empty());
        // before-snapshot only; no removal or after-snapshot listing
        let listings = backend
            .calls()
            .iter()
            .filter(|c| **c == Call::ListInstalled)
            .count();
        assert_eq!(listings, 1);
    }

    #[test]
    fn test_reconcile_group_lookup_failure_aborts() {
        let backend = MockBackend::new().with_failing_lookup("build-essential");
        let mut changes = ChangeLog::new();

        let err = reconcile(&backend, &specs(), &mut changes, &NoCallback).unwrap_err();

        assert!(matches!(err, Error::GroupLookup { .. }));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_reconcile_install_failure_aborts() {
        let backend = MockBackend::new()
            .with_installed([("git", "1.0")])
            .with_install_error("E: Unable to locate package git");
        let mut changes = ChangeLog::new();

        let err = reconcile(&backend, &specs(), &mut changes, &NoCallback).unwrap_err();

        assert!(matches!(err, Error::InstallCommand { .. }));
        assert!(changes.is_empty());
        assert!(
            !backend
                .calls()
                .iter()
                .any(|c| matches!(c, Call::ResolveDependencies(_) | Call::ResolveGroup(_)))
        );
    }

    #[test]
    fn test_reconcile_removal_is_rendered_not_executed() {
        let backend = MockBackend::new()
            .with_installed([("git", "1.0"), ("nano", "6.2"), ("vim", "8.2")])
            .with_dependencies("git", ["perl"]);
        let callback = RecordingCallback::default();
        let mut changes = ChangeLog::new();

        let outcome = reconcile(
            &backend,
            &[PackageSpec::package("git")],
            &mut changes,
            &callback,
        )
        .unwrap();

        let report = outcome.report().unwrap();
        assert_eq!(report.to_remove, vec!["nano", "vim"]);
        assert_eq!(
            report.remove_command.as_deref(),
            Some("apt-get remove -y nano vim")
        );
        assert!(
            callback
                .lines
                .borrow()
                .contains(&"PACMAN-REMOVE-COMMAND: apt-get remove -y nano vim".to_string())
        );
        // Nothing disappeared: the removal was never run.
        assert!(report.diff.removed.is_empty());
        assert_eq!(report.installed_after.len(), 3);
    }

    #[test]
    fn test_reconcile_audit_line_order() {
        let backend = MockBackend::new()
            .with_installed([("git", "1.0"), ("old", "0.1")])
            .with_installed_after([("git", "1.1"), ("make", "4.3"), ("old", "0.1")])
            .with_dependencies("build-essential", ["make"]);
        let callback = RecordingCallback::default();
        let mut changes = ChangeLog::new();

        reconcile(&backend, &specs(), &mut changes, &callback).unwrap();

        assert_eq!(
            *callback.lines.borrow(),
            vec![
                "PACMAN-INSTALL-COMMAND: apt-get update && apt-get install -y build-essential git"
                    .to_string(),
                "PACMAN-REMOVE-COMMAND: apt-get remove -y old".to_string(),
                "PACKAGE-UPGRADED: 1.0 -> 1.1".to_string(),
                "PACKAGE-INSTALLED: make@4.3".to_string(),
            ]
        );
        assert_eq!(changes.updated["git"].from, "1.0");
    }

    #[test]
    fn test_reconcile_appends_to_existing_change_log() {
        let backend = MockBackend::new()
            .with_installed_after([("make", "4.3")])
            .with_dependencies("build-essential", ["make"]);
        let mut changes = ChangeLog::new();
        changes.added.insert("htop".to_string(), "3.0".to_string());

        reconcile(&backend, &specs(), &mut changes, &NoCallback).unwrap();

        assert_eq!(changes.added.len(), 2);
        assert!(changes.added.contains_key("htop"));
    }

    #[test]
    fn test_build_retained_set_is_single_pass() {
        let backend = MockBackend::new()
            .with_dependencies("gnome", ["gnome-shell"])
            .with_dependencies("gnome-shell", ["mutter"])
            .with_dependencies("git", ["perl"])
            .with_dependencies("perl", ["perl-base"]);
        let parts = Partitioned::from_specs(&[
            PackageSpec::group("gnome"),
            PackageSpec::package("git"),
        ]);

        let retained = build_retained_set(&backend, &parts, |_, _| {}).unwrap();

        assert_eq!(
            retained.snapshot(),
            vec!["git", "gnome-shell", "mutter", "perl"]
        );
        // Dependencies discovered by the expansion pass are not expanded.
        assert!(!retained.contains("perl-base"));
        assert!(!retained.contains("gnome"));
    }

    #[test]
    fn test_build_retained_set_externals_keep_dependencies() {
        let backend = MockBackend::new().with_dependencies("docker-ce", ["containerd.io"]);
        let parts = Partitioned::from_specs(&[PackageSpec::external("docker-ce")]);

        let retained = build_retained_set(&backend, &parts, |_, _| {}).unwrap();

        assert_eq!(retained.snapshot(), vec!["containerd.io", "docker-ce"]);
    }

    #[test]
    fn test_plan_does_not_install() {
        let backend = MockBackend::new()
            .with_installed([("git", "1.0"), ("nano", "6.2")])
            .with_failing_lookup("libfoo");

        let plan = plan(
            &backend,
            &[PackageSpec::package("git"), PackageSpec::external("libfoo")],
        )
        .unwrap();

        assert_eq!(plan.to_remove, vec!["nano"]);
        assert_eq!(plan.skipped_externals, vec!["libfoo"]);
        assert!(plan.retained.contains("libfoo"));
        assert!(
            !backend
                .calls()
                .iter()
                .any(|c| matches!(c, Call::Install(_) | Call::RefreshIndex))
        );
    }
}
