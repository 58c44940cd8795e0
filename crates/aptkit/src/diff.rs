//! Before/after comparison of installed package sets.

use crate::types::{InstalledSet, PackageChange, PackageDiff, VersionChange};

/// Classify every name across two snapshots.
///
/// Each name lands in at most one of added, updated or removed; names with
/// identical versions in both snapshots are unchanged and omitted.
pub fn diff_installed(before: &InstalledSet, after: &InstalledSet) -> PackageDiff {
    let mut diff = PackageDiff::default();

    for (name, to) in after {
        match before.get(name) {
            None => {
                diff.added.insert(name.clone(), to.clone());
            }
            Some(from) if from != to => {
                diff.updated.insert(
                    name.clone(),
                    VersionChange {
                        from: from.clone(),
                        to: to.clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }

    for (name, version) in before {
        if !after.contains_key(name) {
            diff.removed.insert(name.clone(), version.clone());
        }
    }

    diff
}

/// Flatten a diff into change events.
///
/// Installs and upgrades come first in name order, then removals.
pub fn changes(diff: &PackageDiff) -> Vec<PackageChange> {
    let mut installed_or_upgraded: Vec<PackageChange> = diff
        .added
        .iter()
        .map(|(name, version)| PackageChange::Installed {
            name: name.clone(),
            version: version.clone(),
        })
        .chain(diff.updated.iter().map(|(name, change)| PackageChange::Upgraded {
            name: name.clone(),
            from: change.from.clone(),
            to: change.to.clone(),
        }))
        .collect();
    installed_or_upgraded.sort_by(|a, b| a.name().cmp(b.name()));

    let removed = diff.removed.iter().map(|(name, version)| PackageChange::Removed {
        name: name.clone(),
        version: version.clone(),
    });

    installed_or_upgraded.into_iter().chain(removed).collect()
}
