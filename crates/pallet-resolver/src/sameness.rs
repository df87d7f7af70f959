//! Comparing an installed id with an installable one.

use pallet_core::package_id::{DependencyKey, PackageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sameness {
    pub is_same_version: bool,
    pub is_same: bool,
    pub is_same_metadata: bool,
}

/// How alike `existing` and `installable` are. Each attribute implies the
/// one before it.
pub fn get_sameness(existing: &PackageId, installable: &PackageId) -> Sameness {
    let is_same_version = existing.version == installable.version;
    let is_same = is_same_version && same_choices(existing, installable);
    let is_same_metadata = is_same && same_dependencies(existing, installable);
    Sameness {
        is_same_version,
        is_same,
        is_same_metadata,
    }
}

/// Values explicitly listed by both ids, in choices considered for
/// sameness, must agree.
fn same_choices(existing: &PackageId, installable: &PackageId) -> bool {
    for choice in existing.choices.iter().filter(|c| c.consider_for_sameness) {
        for value in choice.values.iter().filter(|v| v.explicitly_listed) {
            let name = choice.name_with_prefix(value);
            let Some(other) = installable.choice_value(&name) else {
                continue;
            };
            if other.explicitly_listed && other.enabled != value.enabled {
                return false;
            }
        }
    }
    true
}

fn same_dependencies(existing: &PackageId, installable: &PackageId) -> bool {
    DependencyKey::ALL.into_iter().all(|key| {
        let canonical = |id: &PackageId| {
            id.dependencies(key)
                .map(|t| t.canonical_form())
                .unwrap_or_default()
        };
        canonical(existing) == canonical(installable)
    })
}
