//! The query layer the resolver consumes.

use chrono::{DateTime, Utc};
use pallet_util::errors::PalletError;

use crate::dep_spec::{MatchOptions, PackageDepSpec, PackageOrBlockDepSpec};
use crate::name::{QualifiedPackageName, RepositoryName, SetName};
use crate::package_id::{PackageId, PackageIdRef};
use crate::repository::Repository;

/// Read-only view of installed and installable packages.
pub trait Environment {
    fn repositories(&self) -> &[Repository];

    /// Every id for `name`, installed and installable, sorted ascending by
    /// version and then repository importance, so the best id is last.
    fn package_ids(&self, name: &QualifiedPackageName) -> Vec<PackageIdRef>;

    /// Members of a set; sets may hold blockers as well as packages.
    fn expand_set(&self, name: &SetName) -> Result<Vec<PackageOrBlockDepSpec>, PalletError>;

    fn now(&self) -> DateTime<Utc>;

    fn repository(&self, name: &RepositoryName) -> Result<&Repository, PalletError> {
        self.repositories()
            .iter()
            .find(|r| &r.name == name)
            .ok_or_else(|| PalletError::NoSuchRepository {
                name: name.to_string(),
            })
    }

    fn match_package(&self, spec: &PackageDepSpec, id: &PackageId, options: MatchOptions) -> bool {
        spec.matches(id, options)
    }

    /// Evaluate a `flag? ( ... )` condition against `id`'s choices.
    fn condition_met(&self, id: &PackageId, flag: &str) -> bool {
        id.choice_value(flag).is_some_and(|v| v.enabled)
    }

    fn is_installed(&self, id: &PackageId) -> bool {
        self.repository(&id.repository)
            .is_ok_and(|r| r.is_installed())
    }

    fn installed_ids(&self, name: &QualifiedPackageName) -> Vec<PackageIdRef> {
        self.package_ids(name)
            .into_iter()
            .filter(|id| self.is_installed(id))
            .collect()
    }

    fn installable_ids(&self, name: &QualifiedPackageName) -> Vec<PackageIdRef> {
        self.package_ids(name)
            .into_iter()
            .filter(|id| !self.is_installed(id))
            .collect()
    }

    /// Every id matching `spec`, best last.
    fn matching_ids(&self, spec: &PackageDepSpec, options: MatchOptions) -> Vec<PackageIdRef> {
        self.package_ids(&spec.package)
            .into_iter()
            .filter(|id| self.match_package(spec, id, options))
            .collect()
    }

    /// The single id matching `spec`, as used when decoding plans.
    fn find_id(&self, spec: &PackageDepSpec) -> Result<PackageIdRef, PalletError> {
        let mut ids = self.matching_ids(spec, MatchOptions::default());
        match ids.len() {
            1 => Ok(ids.remove(0)),
            0 => Err(PalletError::NoSuchPackageId {
                spec: spec.to_string(),
            }),
            n => Err(PalletError::Generic {
                message: format!("'{spec}' matches {n} package ids, expected exactly one"),
            }),
        }
    }
}
