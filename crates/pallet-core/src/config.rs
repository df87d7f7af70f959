//! Resolver configuration, loaded from a TOML file.

use std::path::Path;

use chrono::{DateTime, Utc};
use pallet_util::errors::PalletError;
use serde::{Deserialize, Serialize};

use crate::dep_spec::{MatchOptions, PackageDepSpec};
use crate::name::QualifiedPackageName;
use crate::package_id::PackageId;
use crate::repository::DestinationType;

/// Whether an installed id may satisfy a constraint without a rebuild.
///
/// Variants are declared loosest first, so `Ord` gives strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UseExisting {
    IfPossible,
    IfTransient,
    IfSameVersion,
    IfSame,
    OnlyIfTransient,
    Never,
}

impl UseExisting {
    pub const ALL: [UseExisting; 6] = [
        UseExisting::IfPossible,
        UseExisting::IfTransient,
        UseExisting::IfSameVersion,
        UseExisting::IfSame,
        UseExisting::OnlyIfTransient,
        UseExisting::Never,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UseExisting::IfPossible => "if_possible",
            UseExisting::IfTransient => "if_transient",
            UseExisting::IfSameVersion => "if_same_version",
            UseExisting::IfSame => "if_same",
            UseExisting::OnlyIfTransient => "only_if_transient",
            UseExisting::Never => "never",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.as_str() == s)
    }
}

/// Which dependencies of targets follow the target destination type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetDependencies {
    #[default]
    All,
    Runtime,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default, rename = "target-destination-type")]
    pub target_destination_type: DestinationType,

    #[serde(default, rename = "target-dependencies")]
    pub target_dependencies: TargetDependencies,

    /// Rebuild live (scm) packages installed longer ago than this.
    #[serde(default, rename = "reinstall-scm-days")]
    pub reinstall_scm_days: Option<u32>,

    #[serde(default = "default_use_existing_for_targets", rename = "use-existing-for-targets")]
    pub use_existing_for_targets: UseExisting,

    #[serde(default = "default_use_existing_for_sets", rename = "use-existing-for-sets")]
    pub use_existing_for_sets: UseExisting,

    #[serde(
        default = "default_use_existing_for_dependencies",
        rename = "use-existing-for-dependencies"
    )]
    pub use_existing_for_dependencies: UseExisting,

    /// Packages to always rebuild.
    #[serde(default)]
    pub with: Vec<PackageDepSpec>,

    /// Packages to keep whenever something is installed.
    #[serde(default)]
    pub without: Vec<PackageDepSpec>,

    #[serde(default)]
    pub presets: Vec<PackageDepSpec>,

    #[serde(default)]
    pub forbid: Vec<PackageDepSpec>,

    #[serde(default, rename = "allowed-to-remove")]
    pub allowed_to_remove: Vec<PackageDepSpec>,

    #[serde(default, rename = "allowed-to-break")]
    pub allowed_to_break: Vec<PackageDepSpec>,

    /// Suggestions to take.
    #[serde(default)]
    pub take: Vec<PackageDepSpec>,

    /// Suggestions to ignore.
    #[serde(default)]
    pub ignore: Vec<PackageDepSpec>,

    #[serde(default, rename = "take-suggestions")]
    pub take_suggestions: Option<bool>,

    #[serde(default, rename = "take-recommendations")]
    pub take_recommendations: Option<bool>,

    #[serde(default, rename = "follow-installed-build-dependencies")]
    pub follow_installed_build_dependencies: bool,

    #[serde(default, rename = "no-dependencies-from")]
    pub no_dependencies_from: Vec<PackageDepSpec>,

    #[serde(default, rename = "no-blockers-from")]
    pub no_blockers_from: Vec<PackageDepSpec>,

    #[serde(default, rename = "max-restarts")]
    pub max_restarts: Option<usize>,

    /// Fixed clock for reproducible runs; the environment's clock otherwise.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

fn default_use_existing_for_targets() -> UseExisting {
    UseExisting::Never
}

fn default_use_existing_for_sets() -> UseExisting {
    UseExisting::IfSame
}

fn default_use_existing_for_dependencies() -> UseExisting {
    UseExisting::IfPossible
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            target_destination_type: DestinationType::InstallToSlash,
            target_dependencies: TargetDependencies::All,
            reinstall_scm_days: None,
            use_existing_for_targets: default_use_existing_for_targets(),
            use_existing_for_sets: default_use_existing_for_sets(),
            use_existing_for_dependencies: default_use_existing_for_dependencies(),
            with: Vec::new(),
            without: Vec::new(),
            presets: Vec::new(),
            forbid: Vec::new(),
            allowed_to_remove: Vec::new(),
            allowed_to_break: Vec::new(),
            take: Vec::new(),
            ignore: Vec::new(),
            take_suggestions: None,
            take_recommendations: None,
            follow_installed_build_dependencies: false,
            no_dependencies_from: Vec::new(),
            no_blockers_from: Vec::new(),
            max_restarts: None,
            now: None,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, PalletError> {
        let content = pallet_util::fs::read_to_string(path, "resolver config")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PalletError> {
        toml::from_str(content).map_err(|e| PalletError::Config {
            message: format!("Failed to parse resolver config: {e}"),
        })
    }

    /// Whether `id` matches any spec in `specs`, ignoring choice requirements.
    pub fn matches_any(specs: &[PackageDepSpec], id: &PackageId) -> bool {
        let options = MatchOptions {
            ignore_choice_requirements: true,
        };
        specs.iter().any(|s| s.matches(id, options))
    }

    /// Whether any spec in `specs` names `package`, whatever its other parts.
    pub fn names_package(specs: &[PackageDepSpec], package: &QualifiedPackageName) -> bool {
        specs.iter().any(|s| &s.package == package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ResolverConfig::from_toml_str("").unwrap();
        assert_eq!(c.target_destination_type, DestinationType::InstallToSlash);
        assert_eq!(c.use_existing_for_targets, UseExisting::Never);
        assert_eq!(c.use_existing_for_sets, UseExisting::IfSame);
        assert_eq!(c.use_existing_for_dependencies, UseExisting::IfPossible);
        assert!(c.take_recommendations.is_none());
        assert!(c.now.is_none());
    }

    #[test]
    fn full_config() {
        let c = ResolverConfig::from_toml_str(
            r#"
target-destination-type = "create-binary"
target-dependencies = "runtime"
reinstall-scm-days = 14
use-existing-for-targets = "if-same"
with = ["cat/a"]
without = [">=cat/b-2"]
forbid = ["cat/c"]
take-suggestions = true
max-restarts = 5
now = "2026-02-01T12:00:00Z"
"#,
        )
        .unwrap();
        assert_eq!(c.target_destination_type, DestinationType::CreateBinary);
        assert_eq!(c.target_dependencies, TargetDependencies::Runtime);
        assert_eq!(c.reinstall_scm_days, Some(14));
        assert_eq!(c.use_existing_for_targets, UseExisting::IfSame);
        assert_eq!(c.without[0].to_string(), ">=cat/b-2");
        assert_eq!(c.take_suggestions, Some(true));
        assert_eq!(c.max_restarts, Some(5));
        assert!(c.now.is_some());
    }

    #[test]
    fn bad_spec_is_a_config_error() {
        let err = ResolverConfig::from_toml_str(r#"with = ["not a spec"]"#).unwrap_err();
        assert!(matches!(err, PalletError::Config { .. }));
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(ResolverConfig::from_toml_str("frobnicate = true").is_err());
    }

    #[test]
    fn strictness_order() {
        assert!(UseExisting::IfPossible < UseExisting::IfTransient);
        assert!(UseExisting::IfSameVersion < UseExisting::IfSame);
        assert!(UseExisting::OnlyIfTransient < UseExisting::Never);
        for u in UseExisting::ALL {
            assert_eq!(UseExisting::from_str_opt(u.as_str()), Some(u));
        }
    }
}
