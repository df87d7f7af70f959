//! In-memory package universe, loadable from TOML.
//!
//! ```toml
//! now = "2026-01-01T00:00:00Z"
//!
//! [[repository]]
//! name = "gentoo"
//! kind = "source"
//! importance = 10
//!
//! [[repository]]
//! name = "installed"
//! kind = "installed"
//! root = "/"
//!
//! [[package]]
//! name = "dev-libs/openssl"
//! version = "3.0.1"
//! repository = "gentoo"
//! use = ["ssl", "-static"]
//! run-dependencies = "sys-libs/zlib"
//!
//! [[set]]
//! name = "world"
//! specs = ["dev-libs/openssl", "!dev-libs/libressl"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pallet_util::errors::PalletError;
use serde::Deserialize;

use crate::dep_spec::PackageOrBlockDepSpec;
use crate::environment::Environment;
use crate::name::{QualifiedPackageName, RepositoryName, SetName};
use crate::package_id::{Choice, ChoiceValue, DependencyKey, PackageId, PackageIdRef};
use crate::repository::{Repository, RepositoryKind};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UniverseFile {
    #[serde(default)]
    now: Option<DateTime<Utc>>,
    #[serde(default)]
    repository: Vec<RepositoryEntry>,
    #[serde(default)]
    package: Vec<PackageEntry>,
    #[serde(default)]
    set: Vec<SetEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum KindEntry {
    Source,
    Binary,
    Installed,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepositoryEntry {
    name: String,
    kind: KindEntry,
    #[serde(default)]
    importance: i32,
    #[serde(default)]
    root: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PackageEntry {
    name: String,
    version: String,
    #[serde(default = "default_slot")]
    slot: String,
    repository: String,
    #[serde(default)]
    masked: bool,
    #[serde(default)]
    behaviours: Vec<String>,
    #[serde(default)]
    installed_time: Option<DateTime<Utc>>,
    #[serde(default)]
    dependencies: Option<String>,
    #[serde(default)]
    build_dependencies: Option<String>,
    #[serde(default)]
    run_dependencies: Option<String>,
    #[serde(default)]
    post_dependencies: Option<String>,
    #[serde(default)]
    suggested_dependencies: Option<String>,
    #[serde(default, rename = "use")]
    use_flags: Vec<String>,
    #[serde(default)]
    choices: Vec<ChoiceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ChoiceEntry {
    prefix: String,
    #[serde(default = "default_true")]
    consider_for_sameness: bool,
    #[serde(default)]
    values: Vec<String>,
    /// Values present on the id without being listed by the package.
    #[serde(default)]
    implicit: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetEntry {
    name: String,
    #[serde(default)]
    specs: Vec<PackageOrBlockDepSpec>,
}

fn default_slot() -> String {
    "0".to_string()
}

fn default_true() -> bool {
    true
}

fn choice_values(values: &[String], explicitly_listed: bool) -> Vec<ChoiceValue> {
    values
        .iter()
        .map(|v| {
            let (name, enabled) = match v.strip_prefix('-') {
                Some(n) => (n, false),
                None => (v.as_str(), true),
            };
            ChoiceValue {
                name: name.to_string(),
                enabled,
                explicitly_listed,
            }
        })
        .collect()
}

/// An immutable snapshot of repositories, package ids and sets.
#[derive(Debug, Clone)]
pub struct Universe {
    repositories: Vec<Repository>,
    packages: BTreeMap<QualifiedPackageName, Vec<PackageIdRef>>,
    sets: BTreeMap<SetName, Vec<PackageOrBlockDepSpec>>,
    now: DateTime<Utc>,
}

impl Default for Universe {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            packages: BTreeMap::new(),
            sets: BTreeMap::new(),
            now: Utc::now(),
        }
    }
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, PalletError> {
        let content = pallet_util::fs::read_to_string(path, "universe")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PalletError> {
        let file: UniverseFile = toml::from_str(content).map_err(|e| PalletError::Config {
            message: format!("Failed to parse universe: {e}"),
        })?;

        let mut universe = Universe::new();
        if let Some(now) = file.now {
            universe.set_now(now);
        }

        for entry in file.repository {
            let kind = match entry.kind {
                KindEntry::Source => RepositoryKind::Source,
                KindEntry::Binary => RepositoryKind::Binary,
                KindEntry::Installed => RepositoryKind::Installed {
                    root: entry.root.unwrap_or_else(|| PathBuf::from("/")),
                },
            };
            universe.add_repository(Repository {
                name: RepositoryName::new(&entry.name)?,
                importance: entry.importance,
                kind,
            })?;
        }

        for entry in file.package {
            universe.add_package(package_from_entry(entry)?)?;
        }

        for entry in file.set {
            universe.add_set(SetName::new(&entry.name)?, entry.specs);
        }

        tracing::debug!(
            "loaded universe: {} repositories, {} packages, {} sets",
            universe.repositories.len(),
            universe.packages.len(),
            universe.sets.len()
        );
        Ok(universe)
    }

    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn add_repository(&mut self, repository: Repository) -> Result<(), PalletError> {
        if self.repositories.iter().any(|r| r.name == repository.name) {
            return Err(PalletError::Config {
                message: format!("duplicate repository '{}'", repository.name),
            });
        }
        self.repositories.push(repository);
        Ok(())
    }

    /// Add an id, keeping each package's ids sorted best last.
    pub fn add_package(&mut self, id: PackageId) -> Result<(), PalletError> {
        let importance = self.repository(&id.repository)?.importance;
        let importance_of = |repos: &[Repository], id: &PackageId| {
            repos
                .iter()
                .find(|r| r.name == id.repository)
                .map(|r| r.importance)
                .unwrap_or(0)
        };

        let ids = self.packages.entry(id.name.clone()).or_default();
        if ids.iter().any(|existing| **existing == id) {
            return Err(PalletError::Config {
                message: format!("duplicate package id '{id}'"),
            });
        }
        let pos = ids.partition_point(|existing| {
            (&existing.version, importance_of(&self.repositories, existing))
                <= (&id.version, importance)
        });
        ids.insert(pos, Arc::new(id));
        Ok(())
    }

    pub fn add_set(&mut self, name: SetName, specs: Vec<PackageOrBlockDepSpec>) {
        self.sets.insert(name, specs);
    }

    pub fn package_names(&self) -> impl Iterator<Item = &QualifiedPackageName> {
        self.packages.keys()
    }

    pub fn id_count(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn set_count(&self) -> usize {
        self.sets.len()
    }
}

fn package_from_entry(entry: PackageEntry) -> Result<PackageId, PalletError> {
    let mut builder = PackageId::builder(&entry.name, &entry.version, &entry.repository)
        .slot(&entry.slot)
        .masked(entry.masked);

    for (key, text) in [
        (DependencyKey::Dependencies, &entry.dependencies),
        (DependencyKey::Build, &entry.build_dependencies),
        (DependencyKey::Run, &entry.run_dependencies),
        (DependencyKey::Post, &entry.post_dependencies),
        (DependencyKey::Suggested, &entry.suggested_dependencies),
    ] {
        if let Some(text) = text {
            builder = builder.dependencies(key, text);
        }
    }

    for value in choice_values(&entry.use_flags, true) {
        builder = builder.choice(&value.name, value.enabled);
    }

    for choice in &entry.choices {
        let mut values = choice_values(&choice.values, true);
        values.extend(choice_values(&choice.implicit, false));
        builder = builder.choice_group(Choice {
            prefix: choice.prefix.clone(),
            consider_for_sameness: choice.consider_for_sameness,
            values,
        });
    }

    for behaviour in &entry.behaviours {
        builder = builder.behaviour(behaviour);
    }
    if let Some(time) = entry.installed_time {
        builder = builder.installed_time(time);
    }
    builder.build()
}

impl Environment for Universe {
    fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    fn package_ids(&self, name: &QualifiedPackageName) -> Vec<PackageIdRef> {
        self.packages.get(name).cloned().unwrap_or_default()
    }

    fn expand_set(&self, name: &SetName) -> Result<Vec<PackageOrBlockDepSpec>, PalletError> {
        self.sets
            .get(name)
            .cloned()
            .ok_or_else(|| PalletError::NoSuchSet {
                name: name.to_string(),
            })
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
