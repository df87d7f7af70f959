//! Package identifiers: one concrete version of a package in one repository.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pallet_util::errors::PalletError;

use crate::dep_spec::{PackageDepSpec, SlotRequirement};
use crate::dep_tree::{DepTree, DependencyLabel};
use crate::name::{QualifiedPackageName, RepositoryName, SlotName};
use crate::version::{Version, VersionOperator, VersionRequirement};

/// Shared handle to a package id. Ids are immutable once loaded.
pub type PackageIdRef = Arc<PackageId>;

/// Behaviour marking an id that may be freely replaced.
pub const BEHAVIOUR_TRANSIENT: &str = "transient";
/// Behaviour marking an id that cannot be turned into a binary package.
pub const BEHAVIOUR_UNBINARYABLE: &str = "unbinaryable";
/// Behaviour marking an id that cannot be installed to a chroot.
pub const BEHAVIOUR_UNCHROOTABLE: &str = "unchrootable";
/// Behaviour marking an id that cannot be installed at all.
pub const BEHAVIOUR_UNINSTALLABLE: &str = "uninstallable";

/// One value of a choice, e.g. the `ssl` USE flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceValue {
    pub name: String,
    pub enabled: bool,
    /// Set for values the package lists itself, rather than implicit ones.
    pub explicitly_listed: bool,
}

/// A group of choice values sharing a prefix (empty for plain flags).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub prefix: String,
    pub consider_for_sameness: bool,
    pub values: Vec<ChoiceValue>,
}

impl Choice {
    pub fn name_with_prefix(&self, value: &ChoiceValue) -> String {
        if self.prefix.is_empty() {
            value.name.clone()
        } else {
            format!("{}_{}", self.prefix, value.name)
        }
    }
}

/// The dependency metadata keys an id can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKey {
    Dependencies,
    Build,
    Run,
    Post,
    Suggested,
}

impl DependencyKey {
    pub const ALL: [DependencyKey; 5] = [
        DependencyKey::Dependencies,
        DependencyKey::Build,
        DependencyKey::Run,
        DependencyKey::Post,
        DependencyKey::Suggested,
    ];

    pub fn raw_name(self) -> &'static str {
        match self {
            DependencyKey::Dependencies => "DEPENDENCIES",
            DependencyKey::Build => "DEPEND",
            DependencyKey::Run => "RDEPEND",
            DependencyKey::Post => "PDEPEND",
            DependencyKey::Suggested => "SDEPEND",
        }
    }

    /// Labels in force at the top of a tree stored under this key.
    pub fn initial_labels(self) -> &'static [DependencyLabel] {
        match self {
            DependencyKey::Dependencies => &[DependencyLabel::Build, DependencyLabel::Run],
            DependencyKey::Build => &[DependencyLabel::Build],
            DependencyKey::Run => &[DependencyLabel::Run],
            DependencyKey::Post => &[DependencyLabel::Post],
            DependencyKey::Suggested => &[DependencyLabel::Post, DependencyLabel::Suggestion],
        }
    }
}

/// A concrete package version in a repository.
#[derive(Debug, Clone)]
pub struct PackageId {
    pub name: QualifiedPackageName,
    pub version: Version,
    pub slot: SlotName,
    pub repository: RepositoryName,
    pub dependencies: BTreeMap<DependencyKey, DepTree>,
    pub choices: Vec<Choice>,
    pub installed_time: Option<DateTime<Utc>>,
    pub masked: bool,
    pub behaviours: BTreeSet<String>,
}

impl PackageId {
    pub fn builder(name: &str, version: &str, repository: &str) -> PackageIdBuilder {
        PackageIdBuilder {
            name: name.to_string(),
            version: version.to_string(),
            repository: repository.to_string(),
            slot: "0".to_string(),
            dependencies: Vec::new(),
            choices: Vec::new(),
            plain_choices: Vec::new(),
            installed_time: None,
            masked: false,
            behaviours: BTreeSet::new(),
        }
    }

    /// `=cat/pkg-1.0:slot::repo`, matching this id and no other.
    pub fn uniquely_identifying_spec(&self) -> PackageDepSpec {
        PackageDepSpec {
            version_requirements: vec![VersionRequirement {
                operator: VersionOperator::Equal,
                version: self.version.clone(),
            }],
            slot: Some(SlotRequirement::Exact(self.slot.clone())),
            repository: Some(self.repository.clone()),
            ..PackageDepSpec::for_package(self.name.clone())
        }
    }

    /// Look up a choice value by its prefixed name, e.g. `python_targets_3_11`.
    pub fn choice_value(&self, flag: &str) -> Option<&ChoiceValue> {
        self.choices.iter().find_map(|choice| {
            choice
                .values
                .iter()
                .find(|v| choice.name_with_prefix(v) == flag)
        })
    }

    pub fn dependencies(&self, key: DependencyKey) -> Option<&DepTree> {
        self.dependencies.get(&key)
    }

    pub fn has_behaviour(&self, behaviour: &str) -> bool {
        self.behaviours.contains(behaviour)
    }

    pub fn is_transient(&self) -> bool {
        self.has_behaviour(BEHAVIOUR_TRANSIENT)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}:{}::{}",
            self.name, self.version, self.slot, self.repository
        )
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.repository == other.repository
            && self.slot == other.slot
    }
}

impl Eq for PackageId {}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.repository.hash(state);
        self.slot.hash(state);
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.name, &self.version, &self.repository, &self.slot).cmp(&(
            &other.name,
            &other.version,
            &other.repository,
            &other.slot,
        ))
    }
}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Builder for [`PackageId`], used by the universe loader and tests.
#[derive(Debug, Clone)]
pub struct PackageIdBuilder {
    name: String,
    version: String,
    repository: String,
    slot: String,
    dependencies: Vec<(DependencyKey, String)>,
    choices: Vec<Choice>,
    plain_choices: Vec<ChoiceValue>,
    installed_time: Option<DateTime<Utc>>,
    masked: bool,
    behaviours: BTreeSet<String>,
}

impl PackageIdBuilder {
    pub fn slot(mut self, slot: &str) -> Self {
        self.slot = slot.to_string();
        self
    }

    pub fn dependencies(mut self, key: DependencyKey, text: &str) -> Self {
        self.dependencies.push((key, text.to_string()));
        self
    }

    /// An explicitly listed, unprefixed flag.
    pub fn choice(mut self, flag: &str, enabled: bool) -> Self {
        self.plain_choices.push(ChoiceValue {
            name: flag.to_string(),
            enabled,
            explicitly_listed: true,
        });
        self
    }

    pub fn choice_group(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn installed_time(mut self, time: DateTime<Utc>) -> Self {
        self.installed_time = Some(time);
        self
    }

    pub fn masked(mut self, masked: bool) -> Self {
        self.masked = masked;
        self
    }

    pub fn behaviour(mut self, behaviour: &str) -> Self {
        self.behaviours.insert(behaviour.to_string());
        self
    }

    pub fn build(self) -> Result<PackageId, PalletError> {
        let mut dependencies = BTreeMap::new();
        for (key, text) in &self.dependencies {
            dependencies.insert(*key, DepTree::parse(text)?);
        }

        let mut choices = Vec::new();
        if !self.plain_choices.is_empty() {
            choices.push(Choice {
                prefix: String::new(),
                consider_for_sameness: true,
                values: self.plain_choices,
            });
        }
        choices.extend(self.choices);

        Ok(PackageId {
            name: self.name.parse()?,
            version: Version::parse(&self.version)?,
            slot: SlotName::new(&self.slot)?,
            repository: RepositoryName::new(&self.repository)?,
            dependencies,
            choices,
            installed_time: self.installed_time,
            masked: self.masked,
            behaviours: self.behaviours,
        })
    }
}
