//! Package and block dependency specifications.
//!
//! Textual forms:
//! - `cat/pkg`, `>=cat/pkg-1.2`, `=cat/pkg-1.2*`, `~cat/pkg-1.2`
//! - `cat/pkg:3`, `cat/pkg:3=`, `cat/pkg:*`, `cat/pkg:=`
//! - `cat/pkg::repo`
//! - `cat/pkg[foo,-bar]` (choice requirements)
//! - `cat/pkg[>=1&<2]`, `cat/pkg[=1|=3]` (version ranges)
//! - `!cat/pkg` (weak block), `!!cat/pkg` (strong block)

use std::fmt;
use std::str::FromStr;

use pallet_util::errors::PalletError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::name::{QualifiedPackageName, RepositoryName, SlotName};
use crate::package_id::PackageId;
use crate::version::{Version, VersionOperator, VersionRequirement};

/// Slot part of a package dep spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotRequirement {
    /// `:3`
    Exact(SlotName),
    /// `:3=`, the form a `:=` dependency is rewritten to once installed.
    ExactLocked(SlotName),
    /// `:*`
    AnyUnlocked,
    /// `:=`
    AnyLocked,
}

impl SlotRequirement {
    /// The slot a resolvent can be keyed on, if the requirement names exactly one.
    pub fn exact_slot(&self) -> Option<&SlotName> {
        match self {
            SlotRequirement::Exact(s) => Some(s),
            _ => None,
        }
    }

    fn matches(&self, slot: &SlotName) -> bool {
        match self {
            SlotRequirement::Exact(s) | SlotRequirement::ExactLocked(s) => s == slot,
            SlotRequirement::AnyUnlocked | SlotRequirement::AnyLocked => true,
        }
    }
}

impl fmt::Display for SlotRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRequirement::Exact(s) => write!(f, ":{s}"),
            SlotRequirement::ExactLocked(s) => write!(f, ":{s}="),
            SlotRequirement::AnyUnlocked => f.write_str(":*"),
            SlotRequirement::AnyLocked => f.write_str(":="),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VersionRequirementsMode {
    #[default]
    And,
    Or,
}

/// `[flag]` or `[-flag]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChoiceRequirement {
    pub flag: String,
    pub enabled: bool,
}

impl fmt::Display for ChoiceRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            f.write_str(&self.flag)
        } else {
            write!(f, "-{}", self.flag)
        }
    }
}

/// Options for [`PackageDepSpec::matches`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    pub ignore_choice_requirements: bool,
}

/// A requirement on a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageDepSpec {
    pub package: QualifiedPackageName,
    pub version_requirements: Vec<VersionRequirement>,
    pub version_requirements_mode: VersionRequirementsMode,
    pub slot: Option<SlotRequirement>,
    pub repository: Option<RepositoryName>,
    pub choice_requirements: Vec<ChoiceRequirement>,
}

impl PackageDepSpec {
    /// A spec matching every version of `package`.
    pub fn for_package(package: QualifiedPackageName) -> Self {
        Self {
            package,
            version_requirements: Vec::new(),
            version_requirements_mode: VersionRequirementsMode::And,
            slot: None,
            repository: None,
            choice_requirements: Vec::new(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, PalletError> {
        let err = |m: &str| PalletError::malformed_spec(s, m);
        let mut rest = s.trim();
        if rest.is_empty() {
            return Err(err("empty spec"));
        }

        let (operator, after_op) = match VersionOperator::split_prefix(rest) {
            Some((op, r)) => (Some(op), r),
            None => (None, rest),
        };
        rest = after_op;

        let mut bracket_groups = Vec::new();
        while let Some(stripped) = rest.strip_suffix(']') {
            let open = stripped.rfind('[').ok_or_else(|| err("unbalanced ']'"))?;
            bracket_groups.push(&stripped[open + 1..]);
            rest = &stripped[..open];
        }
        bracket_groups.reverse();

        let mut repository = None;
        if let Some(idx) = rest.find("::") {
            repository = Some(RepositoryName::new(&rest[idx + 2..])?);
            rest = &rest[..idx];
        }

        let mut slot = None;
        if let Some(idx) = rest.find(':') {
            slot = Some(parse_slot(&rest[idx + 1..]).ok_or_else(|| err("bad slot"))?);
            rest = &rest[..idx];
        }

        let mut version_requirements = Vec::new();
        let mut version_requirements_mode = VersionRequirementsMode::And;

        let (name_part, version) = split_name_version(rest);
        match (operator, version) {
            (Some(op), Some(ver)) => {
                let (op, ver) = match (op, ver.strip_suffix('*')) {
                    (VersionOperator::Equal, Some(v)) => (VersionOperator::EqualStar, v),
                    (_, Some(_)) => return Err(err("'*' is only allowed with '='")),
                    (op, None) => (op, ver),
                };
                version_requirements.push(VersionRequirement {
                    operator: op,
                    version: Version::parse(ver)?,
                });
            }
            (Some(_), None) => return Err(err("operator without a version")),
            (None, Some(_)) => return Err(err("version without an operator")),
            (None, None) => {}
        }

        let package: QualifiedPackageName = name_part.parse()?;

        let mut choice_requirements = Vec::new();
        for group in bracket_groups {
            if group.starts_with(['=', '<', '>', '~']) {
                if !version_requirements.is_empty() {
                    return Err(err("more than one set of version requirements"));
                }
                let (items, mode) = if group.contains('|') {
                    (group.split('|').collect::<Vec<_>>(), VersionRequirementsMode::Or)
                } else {
                    (group.split('&').collect::<Vec<_>>(), VersionRequirementsMode::And)
                };
                version_requirements_mode = mode;
                for item in items {
                    let (op, v) =
                        VersionOperator::split_prefix(item).ok_or_else(|| err("bad version range"))?;
                    let (op, v) = match (op, v.strip_suffix('*')) {
                        (VersionOperator::Equal, Some(v)) => (VersionOperator::EqualStar, v),
                        (_, Some(_)) => return Err(err("'*' is only allowed with '='")),
                        (op, None) => (op, v),
                    };
                    version_requirements.push(VersionRequirement {
                        operator: op,
                        version: Version::parse(v)?,
                    });
                }
            } else {
                for flag in group.split(',') {
                    let (flag, enabled) = match flag.strip_prefix('-') {
                        Some(f) => (f, false),
                        None => (flag, true),
                    };
                    if flag.is_empty() {
                        return Err(err("empty choice requirement"));
                    }
                    choice_requirements.push(ChoiceRequirement {
                        flag: flag.to_string(),
                        enabled,
                    });
                }
            }
        }

        Ok(Self {
            package,
            version_requirements,
            version_requirements_mode,
            slot,
            repository,
            choice_requirements,
        })
    }

    /// Whether `id` satisfies this spec.
    pub fn matches(&self, id: &PackageId, options: MatchOptions) -> bool {
        if id.name != self.package {
            return false;
        }

        let version_ok = match self.version_requirements_mode {
            VersionRequirementsMode::And => self
                .version_requirements
                .iter()
                .all(|r| r.matches(&id.version)),
            VersionRequirementsMode::Or => {
                self.version_requirements.is_empty()
                    || self
                        .version_requirements
                        .iter()
                        .any(|r| r.matches(&id.version))
            }
        };
        if !version_ok {
            return false;
        }

        if let Some(slot) = &self.slot {
            if !slot.matches(&id.slot) {
                return false;
            }
        }

        if let Some(repo) = &self.repository {
            if repo != &id.repository {
                return false;
            }
        }

        options.ignore_choice_requirements
            || self
                .choice_requirements
                .iter()
                .all(|c| id.choice_value(&c.flag).map(|v| v.enabled) == Some(c.enabled))
    }

    /// A copy of this spec with the `[flag]` requirements removed.
    pub fn without_choice_requirements(&self) -> Self {
        Self {
            choice_requirements: Vec::new(),
            ..self.clone()
        }
    }
}

fn parse_slot(s: &str) -> Option<SlotRequirement> {
    match s {
        "*" => Some(SlotRequirement::AnyUnlocked),
        "=" => Some(SlotRequirement::AnyLocked),
        _ => match s.strip_suffix('=') {
            Some(name) => SlotName::new(name).ok().map(SlotRequirement::ExactLocked),
            None => SlotName::new(s).ok().map(SlotRequirement::Exact),
        },
    }
}

/// Split `cat/pkg-1.2-r1` into `cat/pkg` and `1.2-r1`.
///
/// The version starts at the first `-` after the `/` that is followed by a
/// digit (or by `scm`) and whose remainder parses as a version.
fn split_name_version(s: &str) -> (&str, Option<&str>) {
    let start = s.find('/').map(|i| i + 1).unwrap_or(0);
    for (idx, _) in s[start..].match_indices('-') {
        let pos = start + idx;
        let candidate = &s[pos + 1..];
        let looks_like_version =
            candidate.starts_with(|c: char| c.is_ascii_digit()) || candidate == "scm";
        if looks_like_version && Version::parse(candidate.trim_end_matches('*')).is_ok() {
            return (&s[..pos], Some(candidate));
        }
    }
    (s, None)
}

impl FromStr for PackageDepSpec {
    type Err = PalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageDepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inline = self.version_requirements.len() == 1;
        if inline {
            let req = &self.version_requirements[0];
            write!(f, "{}{}-{}", req.operator.as_str(), self.package, req.version)?;
            if req.operator == VersionOperator::EqualStar {
                f.write_str("*")?;
            }
        } else {
            write!(f, "{}", self.package)?;
        }
        if let Some(slot) = &self.slot {
            write!(f, "{slot}")?;
        }
        if let Some(repo) = &self.repository {
            write!(f, "::{repo}")?;
        }
        if !inline && !self.version_requirements.is_empty() {
            let sep = match self.version_requirements_mode {
                VersionRequirementsMode::And => "&",
                VersionRequirementsMode::Or => "|",
            };
            let reqs: Vec<String> = self
                .version_requirements
                .iter()
                .map(|r| r.to_string())
                .collect();
            write!(f, "[{}]", reqs.join(sep))?;
        }
        if !self.choice_requirements.is_empty() {
            let flags: Vec<String> = self
                .choice_requirements
                .iter()
                .map(|c| c.to_string())
                .collect();
            write!(f, "[{}]", flags.join(","))?;
        }
        Ok(())
    }
}

/// A block on packages matching `blocking`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockDepSpec {
    pub blocking: PackageDepSpec,
    /// `!!` blocks must be resolved before the blocker is installed; `!`
    /// blocks may be resolved afterwards.
    pub strong: bool,
}

impl BlockDepSpec {
    pub fn parse(s: &str) -> Result<Self, PalletError> {
        let (strong, rest) = if let Some(r) = s.strip_prefix("!!") {
            (true, r)
        } else if let Some(r) = s.strip_prefix('!') {
            (false, r)
        } else {
            return Err(PalletError::malformed_spec(s, "a block must start with '!'"));
        };
        Ok(Self {
            blocking: PackageDepSpec::parse(rest)?,
            strong,
        })
    }
}

impl fmt::Display for BlockDepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bangs = if self.strong { "!!" } else { "!" };
        write!(f, "{bangs}{}", self.blocking)
    }
}

/// Either a package requirement or a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageOrBlockDepSpec {
    Package(PackageDepSpec),
    Block(BlockDepSpec),
}

impl PackageOrBlockDepSpec {
    pub fn parse(s: &str) -> Result<Self, PalletError> {
        if s.starts_with('!') {
            BlockDepSpec::parse(s).map(Self::Block)
        } else {
            PackageDepSpec::parse(s).map(Self::Package)
        }
    }

    /// The package spec, or the blocked package spec for a block.
    pub fn package_spec(&self) -> &PackageDepSpec {
        match self {
            PackageOrBlockDepSpec::Package(p) => p,
            PackageOrBlockDepSpec::Block(b) => &b.blocking,
        }
    }

    pub fn as_package(&self) -> Option<&PackageDepSpec> {
        match self {
            PackageOrBlockDepSpec::Package(p) => Some(p),
            PackageOrBlockDepSpec::Block(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&BlockDepSpec> {
        match self {
            PackageOrBlockDepSpec::Package(_) => None,
            PackageOrBlockDepSpec::Block(b) => Some(b),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, PackageOrBlockDepSpec::Block(_))
    }
}

impl FromStr for PackageOrBlockDepSpec {
    type Err = PalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageOrBlockDepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOrBlockDepSpec::Package(p) => write!(f, "{p}"),
            PackageOrBlockDepSpec::Block(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for PackageDepSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageDepSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

impl Serialize for PackageOrBlockDepSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageOrBlockDepSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(de::Error::custom)
    }
}

impl From<PackageDepSpec> for PackageOrBlockDepSpec {
    fn from(spec: PackageDepSpec) -> Self {
        Self::Package(spec)
    }
}

impl From<BlockDepSpec> for PackageOrBlockDepSpec {
    fn from(spec: BlockDepSpec) -> Self {
        Self::Block(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_id::PackageId;

    fn spec(s: &str) -> PackageDepSpec {
        PackageDepSpec::parse(s).unwrap()
    }

    #[test]
    fn parse_plain_name() {
        let s = spec("dev-libs/openssl");
        assert_eq!(s.package.to_string(), "dev-libs/openssl");
        assert!(s.version_requirements.is_empty());
        assert!(s.slot.is_none());
    }

    #[test]
    fn parse_full_spec() {
        let s = spec(">=dev-libs/openssl-1.1.0-r2:0::gentoo[ssl,-static]");
        assert_eq!(s.version_requirements.len(), 1);
        assert_eq!(
            s.version_requirements[0].operator,
            VersionOperator::GreaterEqual
        );
        assert_eq!(s.version_requirements[0].version.to_string(), "1.1.0-r2");
        assert_eq!(
            s.slot,
            Some(SlotRequirement::Exact(SlotName::new("0").unwrap()))
        );
        assert_eq!(s.repository.as_ref().map(|r| r.as_str()), Some("gentoo"));
        assert_eq!(s.choice_requirements.len(), 2);
        assert!(!s.choice_requirements[1].enabled);
    }

    #[test]
    fn package_names_with_dashes_and_digits() {
        let s = spec("=app-misc/foo-bar2-1.0");
        assert_eq!(s.package.package, "foo-bar2");
        assert_eq!(s.version_requirements[0].version.to_string(), "1.0");

        let s = spec("media-libs/x264-encoder");
        assert_eq!(s.package.package, "x264-encoder");
    }

    #[test]
    fn ranges_and_star() {
        let s = spec("cat/pkg[>=1&<2]");
        assert_eq!(s.version_requirements.len(), 2);
        assert_eq!(s.version_requirements_mode, VersionRequirementsMode::And);
        assert_eq!(s.to_string(), "cat/pkg[>=1&<2]");

        let s = spec("cat/pkg[=1|=3]");
        assert_eq!(s.version_requirements_mode, VersionRequirementsMode::Or);

        let s = spec("=cat/pkg-1.2*");
        assert_eq!(s.version_requirements[0].operator, VersionOperator::EqualStar);
        assert_eq!(s.to_string(), "=cat/pkg-1.2*");
    }

    #[test]
    fn slot_forms() {
        assert_eq!(spec("cat/pkg:=").slot, Some(SlotRequirement::AnyLocked));
        assert_eq!(spec("cat/pkg:*").slot, Some(SlotRequirement::AnyUnlocked));
        assert_eq!(
            spec("cat/pkg:2=").slot,
            Some(SlotRequirement::ExactLocked(SlotName::new("2").unwrap()))
        );
    }

    #[test]
    fn display_round_trips() {
        for s in [
            "cat/pkg",
            ">=cat/pkg-1.2:3::repo[a,-b]",
            "~cat/pkg-2.0-r1",
            "cat/pkg:=",
            "cat/pkg[<3|>=5]",
        ] {
            assert_eq!(spec(s).to_string(), s);
            assert_eq!(spec(&spec(s).to_string()), spec(s));
        }
    }

    #[test]
    fn malformed_specs() {
        for s in ["", ">=cat/pkg", "cat/pkg-1.0", "nocat", "cat/pkg[", "=cat/pkg-1[>=2]"] {
            assert!(PackageDepSpec::parse(s).is_err(), "{s} should not parse");
        }
    }

    #[test]
    fn blocks() {
        let b = BlockDepSpec::parse("!!<cat/pkg-2").unwrap();
        assert!(b.strong);
        assert_eq!(b.to_string(), "!!<cat/pkg-2");
        let b = BlockDepSpec::parse("!cat/pkg").unwrap();
        assert!(!b.strong);
        assert!(BlockDepSpec::parse("cat/pkg").is_err());
        assert!(PackageOrBlockDepSpec::parse("!cat/pkg").unwrap().is_block());
    }

    #[test]
    fn matching() {
        let id = PackageId::builder("cat/pkg", "1.5", "main")
            .slot("2")
            .choice("ssl", true)
            .build()
            .unwrap();
        let opts = MatchOptions::default();
        assert!(spec("cat/pkg").matches(&id, opts));
        assert!(spec(">=cat/pkg-1").matches(&id, opts));
        assert!(!spec("<cat/pkg-1").matches(&id, opts));
        assert!(spec("cat/pkg:2").matches(&id, opts));
        assert!(!spec("cat/pkg:3").matches(&id, opts));
        assert!(spec("cat/pkg::main").matches(&id, opts));
        assert!(!spec("cat/pkg::other").matches(&id, opts));
        assert!(spec("cat/pkg[ssl]").matches(&id, opts));
        assert!(!spec("cat/pkg[-ssl]").matches(&id, opts));
        assert!(!spec("cat/pkg[gtk]").matches(&id, opts));
        assert!(spec("cat/pkg[gtk]").matches(
            &id,
            MatchOptions {
                ignore_choice_requirements: true
            }
        ));
        assert!(!spec("cat/other").matches(&id, opts));
    }

    #[test]
    fn stripping_choice_requirements() {
        let s = spec(">=cat/pkg-1[ssl]").without_choice_requirements();
        assert_eq!(s.to_string(), ">=cat/pkg-1");
    }
}
