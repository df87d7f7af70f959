//! Package version parsing, comparison and requirement matching.
//!
//! Versions follow the usual source-distribution shape:
//! - dotted numeric components, compared numerically (`1.10 > 1.9`)
//! - an optional trailing letter (`1.2b`)
//! - suffixes `_alpha < _beta < _pre < _rc < (none) < _p`, each with an optional number
//! - an optional `-rN` revision
//! - live markers: the bare version `scm`, a trailing `-scm`, or a leading
//!   component of `9999` or more

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use pallet_util::errors::PalletError;

/// A parsed package version.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    numbers: Vec<u64>,
    letter: Option<char>,
    suffixes: Vec<(Suffix, u64)>,
    scm: bool,
    revision: u64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
enum Suffix {
    Alpha,
    Beta,
    Pre,
    Rc,
    Patch,
}

impl Suffix {
    fn parse(s: &str) -> Option<(Self, &str)> {
        [
            ("alpha", Suffix::Alpha),
            ("beta", Suffix::Beta),
            ("pre", Suffix::Pre),
            ("rc", Suffix::Rc),
            ("p", Suffix::Patch),
        ]
        .into_iter()
        .find_map(|(prefix, kind)| s.strip_prefix(prefix).map(|rest| (kind, rest)))
    }
}

impl Version {
    pub fn parse(version: &str) -> Result<Self, PalletError> {
        let malformed = || PalletError::MalformedVersion {
            version: version.to_string(),
        };

        if version == "scm" {
            return Ok(Self {
                original: version.to_string(),
                numbers: Vec::new(),
                letter: None,
                suffixes: Vec::new(),
                scm: true,
                revision: 0,
            });
        }

        let mut rest = version;
        let mut revision = 0;
        if let Some(idx) = rest.rfind("-r") {
            let digits = &rest[idx + 2..];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                revision = digits.parse().map_err(|_| malformed())?;
                rest = &rest[..idx];
            }
        }

        let mut scm = false;
        if let Some(stripped) = rest.strip_suffix("-scm") {
            scm = true;
            rest = stripped;
        }

        let mut parts = rest.split('_');
        let base = parts.next().ok_or_else(malformed)?;

        let mut suffixes = Vec::new();
        for part in parts {
            let (kind, digits) = Suffix::parse(part).ok_or_else(malformed)?;
            let n = if digits.is_empty() {
                0
            } else {
                digits.parse().map_err(|_| malformed())?
            };
            suffixes.push((kind, n));
        }

        let (base, letter) = match base.chars().last() {
            Some(c) if c.is_ascii_lowercase() => (&base[..base.len() - 1], Some(c)),
            _ => (base, None),
        };

        let numbers = base
            .split('.')
            .map(|n| {
                if n.is_empty() || !n.chars().all(|c| c.is_ascii_digit()) {
                    Err(malformed())
                } else {
                    n.parse::<u64>().map_err(|_| malformed())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if numbers.first().is_some_and(|n| *n >= 9999) {
            scm = true;
        }

        Ok(Self {
            original: version.to_string(),
            numbers,
            letter,
            suffixes,
            scm,
            revision,
        })
    }

    /// Whether this is a live version whose contents change without a version bump.
    pub fn is_scm(&self) -> bool {
        self.scm
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Equal ignoring the revision, as used by the `~` operator.
    pub fn eq_ignoring_revision(&self, other: &Self) -> bool {
        self.cmp_without_revision(other) == Ordering::Equal
    }

    /// Prefix match used by `=cat/pkg-1.2*`: every component of `prefix`
    /// appears at the same position in `self`.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        if prefix.numbers.len() > self.numbers.len()
            || self.numbers[..prefix.numbers.len()] != prefix.numbers[..]
        {
            return false;
        }
        if prefix.letter.is_some() && prefix.letter != self.letter {
            return false;
        }
        if prefix.suffixes.len() > self.suffixes.len()
            || self.suffixes[..prefix.suffixes.len()] != prefix.suffixes[..]
        {
            return false;
        }
        !prefix.scm || self.scm
    }

    fn cmp_without_revision(&self, other: &Self) -> Ordering {
        // the bare `scm` version is above everything
        match (self.numbers.is_empty() && self.scm, other.numbers.is_empty() && other.scm) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        let max_len = self.numbers.len().max(other.numbers.len());
        for i in 0..max_len {
            let ord = match (self.numbers.get(i), other.numbers.get(i)) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        let ord = self.letter.cmp(&other.letter);
        if ord != Ordering::Equal {
            return ord;
        }

        let max_len = self.suffixes.len().max(other.suffixes.len());
        for i in 0..max_len {
            let ord = match (self.suffixes.get(i), other.suffixes.get(i)) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some((kind, _)), None) => compare_suffix_to_release(*kind),
                (None, Some((kind, _))) => compare_suffix_to_release(*kind).reverse(),
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        self.scm.cmp(&other.scm)
    }
}

fn compare_suffix_to_release(kind: Suffix) -> Ordering {
    if kind == Suffix::Patch {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

impl FromStr for Version {
    type Err = PalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numbers.hash(state);
        self.letter.hash(state);
        self.suffixes.hash(state);
        self.scm.hash(state);
        self.revision.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_without_revision(other)
            .then(self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Comparison operator of a version requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionOperator {
    Equal,
    EqualStar,
    Tilde,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl VersionOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionOperator::Equal | VersionOperator::EqualStar => "=",
            VersionOperator::Tilde => "~",
            VersionOperator::Less => "<",
            VersionOperator::LessEqual => "<=",
            VersionOperator::Greater => ">",
            VersionOperator::GreaterEqual => ">=",
        }
    }

    /// Strip a leading operator from `s`.
    pub fn split_prefix(s: &str) -> Option<(Self, &str)> {
        [
            (">=", VersionOperator::GreaterEqual),
            ("<=", VersionOperator::LessEqual),
            (">", VersionOperator::Greater),
            ("<", VersionOperator::Less),
            ("=", VersionOperator::Equal),
            ("~", VersionOperator::Tilde),
        ]
        .into_iter()
        .find_map(|(prefix, op)| s.strip_prefix(prefix).map(|rest| (op, rest)))
    }
}

/// One `operator version` requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRequirement {
    pub operator: VersionOperator,
    pub version: Version,
}

impl VersionRequirement {
    pub fn matches(&self, v: &Version) -> bool {
        match self.operator {
            VersionOperator::Equal => v == &self.version,
            VersionOperator::EqualStar => v.starts_with(&self.version),
            VersionOperator::Tilde => v.eq_ignoring_revision(&self.version),
            VersionOperator::Less => v < &self.version,
            VersionOperator::LessEqual => v <= &self.version,
            VersionOperator::Greater => v > &self.version,
            VersionOperator::GreaterEqual => v >= &self.version,
        }
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator.as_str(), self.version)?;
        if self.operator == VersionOperator::EqualStar {
            f.write_str("*")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn numeric_ordering() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("1.0.1") > v("1.0"));
        assert!(v("2") > v("1.99.99"));
    }

    #[test]
    fn suffix_ordering() {
        assert!(v("1.0_alpha") < v("1.0_beta"));
        assert!(v("1.0_beta2") < v("1.0_rc1"));
        assert!(v("1.0_rc1") < v("1.0"));
        assert!(v("1.0") < v("1.0_p1"));
        assert!(v("1.0a") > v("1.0"));
    }

    #[test]
    fn revisions() {
        assert!(v("1.0-r1") > v("1.0"));
        assert!(v("1.0-r1").eq_ignoring_revision(&v("1.0-r3")));
        assert_eq!(v("1.0-r2").revision(), 2);
    }

    #[test]
    fn scm_detection() {
        assert!(v("scm").is_scm());
        assert!(v("1.2-scm").is_scm());
        assert!(v("9999").is_scm());
        assert!(!v("1.2").is_scm());
        assert!(v("scm") > v("99999"));
        assert!(v("1.2-scm") > v("1.2"));
    }

    #[test]
    fn malformed() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.0_gamma").is_err());
        assert!(Version::parse("abc").is_err());
    }

    #[test]
    fn equality_ignores_leading_zero_spelling() {
        assert_eq!(v("1.01"), v("1.1"));
        assert_eq!(v("1.2").to_string(), "1.2");
    }

    #[test]
    fn requirements() {
        let req = |op, s: &str| VersionRequirement {
            operator: op,
            version: v(s),
        };
        assert!(req(VersionOperator::GreaterEqual, "1.2").matches(&v("1.2")));
        assert!(!req(VersionOperator::Greater, "1.2").matches(&v("1.2")));
        assert!(req(VersionOperator::EqualStar, "1.2").matches(&v("1.2.5")));
        assert!(!req(VersionOperator::EqualStar, "1.2").matches(&v("1.3")));
        assert!(req(VersionOperator::Tilde, "1.2").matches(&v("1.2-r4")));
        assert_eq!(req(VersionOperator::EqualStar, "1.2").to_string(), "=1.2*");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn version_string() -> impl Strategy<Value = String> {
            (
                prop::collection::vec(0u64..50, 1..4),
                prop::option::of(prop::sample::select(vec!["_alpha", "_rc2", "_p1"])),
                prop::option::of(0u64..4),
            )
                .prop_map(|(nums, suffix, rev)| {
                    let mut s = nums
                        .iter()
                        .map(|n| n.to_string())
                        .collect::<Vec<_>>()
                        .join(".");
                    if let Some(suffix) = suffix {
                        s.push_str(suffix);
                    }
                    if let Some(rev) = rev {
                        s.push_str(&format!("-r{rev}"));
                    }
                    s
                })
        }

        proptest! {
            #[test]
            fn ordering_is_antisymmetric(a in version_string(), b in version_string()) {
                let (a, b) = (v(&a), v(&b));
                prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
            }

            #[test]
            fn display_round_trips(a in version_string()) {
                let parsed = v(&a);
                prop_assert_eq!(parsed.to_string(), a.clone());
                prop_assert_eq!(v(&parsed.to_string()), parsed);
            }
        }
    }
}
