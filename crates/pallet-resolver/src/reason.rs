//! Why a constraint exists.

use std::fmt;

use pallet_core::name::SetName;
use pallet_core::package_id::PackageIdRef;

use crate::error::{ResolveError, ResolveResult};
use crate::resolvent::Resolvent;
use crate::sanitised::SanitisedDependency;

/// Longest delegation chain a reason may have.
pub const MAX_REASON_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    /// Requested on the command line.
    Target,
    Dependency(Box<DependencyReason>),
    /// Injected rather than requested, e.g. by configuration or a restart.
    Preset {
        explanation: String,
        inner: Option<Box<Reason>>,
    },
    /// A member of a set that was requested.
    Set { set: SetName, inner: Box<Reason> },
    /// An installed id that depends upon something being changed.
    Dependent {
        id: PackageIdRef,
        dependency: SanitisedDependency,
    },
    /// Ids that used something being removed.
    WasUsedBy { ids: Vec<PackageIdRef> },
    /// Installed from a binary built for another resolvent.
    ViaBinary { other: Resolvent },
    /// Mirrors a constraint on the same package for another destination type.
    LikeOtherDestinationType {
        other: Resolvent,
        inner: Box<Reason>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DependencyReason {
    pub from_resolvent: Resolvent,
    pub from_id: PackageIdRef,
    pub dependency: SanitisedDependency,
    /// Whether the dependency was satisfied before anything was changed.
    pub already_met: bool,
}

impl Reason {
    pub fn dependency(
        from_resolvent: Resolvent,
        from_id: PackageIdRef,
        dependency: SanitisedDependency,
        already_met: bool,
    ) -> Self {
        Reason::Dependency(Box::new(DependencyReason {
            from_resolvent,
            from_id,
            dependency,
            already_met,
        }))
    }

    pub fn set(set: SetName, inner: Reason) -> ResolveResult<Self> {
        if inner.chain().any(|r| matches!(r, Reason::Set { set: s, .. } if s == &set)) {
            return Err(cycle(&format!("set @{set}")));
        }
        bounded(Reason::Set {
            set,
            inner: Box::new(inner),
        })
    }

    pub fn preset(explanation: impl Into<String>, inner: Option<Reason>) -> ResolveResult<Self> {
        bounded(Reason::Preset {
            explanation: explanation.into(),
            inner: inner.map(Box::new),
        })
    }

    pub fn like_other_destination_type(other: Resolvent, inner: Reason) -> ResolveResult<Self> {
        let revisits = inner.chain().any(
            |r| matches!(r, Reason::LikeOtherDestinationType { other: o, .. } if o == &other),
        );
        if revisits {
            return Err(cycle(&other.to_string()));
        }
        bounded(Reason::LikeOtherDestinationType {
            other,
            inner: Box::new(inner),
        })
    }

    /// The reason this one delegates to, if any.
    pub fn inner(&self) -> Option<&Reason> {
        match self {
            Reason::Set { inner, .. } | Reason::LikeOtherDestinationType { inner, .. } => {
                Some(&**inner)
            }
            Reason::Preset { inner, .. } => inner.as_deref(),
            _ => None,
        }
    }

    /// This reason followed by every reason it delegates to.
    pub fn chain(&self) -> impl Iterator<Item = &Reason> {
        std::iter::successors(Some(self), |r| r.inner())
    }

    pub fn depth(&self) -> usize {
        self.chain().count()
    }

    /// The dependency behind this reason, looking through sets and other
    /// destination types but not presets.
    pub fn as_dependency(&self) -> Option<&DependencyReason> {
        match self {
            Reason::Dependency(d) => Some(&**d),
            Reason::Set { inner, .. } | Reason::LikeOtherDestinationType { inner, .. } => {
                inner.as_dependency()
            }
            _ => None,
        }
    }

    pub fn already_met(&self) -> bool {
        self.as_dependency().is_some_and(|d| d.already_met)
    }

    /// Whether this is, or wraps, a target request.
    pub fn is_target(&self) -> bool {
        self.chain().any(|r| matches!(r, Reason::Target))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Reason::Target => "target",
            Reason::Dependency(_) => "dependency",
            Reason::Preset { .. } => "preset",
            Reason::Set { .. } => "set",
            Reason::Dependent { .. } => "dependent",
            Reason::WasUsedBy { .. } => "was used by",
            Reason::ViaBinary { .. } => "via binary",
            Reason::LikeOtherDestinationType { .. } => "like other destination type",
        }
    }
}

fn bounded(reason: Reason) -> ResolveResult<Reason> {
    if reason.depth() > MAX_REASON_DEPTH {
        return Err(cycle(&reason.to_string()));
    }
    Ok(reason)
}

fn cycle(what: &str) -> ResolveError {
    ResolveError::ReasonCycle {
        reason: what.to_string(),
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Target => f.write_str("target"),
            Reason::Dependency(d) => write!(f, "dependency of {} ({})", d.from_id, d.dependency),
            Reason::Preset {
                explanation,
                inner: None,
            } => write!(f, "preset ({explanation})"),
            Reason::Preset {
                explanation,
                inner: Some(inner),
            } => write!(f, "preset ({explanation} {inner})"),
            Reason::Set { set, inner } => write!(f, "{inner} via set @{set}"),
            Reason::Dependent { id, dependency } => {
                write!(f, "dependent upon {id} ({dependency})")
            }
            Reason::WasUsedBy { ids } => {
                let ids: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
                write!(f, "was used by {}", ids.join(", "))
            }
            Reason::ViaBinary { other } => write!(f, "via binary {other}"),
            Reason::LikeOtherDestinationType { other, inner } => {
                write!(f, "like {other} ({inner})")
            }
        }
    }
}
