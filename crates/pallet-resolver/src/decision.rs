//! The outcome chosen for one resolvent.

use std::fmt;

use pallet_core::environment::Environment;
use pallet_core::name::RepositoryName;
use pallet_core::package_id::{PackageId, PackageIdRef};

use crate::constraint::Constraints;
use crate::resolvent::Resolvent;

/// How installing an id changes what is installed in its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    NewPackage,
    SlotNew,
    AddToSlot,
    Upgrade,
    Downgrade,
    Reinstall,
}

impl ChangeType {
    pub const ALL: [ChangeType; 6] = [
        ChangeType::NewPackage,
        ChangeType::SlotNew,
        ChangeType::AddToSlot,
        ChangeType::Upgrade,
        ChangeType::Downgrade,
        ChangeType::Reinstall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::NewPackage => "new_package",
            ChangeType::SlotNew => "slot_new",
            ChangeType::AddToSlot => "add_to_slot",
            ChangeType::Upgrade => "upgrade",
            ChangeType::Downgrade => "downgrade",
            ChangeType::Reinstall => "reinstall",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Compare `origin` against what is installed for `resolvent`.
    pub fn compute(env: &dyn Environment, resolvent: &Resolvent, origin: &PackageId) -> Self {
        let installed: Vec<PackageIdRef> = env
            .installed_ids(&origin.name)
            .into_iter()
            .filter(|id| {
                env.repository(&id.repository)
                    .is_ok_and(|r| resolvent.destination_type.accepts(r))
            })
            .collect();
        if installed.is_empty() {
            return ChangeType::NewPackage;
        }

        let in_slot: Vec<&PackageIdRef> = installed
            .iter()
            .filter(|id| id.slot == origin.slot)
            .collect();
        if in_slot.is_empty() {
            return ChangeType::SlotNew;
        }
        if in_slot.iter().any(|id| id.version == origin.version) {
            return ChangeType::Reinstall;
        }
        if in_slot.iter().all(|id| id.version < origin.version) {
            ChangeType::Upgrade
        } else if in_slot.iter().all(|id| id.version > origin.version) {
            ChangeType::Downgrade
        } else {
            ChangeType::AddToSlot
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a change is installed to.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub repository: RepositoryName,
    /// Installed ids the new one replaces.
    pub replacing: Vec<PackageIdRef>,
}

/// A candidate rejected for an `UnableToMake` decision, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsuitableCandidate {
    pub id: PackageIdRef,
    pub unmet_constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing is installed and nothing needs to be.
    NothingNoChange { resolvent: Resolvent, taken: bool },
    ExistingNoChange {
        resolvent: Resolvent,
        existing_id: PackageIdRef,
        is_same: bool,
        is_same_version: bool,
        is_transient: bool,
        taken: bool,
    },
    ChangesToMake {
        resolvent: Resolvent,
        origin_id: PackageIdRef,
        /// No better candidate was skipped.
        best: bool,
        change_type: ChangeType,
        destination: Option<Destination>,
        taken: bool,
    },
    Remove {
        resolvent: Resolvent,
        ids: Vec<PackageIdRef>,
        taken: bool,
    },
    UnableToMake {
        resolvent: Resolvent,
        unsuitable_candidates: Vec<UnsuitableCandidate>,
        taken: bool,
    },
    /// Leave an installed id in place although a block on it is unmet.
    Break {
        resolvent: Resolvent,
        existing_id: PackageIdRef,
        taken: bool,
    },
}

impl Decision {
    pub fn resolvent(&self) -> &Resolvent {
        match self {
            Decision::NothingNoChange { resolvent, .. }
            | Decision::ExistingNoChange { resolvent, .. }
            | Decision::ChangesToMake { resolvent, .. }
            | Decision::Remove { resolvent, .. }
            | Decision::UnableToMake { resolvent, .. }
            | Decision::Break { resolvent, .. } => resolvent,
        }
    }

    pub fn taken(&self) -> bool {
        match self {
            Decision::NothingNoChange { taken, .. }
            | Decision::ExistingNoChange { taken, .. }
            | Decision::ChangesToMake { taken, .. }
            | Decision::Remove { taken, .. }
            | Decision::UnableToMake { taken, .. }
            | Decision::Break { taken, .. } => *taken,
        }
    }

    /// The id a package spec is checked against, for decisions that have one.
    pub fn chosen_id(&self) -> Option<&PackageIdRef> {
        match self {
            Decision::ExistingNoChange { existing_id, .. } | Decision::Break { existing_id, .. } => {
                Some(existing_id)
            }
            Decision::ChangesToMake { origin_id, .. } => Some(origin_id),
            _ => None,
        }
    }

    pub fn is_unable(&self) -> bool {
        matches!(self, Decision::UnableToMake { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Decision::NothingNoChange { .. } => "nothing_no_change",
            Decision::ExistingNoChange { .. } => "existing_no_change",
            Decision::ChangesToMake { .. } => "changes_to_make",
            Decision::Remove { .. } => "remove",
            Decision::UnableToMake { .. } => "unable_to_make",
            Decision::Break { .. } => "break",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let untaken = if self.taken() { "" } else { " (untaken)" };
        match self {
            Decision::NothingNoChange { .. } => write!(f, "nothing to do{untaken}"),
            Decision::ExistingNoChange {
                existing_id,
                is_same,
                is_same_version,
                is_transient,
                ..
            } => {
                write!(f, "keep {existing_id}")?;
                let mut notes = Vec::new();
                if *is_same {
                    notes.push("same");
                } else if *is_same_version {
                    notes.push("same version");
                }
                if *is_transient {
                    notes.push("transient");
                }
                if !notes.is_empty() {
                    write!(f, " ({})", notes.join(", "))?;
                }
                f.write_str(untaken)
            }
            Decision::ChangesToMake {
                origin_id,
                best,
                change_type,
                destination,
                ..
            } => {
                write!(f, "{change_type} {origin_id}")?;
                if !best {
                    f.write_str(" (not the best version)")?;
                }
                if let Some(dest) = destination {
                    write!(f, " to ::{}", dest.repository)?;
                    if !dest.replacing.is_empty() {
                        let ids: Vec<String> =
                            dest.replacing.iter().map(|i| i.to_string()).collect();
                        write!(f, " replacing {}", ids.join(", "))?;
                    }
                }
                f.write_str(untaken)
            }
            Decision::Remove { ids, .. } => {
                let ids: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
                write!(f, "remove {}{untaken}", ids.join(", "))
            }
            Decision::UnableToMake {
                unsuitable_candidates,
                ..
            } => write!(
                f,
                "unable to make a decision ({} unsuitable candidates){untaken}",
                unsuitable_candidates.len()
            ),
            Decision::Break { existing_id, .. } => write!(f, "break {existing_id}{untaken}"),
        }
    }
}
