use std::fmt;

use pallet_core::dep_spec::PackageDepSpec;
use pallet_core::name::{QualifiedPackageName, SlotName};
use pallet_core::package_id::PackageId;
use pallet_core::repository::DestinationType;

/// The key of one resolution problem: a package, optionally pinned to a
/// slot, going to one destination type.
///
/// Ordering is by package, then slot, then destination type, which fixes
/// the iteration order of the resolver and therefore of the plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Resolvent {
    pub package: QualifiedPackageName,
    /// `None` when no slot could be determined, e.g. for error resolvents.
    pub slot: Option<SlotName>,
    pub destination_type: DestinationType,
}

impl Resolvent {
    pub fn new(
        package: QualifiedPackageName,
        slot: Option<SlotName>,
        destination_type: DestinationType,
    ) -> Self {
        Self {
            package,
            slot,
            destination_type,
        }
    }

    pub fn for_id(id: &PackageId, destination_type: DestinationType) -> Self {
        Self::new(id.name.clone(), Some(id.slot.clone()), destination_type)
    }

    /// A resolvent for a spec nothing could be found for.
    pub fn for_spec(spec: &PackageDepSpec, destination_type: DestinationType) -> Self {
        let slot = spec
            .slot
            .as_ref()
            .and_then(|s| s.exact_slot())
            .cloned();
        Self::new(spec.package.clone(), slot, destination_type)
    }

    /// Whether `id` lives in this resolvent's slot.
    pub fn slot_matches(&self, id: &PackageId) -> bool {
        self.slot.as_ref().map_or(true, |s| s == &id.slot)
    }
}

impl fmt::Display for Resolvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slot {
            Some(slot) => write!(f, "{}:{slot} -> {}", self.package, self.destination_type),
            None => write!(f, "{} -> {}", self.package, self.destination_type),
        }
    }
}
