use std::fmt;

use pallet_core::config::UseExisting;
use pallet_core::dep_spec::PackageOrBlockDepSpec;
use pallet_core::repository::DestinationType;

use crate::reason::Reason;

/// One requirement placed on a resolvent.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub spec: PackageOrBlockDepSpec,
    pub reason: Reason,
    pub use_existing: UseExisting,
    /// Having nothing installed also satisfies this constraint.
    pub nothing_is_fine_too: bool,
    /// Shown to the user but not acted upon unless something else takes it.
    pub untaken: bool,
    /// Nothing may satisfy this constraint.
    pub force_unable: bool,
    pub destination_type: DestinationType,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.spec, self.reason)?;
        let mut flags = vec![format!("use existing {}", self.use_existing.as_str())];
        if self.nothing_is_fine_too {
            flags.push("nothing is fine too".to_string());
        }
        if self.untaken {
            flags.push("untaken".to_string());
        }
        if self.force_unable {
            flags.push("force unable".to_string());
        }
        write!(f, " [{}]", flags.join(", "))
    }
}

/// The ordered constraints of one resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints(Vec<Constraint>);

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.0.push(constraint);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn all_untaken(&self) -> bool {
        self.0.iter().all(|c| c.untaken)
    }

    pub fn nothing_is_fine_too(&self) -> bool {
        self.0.iter().all(|c| c.nothing_is_fine_too)
    }

    pub fn strictest_use_existing(&self) -> UseExisting {
        self.0
            .iter()
            .map(|c| c.use_existing)
            .max()
            .unwrap_or(UseExisting::IfPossible)
    }

    pub fn any_force_unable(&self) -> bool {
        self.0.iter().any(|c| c.force_unable)
    }
}

impl<'a> IntoIterator for &'a Constraints {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Constraint> for Constraints {
    fn from_iter<I: IntoIterator<Item = Constraint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Constraint> for Constraints {
    fn extend<I: IntoIterator<Item = Constraint>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint(ue: UseExisting, nothing: bool, untaken: bool) -> Constraint {
        Constraint {
            spec: PackageOrBlockDepSpec::parse("cat/a").unwrap(),
            reason: Reason::Target,
            use_existing: ue,
            nothing_is_fine_too: nothing,
            untaken,
            force_unable: false,
            destination_type: DestinationType::InstallToSlash,
        }
    }

    #[test]
    fn empty_constraints() {
        let c = Constraints::new();
        assert!(c.all_untaken());
        assert!(c.nothing_is_fine_too());
        assert_eq!(c.strictest_use_existing(), UseExisting::IfPossible);
        assert!(!c.any_force_unable());
    }

    #[test]
    fn aggregates() {
        let c: Constraints = [
            constraint(UseExisting::IfSame, true, true),
            constraint(UseExisting::IfTransient, false, true),
        ]
        .into_iter()
        .collect();
        assert!(c.all_untaken());
        assert!(!c.nothing_is_fine_too());
        assert_eq!(c.strictest_use_existing(), UseExisting::IfSame);

        let mut c = c;
        c.push(constraint(UseExisting::Never, true, false));
        assert!(!c.all_untaken());
        assert_eq!(c.strictest_use_existing(), UseExisting::Never);
    }

    #[test]
    fn display_lists_flags() {
        let c = constraint(UseExisting::IfSame, true, true);
        assert_eq!(
            c.to_string(),
            "cat/a (target) [use existing if_same, nothing is fine too, untaken]"
        );
    }
}
