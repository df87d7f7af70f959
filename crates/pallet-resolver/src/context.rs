//! Queries shared by the policy helpers, the decider and the orderer.

use chrono::{DateTime, Utc};
use pallet_core::config::ResolverConfig;
use pallet_core::dep_spec::{MatchOptions, PackageDepSpec};
use pallet_core::environment::Environment;
use pallet_core::name::QualifiedPackageName;
use pallet_core::package_id::{
    PackageId, PackageIdRef, BEHAVIOUR_UNBINARYABLE, BEHAVIOUR_UNCHROOTABLE,
    BEHAVIOUR_UNINSTALLABLE,
};
use pallet_core::repository::DestinationType;

use crate::resolvent::Resolvent;

pub const IGNORE_CHOICES: MatchOptions = MatchOptions {
    ignore_choice_requirements: true,
};

/// The environment and configuration one resolve runs against.
#[derive(Clone, Copy)]
pub struct ResolverContext<'a> {
    pub env: &'a dyn Environment,
    pub config: &'a ResolverConfig,
    pub now: DateTime<Utc>,
}

impl<'a> ResolverContext<'a> {
    pub fn new(env: &'a dyn Environment, config: &'a ResolverConfig) -> Self {
        Self {
            env,
            config,
            now: config.now.unwrap_or_else(|| env.now()),
        }
    }

    /// Whether `id` lives in a repository that `dt` installs to.
    pub fn in_destination(&self, dt: DestinationType, id: &PackageId) -> bool {
        self.env
            .repository(&id.repository)
            .is_ok_and(|r| dt.accepts(r))
    }

    /// Ids of `resolvent`'s package already present in its destination and
    /// slot, best last.
    pub fn existing_ids(&self, resolvent: &Resolvent) -> Vec<PackageIdRef> {
        self.env
            .package_ids(&resolvent.package)
            .into_iter()
            .filter(|id| resolvent.slot_matches(id))
            .filter(|id| self.in_destination(resolvent.destination_type, id))
            .collect()
    }

    /// Ids that could be installed for `resolvent`, masked ones included,
    /// best last.
    pub fn candidate_ids(&self, resolvent: &Resolvent) -> Vec<PackageIdRef> {
        self.env
            .package_ids(&resolvent.package)
            .into_iter()
            .filter(|id| resolvent.slot_matches(id))
            .filter(|id| !self.env.is_installed(id))
            .filter(|id| !self.in_destination(resolvent.destination_type, id))
            .collect()
    }

    /// Installed ids matching `spec` on the system root.
    pub fn installed_matching(
        &self,
        spec: &PackageDepSpec,
        options: MatchOptions,
    ) -> Vec<PackageIdRef> {
        self.env
            .matching_ids(spec, options)
            .into_iter()
            .filter(|id| self.in_destination(DestinationType::InstallToSlash, id))
            .collect()
    }

    pub fn any_installed_matching(&self, spec: &PackageDepSpec, options: MatchOptions) -> bool {
        !self.installed_matching(spec, options).is_empty()
    }

    pub fn package_ids(&self, name: &QualifiedPackageName) -> Vec<PackageIdRef> {
        self.env.package_ids(name)
    }
}

/// Whether `id` can be built for `dt` at all.
pub fn can_realise(id: &PackageId, dt: DestinationType) -> bool {
    if id.has_behaviour(BEHAVIOUR_UNINSTALLABLE) {
        return false;
    }
    match dt {
        DestinationType::InstallToSlash => true,
        DestinationType::CreateBinary => !id.has_behaviour(BEHAVIOUR_UNBINARYABLE),
        DestinationType::InstallToChroot => !id.has_behaviour(BEHAVIOUR_UNCHROOTABLE),
    }
}

/// The best id in each slot, keeping `ids`' order of their best members.
pub fn best_in_each_slot(ids: &[PackageIdRef]) -> Vec<PackageIdRef> {
    let mut out: Vec<PackageIdRef> = Vec::new();
    for id in ids.iter().rev() {
        if !out.iter().any(|o| o.slot == id.slot) {
            out.push(id.clone());
        }
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pallet_core::universe::Universe;

    fn universe() -> Universe {
        Universe::from_toml_str(
            r#"
[[repository]]
name = "repo"
kind = "source"

[[repository]]
name = "bins"
kind = "binary"

[[repository]]
name = "installed"
kind = "installed"

[[repository]]
name = "chroot"
kind = "installed"
root = "/mnt/chroot"

[[package]]
name = "cat/a"
version = "1"
repository = "installed"

[[package]]
name = "cat/a"
version = "1"
repository = "chroot"

[[package]]
name = "cat/a"
version = "2"
repository = "repo"

[[package]]
name = "cat/a"
version = "2"
repository = "bins"

[[package]]
name = "cat/a"
version = "3"
slot = "3"
repository = "repo"
behaviours = ["unbinaryable"]
"#,
        )
        .unwrap()
    }

    fn resolvent(slot: Option<&str>, dt: DestinationType) -> Resolvent {
        Resolvent::new(
            "cat/a".parse().unwrap(),
            slot.map(|s| s.parse().unwrap()),
            dt,
        )
    }

    fn shown(ids: Vec<PackageIdRef>) -> Vec<String> {
        ids.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn existing_and_candidates_depend_on_destination() {
        let u = universe();
        let config = ResolverConfig::default();
        let ctx = ResolverContext::new(&u, &config);

        let slash = resolvent(Some("0"), DestinationType::InstallToSlash);
        assert_eq!(shown(ctx.existing_ids(&slash)), vec!["cat/a-1:0::installed"]);
        assert_eq!(
            shown(ctx.candidate_ids(&slash)),
            vec!["cat/a-2:0::repo", "cat/a-2:0::bins"]
        );

        let chroot = resolvent(Some("0"), DestinationType::InstallToChroot);
        assert_eq!(shown(ctx.existing_ids(&chroot)), vec!["cat/a-1:0::chroot"]);

        let binary = resolvent(None, DestinationType::CreateBinary);
        assert_eq!(shown(ctx.existing_ids(&binary)), vec!["cat/a-2:0::bins"]);
        assert_eq!(
            shown(ctx.candidate_ids(&binary)),
            vec!["cat/a-2:0::repo", "cat/a-3:3::repo"]
        );
    }

    #[test]
    fn realising_respects_behaviours() {
        let u = universe();
        let best = u.package_ids(&"cat/a".parse().unwrap()).pop().unwrap();
        assert!(can_realise(&best, DestinationType::InstallToSlash));
        assert!(!can_realise(&best, DestinationType::CreateBinary));
        assert!(can_realise(&best, DestinationType::InstallToChroot));
    }

    #[test]
    fn best_per_slot() {
        let u = universe();
        let ids = u.package_ids(&"cat/a".parse().unwrap());
        assert_eq!(
            shown(best_in_each_slot(&ids)),
            vec!["cat/a-2:0::bins", "cat/a-3:3::repo"]
        );
    }
}
