//! Constraints a resolution starts with before anything asks for it.

use std::collections::BTreeMap;

use chrono::Duration;
use pallet_core::config::{ResolverConfig, UseExisting};
use pallet_core::dep_spec::{MatchOptions, PackageDepSpec, PackageOrBlockDepSpec};
use pallet_core::name::QualifiedPackageName;
use pallet_core::package_id::PackageId;

use crate::constraint::{Constraint, Constraints};
use crate::context::{best_in_each_slot, ResolverContext};
use crate::error::ResolveResult;
use crate::reason::Reason;
use crate::resolvent::Resolvent;

const SCM_SUFFIXES: [&str; 7] = ["-darcs", "-live", "-cvs", "-svn", "-git", "-hg", "-bzr"];

/// Initial constraints per resolvent, plus the presets restarts have added.
#[derive(Debug, Default)]
pub struct InitialConstraints {
    cache: BTreeMap<Resolvent, Constraints>,
    restart_presets: BTreeMap<Resolvent, Vec<Constraint>>,
}

impl InitialConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a preset suggested by a restart; it survives [`Self::reset`].
    pub fn add_restart_preset(&mut self, resolvent: Resolvent, preset: Constraint) {
        self.cache.remove(&resolvent);
        self.restart_presets.entry(resolvent).or_default().push(preset);
    }

    pub fn restart_preset_count(&self) -> usize {
        self.restart_presets.values().map(Vec::len).sum()
    }

    /// Forget cached constraints, e.g. before a fresh attempt.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn constraints_for(
        &mut self,
        ctx: &ResolverContext<'_>,
        resolvent: &Resolvent,
    ) -> ResolveResult<Constraints> {
        if let Some(c) = self.cache.get(resolvent) {
            return Ok(c.clone());
        }
        let mut constraints = Constraints::new();
        if let Some(c) = scm_constraint(ctx, resolvent)? {
            constraints.push(c);
        }
        constraints.extend(preset_constraints(ctx, resolvent)?);
        if let Some(presets) = self.restart_presets.get(resolvent) {
            constraints.extend(presets.iter().cloned());
        }
        constraints.extend(forbid_constraints(ctx, resolvent)?);

        self.cache.insert(resolvent.clone(), constraints.clone());
        Ok(constraints)
    }
}

/// User presets apply to the best id in each slot they match.
fn preset_constraints(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
) -> ResolveResult<Vec<Constraint>> {
    let mut out = Vec::new();
    for spec in ctx.config.presets.iter().filter(|s| s.package == resolvent.package) {
        let ids = ctx.env.matching_ids(spec, MatchOptions::default());
        if !best_in_each_slot(&ids).iter().any(|id| resolvent.slot_matches(id)) {
            continue;
        }
        out.push(Constraint {
            spec: PackageOrBlockDepSpec::Package(spec.clone()),
            reason: Reason::preset("preset", None)?,
            use_existing: UseExisting::IfPossible,
            nothing_is_fine_too: true,
            untaken: false,
            force_unable: false,
            destination_type: resolvent.destination_type,
        });
    }
    Ok(out)
}

fn scm_constraint(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
) -> ResolveResult<Option<Constraint>> {
    let Some(days) = ctx.config.reinstall_scm_days else {
        return Ok(None);
    };
    if ResolverConfig::names_package(&ctx.config.without, &resolvent.package) {
        return Ok(None);
    }
    let stale = ctx
        .existing_ids(resolvent)
        .iter()
        .any(|id| is_scm_older_than(ctx, id, days));
    if !stale {
        return Ok(None);
    }

    tracing::debug!("{resolvent}: installed scm package is older than {days} days");
    Ok(Some(Constraint {
        spec: PackageOrBlockDepSpec::Package(PackageDepSpec::for_package(
            resolvent.package.clone(),
        )),
        reason: Reason::preset("is scm", None)?,
        use_existing: UseExisting::OnlyIfTransient,
        nothing_is_fine_too: true,
        untaken: false,
        force_unable: false,
        destination_type: resolvent.destination_type,
    }))
}

fn forbid_constraints(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
) -> ResolveResult<Vec<Constraint>> {
    let mut out = Vec::new();
    for spec in ctx.config.forbid.iter().filter(|s| s.package == resolvent.package) {
        let slot = spec.slot.as_ref().and_then(|s| s.exact_slot());
        if slot.is_some_and(|s| resolvent.slot.as_ref() != Some(s)) {
            continue;
        }
        out.push(Constraint {
            spec: PackageOrBlockDepSpec::Package(spec.clone()),
            reason: Reason::preset("forbidden", None)?,
            use_existing: UseExisting::IfPossible,
            nothing_is_fine_too: true,
            untaken: true,
            force_unable: true,
            destination_type: resolvent.destination_type,
        });
    }
    Ok(out)
}

pub fn is_scm_name(name: &QualifiedPackageName) -> bool {
    SCM_SUFFIXES
        .iter()
        .any(|s| name.package.len() > s.len() && name.package.ends_with(s))
}

/// A live package installed more than `days` days ago. An unknown install
/// time counts as just installed.
fn is_scm_older_than(ctx: &ResolverContext<'_>, id: &PackageId, days: u32) -> bool {
    if !(id.version.is_scm() || is_scm_name(&id.name)) {
        return false;
    }
    let installed = id.installed_time.unwrap_or(ctx.now);
    ctx.now - installed > Duration::days(i64::from(days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pallet_core::repository::DestinationType;
    use pallet_core::universe::Universe;

    const UNIVERSE: &str = r#"
now = "2026-03-01T00:00:00Z"

[[repository]]
name = "repo"
kind = "source"

[[repository]]
name = "installed"
kind = "installed"

[[package]]
name = "cat/tool-git"
version = "1"
repository = "installed"
installed-time = "2026-01-30T00:00:00Z"

[[package]]
name = "cat/fresh"
version = "scm"
repository = "installed"
installed-time = "2026-02-25T00:00:00Z"

[[package]]
name = "cat/a"
version = "1"
slot = "1"
repository = "repo"

[[package]]
name = "cat/a"
version = "2"
slot = "2"
repository = "repo"
"#;

    fn resolvent(pkg: &str, slot: &str) -> Resolvent {
        Resolvent::new(
            pkg.parse().unwrap(),
            Some(slot.parse().unwrap()),
            DestinationType::InstallToSlash,
        )
    }

    fn constraints(config: &str, r: &Resolvent) -> Constraints {
        let u = Universe::from_toml_str(UNIVERSE).unwrap();
        let config = ResolverConfig::from_toml_str(config).unwrap();
        let ctx = ResolverContext::new(&u, &config);
        InitialConstraints::new().constraints_for(&ctx, r).unwrap()
    }

    #[test]
    fn scm_names() {
        for (name, scm) in [
            ("cat/foo-live", true),
            ("cat/foo-darcs", true),
            ("cat/foo-git", true),
            ("cat/-svn", false),
            ("cat/live", false),
            ("cat/foo", false),
        ] {
            let n: QualifiedPackageName = match name.parse() {
                Ok(n) => n,
                Err(_) => continue,
            };
            assert_eq!(is_scm_name(&n), scm, "{name}");
        }
    }

    #[test]
    fn stale_scm_packages_get_a_preset() {
        let config = "reinstall-scm-days = 14";
        let c = constraints(config, &resolvent("cat/tool-git", "0"));
        assert_eq!(c.len(), 1);
        let first = c.iter().next().unwrap();
        assert_eq!(first.use_existing, UseExisting::OnlyIfTransient);
        assert!(first.nothing_is_fine_too);
        assert_eq!(first.reason.to_string(), "preset (is scm)");

        assert!(constraints(config, &resolvent("cat/fresh", "0")).is_empty());
        assert!(constraints("", &resolvent("cat/tool-git", "0")).is_empty());
        let without = r#"reinstall-scm-days = 14
without = ["cat/tool-git"]"#;
        assert!(constraints(without, &resolvent("cat/tool-git", "0")).is_empty());
    }

    #[test]
    fn presets_go_to_matching_slots() {
        let config = r#"presets = ["cat/a:1"]"#;
        assert_eq!(constraints(config, &resolvent("cat/a", "1")).len(), 1);
        assert!(constraints(config, &resolvent("cat/a", "2")).is_empty());
    }

    #[test]
    fn forbidden_packages_are_force_unable() {
        let c = constraints(r#"forbid = ["cat/a"]"#, &resolvent("cat/a", "2"));
        assert!(c.any_force_unable());
        assert!(c.all_untaken());
    }

    #[test]
    fn restart_presets_persist_across_resets() {
        let u = Universe::from_toml_str(UNIVERSE).unwrap();
        let config = ResolverConfig::default();
        let ctx = ResolverContext::new(&u, &config);
        let r = resolvent("cat/a", "2");
        let mut initial = InitialConstraints::new();
        assert!(initial.constraints_for(&ctx, &r).unwrap().is_empty());
        initial.add_restart_preset(
            r.clone(),
            Constraint {
                spec: PackageOrBlockDepSpec::parse("cat/a").unwrap(),
                reason: Reason::preset("restarted because of", Some(Reason::Target)).unwrap(),
                use_existing: UseExisting::Never,
                nothing_is_fine_too: true,
                untaken: false,
                force_unable: false,
                destination_type: DestinationType::InstallToSlash,
            },
        );
        initial.reset();
        assert_eq!(initial.constraints_for(&ctx, &r).unwrap().len(), 1);
        assert_eq!(initial.restart_preset_count(), 1);
    }
}
