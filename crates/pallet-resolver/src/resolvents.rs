//! Which resolvents a spec applies to.

use pallet_core::config::TargetDependencies;
use pallet_core::dep_spec::{BlockDepSpec, MatchOptions, PackageDepSpec};
use pallet_core::package_id::PackageId;
use pallet_core::repository::DestinationType;

use crate::context::{best_in_each_slot, can_realise, ResolverContext, IGNORE_CHOICES};
use crate::reason::Reason;
use crate::resolvent::Resolvent;

/// Resolvents for `spec`: the slot of the best installable id and every
/// installed slot, for each destination type `reason` asks for. Empty when
/// nothing matches.
pub fn resolvents_for(
    ctx: &ResolverContext<'_>,
    spec: &PackageDepSpec,
    reason: &Reason,
) -> Vec<Resolvent> {
    let exact_slot = spec.slot.as_ref().and_then(|s| s.exact_slot());

    let best = ctx
        .env
        .matching_ids(spec, IGNORE_CHOICES)
        .into_iter()
        .filter(|id| !id.masked && !ctx.env.is_installed(id))
        .filter(|id| can_realise(id, DestinationType::InstallToSlash))
        .filter(|id| exact_slot.map_or(true, |s| s == &id.slot))
        .next_back();

    let installed_dt = match ctx.config.target_destination_type {
        DestinationType::InstallToChroot => DestinationType::InstallToChroot,
        _ => DestinationType::InstallToSlash,
    };
    let installed: Vec<_> = ctx
        .env
        .matching_ids(spec, MatchOptions::default())
        .into_iter()
        .filter(|id| ctx.in_destination(installed_dt, id))
        .collect();

    let ids = best.into_iter().chain(best_in_each_slot(&installed));
    let mut out: Vec<Resolvent> = Vec::new();
    for id in ids {
        for dt in destination_types_for(ctx, Some(id.as_ref()), reason) {
            let resolvent = Resolvent::for_id(&id, dt);
            if !out.contains(&resolvent) {
                out.push(resolvent);
            }
        }
    }
    out
}

/// Resolvents recording that nothing could be found for `spec`.
pub fn error_resolvents_for(
    ctx: &ResolverContext<'_>,
    spec: &PackageDepSpec,
    reason: &Reason,
) -> Vec<Resolvent> {
    destination_types_for(ctx, None, reason)
        .into_iter()
        .map(|dt| Resolvent::for_spec(spec, dt))
        .collect()
}

/// Resolvents a block applies to: its exact slot if it names one, else the
/// best id in each slot of the package, installed or not.
pub fn resolvents_for_blocker(ctx: &ResolverContext<'_>, block: &BlockDepSpec) -> Vec<Resolvent> {
    let dt = DestinationType::InstallToSlash;
    let blocking = &block.blocking;
    if let Some(slot) = blocking.slot.as_ref().and_then(|s| s.exact_slot()) {
        return vec![Resolvent::new(
            blocking.package.clone(),
            Some(slot.clone()),
            dt,
        )];
    }
    best_in_each_slot(&ctx.package_ids(&blocking.package))
        .iter()
        .map(|id| Resolvent::for_id(id, dt))
        .collect()
}

/// Destination types a spec for `reason` should be resolved for. `id` is the
/// candidate being considered, if there is one.
pub fn destination_types_for(
    ctx: &ResolverContext<'_>,
    id: Option<&PackageId>,
    reason: &Reason,
) -> Vec<DestinationType> {
    let target_dt = ctx.config.target_destination_type;
    match reason {
        Reason::Target => vec![target_dt],
        Reason::Dependency(dep) => {
            let mut out = vec![DestinationType::InstallToSlash];
            if target_dt != DestinationType::InstallToSlash {
                let wanted = match ctx.config.target_dependencies {
                    TargetDependencies::All => true,
                    TargetDependencies::Runtime => dep.dependency.active_labels.is_run_or_post(),
                    TargetDependencies::None => false,
                };
                if wanted && id.is_some_and(|id| can_realise(id, target_dt)) {
                    out.push(target_dt);
                }
            }
            out
        }
        Reason::Set { inner, .. } | Reason::LikeOtherDestinationType { inner, .. } => {
            destination_types_for(ctx, id, inner)
        }
        Reason::Preset {
            inner: Some(inner), ..
        } => destination_types_for(ctx, id, inner),
        Reason::Preset { inner: None, .. }
        | Reason::Dependent { .. }
        | Reason::WasUsedBy { .. } => vec![DestinationType::InstallToSlash],
        // Binaries are installed through the resolvent that built them.
        Reason::ViaBinary { .. } => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pallet_core::config::ResolverConfig;
    use pallet_core::dep_spec::PackageOrBlockDepSpec;
    use pallet_core::dep_tree::{ActiveLabels, DependencyLabel};
    use pallet_core::package_id::DependencyKey;
    use pallet_core::universe::Universe;

    use crate::sanitised::SanitisedDependency;

    const UNIVERSE: &str = r#"
[[repository]]
name = "repo"
kind = "source"

[[repository]]
name = "installed"
kind = "installed"

[[package]]
name = "cat/a"
version = "1"
slot = "1"
repository = "installed"

[[package]]
name = "cat/a"
version = "2"
slot = "2"
repository = "repo"

[[package]]
name = "cat/a"
version = "3"
slot = "3"
repository = "repo"
masked = true

[[package]]
name = "cat/old"
version = "1"
repository = "installed"

[[package]]
name = "cat/nobin"
version = "1"
repository = "repo"
behaviours = ["unbinaryable"]
"#;

    fn shown(rs: Vec<Resolvent>) -> Vec<String> {
        rs.iter().map(|r| r.to_string()).collect()
    }

    fn with_ctx<T>(config: &str, f: impl FnOnce(&ResolverContext<'_>) -> T) -> T {
        let u = Universe::from_toml_str(UNIVERSE).unwrap();
        let config = ResolverConfig::from_toml_str(config).unwrap();
        let ctx = ResolverContext::new(&u, &config);
        f(&ctx)
    }

    fn dep_reason(ctx: &ResolverContext<'_>, labels: &[DependencyLabel]) -> Reason {
        let from = ctx
            .env
            .package_ids(&"cat/old".parse().unwrap())
            .pop()
            .unwrap();
        Reason::dependency(
            Resolvent::for_id(&from, DestinationType::InstallToSlash),
            from,
            SanitisedDependency {
                spec: PackageOrBlockDepSpec::parse("cat/a").unwrap(),
                active_labels: ActiveLabels::new(labels),
                metadata_key: DependencyKey::Dependencies,
                original_specification: "cat/a".to_string(),
            },
            false,
        )
    }

    #[test]
    fn best_slot_plus_installed_slots() {
        with_ctx("", |ctx| {
            let spec = PackageDepSpec::parse("cat/a").unwrap();
            assert_eq!(
                shown(resolvents_for(ctx, &spec, &Reason::Target)),
                vec!["cat/a:2 -> install_to_slash", "cat/a:1 -> install_to_slash"]
            );
            let spec = PackageDepSpec::parse("cat/a:1").unwrap();
            assert_eq!(
                shown(resolvents_for(ctx, &spec, &Reason::Target)),
                vec!["cat/a:1 -> install_to_slash"]
            );
            let spec = PackageDepSpec::parse("cat/missing").unwrap();
            assert!(resolvents_for(ctx, &spec, &Reason::Target).is_empty());
            assert_eq!(
                shown(error_resolvents_for(ctx, &spec, &Reason::Target)),
                vec!["cat/missing -> install_to_slash"]
            );
        });
    }

    #[test]
    fn dependencies_follow_binary_targets() {
        with_ctx(r#"target-destination-type = "create-binary""#, |ctx| {
            let spec = PackageDepSpec::parse("cat/a:2").unwrap();
            assert_eq!(
                shown(resolvents_for(ctx, &spec, &Reason::Target)),
                vec!["cat/a:2 -> create_binary"]
            );
            let reason = dep_reason(ctx, &[DependencyLabel::Build]);
            assert_eq!(
                shown(resolvents_for(ctx, &spec, &reason)),
                vec!["cat/a:2 -> install_to_slash", "cat/a:2 -> create_binary"]
            );
            let spec = PackageDepSpec::parse("cat/nobin").unwrap();
            assert_eq!(
                shown(resolvents_for(ctx, &spec, &reason)),
                vec!["cat/nobin:0 -> install_to_slash"]
            );
        });

        with_ctx(
            r#"target-destination-type = "create-binary"
target-dependencies = "runtime""#,
            |ctx| {
                let spec = PackageDepSpec::parse("cat/a:2").unwrap();
                let build = dep_reason(ctx, &[DependencyLabel::Build]);
                assert_eq!(resolvents_for(ctx, &spec, &build).len(), 1);
                let run = dep_reason(ctx, &[DependencyLabel::Run]);
                assert_eq!(resolvents_for(ctx, &spec, &run).len(), 2);
            },
        );
    }

    #[test]
    fn blocker_resolvents() {
        with_ctx("", |ctx| {
            let block = BlockDepSpec::parse("!cat/a").unwrap();
            assert_eq!(
                shown(resolvents_for_blocker(ctx, &block)),
                vec![
                    "cat/a:1 -> install_to_slash",
                    "cat/a:2 -> install_to_slash",
                    "cat/a:3 -> install_to_slash"
                ]
            );
            let block = BlockDepSpec::parse("!cat/a:7").unwrap();
            assert_eq!(
                shown(resolvents_for_blocker(ctx, &block)),
                vec!["cat/a:7 -> install_to_slash"]
            );
        });
    }
}
