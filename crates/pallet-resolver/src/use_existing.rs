//! Choosing a use-existing policy for a new constraint.

use pallet_core::config::{ResolverConfig, UseExisting};
use pallet_core::dep_spec::PackageDepSpec;

use crate::context::{can_realise, ResolverContext};
use crate::reason::Reason;
use crate::resolvent::Resolvent;

/// The policy for a constraint on `resolvent` from `spec` for `reason`.
///
/// When nothing installable can be realised for the resolvent, any stricter
/// policy is relaxed so the installed id stays usable.
pub fn use_existing_for(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    spec: &PackageDepSpec,
    reason: &Reason,
) -> UseExisting {
    let policy = policy_for(ctx.config, spec, reason);
    if policy > UseExisting::IfPossible && no_appropriate_ids(ctx, resolvent, spec) {
        return UseExisting::IfPossible;
    }
    policy
}

fn policy_for(config: &ResolverConfig, spec: &PackageDepSpec, reason: &Reason) -> UseExisting {
    if ResolverConfig::names_package(&config.with, &spec.package) {
        return UseExisting::Never;
    }
    if ResolverConfig::names_package(&config.without, &spec.package) {
        return UseExisting::IfPossible;
    }
    match reason {
        Reason::Target => config.use_existing_for_targets,
        Reason::Set { .. } => config.use_existing_for_sets,
        Reason::Dependency(_) => config.use_existing_for_dependencies,
        _ => UseExisting::IfPossible,
    }
}

/// No unmasked candidate of the package (in the spec's exact slot, if any)
/// can be built for the resolvent's destination type.
fn no_appropriate_ids(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    spec: &PackageDepSpec,
) -> bool {
    let slot = spec.slot.as_ref().and_then(|s| s.exact_slot());
    !ctx.package_ids(&spec.package).iter().any(|id| {
        !id.masked
            && !ctx.env.is_installed(id)
            && slot.map_or(true, |s| s == &id.slot)
            && can_realise(id, resolvent.destination_type)
    })
}
