//! Picking the repository each change is installed to.

use pallet_core::package_id::PackageId;
use pallet_core::repository::Repository;

use crate::context::{can_realise, ResolverContext};
use crate::decision::{Decision, Destination};
use crate::error::{ResolveError, ResolveResult};
use crate::resolution::Resolutions;
use crate::resolvent::Resolvent;

/// Give every `ChangesToMake` decision without a destination one. A taken
/// decision with nowhere to go is fatal; an untaken one keeps none.
pub fn resolve_destinations(ctx: &ResolverContext<'_>, resolutions: &mut Resolutions) -> ResolveResult<()> {
    for idx in 0..resolutions.len() {
        let resolution = resolutions.at_mut(idx);
        let Some(Decision::ChangesToMake {
            resolvent,
            origin_id,
            destination: destination @ None,
            taken,
            ..
        }) = &mut resolution.decision
        else {
            continue;
        };

        match find_destination(ctx, resolvent, origin_id) {
            Some(d) => {
                tracing::debug!("{resolvent}: installing {origin_id} to ::{}", d.repository);
                *destination = Some(d);
            }
            None if *taken => {
                return Err(ResolveError::NoDestination {
                    resolvent: resolvent.to_string(),
                    id: origin_id.to_string(),
                });
            }
            None => tracing::debug!("{resolvent}: no destination for untaken {origin_id}"),
        }
    }
    Ok(())
}

/// The most important repository the resolvent's destination type installs
/// to, and what installing `origin` there would replace. `None` when no
/// such repository exists or `origin` cannot be built for it.
pub fn find_destination(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    origin: &PackageId,
) -> Option<Destination> {
    if !can_realise(origin, resolvent.destination_type) {
        tracing::debug!("{resolvent}: {origin} cannot be realised here");
        return None;
    }

    let mut repos: Vec<&Repository> = ctx
        .env
        .repositories()
        .iter()
        .filter(|r| resolvent.destination_type.accepts(r))
        .collect();
    repos.sort_by_key(|r| std::cmp::Reverse(r.importance));
    let repo = repos.first()?;

    let replacing = ctx
        .package_ids(&origin.name)
        .into_iter()
        .filter(|id| {
            ctx.env
                .repository(&id.repository)
                .is_ok_and(|r| same_root(r, repo))
        })
        .filter(|id| id.version == origin.version || id.slot == origin.slot)
        .collect();

    Some(Destination {
        repository: repo.name.clone(),
        replacing,
    })
}

/// Repositories that install to the same place.
fn same_root(a: &Repository, b: &Repository) -> bool {
    match (a.installed_root(), b.installed_root()) {
        (Some(x), Some(y)) => x == y,
        _ => a.name == b.name,
    }
}
