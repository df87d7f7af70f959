//! Choosing a decision for a resolution and checking new constraints
//! against decisions already made.

use pallet_core::config::{ResolverConfig, UseExisting};
use pallet_core::dep_spec::{BlockDepSpec, MatchOptions, PackageOrBlockDepSpec};
use pallet_core::package_id::{PackageId, PackageIdRef};

use crate::constraint::{Constraint, Constraints};
use crate::context::{can_realise, ResolverContext};
use crate::decision::{ChangeType, Decision, UnsuitableCandidate};
use crate::error::ResolveResult;
use crate::reason::Reason;
use crate::resolution::Resolution;
use crate::resolvent::Resolvent;
use crate::sameness::get_sameness;

/// What happened when a constraint was applied to a resolution.
#[derive(Debug)]
pub enum Acceptance {
    /// The constraint was appended; the decision stands (or there is none yet).
    Accepted,
    /// Nothing had been needed before; the new decision's dependencies must
    /// now be added.
    Replaced,
    /// A different decision is needed, which means starting over.
    Conflict(Box<SuggestRestart>),
    /// Nothing can satisfy the constraints any more.
    Unable,
}

/// A request to throw away the current attempt and start again with
/// `preset` among the initial constraints of `resolvent`.
#[derive(Debug, Clone)]
pub struct SuggestRestart {
    pub resolvent: Resolvent,
    pub previous_decision: Decision,
    pub problematic_constraint: Constraint,
    pub new_decision: Decision,
    pub preset: Constraint,
}

/// Whether `decision` satisfies `constraint`.
pub fn check_constraint(constraint: &Constraint, decision: &Decision) -> bool {
    if constraint.force_unable {
        return decision.is_unable();
    }

    match decision {
        Decision::ExistingNoChange { existing_id: id, .. }
        | Decision::ChangesToMake { origin_id: id, .. } => {
            if !spec_allows(&constraint.spec, id) {
                return false;
            }
        }
        Decision::Break { existing_id, .. } => {
            if let PackageOrBlockDepSpec::Package(spec) = &constraint.spec {
                if !spec.matches(existing_id, MatchOptions::default()) {
                    return false;
                }
            }
        }
        Decision::Remove { .. } => {
            if !constraint.spec.is_block() && !constraint.nothing_is_fine_too {
                return false;
            }
        }
        Decision::NothingNoChange { .. } => {
            if !constraint.nothing_is_fine_too {
                return false;
            }
        }
        Decision::UnableToMake { .. } => return true,
    }

    if let Decision::ExistingNoChange {
        is_same,
        is_same_version,
        is_transient,
        ..
    } = decision
    {
        let ok = match constraint.use_existing {
            UseExisting::IfPossible => true,
            UseExisting::IfTransient => *is_transient || *is_same_version,
            UseExisting::OnlyIfTransient => *is_transient,
            UseExisting::IfSame => *is_same,
            UseExisting::IfSameVersion => *is_same_version,
            UseExisting::Never => false,
        };
        if !ok {
            return false;
        }
    }

    constraint.untaken || decision.taken()
}

/// A package spec must match `id`; a block must not.
fn spec_allows(spec: &PackageOrBlockDepSpec, id: &PackageId) -> bool {
    match spec {
        PackageOrBlockDepSpec::Package(p) => p.matches(id, MatchOptions::default()),
        PackageOrBlockDepSpec::Block(b) => !b.blocking.matches(id, MatchOptions::default()),
    }
}

/// The best of `ids` (sorted ascending) that every constraint's spec allows,
/// and whether it is also the best of `ids` overall.
fn find_id_for_from(constraints: &Constraints, ids: &[PackageIdRef]) -> Option<(PackageIdRef, bool)> {
    let mut best = true;
    for id in ids.iter().rev() {
        if constraints.iter().all(|c| spec_allows(&c.spec, id)) {
            return Some((id.clone(), best));
        }
        best = false;
    }
    None
}

pub fn find_existing_id_for(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    constraints: &Constraints,
) -> Option<PackageIdRef> {
    find_id_for_from(constraints, &ctx.existing_ids(resolvent)).map(|(id, _)| id)
}

pub fn find_installable_id_for(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    constraints: &Constraints,
) -> Option<(PackageIdRef, bool)> {
    let candidates: Vec<PackageIdRef> = ctx
        .candidate_ids(resolvent)
        .into_iter()
        .filter(|id| !id.masked && can_realise(id, resolvent.destination_type))
        .collect();
    find_id_for_from(constraints, &candidates)
}

fn changes_to_make(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    origin_id: PackageIdRef,
    best: bool,
    taken: bool,
) -> Decision {
    Decision::ChangesToMake {
        resolvent: resolvent.clone(),
        change_type: ChangeType::compute(ctx.env, resolvent, &origin_id),
        origin_id,
        best,
        destination: None,
        taken,
    }
}

/// A decision satisfying `constraints`, or `None` when there is none.
pub fn try_to_find_decision_for(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    constraints: &Constraints,
) -> ResolveResult<Option<Decision>> {
    if constraints.any_force_unable() {
        return Ok(None);
    }

    let taken = !constraints.all_untaken();
    let existing = find_existing_id_for(ctx, resolvent, constraints);
    let installable = find_installable_id_for(ctx, resolvent, constraints);
    let strictest = constraints.strictest_use_existing();

    let decision = match (existing, installable) {
        (None, _) if constraints.nothing_is_fine_too() => Some(Decision::NothingNoChange {
            resolvent: resolvent.clone(),
            taken,
        }),
        (None, Some((id, best))) => Some(changes_to_make(ctx, resolvent, id, best, taken)),
        (Some(existing), None) => {
            let is_transient = existing.is_transient();
            let acceptable = match strictest {
                UseExisting::IfPossible => true,
                UseExisting::Never => false,
                UseExisting::IfTransient
                | UseExisting::IfSameVersion
                | UseExisting::IfSame
                | UseExisting::OnlyIfTransient => is_transient,
            };
            acceptable.then(|| Decision::ExistingNoChange {
                resolvent: resolvent.clone(),
                existing_id: existing,
                is_same: true,
                is_same_version: true,
                is_transient,
                taken,
            })
        }
        (Some(existing), Some((id, best))) => {
            let sameness = get_sameness(&existing, &id);
            let is_transient = existing.is_transient();
            let use_existing = match strictest {
                UseExisting::Never | UseExisting::OnlyIfTransient => false,
                UseExisting::IfSame => sameness.is_same,
                UseExisting::IfSameVersion => sameness.is_same_version,
                UseExisting::IfTransient => is_transient || sameness.is_same_version,
                UseExisting::IfPossible => true,
            };
            if use_existing {
                Some(Decision::ExistingNoChange {
                    resolvent: resolvent.clone(),
                    existing_id: existing,
                    is_same: sameness.is_same,
                    is_same_version: sameness.is_same_version,
                    is_transient,
                    taken,
                })
            } else {
                Some(changes_to_make(ctx, resolvent, id, best, taken))
            }
        }
        (None, None) => remove_or_break(ctx, resolvent, constraints, taken),
    };

    if let Some(d) = &decision {
        tracing::debug!("{resolvent}: decided {d}");
    }
    Ok(decision)
}

/// With nothing acceptable, removing or knowingly breaking what is installed
/// may still satisfy every constraint if configuration allows it.
fn remove_or_break(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    constraints: &Constraints,
    taken: bool,
) -> Option<Decision> {
    let installed = ctx.existing_ids(resolvent);
    let best_installed = installed.last()?.clone();

    let removable = constraints
        .iter()
        .all(|c| c.spec.is_block() || c.nothing_is_fine_too)
        && installed
            .iter()
            .all(|id| ResolverConfig::matches_any(&ctx.config.allowed_to_remove, id));
    if removable {
        return Some(Decision::Remove {
            resolvent: resolvent.clone(),
            ids: installed,
            taken,
        });
    }

    if ResolverConfig::matches_any(&ctx.config.allowed_to_break, &best_installed) {
        let decision = Decision::Break {
            resolvent: resolvent.clone(),
            existing_id: best_installed,
            taken,
        };
        if constraints.iter().all(|c| check_constraint(c, &decision)) {
            return Some(decision);
        }
    }
    None
}

/// Record why nothing could be chosen: the best installed id and every
/// candidate, masked or not, each with the constraints it fails.
pub fn cannot_decide_for(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    constraints: &Constraints,
) -> Decision {
    let existing = ctx.existing_ids(resolvent).last().cloned();
    let unsuitable_candidates = existing
        .into_iter()
        .chain(ctx.candidate_ids(resolvent))
        .map(|id| UnsuitableCandidate {
            unmet_constraints: unmet_constraints(ctx, resolvent, constraints, &id),
            id,
        })
        .collect();

    tracing::debug!("{resolvent}: unable to make a decision");
    Decision::UnableToMake {
        resolvent: resolvent.clone(),
        unsuitable_candidates,
        taken: !constraints.all_untaken(),
    }
}

fn unmet_constraints(
    ctx: &ResolverContext<'_>,
    resolvent: &Resolvent,
    constraints: &Constraints,
    id: &PackageIdRef,
) -> Constraints {
    constraints
        .iter()
        .filter(|c| {
            let hypothetical = changes_to_make(ctx, resolvent, id.clone(), false, !c.untaken);
            !check_constraint(c, &hypothetical)
        })
        .cloned()
        .collect()
}

/// Decide `resolution`, recording `UnableToMake` when nothing fits.
pub fn decide(ctx: &ResolverContext<'_>, resolution: &mut Resolution) -> ResolveResult<()> {
    let decision = match try_to_find_decision_for(ctx, &resolution.resolvent, &resolution.constraints)? {
        Some(d) => d,
        None => cannot_decide_for(ctx, &resolution.resolvent, &resolution.constraints),
    };
    resolution.decision = Some(decision);
    Ok(())
}

/// Append `constraint` to `resolution`, revisiting its decision if the
/// decision no longer satisfies it.
pub fn apply_constraint(
    ctx: &ResolverContext<'_>,
    resolution: &mut Resolution,
    constraint: Constraint,
) -> ResolveResult<Acceptance> {
    let Some(previous) = &resolution.decision else {
        resolution.constraints.push(constraint);
        return Ok(Acceptance::Accepted);
    };
    if check_constraint(&constraint, previous) {
        resolution.constraints.push(constraint);
        return Ok(Acceptance::Accepted);
    }

    let mut adapted = resolution.constraints.clone();
    adapted.push(constraint.clone());
    let resolvent = &resolution.resolvent;

    let acceptance = match try_to_find_decision_for(ctx, resolvent, &adapted)? {
        Some(new_decision) if matches!(previous, Decision::NothingNoChange { .. }) => {
            resolution.decision = Some(new_decision);
            Acceptance::Replaced
        }
        Some(new_decision) => {
            tracing::debug!("{resolvent}: '{constraint}' needs {new_decision} instead of {previous}");
            let preset = preset_for_restart(&constraint)?;
            Acceptance::Conflict(Box::new(SuggestRestart {
                resolvent: resolvent.clone(),
                previous_decision: previous.clone(),
                problematic_constraint: constraint.clone(),
                new_decision,
                preset,
            }))
        }
        None => {
            resolution.decision = Some(cannot_decide_for(ctx, resolvent, &adapted));
            Acceptance::Unable
        }
    };
    resolution.constraints.push(constraint);
    Ok(acceptance)
}

/// The constraint a restart starts with. Choice requirements are dropped:
/// they refer to the id that made the request, which may not exist next
/// time.
fn preset_for_restart(constraint: &Constraint) -> ResolveResult<Constraint> {
    let spec = match &constraint.spec {
        PackageOrBlockDepSpec::Package(p) => {
            PackageOrBlockDepSpec::Package(p.without_choice_requirements())
        }
        PackageOrBlockDepSpec::Block(b) => PackageOrBlockDepSpec::Block(BlockDepSpec {
            blocking: b.blocking.without_choice_requirements(),
            strong: b.strong,
        }),
    };
    Ok(Constraint {
        spec,
        reason: Reason::preset("restarted because of", Some(constraint.reason.clone()))?,
        ..constraint.clone()
    })
}
