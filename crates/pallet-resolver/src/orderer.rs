//! Turning decisions into jobs, jobs into arrows, and arrows into an order.

use std::collections::{HashMap, HashSet};

use pallet_core::dep_spec::PackageOrBlockDepSpec;
use pallet_core::dep_tree::DependencyLabel;

use crate::decision::Decision;
use crate::error::{ResolveError, ResolveResult};
use crate::graph::JobGraph;
use crate::job::{
    Arrow, ErrorJob, FetchJob, Job, JobId, JobKind, Jobs, PretendJob, SimpleInstallJob, SyncPoint,
    SyncPointJob, UntakenInstallJob, UsableGroupJob, UsableJob, WorkItem,
};
use crate::resolution::{Resolution, Resolutions};
use crate::resolvent::Resolvent;

/// Every job, plus the ordered, untaken and error job ids.
#[derive(Debug, Clone, Default)]
pub struct JobLists {
    pub jobs: Jobs,
    pub ordered_job_ids: Vec<JobId>,
    pub untaken_job_ids: Vec<JobId>,
    pub error_job_ids: Vec<JobId>,
}

/// Jobs that take part in ordering.
fn is_orderable(kind: &JobKind) -> bool {
    !matches!(kind, JobKind::Error(_) | JobKind::UntakenInstall(_))
}

fn sync_point(jobs: &mut Jobs, s: SyncPoint) -> ResolveResult<&mut Job> {
    jobs.get_mut(&JobId::sync_point(s))
        .ok_or_else(|| ResolveError::internal(format!("missing sync point {}", s.as_str())))
}

/// Create the jobs for every decision, in resolution creation order.
pub fn build_jobs(resolutions: &Resolutions) -> ResolveResult<JobLists> {
    let mut lists = JobLists::default();
    for s in [SyncPoint::DoneInstalls, SyncPoint::DonePretends] {
        lists.jobs.add(Job::new(
            JobId::sync_point(s),
            JobKind::SyncPoint(SyncPointJob { sync_point: s }),
        ))?;
    }

    for resolution in resolutions {
        add_jobs_for(&mut lists, resolution)?;
    }
    tracing::debug!("built {} jobs", lists.jobs.len());
    Ok(lists)
}

fn add_jobs_for(lists: &mut JobLists, resolution: &Resolution) -> ResolveResult<()> {
    let r = &resolution.resolvent;
    let decision = resolution
        .decision
        .as_ref()
        .ok_or_else(|| ResolveError::internal(format!("{r} was never decided")))?;
    let done_pretends = JobId::sync_point(SyncPoint::DonePretends);
    let jobs = &mut lists.jobs;

    match decision {
        Decision::ChangesToMake {
            origin_id,
            destination,
            taken: true,
            ..
        } => {
            let destination = destination
                .as_ref()
                .ok_or_else(|| ResolveError::internal(format!("{r} has no destination")))?;

            jobs.add(Job::new(
                JobId::pretend(r),
                JobKind::Pretend(PretendJob {
                    resolvent: r.clone(),
                    work_item: WorkItem::Pretend {
                        origin_id: origin_id.clone(),
                    },
                }),
            ))?;

            let mut fetch = Job::new(
                JobId::fetch(r),
                JobKind::Fetch(FetchJob {
                    resolvent: r.clone(),
                    work_item: WorkItem::Fetch {
                        origin_id: origin_id.clone(),
                    },
                }),
            );
            fetch.add_arrow(Arrow::new(done_pretends.clone()));
            jobs.add(fetch)?;

            let mut install = Job::new(
                JobId::install(r),
                JobKind::SimpleInstall(SimpleInstallJob {
                    resolvent: r.clone(),
                    work_item: WorkItem::Install {
                        origin_id: origin_id.clone(),
                        destination: destination.repository.clone(),
                        replacing: destination.replacing.clone(),
                    },
                }),
            );
            install.add_arrow(Arrow::new(done_pretends));
            install.add_arrow(Arrow::new(JobId::fetch(r)));
            jobs.add(install)?;

            add_usable(jobs, r, JobId::install(r))?;
            sync_point(jobs, SyncPoint::DonePretends)?.add_arrow(Arrow::new(JobId::pretend(r)));
            sync_point(jobs, SyncPoint::DoneInstalls)?.add_arrow(Arrow::new(JobId::usable(r)));
        }
        Decision::Remove {
            ids, taken: true, ..
        } => {
            let mut uninstall = Job::new(
                JobId::install(r),
                JobKind::SimpleInstall(SimpleInstallJob {
                    resolvent: r.clone(),
                    work_item: WorkItem::Uninstall { ids: ids.clone() },
                }),
            );
            uninstall.add_arrow(Arrow::new(done_pretends));
            jobs.add(uninstall)?;

            add_usable(jobs, r, JobId::install(r))?;
            sync_point(jobs, SyncPoint::DoneInstalls)?.add_arrow(Arrow::new(JobId::usable(r)));
        }
        Decision::NothingNoChange { taken: true, .. }
        | Decision::ExistingNoChange { taken: true, .. }
        | Decision::Break { taken: true, .. } => {
            add_usable(jobs, r, done_pretends)?;
        }
        Decision::UnableToMake { taken: true, .. } => {
            jobs.add(Job::new(
                JobId::error(r),
                JobKind::Error(ErrorJob { resolvent: r.clone() }),
            ))?;
            lists.error_job_ids.push(JobId::error(r));
        }
        Decision::ChangesToMake { taken: false, .. }
        | Decision::UnableToMake { taken: false, .. }
        | Decision::Remove { taken: false, .. } => {
            jobs.add(Job::new(
                JobId::untaken(r),
                JobKind::UntakenInstall(UntakenInstallJob { resolvent: r.clone() }),
            ))?;
            lists.untaken_job_ids.push(JobId::untaken(r));
        }
        Decision::NothingNoChange { taken: false, .. }
        | Decision::ExistingNoChange { taken: false, .. }
        | Decision::Break { taken: false, .. } => {}
    }
    Ok(())
}

fn add_usable(jobs: &mut Jobs, r: &Resolvent, after: JobId) -> ResolveResult<()> {
    let mut usable = Job::new(JobId::usable(r), JobKind::Usable(UsableJob { resolvent: r.clone() }));
    usable.add_arrow(Arrow::new(after));
    jobs.add(usable)
}

/// Add ordering arrows for the dependencies recorded on each resolution.
pub fn resolve_arrows(lists: &mut JobLists, resolutions: &Resolutions) -> ResolveResult<()> {
    for resolution in resolutions {
        let this = &resolution.resolvent;
        for constraint in resolution.constraints.iter().filter(|c| !c.untaken) {
            let Some(dep) = constraint.reason.as_dependency() else {
                continue;
            };
            let from = &dep.from_resolvent;
            if from == this {
                continue;
            }

            let mut wanted: Vec<(Option<JobId>, Option<JobId>)> = Vec::new();
            match &dep.dependency.spec {
                PackageOrBlockDepSpec::Block(block) => {
                    if block.strong {
                        wanted.push((
                            lists.jobs.find_id_for_installed(from).ok(),
                            lists.jobs.find_id_for_installed(this).ok(),
                        ));
                    }
                }
                PackageOrBlockDepSpec::Package(_) => {
                    let labels = &dep.dependency.active_labels.type_labels;
                    if labels.iter().any(|l| l.is_build_class()) {
                        wanted.push((
                            lists.jobs.find_id_for_installed(from).ok(),
                            lists.jobs.find_id_for_usable(this),
                        ));
                    }
                    if labels.contains(&DependencyLabel::Run) {
                        wanted.push((
                            lists.jobs.find_id_for_usable(from),
                            lists.jobs.find_id_for_usable(this),
                        ));
                    }
                }
            }

            for (owner, comes_after) in wanted {
                let Some(comes_after) = comes_after.filter(|id| {
                    lists.jobs.get(id).is_some_and(|j| is_orderable(&j.kind))
                }) else {
                    continue;
                };
                let owner = match owner {
                    Some(id) => lists.jobs.get_mut(&id),
                    None => None,
                };
                let Some(owner) = owner else {
                    tracing::warn!(
                        "{from} has no job to order after {comes_after}; skipping arrow for '{}'",
                        dep.dependency
                    );
                    continue;
                };
                owner.add_arrow(Arrow {
                    comes_after,
                    ignorable_if_satisfied: dep.already_met,
                    reason: Some(constraint.reason.clone()),
                });
            }
        }
    }
    Ok(())
}

/// Order every orderable job, breaking cycles where arrows allow it.
pub fn resolve_order(lists: &mut JobLists) -> ResolveResult<()> {
    let candidates: Vec<JobId> = lists
        .jobs
        .iter()
        .filter(|j| is_orderable(&j.kind))
        .map(|j| j.id.clone())
        .collect();
    let known: HashSet<&JobId> = candidates.iter().collect();
    let mut done: HashSet<JobId> = HashSet::new();
    let mut ordered: Vec<JobId> = Vec::new();

    // Pass 0 respects every arrow, pass 1 drops usable-to-usable arrows and
    // pass 2 also drops arrows that were already satisfied.
    let mut pass = 0;
    loop {
        let mut remaining = false;
        let mut any = false;

        for id in &candidates {
            if done.contains(id) {
                continue;
            }
            remaining = true;
            if !can_order(&lists.jobs, id, pass, &done, &known) {
                continue;
            }

            ordered.push(id.clone());
            done.insert(id.clone());
            any = true;

            if pass >= 2 {
                let waiting: Vec<String> = lists
                    .jobs
                    .get(id)
                    .map(|j| {
                        j.arrows
                            .iter()
                            .filter(|a| !done.contains(&a.comes_after))
                            .map(|a| a.comes_after.to_string())
                            .collect()
                    })
                    .unwrap_or_default();
                tracing::warn!(
                    "Had to break a cycle to order {id} (still waiting for {})",
                    waiting.join(", ")
                );
            }
            pass = 0;
        }

        if !remaining {
            break;
        }
        if !any {
            pass += 1;
            if pass > 2 {
                return Err(unbreakable(&lists.jobs, &candidates, &done));
            }
        }
    }

    lists.ordered_job_ids = ordered;
    add_usable_groups(lists)
}

fn can_order(
    jobs: &Jobs,
    id: &JobId,
    pass: u32,
    done: &HashSet<JobId>,
    known: &HashSet<&JobId>,
) -> bool {
    let Some(job) = jobs.get(id) else {
        return false;
    };
    job.arrows.iter().all(|arrow| {
        if done.contains(&arrow.comes_after) || !known.contains(&arrow.comes_after) {
            return true;
        }
        if pass >= 1 && usable_to_usable(jobs, job, arrow) {
            return true;
        }
        pass >= 2 && arrow.ignorable_if_satisfied
    })
}

fn usable_to_usable(jobs: &Jobs, job: &Job, arrow: &Arrow) -> bool {
    matches!(job.kind, JobKind::Usable(_))
        && jobs
            .get(&arrow.comes_after)
            .is_some_and(|j| matches!(j.kind, JobKind::Usable(_)))
}

/// The cycles left once every relaxable arrow is dropped.
fn unbreakable(jobs: &Jobs, candidates: &[JobId], done: &HashSet<JobId>) -> ResolveError {
    let remaining: Vec<&JobId> = candidates.iter().filter(|id| !done.contains(*id)).collect();
    let mut graph = JobGraph::new();
    for id in &remaining {
        let Some(job) = jobs.get(id) else {
            continue;
        };
        graph.add_node(id);
        for arrow in &job.arrows {
            let relaxable = arrow.ignorable_if_satisfied || usable_to_usable(jobs, job, arrow);
            if !relaxable && !done.contains(&arrow.comes_after) {
                graph.add_edge(id, &arrow.comes_after);
            }
        }
    }

    let cycles = graph.cycles();
    let in_cycles: Vec<&JobId> = if cycles.is_empty() {
        remaining.clone()
    } else {
        cycles.iter().flatten().collect()
    };
    let mut resolvents: Vec<String> = in_cycles
        .iter()
        .filter_map(|id| jobs.get(id).and_then(|j| j.kind.resolvent()))
        .map(|r| r.to_string())
        .collect();
    resolvents.sort();
    resolvents.dedup();

    ResolveError::UnbreakableCycle {
        resolvents,
        jobs: remaining.iter().map(|id| id.to_string()).collect(),
    }
}

/// Usable jobs that wait for each other at run time become usable as a
/// group, ordered straight after the last of them.
fn add_usable_groups(lists: &mut JobLists) -> ResolveResult<()> {
    let mut graph = JobGraph::new();
    for job in lists.jobs.iter().filter(|j| matches!(j.kind, JobKind::Usable(_))) {
        graph.add_node(&job.id);
        for arrow in &job.arrows {
            if usable_to_usable(&lists.jobs, job, arrow) {
                graph.add_edge(&job.id, &arrow.comes_after);
            }
        }
    }

    let position: HashMap<JobId, usize> = lists
        .ordered_job_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();

    let mut groups: Vec<(usize, Job)> = Vec::new();
    for (n, mut members) in graph
        .cycles()
        .into_iter()
        .filter(|c| c.len() > 1)
        .enumerate()
    {
        members.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));
        let last = members
            .last()
            .and_then(|id| position.get(id).copied())
            .ok_or_else(|| ResolveError::internal("usable group member was never ordered"))?;

        let mut group = Job::new(
            JobId::usable_group(n + 1),
            JobKind::UsableGroup(UsableGroupJob {
                job_ids: members.clone(),
            }),
        );
        for member in members {
            group.add_arrow(Arrow::new(member));
        }
        tracing::debug!("{}: usable together", group.id);
        groups.push((last, group));
    }

    // Insert from the back so earlier positions stay valid.
    groups.sort_by_key(|(last, _)| std::cmp::Reverse(*last));
    for (last, group) in groups {
        lists.ordered_job_ids.insert(last + 1, group.id.clone());
        lists.jobs.add(group)?;
    }
    Ok(())
}
