//! Plain-text rendering of a resolve's results, for diagnostics.

use std::fmt;

use crate::decision::Decision;
use crate::job::{Job, JobId};
use crate::resolution::Resolution;
use crate::resolver::ResolverLists;

/// Every resolution with its constraints and decision, then the jobs in
/// order with their arrows.
pub struct Dump<'a> {
    lists: &'a ResolverLists,
}

impl<'a> Dump<'a> {
    pub fn new(lists: &'a ResolverLists) -> Self {
        Self { lists }
    }
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolutions = &self.lists.resolutions;
        writeln!(f, "Resolutions ({}):", resolutions.len())?;
        for resolution in resolutions.iter_by_resolvent() {
            write_resolution(f, resolution)?;
        }

        let jobs = &self.lists.job_lists;
        writeln!(
            f,
            "Jobs ({} ordered, {} untaken, {} errors):",
            jobs.ordered_job_ids.len(),
            jobs.untaken_job_ids.len(),
            jobs.error_job_ids.len()
        )?;
        for (n, id) in jobs.ordered_job_ids.iter().enumerate() {
            write!(f, "  {:>3}. ", n + 1)?;
            write_job(f, jobs.jobs.get(id), id)?;
        }
        for (label, ids) in [
            ("untaken", &jobs.untaken_job_ids),
            ("errors", &jobs.error_job_ids),
        ] {
            if ids.is_empty() {
                continue;
            }
            writeln!(f, "  {label}:")?;
            for id in ids {
                f.write_str("       ")?;
                write_job(f, jobs.jobs.get(id), id)?;
            }
        }
        Ok(())
    }
}

fn write_resolution(f: &mut fmt::Formatter<'_>, resolution: &Resolution) -> fmt::Result {
    writeln!(f, "  {}", resolution.resolvent)?;
    if resolution.constraints.is_empty() {
        writeln!(f, "    constraints: none")?;
    } else {
        writeln!(f, "    constraints:")?;
        for c in &resolution.constraints {
            writeln!(f, "      {c}")?;
        }
    }
    match &resolution.decision {
        None => writeln!(f, "    decision: none"),
        Some(decision) => {
            writeln!(f, "    decision: {decision}")?;
            if let Decision::UnableToMake {
                unsuitable_candidates,
                ..
            } = decision
            {
                for candidate in unsuitable_candidates {
                    writeln!(f, "      candidate {}:", candidate.id)?;
                    if candidate.unmet_constraints.is_empty() {
                        writeln!(f, "        masked or otherwise unusable")?;
                    }
                    for c in &candidate.unmet_constraints {
                        writeln!(f, "        unmet {c}")?;
                    }
                }
            }
            Ok(())
        }
    }
}

fn write_job(f: &mut fmt::Formatter<'_>, job: Option<&Job>, id: &JobId) -> fmt::Result {
    let Some(job) = job else {
        return writeln!(f, "{id} (missing)");
    };
    write!(f, "{id} ({})", job.kind.name())?;
    if let Some(item) = job.kind.work_item() {
        write!(f, ": {item}")?;
    }
    writeln!(f)?;
    for arrow in &job.arrows {
        write!(f, "         after {}", arrow.comes_after)?;
        if arrow.ignorable_if_satisfied {
            f.write_str(" [ignorable if satisfied]")?;
        }
        if let Some(reason) = &arrow.reason {
            write!(f, " because {reason}")?;
        }
        writeln!(f)?;
    }
    Ok(())
}
