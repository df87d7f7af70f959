//! Handler for `pallet resolve`.

use std::path::PathBuf;

use console::style;
use miette::Result;

use pallet_core::config::ResolverConfig;
use pallet_core::universe::Universe;
use pallet_resolver::dump::Dump;
use pallet_resolver::job::JobKind;
use pallet_resolver::serialise::serialise;
use pallet_resolver::{Decision, Resolver, ResolverLists, Target};
use pallet_util::errors::PalletError;
use pallet_util::progress;

pub struct ResolveArgs {
    pub universe: PathBuf,
    pub config: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub dump: bool,
    pub targets: Vec<String>,
}

pub fn exec(args: &ResolveArgs) -> Result<()> {
    let universe = Universe::load(&args.universe)?;
    let config = match &args.config {
        Some(path) => ResolverConfig::load(path)?,
        None => ResolverConfig::default(),
    };

    let mut resolver = Resolver::new(&universe, &config);
    for target in &args.targets {
        resolver.add(Target::parse(target)?)?;
    }

    progress::status("Resolving", &format!("{} targets", args.targets.len()));
    let pb = progress::spinner("Deciding...");
    let resolved = resolver.resolve().map(|_| ());
    pb.finish_and_clear();
    resolved?;

    let restarts = resolver.restarts();
    if restarts > 0 {
        progress::status_info("Restarted", &format!("{restarts} times"));
    }
    let Some(lists) = resolver.into_lists() else {
        return Err(miette::miette!("Resolver finished without a plan"));
    };

    print_plan(&lists);
    if args.dump {
        print!("{}", Dump::new(&lists));
    }

    if let Some(path) = &args.output {
        pallet_util::fs::write_atomic(path, &serialise(&lists))?;
        progress::status("Wrote", &format!("plan to {}", path.display()));
    }

    summarise(&lists)
}

/// The ordered install and uninstall steps, one per line.
fn print_plan(lists: &ResolverLists) {
    let jobs = &lists.job_lists;
    for id in &jobs.ordered_job_ids {
        let Some(job) = jobs.jobs.get(id) else {
            continue;
        };
        if let JobKind::SimpleInstall(install) = &job.kind {
            println!("{}", install.work_item);
        }
    }
    for id in &jobs.untaken_job_ids {
        if let Some(r) = jobs.jobs.get(id).and_then(|j| j.kind.resolvent()) {
            println!("{} {r}", style("untaken").dim());
        }
    }
}

fn summarise(lists: &ResolverLists) -> Result<()> {
    let mut changes = 0;
    let mut removals = 0;
    let mut untaken = 0;
    for d in lists.resolutions.iter().filter_map(|r| r.decision.as_ref()) {
        match d {
            _ if !d.taken() => untaken += 1,
            Decision::ChangesToMake { .. } => changes += 1,
            Decision::Remove { .. } => removals += 1,
            _ => {}
        }
    }
    let errors = lists.taken_error_resolvents.len();

    let summary = format!(
        "{} resolutions: {changes} to install, {removals} to remove, {untaken} untaken, {errors} unable",
        lists.resolutions.len()
    );
    if errors == 0 {
        progress::status("Resolved", &summary);
        return Ok(());
    }

    progress::status_warn("Resolved", &summary);
    for r in &lists.taken_error_resolvents {
        progress::status_error("Unable", &r.to_string());
    }
    Err(PalletError::Generic {
        message: format!("Could not find anything suitable for {errors} resolvents"),
    }
    .into())
}
