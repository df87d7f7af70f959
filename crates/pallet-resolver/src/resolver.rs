//! The resolver: turns targets into decisions and an ordered job list.
//!
//! Resolution runs in four phases. Dependencies are decided to a fixed
//! point, destinations are picked for every change, jobs and their arrows
//! are built, and finally the jobs are ordered. Deciding may discover that
//! an earlier decision was wrong; the attempt is then thrown away and
//! started again with the offending constraint preloaded.

use std::collections::HashSet;

use pallet_core::config::{ResolverConfig, UseExisting};
use pallet_core::dep_spec::{BlockDepSpec, MatchOptions, PackageDepSpec, PackageOrBlockDepSpec, VersionRequirementsMode};
use pallet_core::environment::Environment;
use pallet_core::name::SetName;
use pallet_core::package_id::PackageIdRef;
use pallet_core::version::VersionOperator;

use crate::constraint::Constraint;
use crate::context::{ResolverContext, IGNORE_CHOICES};
use crate::decider::{self, Acceptance, SuggestRestart};
use crate::decision::Decision;
use crate::destinations::resolve_destinations;
use crate::error::{ResolveError, ResolveResult};
use crate::initial_constraints::InitialConstraints;
use crate::interest::{interest_in, Interest};
use crate::orderer::{build_jobs, resolve_arrows, resolve_order, JobLists};
use crate::reason::Reason;
use crate::resolution::{Resolution, Resolutions};
use crate::resolvent::Resolvent;
use crate::resolvents::{error_resolvents_for, resolvents_for, resolvents_for_blocker};
use crate::sanitised::{sanitised_dependencies, SanitisedDependency};
use crate::use_existing::use_existing_for;

/// Everything a finished resolve produced.
#[derive(Debug, Clone, Default)]
pub struct ResolverLists {
    /// Every resolution, in creation order.
    pub resolutions: Resolutions,
    pub job_lists: JobLists,
    /// Resolvents whose taken decision is `UnableToMake`.
    pub taken_error_resolvents: Vec<Resolvent>,
}

impl ResolverLists {
    pub fn has_errors(&self) -> bool {
        !self.taken_error_resolvents.is_empty()
    }
}

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Spec(PackageOrBlockDepSpec),
    Set(SetName),
}

impl Target {
    /// `@set`, `!spec`, `!!spec` or a package spec.
    pub fn parse(s: &str) -> ResolveResult<Self> {
        match s.strip_prefix('@') {
            Some(set) => Ok(Target::Set(SetName::new(set)?)),
            None => Ok(Target::Spec(PackageOrBlockDepSpec::parse(s)?)),
        }
    }
}

/// Why an attempt stopped early.
enum Interrupt {
    Restart(Box<SuggestRestart>),
    Fatal(ResolveError),
}

impl From<ResolveError> for Interrupt {
    fn from(e: ResolveError) -> Self {
        Interrupt::Fatal(e)
    }
}

impl From<pallet_util::errors::PalletError> for Interrupt {
    fn from(e: pallet_util::errors::PalletError) -> Self {
        Interrupt::Fatal(e.into())
    }
}

type Step<T> = Result<T, Interrupt>;

pub struct Resolver<'a> {
    ctx: ResolverContext<'a>,
    targets: Vec<Target>,
    initial: InitialConstraints,
    resolutions: Resolutions,
    /// Resolvents whose new decision still needs its dependencies added.
    pending: Vec<Resolvent>,
    restarts: usize,
    seen_restarts: HashSet<(Resolvent, String, UseExisting)>,
    /// Distinct (resolvent, outcome) pairs decided over all attempts.
    observed: HashSet<(Resolvent, String)>,
    lists: Option<ResolverLists>,
}

impl<'a> Resolver<'a> {
    pub fn new(env: &'a dyn Environment, config: &'a ResolverConfig) -> Self {
        Self {
            ctx: ResolverContext::new(env, config),
            targets: Vec::new(),
            initial: InitialConstraints::new(),
            resolutions: Resolutions::new(),
            pending: Vec::new(),
            restarts: 0,
            seen_restarts: HashSet::new(),
            observed: HashSet::new(),
            lists: None,
        }
    }

    /// Add a package or block target.
    pub fn add_target(&mut self, spec: PackageOrBlockDepSpec) {
        self.targets.push(Target::Spec(spec));
    }

    /// Add every member of a set. Fails if the set does not exist.
    pub fn add_target_set(&mut self, set: SetName) -> ResolveResult<()> {
        self.ctx.env.expand_set(&set)?;
        self.targets.push(Target::Set(set));
        Ok(())
    }

    pub fn add(&mut self, target: Target) -> ResolveResult<()> {
        match target {
            Target::Spec(spec) => {
                self.add_target(spec);
                Ok(())
            }
            Target::Set(set) => self.add_target_set(set),
        }
    }

    pub fn restarts(&self) -> usize {
        self.restarts
    }

    /// The results of the last successful [`Self::resolve`].
    pub fn resolution_lists(&self) -> Option<&ResolverLists> {
        self.lists.as_ref()
    }

    pub fn jobs(&self) -> Option<&JobLists> {
        self.lists.as_ref().map(|l| &l.job_lists)
    }

    pub fn into_lists(self) -> Option<ResolverLists> {
        self.lists
    }

    /// Run every phase. Unsatisfiable resolvents are recorded as
    /// `UnableToMake` decisions; only errors that leave no usable plan fail.
    pub fn resolve(&mut self) -> ResolveResult<&ResolverLists> {
        loop {
            tracing::info!("Resolving {} targets (attempt {})", self.targets.len(), self.restarts + 1);
            match self.attempt() {
                Ok(()) => break,
                Err(Interrupt::Fatal(e)) => return Err(e),
                Err(Interrupt::Restart(suggestion)) => self.restart(*suggestion)?,
            }
        }

        tracing::info!("Finding destinations for {} resolutions", self.resolutions.len());
        resolve_destinations(&self.ctx, &mut self.resolutions)?;

        tracing::info!("Building jobs");
        let mut job_lists = build_jobs(&self.resolutions)?;
        resolve_arrows(&mut job_lists, &self.resolutions)?;

        tracing::info!("Ordering {} jobs", job_lists.jobs.len());
        resolve_order(&mut job_lists)?;

        let taken_error_resolvents = self
            .resolutions
            .iter()
            .filter(|r| r.decision.as_ref().is_some_and(|d| d.taken() && d.is_unable()))
            .map(|r| r.resolvent.clone())
            .collect();

        let lists = self.lists.insert(ResolverLists {
            resolutions: std::mem::take(&mut self.resolutions),
            job_lists,
            taken_error_resolvents,
        });
        Ok(lists)
    }

    fn attempt(&mut self) -> Step<()> {
        self.resolutions = Resolutions::new();
        self.pending.clear();
        self.initial.reset();

        for target in self.targets.clone() {
            self.apply_target(&target)?;
        }
        self.resolve_dependencies()
    }

    fn restart(&mut self, suggestion: SuggestRestart) -> ResolveResult<()> {
        self.restarts += 1;
        let SuggestRestart {
            resolvent,
            previous_decision,
            problematic_constraint,
            new_decision,
            preset,
        } = suggestion;
        self.observe(&resolvent, &new_decision);

        let key = (
            resolvent.clone(),
            preset.spec.to_string(),
            preset.use_existing,
        );
        let repeated = !self.seen_restarts.insert(key);
        let over_budget = self.restarts > self.observed.len();
        let over_cap = self
            .ctx
            .config
            .max_restarts
            .is_some_and(|max| self.restarts > max);
        if repeated || over_budget || over_cap {
            return Err(ResolveError::RestartBudgetExhausted {
                resolvent: resolvent.to_string(),
                spec: preset.spec.to_string(),
                restarts: self.restarts,
            });
        }

        tracing::info!(
            "Restarting: {resolvent} had {previous_decision} but '{problematic_constraint}' needs {new_decision}"
        );
        self.initial.add_restart_preset(resolvent, preset);
        tracing::debug!("{} restart presets in force", self.initial.restart_preset_count());
        Ok(())
    }

    fn observe(&mut self, resolvent: &Resolvent, decision: &Decision) {
        let outcome = match decision.chosen_id() {
            Some(id) => id.to_string(),
            None => decision.kind_name().to_string(),
        };
        self.observed.insert((resolvent.clone(), outcome));
    }

    /// The resolution for `resolvent`, created with its initial
    /// constraints if it is new.
    fn resolution_index(&mut self, resolvent: &Resolvent) -> ResolveResult<usize> {
        if let Some(idx) = self.resolutions.index_of(resolvent) {
            return Ok(idx);
        }
        let constraints = self.initial.constraints_for(&self.ctx, resolvent)?;
        tracing::debug!("{resolvent}: new resolution with {} initial constraints", constraints.len());
        Ok(self.resolutions.insert(Resolution::new(resolvent.clone(), constraints)))
    }

    fn apply(&mut self, resolvent: &Resolvent, constraint: Constraint) -> Step<()> {
        let idx = self.resolution_index(resolvent)?;
        let ctx = self.ctx;
        match decider::apply_constraint(&ctx, self.resolutions.at_mut(idx), constraint)? {
            Acceptance::Accepted => {}
            Acceptance::Replaced => {
                tracing::debug!("{resolvent}: decision replaced, adding its dependencies");
                if let Some(decision) = self.resolutions.at(idx).decision.clone() {
                    self.observe(resolvent, &decision);
                }
                self.pending.push(resolvent.clone());
            }
            Acceptance::Unable => tracing::debug!("{resolvent}: no longer decidable"),
            Acceptance::Conflict(suggestion) => return Err(Interrupt::Restart(suggestion)),
        }
        Ok(())
    }

    fn apply_target(&mut self, target: &Target) -> Step<()> {
        match target {
            Target::Spec(spec) => self.apply_target_spec(spec, Reason::Target),
            Target::Set(set) => {
                for spec in self.ctx.env.expand_set(set)? {
                    let reason = Reason::set(set.clone(), Reason::Target)?;
                    self.apply_target_spec(&spec, reason)?;
                }
                Ok(())
            }
        }
    }

    fn apply_target_spec(&mut self, spec: &PackageOrBlockDepSpec, reason: Reason) -> Step<()> {
        let ctx = self.ctx;
        match spec {
            PackageOrBlockDepSpec::Package(package) => {
                let mut resolvents = resolvents_for(&ctx, package, &reason);
                if resolvents.is_empty() {
                    tracing::debug!("nothing matches target '{package}'");
                    resolvents = error_resolvents_for(&ctx, package, &reason);
                }
                for resolvent in resolvents {
                    let constraint = Constraint {
                        spec: spec.clone(),
                        reason: reason.clone(),
                        use_existing: use_existing_for(&ctx, &resolvent, package, &reason),
                        nothing_is_fine_too: false,
                        untaken: false,
                        force_unable: false,
                        destination_type: resolvent.destination_type,
                    };
                    self.apply(&resolvent, constraint)?;
                }
            }
            PackageOrBlockDepSpec::Block(block) => {
                for resolvent in resolvents_for_blocker(&ctx, block) {
                    let constraint = block_constraint(&ctx, spec, block, reason.clone(), &resolvent);
                    self.apply(&resolvent, constraint)?;
                }
            }
        }
        Ok(())
    }

    /// Decide until nothing changes: first everything something needs, then
    /// resolutions that are only suggested.
    fn resolve_dependencies(&mut self) -> Step<()> {
        let ctx = self.ctx;
        for suggestions in [false, true] {
            loop {
                let mut changed = false;
                let mut cursor: Option<Resolvent> = None;
                while let Some(resolvent) = self.resolutions.next_key_after(cursor.as_ref()) {
                    cursor = Some(resolvent.clone());
                    let Some(idx) = self.resolutions.index_of(&resolvent) else {
                        continue;
                    };
                    let resolution = self.resolutions.at(idx);
                    if resolution.decision.is_some() {
                        continue;
                    }
                    if !suggestions && resolution.constraints.all_untaken() {
                        continue;
                    }

                    changed = true;
                    decider::decide(&ctx, self.resolutions.at_mut(idx))?;
                    if let Some(decision) = self.resolutions.at(idx).decision.clone() {
                        self.observe(&resolvent, &decision);
                    }

                    self.pending.push(resolvent);
                    while let Some(next) = self.pending.pop() {
                        self.add_dependencies(&next)?;
                    }
                }
                if !changed {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Turn the dependencies of a taken decision's id into constraints.
    fn add_dependencies(&mut self, resolvent: &Resolvent) -> Step<()> {
        let Some(decision) = self.resolutions.get(resolvent).and_then(|r| r.decision.clone()) else {
            return Ok(());
        };
        let id = match &decision {
            Decision::ChangesToMake {
                origin_id,
                taken: true,
                ..
            } => origin_id.clone(),
            Decision::ExistingNoChange {
                existing_id,
                taken: true,
                ..
            } => existing_id.clone(),
            _ => return Ok(()),
        };

        let ctx = self.ctx;
        let deps = sanitised_dependencies(ctx.env, &id, &mut |dep| {
            self.find_any_score(resolvent, &id, dep)
        })?;

        for dep in deps {
            let interest = interest_in(&ctx, &decision, &id, &dep);
            if interest == Interest::Ignore {
                continue;
            }
            let already_met = already_met(&ctx, &dep);
            let reason = Reason::dependency(resolvent.clone(), id.clone(), dep.clone(), already_met);

            match &dep.spec {
                PackageOrBlockDepSpec::Package(spec) => {
                    let mut resolvents = resolvents_for(&ctx, spec, &reason);
                    if resolvents.is_empty() {
                        tracing::debug!("{resolvent}: nothing matches dependency '{spec}'");
                        resolvents = error_resolvents_for(&ctx, spec, &reason);
                    }
                    for r in resolvents {
                        let constraint = Constraint {
                            spec: dep.spec.clone(),
                            reason: reason.clone(),
                            use_existing: use_existing_for(&ctx, &r, spec, &reason),
                            nothing_is_fine_too: false,
                            untaken: interest == Interest::Untaken,
                            force_unable: false,
                            destination_type: r.destination_type,
                        };
                        self.apply(&r, constraint)?;
                    }
                }
                PackageOrBlockDepSpec::Block(block) => {
                    // Blocking something that does not exist is fine.
                    for r in resolvents_for_blocker(&ctx, block) {
                        let constraint = block_constraint(&ctx, &dep.spec, block, reason.clone(), &r);
                        self.apply(&r, constraint)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// How much we like a leaf of an any-of group picked for `our_id`.
    fn find_any_score(
        &mut self,
        our_resolvent: &Resolvent,
        our_id: &PackageIdRef,
        dep: &SanitisedDependency,
    ) -> ResolveResult<i32> {
        let Some(spec) = dep.spec.as_package() else {
            return Err(ResolveError::internal(format!(
                "blocker '{}' scored inside an any-of group",
                dep.spec
            )));
        };
        let ctx = self.ctx;
        let bias = operator_bias(spec);

        if ctx.any_installed_matching(spec, MatchOptions::default()) {
            return Ok(50 + bias);
        }
        if !spec.choice_requirements.is_empty() && ctx.any_installed_matching(spec, IGNORE_CHOICES) {
            return Ok(40 + bias);
        }

        let reason = Reason::dependency(
            our_resolvent.clone(),
            our_id.clone(),
            dep.clone(),
            already_met(&ctx, dep),
        );
        let resolvents = resolvents_for(&ctx, spec, &reason);
        if resolvents.iter().any(|r| self.resolutions.contains(r)) {
            return Ok(30 + bias);
        }

        for r in &resolvents {
            let mut constraints = self.initial.constraints_for(&ctx, r)?;
            constraints.push(Constraint {
                spec: dep.spec.clone(),
                reason: reason.clone(),
                use_existing: use_existing_for(&ctx, r, spec, &reason),
                nothing_is_fine_too: false,
                untaken: false,
                force_unable: false,
                destination_type: r.destination_type,
            });
            if decider::try_to_find_decision_for(&ctx, r, &constraints)?.is_some() {
                return Ok(20 + bias);
            }
        }

        if !ctx.env.matching_ids(spec, IGNORE_CHOICES).is_empty() {
            return Ok(10 + bias);
        }
        Ok(0)
    }
}

fn block_constraint(
    ctx: &ResolverContext<'_>,
    spec: &PackageOrBlockDepSpec,
    block: &BlockDepSpec,
    reason: Reason,
    resolvent: &Resolvent,
) -> Constraint {
    Constraint {
        spec: spec.clone(),
        reason,
        use_existing: UseExisting::IfPossible,
        nothing_is_fine_too: !ctx.any_installed_matching(&block.blocking, MatchOptions::default()),
        untaken: false,
        force_unable: false,
        destination_type: resolvent.destination_type,
    }
}

/// A package dependency is met when something matching is installed; a
/// block when nothing matching is.
fn already_met(ctx: &ResolverContext<'_>, dep: &SanitisedDependency) -> bool {
    match &dep.spec {
        PackageOrBlockDepSpec::Package(spec) => {
            ctx.any_installed_matching(spec, MatchOptions::default())
        }
        PackageOrBlockDepSpec::Block(block) => {
            !ctx.any_installed_matching(&block.blocking, MatchOptions::default())
        }
    }
}

/// Prefer open-ended requirements, so `|| ( >=foo-2 bar )` still likes foo.
fn operator_bias(spec: &PackageDepSpec) -> i32 {
    let scores = spec.version_requirements.iter().map(|r| match r.operator {
        VersionOperator::Greater | VersionOperator::GreaterEqual => 9,
        VersionOperator::Equal | VersionOperator::Tilde | VersionOperator::EqualStar => 2,
        VersionOperator::Less | VersionOperator::LessEqual => 1,
    });
    let combined = match spec.version_requirements_mode {
        VersionRequirementsMode::And => scores.min(),
        VersionRequirementsMode::Or => scores.max(),
    };
    combined.unwrap_or(9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;
    use pallet_core::universe::Universe;

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
repository = "repo"
build-dependencies = "cat/b"
run-dependencies = "|| ( cat/missing cat/c )"

[[package]]
name = "cat/b"
version = "1"
repository = "repo"

[[package]]
name = "cat/c"
version = "1"
repository = "repo"

[[package]]
name = "cat/c"
version = "1"
repository = "installed"
"#;

    fn resolve(u: &Universe, config: &ResolverConfig, targets: &[&str]) -> ResolverLists {
        let mut resolver = Resolver::new(u, config);
        for t in targets {
            resolver.add(Target::parse(t).unwrap()).unwrap();
        }
        resolver.resolve().unwrap().clone()
    }

    fn decisions(lists: &ResolverLists) -> Vec<String> {
        lists
            .resolutions
            .iter()
            .map(|r| format!("{} = {}", r.resolvent.package, r.decision.as_ref().unwrap().kind_name()))
            .collect()
    }

    #[test]
    fn target_dependencies_are_followed() {
        let u = Universe::from_toml_str(UNIVERSE).unwrap();
        let config = ResolverConfig::default();
        let lists = resolve(&u, &config, &["cat/a"]);
        assert_eq!(
            decisions(&lists),
            vec![
                "cat/a = changes_to_make",
                "cat/b = changes_to_make",
                "cat/c = existing_no_change",
            ]
        );
        assert!(!lists.has_errors());
    }

    #[test]
    fn build_dependency_is_installed_first() {
        let u = Universe::from_toml_str(UNIVERSE).unwrap();
        let config = ResolverConfig::default();
        let lists = resolve(&u, &config, &["cat/a"]);
        let ordered: Vec<&str> = lists
            .job_lists
            .ordered_job_ids
            .iter()
            .map(|id| id.as_str())
            .collect();
        let pos = |s: &str| ordered.iter().position(|x| *x == s).unwrap();
        assert!(pos("u:cat/b:0 -> install_to_slash") < pos("i:cat/a:0 -> install_to_slash"));
    }

    #[test]
    fn unknown_target_is_recorded_not_fatal() {
        let u = Universe::from_toml_str(UNIVERSE).unwrap();
        let config = ResolverConfig::default();
        let lists = resolve(&u, &config, &["cat/nope"]);
        assert_eq!(lists.taken_error_resolvents.len(), 1);
        let error_id = &lists.job_lists.error_job_ids[0];
        assert!(matches!(
            lists.job_lists.jobs.get(error_id).map(|j| &j.kind),
            Some(JobKind::Error(_))
        ));
    }

    #[test]
    fn unknown_set_is_an_error() {
        let u = Universe::from_toml_str(UNIVERSE).unwrap();
        let config = ResolverConfig::default();
        let mut resolver = Resolver::new(&u, &config);
        assert!(resolver.add_target_set(SetName::new("world").unwrap()).is_err());
    }

    #[test]
    fn targets_parse() {
        assert_eq!(
            Target::parse("@world").unwrap(),
            Target::Set(SetName::new("world").unwrap())
        );
        assert!(matches!(
            Target::parse("!cat/a").unwrap(),
            Target::Spec(PackageOrBlockDepSpec::Block(_))
        ));
        assert!(Target::parse("not a spec").is_err());
    }

    #[test]
    fn operator_bias_prefers_open_ranges() {
        let bias = |s: &str| operator_bias(&PackageDepSpec::parse(s).unwrap());
        assert_eq!(bias("cat/a"), 9);
        assert_eq!(bias(">=cat/a-1"), 9);
        assert_eq!(bias("=cat/a-1"), 2);
        assert_eq!(bias("<cat/a-1"), 1);
        assert_eq!(bias("cat/a[>=1&<2]"), 1);
        assert_eq!(bias("cat/a[=1|>2]"), 9);
    }
}
