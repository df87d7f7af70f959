//! Jobs: the orderable units of an execution plan.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use pallet_core::name::RepositoryName;
use pallet_core::package_id::PackageIdRef;

use crate::error::{ResolveError, ResolveResult};
use crate::reason::Reason;
use crate::resolvent::Resolvent;

/// Stable job identifier, e.g. `i:cat/a:0 -> install_to_slash`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn pretend(r: &Resolvent) -> Self {
        Self(format!("p:{r}"))
    }

    pub fn fetch(r: &Resolvent) -> Self {
        Self(format!("f:{r}"))
    }

    pub fn install(r: &Resolvent) -> Self {
        Self(format!("i:{r}"))
    }

    pub fn usable(r: &Resolvent) -> Self {
        Self(format!("u:{r}"))
    }

    pub fn error(r: &Resolvent) -> Self {
        Self(format!("e:{r}"))
    }

    pub fn untaken(r: &Resolvent) -> Self {
        Self(format!("n:{r}"))
    }

    pub fn usable_group(n: usize) -> Self {
        Self(format!("g:{n}"))
    }

    pub fn sync_point(s: SyncPoint) -> Self {
        Self(format!("s:{}", s.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPoint {
    DonePretends,
    DoneInstalls,
}

impl SyncPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncPoint::DonePretends => "done_pretends",
            SyncPoint::DoneInstalls => "done_installs",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        [SyncPoint::DonePretends, SyncPoint::DoneInstalls]
            .into_iter()
            .find(|p| p.as_str() == s)
    }
}

/// The executable unit a pretend, fetch or install job carries.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    Pretend {
        origin_id: PackageIdRef,
    },
    Fetch {
        origin_id: PackageIdRef,
    },
    Install {
        origin_id: PackageIdRef,
        destination: RepositoryName,
        replacing: Vec<PackageIdRef>,
    },
    Uninstall {
        ids: Vec<PackageIdRef>,
    },
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Pretend { origin_id } => write!(f, "pretend {origin_id}"),
            WorkItem::Fetch { origin_id } => write!(f, "fetch {origin_id}"),
            WorkItem::Install {
                origin_id,
                destination,
                replacing,
            } => {
                write!(f, "install {origin_id} to ::{destination}")?;
                if !replacing.is_empty() {
                    write!(f, " replacing {}", join_ids(replacing))?;
                }
                Ok(())
            }
            WorkItem::Uninstall { ids } => write!(f, "uninstall {}", join_ids(ids)),
        }
    }
}

fn join_ids(ids: &[PackageIdRef]) -> String {
    ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

/// An ordering edge: the owning job comes after `comes_after`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrow {
    pub comes_after: JobId,
    /// The edge may be dropped to break a cycle, since what it waits for
    /// was already in place.
    pub ignorable_if_satisfied: bool,
    pub reason: Option<Reason>,
}

impl Arrow {
    pub fn new(comes_after: JobId) -> Self {
        Self {
            comes_after,
            ignorable_if_satisfied: false,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PretendJob {
    pub resolvent: Resolvent,
    pub work_item: WorkItem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    pub resolvent: Resolvent,
    pub work_item: WorkItem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleInstallJob {
    pub resolvent: Resolvent,
    pub work_item: WorkItem,
}

/// The point after which a resolvent's result can be relied upon.
#[derive(Debug, Clone, PartialEq)]
pub struct UsableJob {
    pub resolvent: Resolvent,
}

/// Usable jobs that depend on each other at run time and become usable
/// together.
#[derive(Debug, Clone, PartialEq)]
pub struct UsableGroupJob {
    pub job_ids: Vec<JobId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorJob {
    pub resolvent: Resolvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UntakenInstallJob {
    pub resolvent: Resolvent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncPointJob {
    pub sync_point: SyncPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    Pretend(PretendJob),
    Fetch(FetchJob),
    SimpleInstall(SimpleInstallJob),
    Usable(UsableJob),
    UsableGroup(UsableGroupJob),
    Error(ErrorJob),
    UntakenInstall(UntakenInstallJob),
    SyncPoint(SyncPointJob),
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Pretend(_) => PretendJob::NAME,
            JobKind::Fetch(_) => FetchJob::NAME,
            JobKind::SimpleInstall(_) => SimpleInstallJob::NAME,
            JobKind::Usable(_) => UsableJob::NAME,
            JobKind::UsableGroup(_) => UsableGroupJob::NAME,
            JobKind::Error(_) => ErrorJob::NAME,
            JobKind::UntakenInstall(_) => UntakenInstallJob::NAME,
            JobKind::SyncPoint(_) => SyncPointJob::NAME,
        }
    }

    /// The resolvent this job belongs to, if it belongs to exactly one.
    pub fn resolvent(&self) -> Option<&Resolvent> {
        match self {
            JobKind::Pretend(j) => Some(&j.resolvent),
            JobKind::Fetch(j) => Some(&j.resolvent),
            JobKind::SimpleInstall(j) => Some(&j.resolvent),
            JobKind::Usable(j) => Some(&j.resolvent),
            JobKind::Error(j) => Some(&j.resolvent),
            JobKind::UntakenInstall(j) => Some(&j.resolvent),
            JobKind::UsableGroup(_) | JobKind::SyncPoint(_) => None,
        }
    }

    pub fn work_item(&self) -> Option<&WorkItem> {
        match self {
            JobKind::Pretend(j) => Some(&j.work_item),
            JobKind::Fetch(j) => Some(&j.work_item),
            JobKind::SimpleInstall(j) => Some(&j.work_item),
            _ => None,
        }
    }
}

/// Typed access to one kind of job.
pub trait JobVariant: Sized {
    const NAME: &'static str;
    fn from_kind(kind: &JobKind) -> Option<&Self>;
}

macro_rules! job_variant {
    ($ty:ident, $variant:ident, $name:literal) => {
        impl JobVariant for $ty {
            const NAME: &'static str = $name;

            fn from_kind(kind: &JobKind) -> Option<&Self> {
                match kind {
                    JobKind::$variant(j) => Some(j),
                    _ => None,
                }
            }
        }
    };
}

job_variant!(PretendJob, Pretend, "pretend");
job_variant!(FetchJob, Fetch, "fetch");
job_variant!(SimpleInstallJob, SimpleInstall, "simple install");
job_variant!(UsableJob, Usable, "usable");
job_variant!(UsableGroupJob, UsableGroup, "usable group");
job_variant!(ErrorJob, Error, "error");
job_variant!(UntakenInstallJob, UntakenInstall, "untaken install");
job_variant!(SyncPointJob, SyncPoint, "sync point");

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub arrows: Vec<Arrow>,
}

impl Job {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            arrows: Vec::new(),
        }
    }

    /// Add an arrow. A second arrow to the same job only makes the existing
    /// one harder to ignore.
    pub fn add_arrow(&mut self, arrow: Arrow) {
        match self.arrows.iter_mut().find(|a| a.comes_after == arrow.comes_after) {
            Some(existing) => {
                existing.ignorable_if_satisfied &= arrow.ignorable_if_satisfied;
            }
            None => self.arrows.push(arrow),
        }
    }
}

/// Jobs in insertion order, indexed by id and by resolvent.
#[derive(Debug, Clone, Default)]
pub struct Jobs {
    jobs: Vec<Job>,
    by_id: HashMap<JobId, usize>,
    by_resolvent: BTreeMap<Resolvent, Vec<usize>>,
}

impl Jobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, job: Job) -> ResolveResult<()> {
        if self.by_id.contains_key(&job.id) {
            return Err(ResolveError::DuplicateJob {
                id: job.id.to_string(),
            });
        }
        let idx = self.jobs.len();
        self.by_id.insert(job.id.clone(), idx);
        if let Some(r) = job.kind.resolvent() {
            self.by_resolvent.entry(r.clone()).or_default().push(idx);
        }
        self.jobs.push(job);
        Ok(())
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.by_id.get(id).map(|&i| &self.jobs[i])
    }

    pub fn get_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.by_id.get(id).map(|&i| &mut self.jobs[i])
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.by_id.contains_key(id)
    }

    /// The job `id` as a `T`, failing when it is some other kind of job.
    pub fn fetch_as<T: JobVariant>(&self, id: &JobId) -> ResolveResult<&T> {
        let job = self
            .get(id)
            .ok_or_else(|| ResolveError::internal(format!("no job with id '{id}'")))?;
        T::from_kind(&job.kind).ok_or_else(|| ResolveError::JobKindMismatch {
            id: id.to_string(),
            expected: T::NAME,
            actual: job.kind.name(),
        })
    }

    /// Jobs belonging to `resolvent`, in insertion order.
    pub fn for_resolvent(&self, resolvent: &Resolvent) -> impl Iterator<Item = &Job> {
        self.by_resolvent
            .get(resolvent)
            .into_iter()
            .flatten()
            .map(|&i| &self.jobs[i])
    }

    pub fn find_id_for_usable(&self, resolvent: &Resolvent) -> Option<JobId> {
        self.for_resolvent(resolvent)
            .find(|j| matches!(j.kind, JobKind::Usable(_)))
            .map(|j| j.id.clone())
    }

    /// The job after which `resolvent` counts as installed: its error or
    /// install job, else its usable job.
    pub fn find_id_for_installed(&self, resolvent: &Resolvent) -> ResolveResult<JobId> {
        self.for_resolvent(resolvent)
            .find(|j| matches!(j.kind, JobKind::Error(_) | JobKind::SimpleInstall(_)))
            .map(|j| j.id.clone())
            .or_else(|| self.find_id_for_usable(resolvent))
            .ok_or_else(|| ResolveError::internal(format!("no installed job for {resolvent}")))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl<'a> IntoIterator for &'a Jobs {
    type Item = &'a Job;
    type IntoIter = std::slice::Iter<'a, Job>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pallet_core::repository::DestinationType;

    fn resolvent(pkg: &str) -> Resolvent {
        Resolvent::new(
            pkg.parse().unwrap(),
            Some("0".parse().unwrap()),
            DestinationType::InstallToSlash,
        )
    }

    #[test]
    fn job_ids() {
        let r = resolvent("cat/a");
        assert_eq!(JobId::install(&r).as_str(), "i:cat/a:0 -> install_to_slash");
        assert_eq!(JobId::usable_group(2).as_str(), "g:2");
        assert_eq!(
            JobId::sync_point(SyncPoint::DoneInstalls).as_str(),
            "s:done_installs"
        );
    }

    #[test]
    fn duplicate_jobs_are_rejected() {
        let r = resolvent("cat/a");
        let mut jobs = Jobs::new();
        let usable = || Job::new(JobId::usable(&r), JobKind::Usable(UsableJob { resolvent: r.clone() }));
        jobs.add(usable()).unwrap();
        assert!(matches!(
            jobs.add(usable()),
            Err(ResolveError::DuplicateJob { .. })
        ));
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn typed_lookup() {
        let r = resolvent("cat/a");
        let mut jobs = Jobs::new();
        jobs.add(Job::new(
            JobId::sync_point(SyncPoint::DonePretends),
            JobKind::SyncPoint(SyncPointJob {
                sync_point: SyncPoint::DonePretends,
            }),
        ))
        .unwrap();
        jobs.add(Job::new(JobId::usable(&r), JobKind::Usable(UsableJob { resolvent: r.clone() })))
            .unwrap();

        let usable = jobs.fetch_as::<UsableJob>(&JobId::usable(&r)).unwrap();
        assert_eq!(usable.resolvent, r);
        match jobs.fetch_as::<ErrorJob>(&JobId::usable(&r)) {
            Err(ResolveError::JobKindMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, "error");
                assert_eq!(actual, "usable");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(jobs.fetch_as::<UsableJob>(&JobId::new("u:nothing")).is_err());
    }

    #[test]
    fn installed_falls_back_to_usable() {
        let a = resolvent("cat/a");
        let b = resolvent("cat/b");
        let mut jobs = Jobs::new();
        jobs.add(Job::new(JobId::usable(&a), JobKind::Usable(UsableJob { resolvent: a.clone() })))
            .unwrap();
        jobs.add(Job::new(JobId::error(&b), JobKind::Error(ErrorJob { resolvent: b.clone() })))
            .unwrap();
        assert_eq!(jobs.find_id_for_installed(&a).unwrap(), JobId::usable(&a));
        assert_eq!(jobs.find_id_for_installed(&b).unwrap(), JobId::error(&b));
        assert!(jobs.find_id_for_usable(&b).is_none());
        assert!(jobs.find_id_for_installed(&resolvent("cat/c")).is_err());
    }

    #[test]
    fn arrows_are_not_duplicated() {
        let r = resolvent("cat/a");
        let mut job = Job::new(JobId::usable(&r), JobKind::Usable(UsableJob { resolvent: r.clone() }));
        let ignorable = || Arrow {
            ignorable_if_satisfied: true,
            ..Arrow::new(JobId::install(&r))
        };
        job.add_arrow(ignorable());
        job.add_arrow(ignorable());
        assert_eq!(job.arrows.len(), 1);
        assert!(job.arrows[0].ignorable_if_satisfied);
        job.add_arrow(Arrow::new(JobId::install(&r)));
        assert_eq!(job.arrows.len(), 1);
        assert!(!job.arrows[0].ignorable_if_satisfied);
    }
}
