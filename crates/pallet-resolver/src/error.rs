use miette::Diagnostic;
use pallet_util::errors::PalletError;
use thiserror::Error;

/// Fatal resolver failures. Unsatisfiable resolvents are not errors: they
/// are recorded as `UnableToMake` decisions and `resolve()` still returns.
#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    /// Jobs that cannot be ordered even after relaxing every ignorable arrow.
    #[error("Unbreakable dependency cycle involving {}", resolvents.join(", "))]
    #[diagnostic(help("Remaining jobs: {}", jobs.join(", ")))]
    UnbreakableCycle {
        resolvents: Vec<String>,
        jobs: Vec<String>,
    },

    /// A taken install has no repository to go to.
    #[error("No suitable destination for '{id}' ({resolvent})")]
    #[diagnostic(help("Add an installed repository for this destination type to the universe"))]
    NoDestination { resolvent: String, id: String },

    /// Restart suggestions kept coming without narrowing the problem.
    #[error("Gave up after {restarts} restarts; the last one was for {resolvent} with '{spec}'")]
    RestartBudgetExhausted {
        resolvent: String,
        spec: String,
        restarts: usize,
    },

    #[error("Internal consistency error: {message}")]
    InternalConsistency { message: String },

    /// A reason chain would loop back on itself or grow without bound.
    #[error("Reason chain for {reason} revisits itself or is too deep")]
    ReasonCycle { reason: String },

    #[error("Job '{id}' is a {actual} job, not a {expected} job")]
    JobKindMismatch {
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Job '{id}' was added twice")]
    DuplicateJob { id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Collaborator(#[from] PalletError),
}

impl ResolveError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalConsistency {
            message: message.into(),
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;
