//! Dependency resolution engine: decides what happens to every package a
//! set of targets pulls in, then orders the resulting jobs.
//!
//! [`resolver::Resolver`] is the entry point. Its results can be written
//! out and read back with [`serialise`], or rendered with [`dump`].

pub mod constraint;
pub mod context;
pub mod decider;
pub mod decision;
pub mod destinations;
pub mod dump;
pub mod error;
pub mod graph;
pub mod initial_constraints;
pub mod interest;
pub mod job;
pub mod orderer;
pub mod reason;
pub mod resolution;
pub mod resolvent;
pub mod resolvents;
pub mod resolver;
pub mod sameness;
pub mod sanitised;
pub mod serialise;
pub mod use_existing;

pub use decision::Decision;
pub use error::{ResolveError, ResolveResult};
pub use orderer::JobLists;
pub use resolvent::Resolvent;
pub use resolver::{Resolver, ResolverLists, Target};
