//! Shared utilities for the pallet resolver.
//!
//! This crate provides cross-cutting concerns used by the other pallet
//! crates: the collaborator error type, filesystem helpers and terminal
//! status output.

pub mod errors;
pub mod fs;
pub mod progress;
