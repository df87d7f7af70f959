//! Package model for the pallet resolver.
//!
//! Everything the resolver asks about packages goes through the
//! [`environment::Environment`] trait; [`universe::Universe`] is the
//! in-memory implementation loaded from TOML.

pub mod config;
pub mod dep_spec;
pub mod dep_tree;
pub mod environment;
pub mod name;
pub mod package_id;
pub mod repository;
pub mod universe;
pub mod version;
