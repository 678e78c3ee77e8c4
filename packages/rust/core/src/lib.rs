//! Core pipeline orchestration for ochub.
//!
//! This crate ties together the registry, source materialization, packing,
//! and conversion into the two batch stages (`fetch`, `build`) and the
//! end-to-end `run`, plus publishing of the `latest` alias.

pub mod build;
pub mod pipeline;
pub mod progress;
pub mod publish;

#[cfg(test)]
mod testing;
