//! Shared test utilities for the instrumentation library.
//!
//! This crate provides:
//! - Proptest generators for statuses, identities and field names
//! - Recording and failing exporters and metric sinks
//! - Validation-error documents as served by upstream services

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
