//! Validation and planning for temporal statistics jobs.
//!
//! A job document names imagery sources with quality masks, a time
//! windowing policy, an output grid and a list of output products. This
//! crate parses and validates such documents against a product catalog
//! and function registries, generates time windows, renders per-unit
//! output paths and defines the contract for executing the resulting plan.

pub mod catalog;
pub mod compare;
pub mod diagnostics;
pub mod error;
pub mod plan;
pub mod registry;
pub mod run;
pub mod spec;
pub mod template;
pub mod windows;

pub use error::{JobError, JobResult, UnitError};
pub use spec::{JobSpec, KeyPolicy, LoadOptions, Validated, ValidationContext};
