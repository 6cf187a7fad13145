//! Spec layer: YAML job documents + validated in-memory structures.
//!
//! This module is intentionally separate from planning and execution.
//! It owns:
//! - raw document shapes (serde-friendly)
//! - the validated, immutable `JobSpec`
//! - loading with strict or lenient top-level key handling

pub mod load;
pub mod model;
pub mod raw;
pub mod types;
pub mod validate;

pub use load::{KeyPolicy, LoadOptions, load_file, load_str, parse_document};
pub use model::{
    ComputationPolicy, JobSpec, MaskSpec, OutputGrid, OutputProductSpec, SourceSpec,
    TimeWindowing,
};
pub use raw::RawJobDoc;
pub use validate::{Validated, ValidationContext};
