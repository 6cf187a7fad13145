//! Imagery catalog capability.
//!
//! Validation only needs to know which products exist, which measurements
//! they carry and what quality flags those measurements define. The real
//! catalog is external; [`DocumentCatalog`] serves product definitions
//! loaded from YAML files.

pub mod document;
pub mod product;

pub use document::DocumentCatalog;
pub use product::{FlagBits, FlagDefinition, MeasurementDefinition, ProductDefinition};

pub trait Catalog: Send + Sync {
    fn product(&self, name: &str) -> Option<&ProductDefinition>;

    fn product_names(&self) -> Vec<&str>;
}
