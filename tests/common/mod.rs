#![allow(dead_code)]

use statsjob::catalog::DocumentCatalog;
use statsjob::registry::{FuseRegistry, StatisticRegistry};
use statsjob::spec::{self, LoadOptions, Validated, ValidationContext};
use statsjob::JobResult;

pub const PRODUCTS: &str = include_str!("../fixtures/products.yaml");
pub const SEASONAL_MEAN: &str = include_str!("../fixtures/seasonal_mean.yaml");

pub struct Fixture {
    pub catalog: DocumentCatalog,
    pub statistics: StatisticRegistry,
    pub fusers: FuseRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        let mut catalog = DocumentCatalog::new();
        catalog
            .load_str(PRODUCTS, "products.yaml")
            .expect("fixture catalog loads");
        Self {
            catalog,
            statistics: StatisticRegistry::builtin(),
            fusers: FuseRegistry::builtin(),
        }
    }

    pub fn ctx(&self) -> ValidationContext<'_> {
        ValidationContext {
            catalog: &self.catalog,
            statistics: &self.statistics,
            fusers: &self.fusers,
        }
    }

    pub fn load(&self, text: &str) -> JobResult<Validated> {
        self.load_with(text, LoadOptions::default())
    }

    pub fn load_with(&self, text: &str, options: LoadOptions) -> JobResult<Validated> {
        spec::load_str(text, "test", options, self.ctx())
    }
}

/// Replace the first occurrence of `from` in the seasonal fixture.
pub fn seasonal_with(from: &str, to: &str) -> String {
    assert!(SEASONAL_MEAN.contains(from), "fixture does not contain {:?}", from);
    SEASONAL_MEAN.replacen(from, to, 1)
}
