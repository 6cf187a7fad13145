//! Name-to-capability registries for statistics and fuse functions.
//!
//! Documents refer to both by free-form names. Resolving them at load time
//! turns a late lookup failure into a validation error.

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// A temporal reducer the statistics engine can run.
pub trait Reducer: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Measurement names written for the given input measurements.
    fn output_measurements(&self, inputs: &[String]) -> Vec<String> {
        inputs.to_vec()
    }
}

#[derive(Debug)]
struct Builtin(&'static str);

impl Reducer for Builtin {
    fn name(&self) -> &str {
        self.0
    }
}

/// `percentile_N`: one output band per input, suffixed `_PC_N`.
#[derive(Debug)]
pub struct Percentile {
    q: u8,
    name: String,
}

impl Percentile {
    pub fn new(q: u8) -> Option<Self> {
        (q <= 100).then(|| Self {
            q,
            name: format!("percentile_{}", q),
        })
    }
}

impl Reducer for Percentile {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_measurements(&self, inputs: &[String]) -> Vec<String> {
        inputs
            .iter()
            .map(|m| format!("{}_PC_{}", m, self.q))
            .collect()
    }
}

static PERCENTILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^percentile_(\d{1,3})$").expect("percentile regex is valid"));

#[derive(Debug, Clone)]
pub struct StatisticRegistry {
    reducers: BTreeMap<String, Arc<dyn Reducer>>,
    percentiles: bool,
}

impl StatisticRegistry {
    /// Empty registry without the percentile family.
    pub fn empty() -> Self {
        Self {
            reducers: BTreeMap::new(),
            percentiles: false,
        }
    }

    pub fn builtin() -> Self {
        let mut reg = Self::empty();
        for name in ["mean", "medoid", "geomedian", "min", "max", "std"] {
            reg.register(Arc::new(Builtin(name)));
        }
        reg.percentiles = true;
        reg
    }

    pub fn register(&mut self, reducer: Arc<dyn Reducer>) {
        self.reducers.insert(reducer.name().to_string(), reducer);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Reducer>> {
        if let Some(r) = self.reducers.get(name) {
            return Some(Arc::clone(r));
        }
        if !self.percentiles {
            return None;
        }
        let caps = PERCENTILE_RE.captures(name)?;
        let q: u8 = caps[1].parse().ok()?;
        Percentile::new(q).map(|p| Arc::new(p) as Arc<dyn Reducer>)
    }

    pub fn known_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.reducers.keys().cloned().collect();
        if self.percentiles {
            names.push("percentile_N (0..=100)".to_string());
        }
        names
    }
}

impl Default for StatisticRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Merges two same-day observations of a quality measurement.
pub trait Fuser: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Fuse `src` into `dest` for one pixel.
    fn fuse(&self, dest: u64, src: u64, nodata: Option<u64>) -> u64;
}

/// Pixel-quality fuser: takes `src` where `dest` is not contiguous and
/// ANDs the quality bits where both are.
#[derive(Debug)]
pub struct PqFuser;

const PQ_CONTIGUOUS_BIT: u64 = 1 << 8;

impl Fuser for PqFuser {
    fn name(&self) -> &str {
        "datacube.helpers.ga_pq_fuser"
    }

    fn fuse(&self, dest: u64, src: u64, _nodata: Option<u64>) -> u64 {
        if dest & PQ_CONTIGUOUS_BIT == 0 {
            src
        } else if src & PQ_CONTIGUOUS_BIT != 0 {
            dest & src
        } else {
            dest
        }
    }
}

/// First valid observation wins.
#[derive(Debug)]
pub struct FirstValidFuser;

impl Fuser for FirstValidFuser {
    fn name(&self) -> &str {
        "datacube.helpers.none_fuser"
    }

    fn fuse(&self, dest: u64, src: u64, nodata: Option<u64>) -> u64 {
        match nodata {
            Some(nd) if dest == nd => src,
            _ => dest,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuseRegistry {
    fusers: BTreeMap<String, Arc<dyn Fuser>>,
    default: String,
}

impl FuseRegistry {
    pub fn builtin() -> Self {
        let mut reg = Self {
            fusers: BTreeMap::new(),
            default: FirstValidFuser.name().to_string(),
        };
        reg.register(Arc::new(PqFuser));
        reg.register(Arc::new(FirstValidFuser));
        reg
    }

    pub fn register(&mut self, fuser: Arc<dyn Fuser>) {
        self.fusers.insert(fuser.name().to_string(), fuser);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Fuser>> {
        self.fusers.get(name).cloned()
    }

    /// Name used when a mask omits `fuse_func`.
    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn known_names(&self) -> Vec<String> {
        self.fusers.keys().cloned().collect()
    }
}

impl Default for FuseRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resolves_builtins_and_percentiles() {
        let reg = StatisticRegistry::builtin();
        assert_eq!(reg.resolve("mean").unwrap().name(), "mean");
        assert_eq!(reg.resolve("percentile_0").unwrap().name(), "percentile_0");
        assert_eq!(reg.resolve("percentile_100").unwrap().name(), "percentile_100");
        assert!(reg.resolve("percentile_101").is_none());
        assert!(reg.resolve("percentile_").is_none());
        assert!(reg.resolve("median").is_none());
    }

    #[test]
    fn percentile_outputs_are_suffixed() {
        let reg = StatisticRegistry::builtin();
        let p = reg.resolve("percentile_10").unwrap();
        let inputs = vec!["red".to_string(), "nir".to_string()];
        assert_eq!(p.output_measurements(&inputs), vec!["red_PC_10", "nir_PC_10"]);
        assert_eq!(reg.resolve("medoid").unwrap().output_measurements(&inputs), inputs);
    }

    #[test]
    fn empty_registry_knows_nothing() {
        let mut reg = StatisticRegistry::empty();
        assert!(reg.resolve("percentile_50").is_none());
        reg.register(Arc::new(Percentile::new(50).unwrap()));
        assert!(reg.resolve("percentile_50").is_some());
        assert!(reg.resolve("percentile_90").is_none());
    }

    #[test]
    fn pq_fuser_prefers_contiguous() {
        let f = PqFuser;
        let contiguous_clear = PQ_CONTIGUOUS_BIT | 0b1111;
        let contiguous_cloudy = PQ_CONTIGUOUS_BIT | 0b0101;
        assert_eq!(f.fuse(0, contiguous_clear, None), contiguous_clear);
        assert_eq!(f.fuse(contiguous_clear, 0b1111, None), contiguous_clear);
        assert_eq!(
            f.fuse(contiguous_clear, contiguous_cloudy, None),
            contiguous_cloudy
        );
    }

    #[test]
    fn first_valid_fuser() {
        let f = FirstValidFuser;
        assert_eq!(f.fuse(0, 7, Some(0)), 7);
        assert_eq!(f.fuse(3, 7, Some(0)), 3);
        assert_eq!(f.fuse(0, 7, None), 0);
    }

    #[test]
    fn fuse_registry_lookup() {
        let reg = FuseRegistry::builtin();
        assert!(reg.resolve("datacube.helpers.ga_pq_fuser").is_some());
        assert!(reg.resolve(reg.default_name()).is_some());
        assert!(reg.resolve("my.custom.fuser").is_none());
    }
}
