use crate::catalog::{Catalog, ProductDefinition};
use crate::error::{JobError, JobResult};

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

/// Catalog backed by product definition documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentCatalog {
    products: BTreeMap<String, ProductDefinition>,
}

impl DocumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Re-adding an identical definition is a no-op; a
    /// different definition under an existing name is rejected.
    pub fn add(&mut self, definition: ProductDefinition) -> JobResult<()> {
        let mut seen = BTreeSet::new();
        for m in &definition.measurements {
            if !seen.insert(m.name.as_str()) {
                return Err(JobError::CatalogResolution {
                    path: format!("product {}", definition.name),
                    message: format!("duplicate measurement {:?}", m.name),
                });
            }
        }

        if let Some(existing) = self.products.get(&definition.name) {
            if existing != &definition {
                return Err(JobError::CatalogResolution {
                    path: format!("product {}", definition.name),
                    message: "a different definition with this name is already loaded".to_string(),
                });
            }
            debug!(product = %definition.name, "identical product definition already loaded");
            return Ok(());
        }

        self.products.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Load every document of a (possibly multi-document) YAML stream.
    ///
    /// Documents that are not valid product definitions are logged and
    /// skipped. Returns the number of definitions accepted.
    pub fn load_str(&mut self, text: &str, origin: &str) -> JobResult<usize> {
        let mut accepted = 0;
        for (i, doc) in serde_yaml::Deserializer::from_str(text).enumerate() {
            match ProductDefinition::deserialize(doc) {
                Ok(def) => {
                    self.add(def)?;
                    accepted += 1;
                }
                Err(e) => {
                    error!(origin, document = i, error = %e, "invalid product definition, skipping");
                }
            }
        }
        Ok(accepted)
    }

    pub fn load_file(&mut self, path: &Path) -> JobResult<usize> {
        let text = fs::read_to_string(path).map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let n = self.load_str(&text, &path.display().to_string())?;
        info!(path = %path.display(), products = n, "loaded product definitions");
        Ok(n)
    }

    pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> JobResult<Self> {
        let mut catalog = Self::new();
        for p in paths {
            catalog.load_file(p.as_ref())?;
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Catalog for DocumentCatalog {
    fn product(&self, name: &str) -> Option<&ProductDefinition> {
        self.products.get(name)
    }

    fn product_names(&self) -> Vec<&str> {
        self.products.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FlagBits;
    use crate::spec::types::{DType, FlagValue, Nodata};
    use pretty_assertions::assert_eq;

    const PQ: &str = r#"
name: ls8_pq_albers
metadata_type: eo
measurements:
  - name: pixelquality
    dtype: int16
    nodata: 0
    units: bit_field
    flags_definition:
      contiguous:
        bits: 8
        values: {0: false, 1: true}
      cloud_acca:
        bits: [10]
        values: {0: cloud, 1: no_cloud}
---
name: broken
measurements: 7
---
name: ls8_nbar_albers
measurements:
  - {name: red, dtype: int16, nodata: -999}
"#;

    #[test]
    fn loads_multi_document_stream_and_skips_invalid() {
        let mut cat = DocumentCatalog::new();
        assert_eq!(cat.load_str(PQ, "inline").unwrap(), 2);
        assert_eq!(cat.product_names(), vec!["ls8_nbar_albers", "ls8_pq_albers"]);

        let pq = cat.product("ls8_pq_albers").unwrap();
        let m = pq.measurement("pixelquality").unwrap();
        assert_eq!(m.dtype, DType::Int16);
        assert_eq!(m.nodata, Nodata::Value(0.0));

        let contiguous = m.flag("contiguous").unwrap();
        assert_eq!(contiguous.bits, FlagBits::Single(8));
        assert!(contiguous.accepts(&FlagValue::Bool(true)));
        assert!(!contiguous.accepts(&FlagValue::Category("yes".into())));

        let cloud = m.flag("cloud_acca").unwrap();
        assert_eq!(cloud.domain(), vec!["cloud", "no_cloud"]);
    }

    #[test]
    fn identical_readd_is_noop_but_conflict_fails() {
        let mut cat = DocumentCatalog::new();
        cat.load_str(PQ, "a").unwrap();
        cat.load_str(PQ, "b").unwrap();
        assert_eq!(cat.len(), 2);

        let changed = "name: ls8_nbar_albers\nmeasurements:\n  - {name: red, dtype: int32, nodata: -999}\n";
        let err = cat.load_str(changed, "c").unwrap_err();
        assert!(matches!(err, JobError::CatalogResolution { .. }));
    }

    #[test]
    fn duplicate_measurement_rejected() {
        let mut cat = DocumentCatalog::new();
        let doc = "name: p\nmeasurements:\n  - {name: a, dtype: uint8, nodata: 0}\n  - {name: a, dtype: uint8, nodata: 0}\n";
        assert!(cat.load_str(doc, "dup").is_err());
        assert!(cat.is_empty());
    }
}
