//! Validated, fully defaulted job model.
//!
//! A [`JobSpec`] is only ever produced by validation and is never mutated
//! afterwards; workers receive it by shared reference.

use crate::spec::raw::{
    RawComputation, RawDateRanges, RawJobDoc, RawMask, RawOutputProduct, RawSource, RawStorage,
};
use crate::spec::types::{
    DType, Dim, DurationExpr, FlagValue, Nodata, OnExisting, OnUnresolved, PartialWindow,
    StorageChunking, XY,
};
use crate::template::PathTemplate;

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub sources: Vec<SourceSpec>,
    pub date_ranges: TimeWindowing,
    pub storage: OutputGrid,
    pub computation: ComputationPolicy,
    pub output_products: Vec<OutputProductSpec>,
    pub location: PathBuf,
    pub on_existing_output: OnExisting,
    pub on_unresolved_source: OnUnresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub product: String,
    pub measurements: Vec<String>,
    pub group_by: String,
    pub masks: Vec<MaskSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaskSpec {
    pub product: String,
    pub measurement: String,
    pub group_by: String,
    pub fuse_func: String,
    pub flags: BTreeMap<String, FlagValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindowing {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub stats_duration: DurationExpr,
    pub step_size: DurationExpr,
    pub partial_window: PartialWindow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputGrid {
    pub driver: String,
    pub crs: String,
    pub tile_size: XY<f64>,
    pub resolution: XY<f64>,
    pub chunking: StorageChunking,
    pub dimension_order: [Dim; 3],
}

/// In-memory processing block shape; independent of on-disk chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputationPolicy {
    pub chunking: XY<u32>,
}

impl Default for ComputationPolicy {
    fn default() -> Self {
        Self {
            chunking: XY { x: 1000, y: 1000 },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputProductSpec {
    pub name: String,
    pub statistic: String,
    pub zlib: bool,
    pub fletcher32: bool,
    pub dtype: DType,
    pub nodata: Nodata,
    pub file_path_template: PathTemplate,
}

impl JobSpec {
    /// All source measurement names in document order, without duplicates.
    pub fn input_measurements(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for source in &self.sources {
            for m in &source.measurements {
                if !out.contains(m) {
                    out.push(m.clone());
                }
            }
        }
        out
    }

    pub fn output_product(&self, name: &str) -> Option<&OutputProductSpec> {
        self.output_products.iter().find(|p| p.name == name)
    }

    /// Back to the document shape with every default made explicit.
    pub fn to_document(&self) -> RawJobDoc {
        RawJobDoc {
            sources: self
                .sources
                .iter()
                .map(|s| RawSource {
                    product: s.product.clone(),
                    measurements: s.measurements.clone(),
                    group_by: Some(s.group_by.clone()),
                    masks: s
                        .masks
                        .iter()
                        .map(|m| RawMask {
                            product: m.product.clone(),
                            measurement: m.measurement.clone(),
                            group_by: Some(m.group_by.clone()),
                            fuse_func: Some(m.fuse_func.clone()),
                            flags: m.flags.clone(),
                        })
                        .collect(),
                })
                .collect(),
            date_ranges: RawDateRanges {
                start_date: self.date_ranges.start_date.format("%Y-%m-%d").to_string(),
                end_date: self.date_ranges.end_date.format("%Y-%m-%d").to_string(),
                stats_duration: self.date_ranges.stats_duration.to_string(),
                step_size: self.date_ranges.step_size.to_string(),
                partial_window: Some(self.date_ranges.partial_window),
            },
            storage: RawStorage {
                driver: self.storage.driver.clone(),
                crs: self.storage.crs.clone(),
                tile_size: self.storage.tile_size,
                resolution: self.storage.resolution,
                chunking: self.storage.chunking,
                dimension_order: self
                    .storage
                    .dimension_order
                    .iter()
                    .map(|d| d.to_string())
                    .collect(),
            },
            computation: Some(RawComputation {
                chunking: self.computation.chunking,
            }),
            output_products: self
                .output_products
                .iter()
                .map(|p| RawOutputProduct {
                    name: p.name.clone(),
                    statistic: p.statistic.clone(),
                    zlib: p.zlib,
                    fletcher32: p.fletcher32,
                    dtype: Some(p.dtype.to_string()),
                    nodata: Some(p.nodata),
                    file_path_template: p.file_path_template.as_str().to_string(),
                })
                .collect(),
            location: Some(self.location.display().to_string()),
            on_existing_output: Some(self.on_existing_output),
            on_unresolved_source: Some(self.on_unresolved_source),
        }
    }
}
