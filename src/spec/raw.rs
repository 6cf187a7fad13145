//! Raw job document shape, exactly as it appears in YAML.
//!
//! ```yaml
//! sources:
//!   - product: ls8_nbar_albers
//!     measurements: [red, green, blue]
//!     group_by: solar_day
//!     masks:
//!       - product: ls8_pq_albers
//!         measurement: pixelquality
//!         group_by: solar_day
//!         fuse_func: datacube.helpers.ga_pq_fuser
//!         flags: {contiguous: true, cloud_acca: no_cloud}
//! date_ranges: {start_date: 2015-01-01, end_date: 2015-04-01, stats_duration: 3m, step_size: 3m}
//! storage:
//!   driver: NetCDF CF
//!   crs: EPSG:3577
//!   tile_size: {x: 100000.0, y: 100000.0}
//!   resolution: {x: 25, y: -25}
//!   chunking: {x: 200, y: 200, time: 1}
//!   dimension_order: [time, y, x]
//! output_products:
//!   - name: landsat_seasonal_mean
//!     statistic: mean
//!     file_path_template: 'SR_N_MEAN/SR_N_MEAN_3577_{tile_index[0]}_{tile_index[1]}_{time_period[0]:%Y%m%d}.nc'
//! ```
//!
//! Values that need checking (dates, durations, dtypes, templates) stay as
//! strings here and are parsed during validation so errors carry a field path.

use crate::spec::types::{
    FlagValue, Nodata, OnExisting, OnUnresolved, PartialWindow, StorageChunking, XY,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level keys a job document may carry.
pub const TOP_LEVEL_KEYS: &[&str] = &[
    "sources",
    "date_ranges",
    "storage",
    "computation",
    "output_products",
    "location",
    "on_existing_output",
    "on_unresolved_source",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawJobDoc {
    #[serde(default)]
    pub sources: Vec<RawSource>,

    pub date_ranges: RawDateRanges,

    pub storage: RawStorage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computation: Option<RawComputation>,

    #[serde(default)]
    pub output_products: Vec<RawOutputProduct>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_existing_output: Option<OnExisting>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_unresolved_source: Option<OnUnresolved>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawSource {
    pub product: String,

    #[serde(default)]
    pub measurements: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,

    #[serde(default)]
    pub masks: Vec<RawMask>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawMask {
    pub product: String,

    pub measurement: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuse_func: Option<String>,

    #[serde(default)]
    pub flags: BTreeMap<String, FlagValue>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawDateRanges {
    pub start_date: String,
    pub end_date: String,
    pub stats_duration: String,
    pub step_size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_window: Option<PartialWindow>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawStorage {
    pub driver: String,
    pub crs: String,
    pub tile_size: XY<f64>,
    pub resolution: XY<f64>,
    pub chunking: StorageChunking,
    pub dimension_order: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawComputation {
    pub chunking: XY<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawOutputProduct {
    pub name: String,

    pub statistic: String,

    #[serde(default)]
    pub zlib: bool,

    #[serde(default)]
    pub fletcher32: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<Nodata>,

    pub file_path_template: String,
}
