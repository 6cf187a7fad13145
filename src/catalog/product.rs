//! Product definition documents.
//!
//! ```yaml
//! name: ls8_pq_albers
//! measurements:
//!   - name: pixelquality
//!     dtype: int16
//!     nodata: 0
//!     units: bit_field
//!     flags_definition:
//!       contiguous:
//!         bits: 8
//!         values: {0: false, 1: true}
//!       cloud_acca:
//!         bits: 10
//!         values: {0: cloud, 1: no_cloud}
//! ```
//!
//! Keys other than the ones below (metadata, storage hints, ...) are ignored.

use crate::spec::types::{DType, FlagValue, Nodata};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub measurements: Vec<MeasurementDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementDefinition {
    pub name: String,

    pub dtype: DType,

    pub nodata: Nodata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags_definition: Option<BTreeMap<String, FlagDefinition>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub bits: FlagBits,

    pub values: BTreeMap<u64, FlagValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagBits {
    Single(u8),
    Range(Vec<u8>),
}

impl ProductDefinition {
    pub fn measurement(&self, name: &str) -> Option<&MeasurementDefinition> {
        self.measurements.iter().find(|m| m.name == name)
    }

    pub fn measurement_names(&self) -> Vec<&str> {
        self.measurements.iter().map(|m| m.name.as_str()).collect()
    }
}

impl MeasurementDefinition {
    pub fn flag(&self, name: &str) -> Option<&FlagDefinition> {
        self.flags_definition.as_ref()?.get(name)
    }
}

impl FlagDefinition {
    /// Whether `value` is one of the values this flag can take.
    pub fn accepts(&self, value: &FlagValue) -> bool {
        self.values.values().any(|v| v == value)
    }

    /// Allowed values in bit-value order, for error messages.
    pub fn domain(&self) -> Vec<String> {
        self.values.values().map(|v| v.to_string()).collect()
    }
}
