//! Scalar value types shared by job documents and product definitions.

use chrono::{Days, Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Pixel data type of a measurement or output product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
}

impl DType {
    pub fn is_float(self) -> bool {
        matches!(self, DType::Float32 | DType::Float64)
    }

    /// Inclusive integer range, or None for floating point types.
    pub fn integer_range(self) -> Option<(i128, i128)> {
        let range = match self {
            DType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            DType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            DType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            DType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            DType::Uint8 => (0, u8::MAX as i128),
            DType::Uint16 => (0, u16::MAX as i128),
            DType::Uint32 => (0, u32::MAX as i128),
            DType::Uint64 => (0, u64::MAX as i128),
            DType::Float32 | DType::Float64 => return None,
        };
        Some(range)
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Uint8 => "uint8",
            DType::Uint16 => "uint16",
            DType::Uint32 => "uint32",
            DType::Uint64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    pub const ALL: [DType; 10] = [
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::Uint8,
        DType::Uint16,
        DType::Uint32,
        DType::Uint64,
        DType::Float32,
        DType::Float64,
    ];
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DType::ALL
            .into_iter()
            .find(|d| d.name() == s.trim())
            .ok_or_else(|| {
                let names: Vec<&str> = DType::ALL.iter().map(|d| d.name()).collect();
                format!("unknown dtype {:?}, expected one of {}", s, names.join(", "))
            })
    }
}

/// Nodata sentinel. NaN is a distinct variant so the type stays comparable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NodataRepr", into = "NodataRepr")]
pub enum Nodata {
    Value(f64),
    NaN,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum NodataRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<NodataRepr> for Nodata {
    type Error = String;

    fn try_from(repr: NodataRepr) -> Result<Self, Self::Error> {
        match repr {
            NodataRepr::Number(v) if v.is_nan() => Ok(Nodata::NaN),
            NodataRepr::Number(v) => Ok(Nodata::Value(v)),
            NodataRepr::Text(s) => s.parse(),
        }
    }
}

impl From<Nodata> for NodataRepr {
    fn from(nodata: Nodata) -> Self {
        match nodata {
            Nodata::Value(v) => NodataRepr::Number(v),
            Nodata::NaN => NodataRepr::Text("nan".to_string()),
        }
    }
}

impl FromStr for Nodata {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("nan") {
            return Ok(Nodata::NaN);
        }
        t.parse::<f64>()
            .map(Nodata::Value)
            .map_err(|_| format!("nodata must be a number or \"nan\", got {:?}", s))
    }
}

impl Nodata {
    /// Whether this sentinel can be stored in `dtype` without loss.
    pub fn representable_in(self, dtype: DType) -> bool {
        match (self, dtype.integer_range()) {
            (Nodata::NaN, range) => range.is_none(),
            (Nodata::Value(v), None) => match dtype {
                DType::Float32 => v.is_infinite() || v.abs() <= f32::MAX as f64,
                _ => true,
            },
            (Nodata::Value(v), Some((lo, hi))) => {
                // Compare as i128: `hi as f64` rounds i64::MAX and u64::MAX up.
                let i = v as i128;
                v.is_finite() && i as f64 == v && (lo..=hi).contains(&i)
            }
        }
    }
}

impl fmt::Display for Nodata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nodata::Value(v) => write!(f, "{}", v),
            Nodata::NaN => f.write_str("nan"),
        }
    }
}

/// Required value of a quality flag: a boolean bit or an enumerated category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Category(String),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Category(c) => f.write_str(c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Days,
    Months,
    Years,
}

impl DurationUnit {
    fn suffix(self) -> char {
        match self {
            DurationUnit::Days => 'd',
            DurationUnit::Months => 'm',
            DurationUnit::Years => 'y',
        }
    }
}

/// Calendar duration such as `3m`, `16d` or `1y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DurationExpr {
    pub amount: u32,
    pub unit: DurationUnit,
}

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*([dmy])\s*$").expect("duration regex is valid"));

impl FromStr for DurationExpr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = DURATION_RE.captures(s).ok_or_else(|| {
            format!(
                "invalid duration {:?}, expected <integer><unit> with unit d, m or y",
                s
            )
        })?;
        let amount: u32 = caps[1]
            .parse()
            .map_err(|_| format!("duration amount out of range: {:?}", s))?;
        if amount == 0 {
            return Err(format!("duration must be positive, got {:?}", s));
        }
        let unit = match &caps[2] {
            "d" => DurationUnit::Days,
            "m" => DurationUnit::Months,
            _ => DurationUnit::Years,
        };
        Ok(DurationExpr { amount, unit })
    }
}

impl fmt::Display for DurationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl DurationExpr {
    /// `date + times * self`, or None on calendar overflow.
    ///
    /// Month arithmetic clamps to the last day of the target month.
    pub fn advance(self, date: NaiveDate, times: u32) -> Option<NaiveDate> {
        let total = self.amount.checked_mul(times)?;
        match self.unit {
            DurationUnit::Days => date.checked_add_days(Days::new(u64::from(total))),
            DurationUnit::Months => date.checked_add_months(Months::new(total)),
            DurationUnit::Years => date.checked_add_months(Months::new(total.checked_mul(12)?)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dim {
    Time,
    X,
    Y,
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dim::Time => "time",
            Dim::X => "x",
            Dim::Y => "y",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XY<T> {
    pub x: T,
    pub y: T,
}

/// On-disk chunk shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageChunking {
    pub x: u32,
    pub y: u32,
    pub time: u32,
}

/// What to do when a unit's output path already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnExisting {
    #[default]
    Error,
    Skip,
    Overwrite,
}

/// What to do when a source product or measurement is missing from the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnUnresolved {
    #[default]
    Abort,
    Skip,
}

/// Handling of a trailing window whose nominal end passes `end_date`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialWindow {
    #[default]
    Overrun,
    Truncate,
    Skip,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn duration_parses_units() {
        assert_eq!(
            "3m".parse::<DurationExpr>().unwrap(),
            DurationExpr {
                amount: 3,
                unit: DurationUnit::Months
            }
        );
        assert_eq!("16d".parse::<DurationExpr>().unwrap().unit, DurationUnit::Days);
        assert_eq!("1y".parse::<DurationExpr>().unwrap().to_string(), "1y");
    }

    #[test]
    fn duration_rejects_zero_and_garbage() {
        assert!("0m".parse::<DurationExpr>().is_err());
        assert!("3w".parse::<DurationExpr>().is_err());
        assert!("m".parse::<DurationExpr>().is_err());
        assert!("-1d".parse::<DurationExpr>().is_err());
    }

    #[test]
    fn month_advance_clamps_from_origin() {
        let d = NaiveDate::from_ymd_opt(2015, 1, 31).unwrap();
        let one_month: DurationExpr = "1m".parse().unwrap();
        assert_eq!(
            one_month.advance(d, 1),
            NaiveDate::from_ymd_opt(2015, 2, 28)
        );
        assert_eq!(
            one_month.advance(d, 2),
            NaiveDate::from_ymd_opt(2015, 3, 31)
        );
    }

    #[test]
    fn nodata_representability() {
        assert!(Nodata::Value(-999.0).representable_in(DType::Int16));
        assert!(!Nodata::Value(-999.0).representable_in(DType::Uint16));
        assert!(!Nodata::Value(1.5).representable_in(DType::Int32));
        assert!(!Nodata::Value(300.0).representable_in(DType::Uint8));
        assert!(Nodata::NaN.representable_in(DType::Float32));
        assert!(!Nodata::NaN.representable_in(DType::Int8));
        assert!(!Nodata::Value(1e300).representable_in(DType::Float32));
        assert!(Nodata::Value(-9223372036854775808.0).representable_in(DType::Int64));
        assert!(!Nodata::Value(9223372036854775808.0).representable_in(DType::Int64));
        assert!(!Nodata::Value(18446744073709551616.0).representable_in(DType::Uint64));
        assert!(Nodata::Value(4294967295.0).representable_in(DType::Uint32));
    }

    #[test]
    fn dtype_from_str() {
        assert_eq!("uint16".parse::<DType>().unwrap(), DType::Uint16);
        assert!("int128".parse::<DType>().is_err());
    }
}
