//! Raw document -> validated [`JobSpec`].
//!
//! Validation runs in four phases:
//! 1) Sources and masks, resolved against the catalog and fuse registry.
//! 2) Date ranges and the output grid.
//! 3) Output products: names, statistics, dtype/nodata defaulting.
//! 4) Path templates: unit-distinguishing tokens and a dry-run render.
//!
//! The first failure aborts with a [`JobError`] naming the field path.
//! Non-fatal findings are returned as warnings and logged.

use crate::catalog::{Catalog, MeasurementDefinition};
use crate::diagnostics::FieldPath;
use crate::error::{JobError, JobResult};
use crate::registry::{FuseRegistry, StatisticRegistry};
use crate::spec::model::{
    ComputationPolicy, JobSpec, MaskSpec, OutputGrid, OutputProductSpec, SourceSpec,
    TimeWindowing,
};
use crate::spec::raw::{RawDateRanges, RawJobDoc, RawMask, RawOutputProduct, RawSource, RawStorage};
use crate::spec::types::{DType, Dim, DurationExpr, Nodata, OnUnresolved, XY};
use crate::template::{PathTemplate, RenderContext, TemplateError, Token};
use crate::windows::TimeWindow;

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::warn;

/// Temporal grouping keys understood by the catalog query layer.
pub const GROUP_BY_KEYS: &[&str] = &["solar_day", "time"];

const DEFAULT_GROUP_BY: &str = "solar_day";

/// External capabilities validation is checked against.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub statistics: &'a StatisticRegistry,
    pub fusers: &'a FuseRegistry,
}

#[derive(Debug, Clone)]
pub struct Validated {
    pub job: JobSpec,
    pub warnings: Vec<String>,
}

struct Checker<'a> {
    ctx: ValidationContext<'a>,
    warnings: Vec<String>,
}

impl Checker<'_> {
    fn warn(&mut self, path: &FieldPath, message: impl Into<String>) {
        let message = message.into();
        warn!(path = %path, "{}", message);
        self.warnings.push(format!("{}: {}", path, message));
    }
}

impl RawJobDoc {
    pub fn validate_and_build(&self, ctx: ValidationContext<'_>) -> JobResult<Validated> {
        let root = FieldPath::root();
        let mut checker = Checker {
            ctx,
            warnings: Vec::new(),
        };

        // Phase 1: sources.
        let on_unresolved = self.on_unresolved_source.unwrap_or_default();
        let sources_path = root.key("sources");
        if self.sources.is_empty() {
            return Err(JobError::schema(&sources_path, "at least one source is required"));
        }
        let mut sources = Vec::with_capacity(self.sources.len());
        for (i, raw) in self.sources.iter().enumerate() {
            let path = sources_path.index(i);
            let source = check_source_shape(raw, &path, &mut checker)?;
            // Missing products or measurements follow the skip policy;
            // flag names and values never do.
            let quality = match resolve_source(&source, &path, checker.ctx.catalog) {
                Ok(quality) => quality,
                Err(e @ JobError::CatalogResolution { .. })
                    if on_unresolved == OnUnresolved::Skip =>
                {
                    checker.warn(&path, format!("skipping source: {}", e));
                    continue;
                }
                Err(e) => return Err(e),
            };
            for (j, (mask, measurement)) in source.masks.iter().zip(quality).enumerate() {
                check_mask_flags(mask, measurement, &path.key("masks").index(j))?;
            }
            sources.push(source);
        }
        if sources.is_empty() {
            return Err(JobError::catalog(
                &sources_path,
                "no source could be resolved against the catalog",
            ));
        }

        // Phase 2: dates and grid.
        let date_ranges = check_date_ranges(&self.date_ranges, &root.key("date_ranges"), &mut checker)?;
        let storage = check_storage(&self.storage, &root.key("storage"), &mut checker)?;
        let computation = match &self.computation {
            Some(c) => {
                let path = root.key("computation").key("chunking");
                if c.chunking.x == 0 || c.chunking.y == 0 {
                    return Err(JobError::schema(&path, "chunk sizes must be positive"));
                }
                ComputationPolicy {
                    chunking: c.chunking,
                }
            }
            None => ComputationPolicy::default(),
        };

        // Phase 3: output products.
        let products_path = root.key("output_products");
        if self.output_products.is_empty() {
            return Err(JobError::schema(
                &products_path,
                "at least one output product is required",
            ));
        }
        let native = native_measurements(&sources, checker.ctx.catalog);
        let mut names = BTreeSet::new();
        let mut output_products = Vec::with_capacity(self.output_products.len());
        for (i, raw) in self.output_products.iter().enumerate() {
            let path = products_path.index(i);
            if !names.insert(raw.name.as_str()) {
                return Err(JobError::schema(
                    &path.key("name"),
                    format!("duplicate output product name {:?}", raw.name),
                ));
            }
            output_products.push(check_output_product(raw, &path, &native, &checker)?);
        }

        // Phase 4: templates.
        check_templates(&output_products, &products_path, &date_ranges)?;

        let job = JobSpec {
            sources,
            date_ranges,
            storage,
            computation,
            output_products,
            location: PathBuf::from(self.location.as_deref().unwrap_or(".")),
            on_existing_output: self.on_existing_output.unwrap_or_default(),
            on_unresolved_source: on_unresolved,
        };
        Ok(Validated {
            job,
            warnings: checker.warnings,
        })
    }
}

fn require_non_empty(value: &str, path: &FieldPath) -> JobResult<()> {
    if value.trim().is_empty() {
        return Err(JobError::schema(path, "must not be empty"));
    }
    Ok(())
}

fn check_group_by(value: Option<&str>, path: &FieldPath) -> JobResult<String> {
    let value = value.unwrap_or(DEFAULT_GROUP_BY);
    if !GROUP_BY_KEYS.contains(&value) {
        return Err(JobError::schema(
            path,
            format!(
                "unknown grouping {:?}, expected one of {}",
                value,
                GROUP_BY_KEYS.join(", ")
            ),
        ));
    }
    Ok(value.to_string())
}

fn check_source_shape(raw: &RawSource, path: &FieldPath, checker: &mut Checker<'_>) -> JobResult<SourceSpec> {
    require_non_empty(&raw.product, &path.key("product"))?;

    let mpath = path.key("measurements");
    if raw.measurements.is_empty() {
        return Err(JobError::schema(&mpath, "at least one measurement is required"));
    }
    let mut seen = BTreeSet::new();
    for (k, m) in raw.measurements.iter().enumerate() {
        require_non_empty(m, &mpath.index(k))?;
        if !seen.insert(m.as_str()) {
            return Err(JobError::schema(
                &mpath.index(k),
                format!("duplicate measurement {:?}", m),
            ));
        }
    }

    let group_by = check_group_by(raw.group_by.as_deref(), &path.key("group_by"))?;

    let mut masks = Vec::with_capacity(raw.masks.len());
    for (j, m) in raw.masks.iter().enumerate() {
        masks.push(check_mask_shape(m, &path.key("masks").index(j), checker)?);
    }

    Ok(SourceSpec {
        product: raw.product.clone(),
        measurements: raw.measurements.clone(),
        group_by,
        masks,
    })
}

fn check_mask_shape(raw: &RawMask, path: &FieldPath, checker: &mut Checker<'_>) -> JobResult<MaskSpec> {
    require_non_empty(&raw.product, &path.key("product"))?;
    require_non_empty(&raw.measurement, &path.key("measurement"))?;
    let group_by = check_group_by(raw.group_by.as_deref(), &path.key("group_by"))?;

    let fuse_func = raw
        .fuse_func
        .clone()
        .unwrap_or_else(|| checker.ctx.fusers.default_name().to_string());
    if checker.ctx.fusers.resolve(&fuse_func).is_none() {
        return Err(JobError::schema(
            &path.key("fuse_func"),
            format!(
                "unknown fuse function {:?}, registered: {}",
                fuse_func,
                checker.ctx.fusers.known_names().join(", ")
            ),
        ));
    }

    if raw.flags.is_empty() {
        checker.warn(&path.key("flags"), "mask has no flags and will not exclude any pixel");
    }

    Ok(MaskSpec {
        product: raw.product.clone(),
        measurement: raw.measurement.clone(),
        group_by,
        fuse_func,
        flags: raw.flags.clone(),
    })
}

/// Resolve a source and its masks; returns each mask's quality measurement.
fn resolve_source<'c>(
    source: &SourceSpec,
    path: &FieldPath,
    catalog: &'c dyn Catalog,
) -> JobResult<Vec<&'c MeasurementDefinition>> {
    let product = catalog.product(&source.product).ok_or_else(|| {
        JobError::catalog(
            &path.key("product"),
            format!("product {:?} not found in catalog", source.product),
        )
    })?;
    for (k, m) in source.measurements.iter().enumerate() {
        if product.measurement(m).is_none() {
            return Err(JobError::catalog(
                &path.key("measurements").index(k),
                format!(
                    "product {:?} has no measurement {:?} (available: {})",
                    product.name,
                    m,
                    product.measurement_names().join(", ")
                ),
            ));
        }
    }

    let mut quality = Vec::with_capacity(source.masks.len());
    for (j, mask) in source.masks.iter().enumerate() {
        let mpath = path.key("masks").index(j);
        let product = catalog.product(&mask.product).ok_or_else(|| {
            JobError::catalog(
                &mpath.key("product"),
                format!("mask product {:?} not found in catalog", mask.product),
            )
        })?;
        let measurement = product.measurement(&mask.measurement).ok_or_else(|| {
            JobError::catalog(
                &mpath.key("measurement"),
                format!(
                    "product {:?} has no measurement {:?}",
                    product.name, mask.measurement
                ),
            )
        })?;
        quality.push(measurement);
    }
    Ok(quality)
}

/// Flag names and values must belong to the quality measurement's domain.
fn check_mask_flags(
    mask: &MaskSpec,
    measurement: &MeasurementDefinition,
    path: &FieldPath,
) -> JobResult<()> {
    if measurement.flags_definition.is_none() && !mask.flags.is_empty() {
        return Err(JobError::catalog(
            &path.key("measurement"),
            format!("measurement {:?} defines no quality flags", mask.measurement),
        ));
    }

    let fpath = path.key("flags");
    for (name, value) in &mask.flags {
        let flag = measurement.flag(name).ok_or_else(|| {
            let known: Vec<&str> = measurement
                .flags_definition
                .iter()
                .flat_map(|f| f.keys().map(String::as_str))
                .collect();
            JobError::catalog(
                &fpath.key(name.as_str()),
                format!(
                    "unrecognized flag {:?} for {}.{} (known: {})",
                    name,
                    mask.product,
                    mask.measurement,
                    known.join(", ")
                ),
            )
        })?;
        if !flag.accepts(value) {
            return Err(JobError::catalog(
                &fpath.key(name.as_str()),
                format!(
                    "value {} is not one of {}",
                    value,
                    flag.domain().join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn parse_date(value: &str, path: &FieldPath) -> JobResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        JobError::schema(path, format!("expected a YYYY-MM-DD date, got {:?} ({})", value, e))
    })
}

fn parse_duration(value: &str, path: &FieldPath) -> JobResult<DurationExpr> {
    value.parse().map_err(|e: String| JobError::schema(path, e))
}

fn check_date_ranges(
    raw: &RawDateRanges,
    path: &FieldPath,
    checker: &mut Checker<'_>,
) -> JobResult<TimeWindowing> {
    let start_date = parse_date(&raw.start_date, &path.key("start_date"))?;
    let end_date = parse_date(&raw.end_date, &path.key("end_date"))?;
    if start_date > end_date {
        return Err(JobError::schema(
            path,
            format!("start_date {} is after end_date {}", start_date, end_date),
        ));
    }
    if start_date == end_date {
        checker.warn(path, "start_date equals end_date; no windows will be generated");
    }
    Ok(TimeWindowing {
        start_date,
        end_date,
        stats_duration: parse_duration(&raw.stats_duration, &path.key("stats_duration"))?,
        step_size: parse_duration(&raw.step_size, &path.key("step_size"))?,
        partial_window: raw.partial_window.unwrap_or_default(),
    })
}

fn check_positive(v: XY<f64>, path: &FieldPath) -> JobResult<()> {
    if !(v.x.is_finite() && v.y.is_finite() && v.x > 0.0 && v.y > 0.0) {
        return Err(JobError::schema(path, "x and y must be positive"));
    }
    Ok(())
}

fn check_storage(raw: &RawStorage, path: &FieldPath, checker: &mut Checker<'_>) -> JobResult<OutputGrid> {
    require_non_empty(&raw.driver, &path.key("driver"))?;
    require_non_empty(&raw.crs, &path.key("crs"))?;
    check_positive(raw.tile_size, &path.key("tile_size"))?;

    let rpath = path.key("resolution");
    let res = raw.resolution;
    if !(res.x.is_finite() && res.y.is_finite()) || res.x == 0.0 || res.y == 0.0 {
        return Err(JobError::schema(&rpath, "x and y must be finite and non-zero"));
    }

    let cpath = path.key("chunking");
    if raw.chunking.x == 0 || raw.chunking.y == 0 || raw.chunking.time == 0 {
        return Err(JobError::schema(&cpath, "chunk sizes must be positive"));
    }

    let dpath = path.key("dimension_order");
    let dimension_order = parse_dimension_order(&raw.dimension_order, &dpath)?;

    // Sign conventions differ between CRSs, so these only warn.
    let y_pos = dimension_order.iter().position(|d| *d == Dim::Y);
    let x_pos = dimension_order.iter().position(|d| *d == Dim::X);
    if res.y > 0.0 {
        checker.warn(
            &rpath.key("y"),
            format!(
                "positive y resolution means south-up rows; north-up grids in {} use a negative y",
                raw.crs
            ),
        );
    }
    if res.x < 0.0 {
        checker.warn(&rpath.key("x"), "negative x resolution flips columns east-to-west");
    }
    if x_pos < y_pos {
        checker.warn(
            &dpath,
            "x precedes y; rows will not follow the y resolution sign convention",
        );
    }
    for (axis, tile, r) in [("x", raw.tile_size.x, res.x), ("y", raw.tile_size.y, res.y)] {
        let pixels = tile / r.abs();
        if (pixels - pixels.round()).abs() > 1e-9 {
            checker.warn(
                &path.key("tile_size").key(axis),
                format!("tile size {} is not a whole number of {} pixels", tile, r.abs()),
            );
        }
    }

    Ok(OutputGrid {
        driver: raw.driver.clone(),
        crs: raw.crs.clone(),
        tile_size: raw.tile_size,
        resolution: res,
        chunking: raw.chunking,
        dimension_order,
    })
}

fn parse_dimension_order(raw: &[String], path: &FieldPath) -> JobResult<[Dim; 3]> {
    let dims: Vec<Dim> = raw
        .iter()
        .enumerate()
        .map(|(i, s)| match s.trim() {
            "time" => Ok(Dim::Time),
            "x" => Ok(Dim::X),
            "y" => Ok(Dim::Y),
            other => Err(JobError::schema(
                &path.index(i),
                format!("unknown dimension {:?}, expected time, x or y", other),
            )),
        })
        .collect::<JobResult<_>>()?;
    let order: [Dim; 3] = dims
        .try_into()
        .map_err(|_| JobError::schema(path, "must list exactly the three dimensions time, x, y"))?;
    let distinct: BTreeSet<String> = order.iter().map(|d| d.to_string()).collect();
    if distinct.len() != 3 {
        return Err(JobError::schema(path, "must be a permutation of time, x, y"));
    }
    Ok(order)
}

/// Native dtype and nodata of every resolved source measurement.
fn native_measurements<'c>(
    sources: &[SourceSpec],
    catalog: &'c dyn Catalog,
) -> Vec<&'c MeasurementDefinition> {
    sources
        .iter()
        .filter_map(|s| catalog.product(&s.product).map(|p| (s, p)))
        .flat_map(|(s, p)| s.measurements.iter().filter_map(move |m| p.measurement(m)))
        .collect()
}

fn check_output_product(
    raw: &RawOutputProduct,
    path: &FieldPath,
    native: &[&MeasurementDefinition],
    checker: &Checker<'_>,
) -> JobResult<OutputProductSpec> {
    require_non_empty(&raw.name, &path.key("name"))?;

    if checker.ctx.statistics.resolve(&raw.statistic).is_none() {
        return Err(JobError::schema(
            &path.key("statistic"),
            format!(
                "unknown statistic {:?}, expected one of {}",
                raw.statistic,
                checker.ctx.statistics.known_names().join(", ")
            ),
        ));
    }

    let dtype_path = path.key("dtype");
    let dtype = match &raw.dtype {
        Some(s) => s.parse::<DType>().map_err(|e| JobError::schema(&dtype_path, e))?,
        None => {
            let dtypes: BTreeSet<DType> = native.iter().map(|m| m.dtype).collect();
            let mut iter = dtypes.iter().copied();
            match (iter.next(), iter.next()) {
                (Some(only), None) => only,
                (None, _) => {
                    return Err(JobError::schema(
                        &dtype_path,
                        "no source measurement to inherit a dtype from",
                    ));
                }
                _ => {
                    let names: Vec<String> = dtypes.iter().map(|d| d.to_string()).collect();
                    return Err(JobError::schema(
                        &dtype_path,
                        format!(
                            "source measurements have mixed dtypes ({}); set dtype explicitly",
                            names.join(", ")
                        ),
                    ));
                }
            }
        }
    };

    let nodata_path = path.key("nodata");
    let nodata = match raw.nodata {
        Some(nd) => {
            if !nd.representable_in(dtype) {
                return Err(JobError::schema(
                    &nodata_path,
                    format!("nodata {} is not representable as {}", nd, dtype),
                ));
            }
            nd
        }
        None => default_nodata(native, dtype).ok_or_else(|| {
            JobError::schema(
                &nodata_path,
                format!("no source nodata is representable as {}; set nodata explicitly", dtype),
            )
        })?,
    };

    let file_path_template = PathTemplate::parse(&raw.file_path_template)
        .map_err(|e| JobError::template(&path.key("file_path_template"), e))?;

    Ok(OutputProductSpec {
        name: raw.name.clone(),
        statistic: raw.statistic.clone(),
        zlib: raw.zlib,
        fletcher32: raw.fletcher32,
        dtype,
        nodata,
        file_path_template,
    })
}

fn default_nodata(native: &[&MeasurementDefinition], dtype: DType) -> Option<Nodata> {
    let mut candidates = native.iter().map(|m| m.nodata);
    let first = candidates.next();
    let shared = first.filter(|f| candidates.all(|c| c == *f));
    match shared {
        Some(nd) if nd.representable_in(dtype) => Some(nd),
        _ if dtype.is_float() => Some(Nodata::NaN),
        _ => None,
    }
}

/// Units must never collide on an output path. Tile indices are required
/// tokens, so rendering every window for one sample tile is enough.
fn check_templates(
    products: &[OutputProductSpec],
    path: &FieldPath,
    windows: &TimeWindowing,
) -> JobResult<()> {
    let mut by_template: BTreeMap<&str, &str> = BTreeMap::new();
    let mut sample: Vec<TimeWindow> = windows.windows().collect();
    if sample.is_empty() {
        sample.push(windows.sample_window());
    }
    let mut rendered: BTreeMap<String, String> = BTreeMap::new();

    for (i, p) in products.iter().enumerate() {
        let tpath = path.index(i).key("file_path_template");
        let t = &p.file_path_template;
        if !t.distinguishes_units() {
            return Err(JobError::schema(
                &tpath,
                "template must use {tile_index[0]}, {tile_index[1]} and {time_period[0]} so units get distinct paths",
            ));
        }
        if let Some(other) = by_template.insert(t.as_str(), p.name.as_str()) {
            if !t.uses(Token::Name) {
                return Err(JobError::schema(
                    &tpath,
                    format!(
                        "same template as output product {:?}; add {{name}} to keep their paths apart",
                        other
                    ),
                ));
            }
        }

        for window in &sample {
            let ctx = RenderContext {
                tile_index: Some((0, 0)),
                window: Some(window),
                name: Some(&p.name),
            };
            let out = t.render(&ctx).map_err(|e| JobError::template(&tpath, e))?;
            let label = format!("{}@{}", p.name, window.start);
            if let Some(first) = rendered.get(&out) {
                return Err(JobError::template(
                    &tpath,
                    TemplateError::Collision {
                        path: out,
                        first: first.clone(),
                        second: label,
                    },
                ));
            }
            rendered.insert(out, label);
        }
    }
    Ok(())
}
