//! Safe/unsafe change detection between two versions of a job.
//!
//! A change is unsafe when outputs already written under the old job would
//! no longer match what the new job produces (content, grid or location).
//! Compression toggles, chunking, new products and a later `end_date` only
//! affect how or how much is written, so they are safe.

use crate::spec::JobSpec;
use crate::spec::model::OutputProductSpec;

use serde::Serialize;
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Safety {
    Safe,
    Unsafe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub field: String,
    pub old: String,
    pub new: String,
    pub safety: Safety,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Comparison {
    pub changes: Vec<Change>,
}

impl Comparison {
    fn record<T: PartialEq + Debug>(&mut self, field: impl Into<String>, old: &T, new: &T, safety: Safety) {
        if old != new {
            self.changes.push(Change {
                field: field.into(),
                old: format!("{:?}", old),
                new: format!("{:?}", new),
                safety,
            });
        }
    }

    pub fn safe_changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.safety == Safety::Safe)
    }

    pub fn unsafe_changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(|c| c.safety == Safety::Unsafe)
    }

    pub fn is_unchanged(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn can_update(&self, allow_unsafe: bool) -> bool {
        allow_unsafe || self.unsafe_changes().next().is_none()
    }
}

pub fn compare(old: &JobSpec, new: &JobSpec) -> Comparison {
    use Safety::{Safe, Unsafe};

    let mut cmp = Comparison::default();

    cmp.record("sources", &old.sources.len(), &new.sources.len(), Unsafe);
    for (i, (o, n)) in old.sources.iter().zip(&new.sources).enumerate() {
        let p = format!("sources[{}]", i);
        cmp.record(format!("{}.product", p), &o.product, &n.product, Unsafe);
        cmp.record(format!("{}.measurements", p), &o.measurements, &n.measurements, Unsafe);
        cmp.record(format!("{}.group_by", p), &o.group_by, &n.group_by, Unsafe);
        cmp.record(format!("{}.masks", p), &o.masks, &n.masks, Unsafe);
    }

    let (od, nd) = (&old.date_ranges, &new.date_ranges);
    cmp.record("date_ranges.start_date", &od.start_date, &nd.start_date, Unsafe);
    let end_safety = if nd.end_date > od.end_date { Safe } else { Unsafe };
    cmp.record("date_ranges.end_date", &od.end_date, &nd.end_date, end_safety);
    cmp.record("date_ranges.stats_duration", &od.stats_duration, &nd.stats_duration, Unsafe);
    cmp.record("date_ranges.step_size", &od.step_size, &nd.step_size, Unsafe);
    cmp.record("date_ranges.partial_window", &od.partial_window, &nd.partial_window, Unsafe);

    let (os, ns) = (&old.storage, &new.storage);
    cmp.record("storage.driver", &os.driver, &ns.driver, Unsafe);
    cmp.record("storage.crs", &os.crs, &ns.crs, Unsafe);
    cmp.record("storage.tile_size", &os.tile_size, &ns.tile_size, Unsafe);
    cmp.record("storage.resolution", &os.resolution, &ns.resolution, Unsafe);
    cmp.record("storage.dimension_order", &os.dimension_order, &ns.dimension_order, Unsafe);
    cmp.record("storage.chunking", &os.chunking, &ns.chunking, Safe);
    cmp.record("computation.chunking", &old.computation.chunking, &new.computation.chunking, Safe);

    cmp.record("location", &old.location, &new.location, Unsafe);
    cmp.record("on_existing_output", &old.on_existing_output, &new.on_existing_output, Safe);
    cmp.record("on_unresolved_source", &old.on_unresolved_source, &new.on_unresolved_source, Safe);

    for o in &old.output_products {
        match new.output_product(&o.name) {
            Some(n) => compare_product(&mut cmp, o, n),
            None => cmp.changes.push(Change {
                field: format!("output_products.{}", o.name),
                old: "present".to_string(),
                new: "removed".to_string(),
                safety: Unsafe,
            }),
        }
    }
    for n in &new.output_products {
        if old.output_product(&n.name).is_none() {
            cmp.changes.push(Change {
                field: format!("output_products.{}", n.name),
                old: "absent".to_string(),
                new: "added".to_string(),
                safety: Safe,
            });
        }
    }

    cmp
}

fn compare_product(cmp: &mut Comparison, o: &OutputProductSpec, n: &OutputProductSpec) {
    use Safety::{Safe, Unsafe};

    let p = format!("output_products.{}", o.name);
    cmp.record(format!("{}.statistic", p), &o.statistic, &n.statistic, Unsafe);
    cmp.record(format!("{}.dtype", p), &o.dtype, &n.dtype, Unsafe);
    cmp.record(format!("{}.nodata", p), &o.nodata, &n.nodata, Unsafe);
    cmp.record(
        format!("{}.file_path_template", p),
        &o.file_path_template.as_str(),
        &n.file_path_template.as_str(),
        Unsafe,
    );
    cmp.record(format!("{}.zlib", p), &o.zlib, &n.zlib, Safe);
    cmp.record(format!("{}.fletcher32", p), &o.fletcher32, &n.fletcher32, Safe);
}
