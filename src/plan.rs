//! Work planning: one unit per (tile, window, output product).
//!
//! Tiles come from the external tiling machinery; here they are just
//! integer pairs. Every unit's path is rendered up front so collisions and
//! existing outputs are reported before anything runs.

use crate::diagnostics::FieldPath;
use crate::error::{JobError, JobResult};
use crate::registry::StatisticRegistry;
use crate::spec::JobSpec;
use crate::spec::model::OutputProductSpec;
use crate::spec::types::OnExisting;
use crate::template::{RenderContext, TemplateError};
use crate::windows::TimeWindow;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileIndex(pub i32, pub i32);

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

impl FromStr for TileIndex {
    type Err = String;

    /// Parses `"12,-5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("tile index must look like X,Y, got {:?}", s))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|e| format!("bad tile index component {:?}: {}", v, e))
        };
        Ok(TileIndex(parse(x)?, parse(y)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputAction {
    Write,
    Overwrite,
    Skip,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkUnit {
    pub tile: TileIndex,
    pub window: TimeWindow,
    pub product: String,
    pub measurements: Vec<String>,
    pub path: PathBuf,
    pub action: OutputAction,
}

impl WorkUnit {
    pub fn label(&self) -> String {
        format!("{}@{}/{}", self.product, self.tile, self.window.start)
    }
}

/// Renders output paths and applies the job's existing-output policy.
pub struct OutputResolver<'a> {
    job: &'a JobSpec,
}

impl<'a> OutputResolver<'a> {
    pub fn new(job: &'a JobSpec) -> Self {
        Self { job }
    }

    fn template_path(&self, product: &OutputProductSpec) -> FieldPath {
        let index = self
            .job
            .output_products
            .iter()
            .position(|p| p.name == product.name)
            .unwrap_or(0);
        FieldPath::root()
            .key("output_products")
            .index(index)
            .key("file_path_template")
    }

    pub fn render(
        &self,
        tile: TileIndex,
        window: &TimeWindow,
        product: &OutputProductSpec,
    ) -> JobResult<PathBuf> {
        let ctx = RenderContext {
            tile_index: Some((tile.0, tile.1)),
            window: Some(window),
            name: Some(&product.name),
        };
        let rel = product
            .file_path_template
            .render(&ctx)
            .map_err(|e| JobError::template(&self.template_path(product), e))?;
        Ok(self.job.location.join(rel))
    }

    /// Render the path and decide what to do given what is already on disk.
    pub fn resolve(
        &self,
        tile: TileIndex,
        window: &TimeWindow,
        product: &OutputProductSpec,
    ) -> JobResult<(PathBuf, OutputAction)> {
        let path = self.render(tile, window, product)?;
        if !path.exists() {
            return Ok((path, OutputAction::Write));
        }
        match self.job.on_existing_output {
            OnExisting::Error => Err(JobError::OutputExists { path }),
            OnExisting::Skip => {
                debug!(path = %path.display(), "output exists, skipping");
                Ok((path, OutputAction::Skip))
            }
            OnExisting::Overwrite => {
                debug!(path = %path.display(), "output exists, overwriting");
                Ok((path, OutputAction::Overwrite))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub units: Vec<WorkUnit>,
}

impl Plan {
    pub fn build(
        job: &JobSpec,
        statistics: &StatisticRegistry,
        tiles: &[TileIndex],
    ) -> JobResult<Plan> {
        let resolver = OutputResolver::new(job);
        let inputs = job.input_measurements();
        let windows: Vec<TimeWindow> = job.date_ranges.windows().collect();

        let mut units = Vec::with_capacity(tiles.len() * windows.len() * job.output_products.len());
        let mut claimed: HashMap<PathBuf, usize> = HashMap::new();

        for (pi, product) in job.output_products.iter().enumerate() {
            let reducer = statistics.resolve(&product.statistic).ok_or_else(|| {
                JobError::schema(
                    &FieldPath::root().key("output_products").index(pi).key("statistic"),
                    format!("unknown statistic {:?}", product.statistic),
                )
            })?;
            let measurements = reducer.output_measurements(&inputs);

            for tile in tiles {
                for window in &windows {
                    let (path, action) = resolver.resolve(*tile, window, product)?;
                    let unit = WorkUnit {
                        tile: *tile,
                        window: *window,
                        product: product.name.clone(),
                        measurements: measurements.clone(),
                        path,
                        action,
                    };
                    if let Some(&prev) = claimed.get(&unit.path) {
                        let first: &WorkUnit = &units[prev];
                        return Err(JobError::template(
                            &resolver.template_path(product),
                            TemplateError::Collision {
                                path: unit.path.display().to_string(),
                                first: first.label(),
                                second: unit.label(),
                            },
                        ));
                    }
                    claimed.insert(unit.path.clone(), units.len());
                    units.push(unit);
                }
            }
        }

        info!(
            units = units.len(),
            tiles = tiles.len(),
            windows = windows.len(),
            products = job.output_products.len(),
            "plan built"
        );
        Ok(Plan { units })
    }

    pub fn count(&self, action: OutputAction) -> usize {
        self.units.iter().filter(|u| u.action == action).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tile_index_parses() {
        assert_eq!("12,-5".parse::<TileIndex>().unwrap(), TileIndex(12, -5));
        assert_eq!(" 3 , 4 ".parse::<TileIndex>().unwrap(), TileIndex(3, 4));
        assert!("12".parse::<TileIndex>().is_err());
        assert!("a,b".parse::<TileIndex>().is_err());
    }
}
