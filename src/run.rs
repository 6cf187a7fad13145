//! Plan execution contract.
//!
//! Units share nothing but the immutable job and write distinct paths, so
//! they run in parallel. A failing unit is recorded and its siblings carry on.

use crate::error::UnitError;
use crate::plan::{OutputAction, Plan, TileIndex, WorkUnit};
use crate::spec::JobSpec;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Computes a unit's statistic and writes it to `unit.path`.
pub trait UnitExecutor: Sync {
    fn execute(&self, job: &JobSpec, unit: &WorkUnit) -> Result<(), UnitError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitStatus {
    Written,
    Skipped,
    Failed { kind: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub tile: TileIndex,
    pub window_start: NaiveDate,
    pub product: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<UnitOutcome>,
}

impl JobSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, UnitStatus::Failed { .. }))
    }
}

fn run_unit<E: UnitExecutor>(job: &JobSpec, unit: &WorkUnit, executor: &E) -> UnitOutcome {
    let status = match unit.action {
        OutputAction::Skip => UnitStatus::Skipped,
        OutputAction::Write | OutputAction::Overwrite => match executor.execute(job, unit) {
            Ok(()) => UnitStatus::Written,
            Err(e) => {
                warn!(unit = %unit.label(), error = %e, "unit failed");
                UnitStatus::Failed {
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }
            }
        },
    };
    UnitOutcome {
        tile: unit.tile,
        window_start: unit.window.start,
        product: unit.product.clone(),
        path: unit.path.clone(),
        status,
    }
}

/// Run every unit of `plan`; outcomes keep plan order.
pub fn run_plan<E: UnitExecutor>(job: &JobSpec, plan: &Plan, executor: &E) -> JobSummary {
    let outcomes: Vec<UnitOutcome> = plan
        .units
        .par_iter()
        .map(|unit| run_unit(job, unit, executor))
        .collect();

    let mut summary = JobSummary::default();
    for o in &outcomes {
        match o.status {
            UnitStatus::Written => summary.written += 1,
            UnitStatus::Skipped => summary.skipped += 1,
            UnitStatus::Failed { .. } => summary.failed += 1,
        }
    }
    summary.outcomes = outcomes;

    info!(
        written = summary.written,
        skipped = summary.skipped,
        failed = summary.failed,
        "job finished"
    );
    summary
}
