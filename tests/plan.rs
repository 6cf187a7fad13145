mod common;

use common::{Fixture, SEASONAL_MEAN};
use pretty_assertions::assert_eq;
use statsjob::error::UnitError;
use statsjob::plan::{OutputAction, OutputResolver, Plan, TileIndex, WorkUnit};
use statsjob::run::{UnitExecutor, UnitStatus, run_plan};
use statsjob::spec::JobSpec;
use statsjob::template::TemplateError;
use statsjob::JobError;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

fn with_location(doc: &str, location: &Path) -> String {
    format!("location: '{}'\n{}", location.display(), doc)
}

#[test]
fn renders_documented_example_path() {
    let fx = Fixture::new();
    let job = fx.load(SEASONAL_MEAN).unwrap().job;
    let window = job.date_ranges.windows().next().unwrap();
    let mean = job.output_product("landsat_seasonal_mean").unwrap();

    let path = OutputResolver::new(&job)
        .render(TileIndex(12, -5), &window, mean)
        .unwrap();
    assert_eq!(
        path,
        PathBuf::from("./SR_N_MEAN/SR_N_MEAN_3577_12_-5_20150101.nc")
    );
}

#[test]
fn plan_covers_every_tile_window_and_product() {
    let fx = Fixture::new();
    let job = fx.load(SEASONAL_MEAN).unwrap().job;
    let tiles = [TileIndex(12, -5), TileIndex(13, -5)];
    let plan = Plan::build(&job, &fx.statistics, &tiles).unwrap();

    assert_eq!(plan.units.len(), 6);
    assert_eq!(plan.count(OutputAction::Write), 6);

    let pct = plan
        .units
        .iter()
        .find(|u| u.product == "landsat_seasonal_percentile_10")
        .unwrap();
    assert_eq!(pct.measurements[0], "blue_PC_10");
    assert_eq!(pct.measurements.len(), 6);

    let mut paths: Vec<&PathBuf> = plan.units.iter().map(|u| &u.path).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 6);
}

#[test]
fn shared_template_with_name_keeps_paths_apart() {
    let fx = Fixture::new();
    let doc = SEASONAL_MEAN
        .replacen("SR_N_MEAN/SR_N_MEAN_3577", "{name}/SR_3577", 1)
        .replacen("SR_N_MEDOID/SR_N_MEDOID_3577", "{name}/SR_3577", 1);
    let job = fx.load(&doc).unwrap().job;
    let plan = Plan::build(&job, &fx.statistics, &[TileIndex(1, 1), TileIndex(1, 2)]).unwrap();

    let mut paths: Vec<&PathBuf> = plan.units.iter().map(|u| &u.path).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), plan.units.len());
    assert!(
        plan.units
            .iter()
            .any(|u| u.path.starts_with("./landsat_seasonal_medoid"))
    );
}

#[test]
fn plan_rejects_units_sharing_a_path() {
    let fx = Fixture::new();
    let mut job = fx.load(SEASONAL_MEAN).unwrap().job;
    job.output_products[1].file_path_template = job.output_products[0].file_path_template.clone();

    match Plan::build(&job, &fx.statistics, &[TileIndex(0, 0)]).unwrap_err() {
        JobError::Template { path, source } => {
            assert_eq!(path, "output_products[1].file_path_template");
            assert!(matches!(source, TemplateError::Collision { .. }));
        }
        other => panic!("expected template collision, got {:?}", other),
    }
}

#[test]
fn existing_output_policies() {
    let tmp = tempfile::tempdir().unwrap();
    let existing = tmp.path().join("SR_N_MEAN/SR_N_MEAN_3577_12_-5_20150101.nc");
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, b"old").unwrap();

    let fx = Fixture::new();
    let tiles = [TileIndex(12, -5)];
    let base = with_location(SEASONAL_MEAN, tmp.path());

    let job = fx.load(&base).unwrap().job;
    match Plan::build(&job, &fx.statistics, &tiles).unwrap_err() {
        JobError::OutputExists { path } => assert_eq!(path, existing),
        other => panic!("expected existing output error, got {:?}", other),
    }

    let job = fx
        .load(&format!("on_existing_output: skip\n{}", base))
        .unwrap()
        .job;
    let plan = Plan::build(&job, &fx.statistics, &tiles).unwrap();
    assert_eq!(plan.count(OutputAction::Skip), 1);
    assert_eq!(plan.count(OutputAction::Write), 2);

    let job = fx
        .load(&format!("on_existing_output: overwrite\n{}", base))
        .unwrap()
        .job;
    let plan = Plan::build(&job, &fx.statistics, &tiles).unwrap();
    assert_eq!(plan.count(OutputAction::Overwrite), 1);
}

/// Fails every unit of one tile; writes a marker file for the rest.
struct FlakyExecutor {
    failing_tile: TileIndex,
    calls: AtomicUsize,
}

impl UnitExecutor for FlakyExecutor {
    fn execute(&self, _job: &JobSpec, unit: &WorkUnit) -> Result<(), UnitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if unit.tile == self.failing_tile {
            return Err(UnitError::Computation(format!("no data for {}", unit.tile)));
        }
        let parent = unit.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| UnitError::StorageWrite(e.to_string()))?;
        fs::write(&unit.path, b"stats").map_err(|e| UnitError::StorageWrite(e.to_string()))
    }
}

#[test]
fn failing_units_do_not_abort_siblings() {
    let tmp = tempfile::tempdir().unwrap();
    let fx = Fixture::new();
    let job = fx.load(&with_location(SEASONAL_MEAN, tmp.path())).unwrap().job;
    let plan = Plan::build(&job, &fx.statistics, &[TileIndex(12, -5), TileIndex(13, -5)]).unwrap();

    let executor = FlakyExecutor {
        failing_tile: TileIndex(13, -5),
        calls: AtomicUsize::new(0),
    };
    let summary = run_plan(&job, &plan, &executor);

    assert_eq!(executor.calls.load(Ordering::SeqCst), 6);
    assert_eq!(summary.written, 3);
    assert_eq!(summary.failed, 3);
    assert!(!summary.is_success());
    assert!(summary.failures().all(|o| o.tile == TileIndex(13, -5)));
    assert_eq!(
        summary.outcomes[0].status,
        UnitStatus::Written,
    );
    assert!(tmp
        .path()
        .join("SR_N_MEAN/SR_N_MEAN_3577_12_-5_20150101.nc")
        .exists());

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["failed"], 3);
    assert_eq!(json["outcomes"][1]["status"], "failed");
    assert_eq!(json["outcomes"][1]["kind"], "computation");
}

#[test]
fn skipped_units_are_not_executed() {
    let tmp = tempfile::tempdir().unwrap();
    let fx = Fixture::new();
    let doc = format!(
        "on_existing_output: skip\n{}",
        with_location(SEASONAL_MEAN, tmp.path())
    );
    let job = fx.load(&doc).unwrap().job;
    let tiles = [TileIndex(12, -5)];

    let executor = FlakyExecutor {
        failing_tile: TileIndex(99, 99),
        calls: AtomicUsize::new(0),
    };
    let first = run_plan(&job, &Plan::build(&job, &fx.statistics, &tiles).unwrap(), &executor);
    assert_eq!(first.written, 3);

    let second = run_plan(&job, &Plan::build(&job, &fx.statistics, &tiles).unwrap(), &executor);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.written, 0);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
}
