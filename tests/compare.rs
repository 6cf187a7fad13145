mod common;

use common::{Fixture, SEASONAL_MEAN, seasonal_with};
use pretty_assertions::assert_eq;
use statsjob::compare::{Safety, compare};

#[test]
fn identical_jobs_are_unchanged() {
    let fx = Fixture::new();
    let a = fx.load(SEASONAL_MEAN).unwrap().job;
    let b = fx.load(&a.to_yaml().unwrap()).unwrap().job;
    let cmp = compare(&a, &b);
    assert!(cmp.is_unchanged());
    assert!(cmp.can_update(false));
}

#[test]
fn storage_tweaks_and_longer_range_are_safe() {
    let fx = Fixture::new();
    let old = fx.load(SEASONAL_MEAN).unwrap().job;
    let doc = seasonal_with("chunking: {x: 200, y: 200, time: 1}", "chunking: {x: 100, y: 100, time: 1}")
        .replacen("end_date: 2015-04-01", "end_date: 2016-01-01", 1)
        .replacen("zlib: True", "zlib: False", 1);
    let new = fx.load(&doc).unwrap().job;

    let cmp = compare(&old, &new);
    let fields: Vec<&str> = cmp.changes.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(
        fields,
        vec![
            "date_ranges.end_date",
            "storage.chunking",
            "output_products.landsat_seasonal_mean.zlib",
        ]
    );
    assert!(cmp.changes.iter().all(|c| c.safety == Safety::Safe));
    assert!(cmp.can_update(false));
}

#[test]
fn grid_and_statistic_changes_are_unsafe() {
    let fx = Fixture::new();
    let old = fx.load(SEASONAL_MEAN).unwrap().job;
    let doc = seasonal_with("resolution: {x: 25, y: -25}", "resolution: {x: 30, y: -30}")
        .replacen("statistic: medoid", "statistic: geomedian", 1)
        .replacen("end_date: 2015-04-01", "end_date: 2015-03-01", 1);
    let new = fx.load(&doc).unwrap().job;

    let cmp = compare(&old, &new);
    let unsafe_fields: Vec<&str> = cmp.unsafe_changes().map(|c| c.field.as_str()).collect();
    assert_eq!(
        unsafe_fields,
        vec![
            "date_ranges.end_date",
            "storage.resolution",
            "output_products.landsat_seasonal_medoid.statistic",
        ]
    );
    assert!(!cmp.can_update(false));
    assert!(cmp.can_update(true));
}

#[test]
fn added_products_are_safe_removed_are_not() {
    let fx = Fixture::new();
    let old = fx.load(SEASONAL_MEAN).unwrap().job;
    let renamed = seasonal_with(
        "name: landsat_seasonal_medoid",
        "name: landsat_seasonal_geomedian",
    );
    let new = fx.load(&renamed).unwrap().job;

    let cmp = compare(&old, &new);
    let summary: Vec<(&str, Safety)> = cmp
        .changes
        .iter()
        .map(|c| (c.field.as_str(), c.safety))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("output_products.landsat_seasonal_medoid", Safety::Unsafe),
            ("output_products.landsat_seasonal_geomedian", Safety::Safe),
        ]
    );
}
