use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mth5_metadata::migration::migrate;
use mth5_metadata::models::{Category, MetadataContainer};
use mth5_metadata::processors::{BatchValidator, IntegrityChecker};
use mth5_metadata::schema::{SchemaRegistry, SchemaVersion};
use mth5_metadata::tree::MetadataTree;
use mth5_metadata::utils::coordinates::dms_to_decimal;
use mth5_metadata::utils::flatten::{flatten, FlatMap};
use mth5_metadata::models::MetadataRecord;
use serde_json::json;

fn station_mapping(i: usize) -> serde_json::Value {
    json!({
        "archive_id": format!("MT{:03}", i),
        "location": {
            "latitude": 40.0 + i as f64 * 0.01,
            "longitude": -116.0 - i as f64 * 0.01,
            "elevation": 1200.0
        },
        "time_period": {"start": "2020-06-01T00:00:00", "end": "2020-07-01T00:00:00"},
        "acquired_by": {"name": "field crew"}
    })
}

// Build a tree with `stations` stations, two runs each and four channels per run
fn create_test_tree(stations: usize) -> MetadataTree {
    let registry = SchemaRegistry::shared().unwrap();
    let mut tree = MetadataTree::new(registry.clone());

    for i in 0..stations {
        let station = MetadataContainer::from_mapping(Category::Station, registry.clone(), &station_mapping(i)).unwrap();
        let station_id = format!("MT{:03}", i);
        let station_path = tree.add_child("", &station_id, station).unwrap();

        for run in ["a", "b"] {
            let run_id = format!("{}{}", station_id, run);
            let metadata = MetadataContainer::from_mapping(
                Category::Run,
                registry.clone(),
                &json!({"id": run_id, "sample_rate": 256.0, "channels_recorded": ["Ex", "Ey", "Hx", "Hy"]}),
            )
            .unwrap();
            let run_path = tree.add_child(&station_path, &run_id, metadata).unwrap();

            for (component, category) in [
                ("Ex", Category::Electric),
                ("Ey", Category::Electric),
                ("Hx", Category::Magnetic),
                ("Hy", Category::Magnetic),
            ] {
                let channel = MetadataContainer::from_mapping(
                    category,
                    registry.clone(),
                    &json!({"component": component, "sample_rate": 256.0}),
                )
                .unwrap();
                tree.add_child(&run_path, component, channel).unwrap();
            }
        }
    }

    tree
}

fn benchmark_container_from_mapping(c: &mut Criterion) {
    let registry = SchemaRegistry::shared().unwrap();
    let mapping = station_mapping(1);

    c.bench_function("station_from_mapping", |b| {
        b.iter(|| {
            let station = MetadataContainer::from_mapping(Category::Station, registry.clone(), black_box(&mapping));
            black_box(station.map(|s| s.len()).unwrap_or(0))
        })
    });
}

fn benchmark_legacy_migration(c: &mut Criterion) {
    let legacy: FlatMap = flatten(&json!({
        "sta_code_s": "MT001",
        "start": "2020-06-01T00:00:00",
        "end": "2020-07-01T00:00:00",
        "location.declination_d": 12.1,
        "acquired_by.contact.email_s": "crew@example.org"
    }))
    .unwrap();

    c.bench_function("station_migration_0_1_0", |b| {
        b.iter(|| {
            let migrated = migrate(Category::Station, black_box(&legacy), SchemaVersion::suffixed());
            black_box(migrated.map(|m| m.len()).unwrap_or(0))
        })
    });
}

fn benchmark_coordinate_conversion(c: &mut Criterion) {
    let dms_coordinates = vec!["40:30:15", "-116:12:30", "38:45:22", "-117:18:45", "39:55:30"];

    c.bench_function("coordinate_conversion", |b| {
        b.iter(|| {
            let mut results = Vec::new();
            for dms in &dms_coordinates {
                if let Ok(decimal) = dms_to_decimal(dms) {
                    results.push(decimal);
                }
            }
            black_box(results.len())
        })
    });
}

fn benchmark_batch_validation(c: &mut Criterion) {
    let registry = SchemaRegistry::shared().unwrap();
    let records: Vec<MetadataRecord> = (0..500)
        .map(|i| {
            MetadataRecord::new(
                format!("station-{}", i),
                Category::Station,
                flatten(&station_mapping(i)).unwrap(),
            )
        })
        .collect();
    let validator = BatchValidator::new(registry, num_cpus::get());

    c.bench_function("batch_validation_500", |b| {
        b.iter(|| {
            let report = validator.validate_all(black_box(&records), None);
            black_box(report.map(|r| r.valid).unwrap_or(0))
        })
    });
}

fn benchmark_integrity_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrity_by_size");

    for &size in &[10, 50, 100] {
        let tree = create_test_tree(size);
        group.bench_with_input(BenchmarkId::new("stations", size), &tree, |b, tree| {
            b.iter(|| {
                let report = IntegrityChecker::new().check_integrity(black_box(tree));
                black_box(report.issues.len())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_container_from_mapping,
    benchmark_legacy_migration,
    benchmark_coordinate_conversion,
    benchmark_batch_validation,
    benchmark_integrity_by_size
);
criterion_main!(benches);
