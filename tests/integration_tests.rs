use mth5_metadata::error::MetadataError;
use mth5_metadata::migration::{detect_version, migrate, Migrator};
use mth5_metadata::models::{Category, MetadataContainer, MetadataValue, SummaryLevel};
use mth5_metadata::processors::{BatchValidator, IntegrityChecker, IssueKind};
use mth5_metadata::readers::{collect_inputs, ConcurrentReader};
use mth5_metadata::schema::{SchemaRegistry, SchemaVersion};
use mth5_metadata::tree::{ArchiveDocument, ArchiveHandle, MetadataTree};
use mth5_metadata::utils::flatten::{flatten, FlatMap};
use mth5_metadata::writers::{ParquetWriter, StandardsWriter};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn registry() -> Arc<SchemaRegistry> {
    SchemaRegistry::shared().expect("standard registry")
}

fn container(category: Category, mapping: serde_json::Value) -> MetadataContainer {
    MetadataContainer::from_mapping(category, registry(), &mapping).unwrap()
}

fn station(archive_id: &str) -> MetadataContainer {
    container(
        Category::Station,
        json!({
            "archive_id": archive_id,
            "location": {"latitude": 40.5, "longitude": -116.25, "elevation": 1250.0},
            "time_period": {"start": "2020-06-01T00:00:00+00:00"}
        }),
    )
}

#[test]
fn test_round_trip_declared_fields() {
    let original = container(
        Category::Run,
        json!({
            "id": "MT001a",
            "sample_rate": 256.0,
            "data_type": "BBMT",
            "channels_recorded": ["Ex", "Ey", "Hx"],
            "time_period": {"start": "2020-06-01T12:00:00+00:00", "end": "2020-06-02T12:00:00+00:00"}
        }),
    );

    let mapping = original.to_mapping().unwrap();
    let rebuilt = MetadataContainer::from_mapping(Category::Run, registry(), &mapping).unwrap();
    assert_eq!(rebuilt, original);
}

#[test]
fn test_migration_is_idempotent() {
    let legacy: FlatMap = flatten(&json!({
        "sta_code_s": "MT001",
        "lat_d": 40.0,
        "power_source.start_voltage_d": 12.5
    }))
    .unwrap();

    let once = migrate(Category::Station, &legacy, SchemaVersion::suffixed()).unwrap();
    let twice = migrate(Category::Station, &once, SchemaVersion::current()).unwrap();
    assert_eq!(twice, once);
    assert_eq!(once["archive_id"], json!("MT001"));
}

#[test]
fn test_validation_reports_every_violation() {
    let err = MetadataContainer::from_mapping(Category::Run, registry(), &json!({"data_type": "XMT"}))
        .unwrap_err();

    let violations = err.violations();
    assert_eq!(violations.len(), 3, "{}", err);
    assert_eq!(violations.iter().filter(|v| v.is_missing()).count(), 2);
    assert!(violations.iter().any(|v| v.path == "data_type"));
}

#[test]
fn test_station_ids_are_unique() {
    let mut tree = MetadataTree::standard().unwrap();
    tree.add_child("", "MT001", station("MT001")).unwrap();

    let err = tree.add_child("", "MT001", station("MT001")).unwrap_err();
    assert!(matches!(err, MetadataError::Duplicate { .. }));

    tree.remove_child("", "MT001").unwrap();
    tree.add_child("", "MT001", station("MT001")).unwrap();
    assert_eq!(tree.stations().count(), 1);
}

#[test]
fn test_remove_cascades() {
    let mut tree = MetadataTree::standard().unwrap();
    let station_path = tree.add_child("", "MT001", station("MT001")).unwrap();
    let run_path = tree
        .add_child(
            &station_path,
            "MT001a",
            container(Category::Run, json!({"id": "MT001a", "sample_rate": 4096.0})),
        )
        .unwrap();
    let channel_path = tree
        .add_child(&run_path, "Ex", MetadataContainer::standard(Category::Electric).unwrap())
        .unwrap();
    assert_eq!(channel_path, "station/MT001/run/MT001a/channel/Ex");

    tree.remove_child("", "MT001").unwrap();

    for path in [station_path.as_str(), run_path.as_str(), channel_path.as_str()] {
        assert!(matches!(tree.find(path), Err(MetadataError::NotFound { .. })));
    }
    assert_eq!(tree.node_count(), 1);
}

#[test]
fn test_legacy_battery_voltage() {
    let legacy: FlatMap = flatten(&json!({"battery.start_voltage_d": 12.5})).unwrap();
    assert_eq!(detect_version(&legacy).unwrap(), SchemaVersion::suffixed());

    let migrated = migrate(Category::DataLogger, &legacy, SchemaVersion::suffixed()).unwrap();
    assert_eq!(migrated.len(), 1);
    assert_eq!(migrated["battery.voltage.start"], json!(12.5));

    registry().validate(Category::DataLogger, &migrated).unwrap();

    let logger = container(Category::DataLogger, json!({"battery.start_voltage_d": 12.5}));
    assert_eq!(
        logger.get("battery.voltage.start").unwrap(),
        Some(&MetadataValue::Float(12.5))
    );
}

#[test]
fn test_non_standard_fields_survive() {
    let mapping = json!({
        "id": "MT001a",
        "sample_rate": 1.0,
        "custom": {"note": "spare coil used"}
    });

    let run = container(Category::Run, mapping.clone());
    assert!(run.is_non_standard("custom.note"));
    assert_eq!(run.to_mapping().unwrap(), mapping);
}

#[test]
fn test_dms_coordinates_are_accepted() {
    let station = container(
        Category::Station,
        json!({"archive_id": "MT002", "location": {"latitude": "40:30:00", "longitude": "-116:15:00"}}),
    );
    assert_eq!(station.get_f64("location.latitude"), Some(40.5));
    assert_eq!(station.get_f64("location.longitude"), Some(-116.25));

    let err = MetadataContainer::from_mapping(
        Category::Station,
        registry(),
        &json!({"archive_id": "MT003", "location": {"latitude": "95:00:00", "longitude": 0.0}}),
    );
    assert!(err.is_err());
}

#[test]
fn test_explicit_schema_version_wins() {
    let mapping: FlatMap = flatten(&json!({"schema_version": "0.2.0", "start": "2020-01-01"})).unwrap();
    assert_eq!(detect_version(&mapping).unwrap(), SchemaVersion::legacy_layout());

    let migrated = Migrator::new()
        .migrate_detected(Category::Run, &mapping)
        .unwrap()
        .0;
    assert_eq!(migrated["schema_version"], json!("0.3.0"));
    assert!(migrated.contains_key("time_period.start"));

    let newer: FlatMap = flatten(&json!({"schema_version": "9.0.0"})).unwrap();
    assert!(Migrator::new().migrate_detected(Category::Run, &newer).is_err());
}

#[test]
fn test_standards_table_covers_every_category() {
    let registry = registry();
    let rows = registry.standards_table();
    for category in registry.categories() {
        assert!(
            rows.iter().any(|row| row.category == category.as_str()),
            "no attributes for {}",
            category
        );
    }

    let csv = StandardsWriter::to_csv_string(&rows).unwrap();
    assert!(csv.contains("data_logger,battery.voltage.start,float,false,volts,number,,"));
}

fn archive_json() -> serde_json::Value {
    json!({
        "survey": {"id": "CONUS"},
        "filters": [{"name": "lowpass", "type": "zpk"}],
        "stations": [{
            "metadata": {
                "archive_id": "MT001",
                "location": {"latitude": 40.5, "longitude": -116.25},
                "time_period": {"start": "2020-06-01T00:00:00", "end": "2020-06-10T00:00:00"}
            },
            "runs": [{
                "metadata": {
                    "id": "MT001a",
                    "sample_rate": 256.0,
                    "channels_recorded": ["Ex", "Hx"],
                    "time_period": {"start": "2020-06-02T00:00:00", "end": "2020-06-03T00:00:00"}
                },
                "data_logger": {"manufacturer": "Phoenix", "battery": {"voltage": {"start": 12.4}}},
                "channels": [
                    {"category": "electric", "metadata": {"component": "Ex", "sample_rate": 256.0, "filter": {"name": ["lowpass"]}}},
                    {"category": "magnetic", "metadata": {"component": "Hx", "sample_rate": 256.0, "filter": {"name": ["notch"]}}}
                ]
            }]
        }]
    })
}

#[test]
fn test_archive_summary_and_integrity() {
    let document: ArchiveDocument = serde_json::from_value(archive_json()).unwrap();
    let tree = document.into_tree(registry()).unwrap();

    let rows = tree.summary();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].level, SummaryLevel::Station);
    assert_eq!(rows[1].components, "Ex,Hx");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("summary.parquet");
    let writer = ParquetWriter::new().with_compression("zstd").unwrap();
    writer.write_summary(&rows, &path).unwrap();
    assert_eq!(writer.read_summary(&path, 100).unwrap(), rows);

    let report = IntegrityChecker::new().check_integrity(&tree);
    assert_eq!(report.stations, 1);
    assert_eq!(report.channels, 2);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::DanglingFilter);
    assert_eq!(report.issues[0].path, "station/MT001/run/MT001a/channel/Hx");
}

#[test]
fn test_archive_document_round_trip() {
    let document: ArchiveDocument = serde_json::from_value(archive_json()).unwrap();
    let tree = document.clone().into_tree(registry()).unwrap();
    let rebuilt = ArchiveDocument::from_tree(&tree).unwrap();

    let again = rebuilt.clone().into_tree(registry()).unwrap();
    assert_eq!(ArchiveDocument::from_tree(&again).unwrap(), rebuilt);
    assert_eq!(rebuilt.container_count(), document.container_count());
}

#[test]
fn test_concurrent_archive_handle() {
    let handle = ArchiveHandle::new(MetadataTree::standard().unwrap());

    let workers: Vec<_> = (0..6)
        .map(|i| {
            let handle = handle.clone();
            thread::spawn(move || {
                let id = format!("MT00{}", i % 3);
                handle.with_mut(|tree| tree.add_child("", &id, station(&id)).map(|_| ()))
            })
        })
        .collect();

    let added = workers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|result| result.is_ok())
        .count();

    assert_eq!(added, 3);
    assert_eq!(handle.with(|tree| tree.stations().count()).unwrap(), 3);
}

#[tokio::test]
async fn test_read_and_validate_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("station.json"),
        r#"{"station": {"archive_id": "MT001", "location": {"latitude": 40.5, "longitude": -116.25}}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("logger.txt"),
        "[data_logger]\nbattery.start_voltage_d = 12.5\nmanufacturer_s = Phoenix\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("broken.json"),
        r#"{"run": {"data_type": "XMT"}}"#,
    )
    .unwrap();

    let inputs = collect_inputs(&[dir.path().to_path_buf()]).unwrap();
    let records = ConcurrentReader::new(2).read_all(inputs).await.unwrap();
    assert_eq!(records.len(), 3);

    let report = BatchValidator::new(registry(), 2)
        .validate_all(&records, None)
        .unwrap();
    assert_eq!(report.valid, 2);
    assert_eq!(report.invalid, 1);
    assert_eq!(report.migrated, 1);

    let broken = report.outcomes.iter().find(|o| !o.is_valid()).unwrap();
    assert!(broken.source.ends_with("broken.json"));
    assert_eq!(broken.problems.len(), 3);
}
