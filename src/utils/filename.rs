use chrono::{Datelike, Local};
use std::path::{Path, PathBuf};

/// Default summary output: mth5-summary-{YYMMDD}.parquet
pub fn generate_default_summary_filename() -> PathBuf {
    let now = Local::now();
    let year = now.year() % 100;

    let filename = format!(
        "mth5-summary-{:02}{:02}{:02}.parquet",
        year,
        now.month(),
        now.day()
    );
    PathBuf::from("output").join(filename)
}

/// Output path for a migrated document: `station.json` -> `station.v0.3.0.json`
pub fn migrated_filename(input: &Path, version: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("metadata");
    input.with_file_name(format!("{}.v{}.json", stem, version))
}
