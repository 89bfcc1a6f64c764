use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::migration::Migrator;
use crate::models::category::Category;
use crate::models::record::MetadataRecord;
use crate::schema::registry::SchemaRegistry;
use crate::schema::version::SchemaVersion;
use crate::utils::flatten::FlatMap;
use crate::utils::progress::ProgressReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Valid,
    Invalid,
}

/// Result of validating one record.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub source: String,
    pub category: Category,
    pub status: OutcomeStatus,
    /// Version the record was written under, when it could be determined.
    pub source_version: Option<SchemaVersion>,
    pub problems: Vec<String>,
    pub non_standard: Vec<String>,
}

impl RecordOutcome {
    pub fn is_valid(&self) -> bool {
        self.status == OutcomeStatus::Valid
    }

    pub fn was_migrated(&self) -> bool {
        self.source_version.map_or(false, |v| !v.is_current())
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
    pub valid: usize,
    pub invalid: usize,
    pub migrated: usize,
    pub non_standard_fields: usize,
}

impl BatchReport {
    fn from_outcomes(outcomes: Vec<RecordOutcome>) -> Self {
        let valid = outcomes.iter().filter(|o| o.is_valid()).count();
        let migrated = outcomes.iter().filter(|o| o.was_migrated()).count();
        let non_standard_fields = outcomes.iter().map(|o| o.non_standard.len()).sum();
        Self {
            invalid: outcomes.len() - valid,
            valid,
            migrated,
            non_standard_fields,
            outcomes,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }

    pub fn display_summary(&self) -> String {
        let mut summary = format!(
            "Validated {} records: {} valid, {} invalid, {} migrated, {} non-standard fields",
            self.outcomes.len(),
            self.valid,
            self.invalid,
            self.migrated,
            self.non_standard_fields
        );
        for outcome in self.outcomes.iter().filter(|o| !o.is_valid()) {
            summary.push_str(&format!("\n  {} ({}):", outcome.source, outcome.category));
            for problem in &outcome.problems {
                summary.push_str(&format!("\n    - {}", problem));
            }
        }
        summary
    }
}

/// Validates independent records in parallel on a bounded rayon pool.
pub struct BatchValidator {
    registry: Arc<SchemaRegistry>,
    max_workers: usize,
    strict: bool,
}

impl BatchValidator {
    pub fn new(registry: Arc<SchemaRegistry>, max_workers: usize) -> Self {
        Self {
            registry,
            max_workers: max_workers.max(1),
            strict: false,
        }
    }

    /// In strict mode a non-standard field makes a record invalid.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| MetadataError::InvalidState(e.to_string()))
    }

    pub fn validate_all(
        &self,
        records: &[MetadataRecord],
        progress: Option<&ProgressReporter>,
    ) -> Result<BatchReport> {
        let processed = AtomicUsize::new(0);

        if let Some(p) = progress {
            p.set_message(&format!("Validating {} records...", records.len()));
        }

        let outcomes: Vec<RecordOutcome> = self.pool()?.install(|| {
            records
                .par_iter()
                .map(|record| {
                    let outcome = self.validate_record(record);
                    processed.fetch_add(1, Ordering::Relaxed);
                    if let Some(p) = progress {
                        p.increment(1);
                    }
                    outcome
                })
                .collect()
        });

        debug!("Validated {} records", processed.load(Ordering::Relaxed));
        if let Some(p) = progress {
            p.finish_with_message("Validation complete");
        }

        Ok(BatchReport::from_outcomes(outcomes))
    }

    pub fn validate_record(&self, record: &MetadataRecord) -> RecordOutcome {
        let mut outcome = RecordOutcome {
            source: record.source.clone(),
            category: record.category,
            status: OutcomeStatus::Invalid,
            source_version: None,
            problems: Vec::new(),
            non_standard: Vec::new(),
        };

        let migrator = Migrator::new().with_target(self.registry.version());
        let migrated = match migrator.migrate_detected(record.category, &record.mapping) {
            Ok((migrated, source)) => {
                outcome.source_version = Some(source);
                migrated
            }
            Err(e) => {
                outcome.problems.push(e.to_string());
                return outcome;
            }
        };

        match self.registry.validate(record.category, &migrated) {
            Ok(validated) => {
                outcome.non_standard = validated.non_standard.into_iter().collect();
                if self.strict && !outcome.non_standard.is_empty() {
                    outcome.problems.extend(
                        outcome
                            .non_standard
                            .iter()
                            .map(|path| format!("{}: non-standard field", path)),
                    );
                } else {
                    outcome.status = OutcomeStatus::Valid;
                }
            }
            Err(e) => {
                let violations = e.violations();
                if violations.is_empty() {
                    outcome.problems.push(e.to_string());
                } else {
                    outcome
                        .problems
                        .extend(violations.iter().map(|v| v.to_string()));
                }
            }
        }

        outcome
    }

    /// Migrate every record to the registry's version, in parallel.
    ///
    /// Fails on the first record that cannot be migrated.
    pub fn migrate_all(&self, records: &[MetadataRecord]) -> Result<Vec<(MetadataRecord, SchemaVersion)>> {
        let migrator = Migrator::new().with_target(self.registry.version());
        self.pool()?.install(|| {
            records
                .par_iter()
                .map(|record| {
                    let (mapping, source): (FlatMap, SchemaVersion) =
                        migrator.migrate_detected(record.category, &record.mapping)?;
                    Ok((
                        MetadataRecord::new(record.source.clone(), record.category, mapping),
                        source,
                    ))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::flatten::flatten;
    use serde_json::json;

    fn record(source: &str, category: Category, mapping: serde_json::Value) -> MetadataRecord {
        MetadataRecord::new(source, category, flatten(&mapping).unwrap())
    }

    fn records() -> Vec<MetadataRecord> {
        vec![
            record("ok", Category::Run, json!({"id": "a", "sample_rate": 1.0})),
            record("legacy", Category::DataLogger, json!({"battery.start_voltage_d": 12.5})),
            record(
                "bad",
                Category::Station,
                json!({"location": {"latitude": 100.0, "longitude": 1.0}}),
            ),
            record("extra", Category::Filter, json!({"name": "f", "type": "fir", "vendor": "acme"})),
        ]
    }

    #[test]
    fn test_validate_all() {
        let validator = BatchValidator::new(SchemaRegistry::shared().unwrap(), 2);
        let report = validator.validate_all(&records(), None).unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.valid, 3);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.migrated, 1);
        assert_eq!(report.non_standard_fields, 1);

        let bad = &report.outcomes[2];
        assert_eq!(bad.source, "bad");
        assert_eq!(bad.problems.len(), 2);
        assert!(report.display_summary().contains("bad (station)"));
    }

    #[test]
    fn test_strict_mode_rejects_non_standard() {
        let validator = BatchValidator::new(SchemaRegistry::shared().unwrap(), 2).with_strict(true);
        let report = validator.validate_all(&records(), None).unwrap();
        assert_eq!(report.invalid, 2);
        assert!(!report.outcomes[3].is_valid());
    }

    #[test]
    fn test_migrate_all() {
        let validator = BatchValidator::new(SchemaRegistry::shared().unwrap(), 2);
        let migrated = validator.migrate_all(&records()).unwrap();
        assert_eq!(migrated[1].1, SchemaVersion::suffixed());
        assert_eq!(migrated[1].0.mapping["battery.voltage.start"], json!(12.5));
    }
}
