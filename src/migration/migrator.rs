use serde_json::Value;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::migration::rules::{MigrationRule, Transform, LEGACY_LAYOUT_KEYS, STANDARD_RULES};
use crate::models::category::Category;
use crate::models::value::split_list;
use crate::schema::version::SchemaVersion;
use crate::utils::constants::SCHEMA_VERSION_KEY;
use crate::utils::flatten::{json_kind, FlatMap};
use crate::utils::naming::{has_type_suffix, strip_type_suffixes};

/// Applies an ordered rule list to bring old mappings up to a target version.
#[derive(Debug, Clone)]
pub struct Migrator {
    rules: Vec<MigrationRule>,
    target: SchemaVersion,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Migrator {
    pub fn new() -> Self {
        Self {
            rules: STANDARD_RULES.to_vec(),
            target: SchemaVersion::current(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<MigrationRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_target(mut self, target: SchemaVersion) -> Self {
        self.target = target;
        self
    }

    pub fn rules(&self) -> &[MigrationRule] {
        &self.rules
    }

    pub fn target(&self) -> SchemaVersion {
        self.target
    }

    /// Rewrite `mapping` from `source` to the target version in one ordered pass.
    ///
    /// Paths that a rule names but the mapping lacks are skipped. A mapping
    /// already at the target version comes back unchanged. Rules whose range
    /// ends past the target are left out.
    pub fn migrate(
        &self,
        category: Category,
        mapping: &FlatMap,
        source: SchemaVersion,
    ) -> Result<FlatMap> {
        if source > self.target {
            return Err(MetadataError::InvalidFormat(format!(
                "Schema version {} is newer than supported version {}",
                source, self.target
            )));
        }

        let mut migrated = mapping.clone();
        for rule in self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(category, &source) && rule.range.until <= self.target)
        {
            apply_rule(rule, &mut migrated)?;
        }

        if let Some(version) = migrated.get_mut(SCHEMA_VERSION_KEY) {
            *version = Value::String(self.target.to_string());
        }

        Ok(migrated)
    }

    /// Detect the source version, then migrate.
    pub fn migrate_detected(
        &self,
        category: Category,
        mapping: &FlatMap,
    ) -> Result<(FlatMap, SchemaVersion)> {
        let source = detect_version(mapping)?;
        if source != self.target {
            debug!("Migrating {} metadata from {} to {}", category, source, self.target);
        }
        Ok((self.migrate(category, mapping, source)?, source))
    }
}

/// Guess the schema version a mapping was written under.
///
/// An explicit `schema_version` key wins. Otherwise type-suffixed keys mean
/// 0.1.0 and keys from the pre-`time_period` layout mean 0.2.0.
pub fn detect_version(mapping: &FlatMap) -> Result<SchemaVersion> {
    if let Some(raw) = mapping.get(SCHEMA_VERSION_KEY) {
        return match raw {
            Value::String(s) => s.parse(),
            other => Err(MetadataError::InvalidFormat(format!(
                "'{}' must be a string, found {}",
                SCHEMA_VERSION_KEY,
                json_kind(other)
            ))),
        };
    }

    if mapping.keys().any(|key| has_type_suffix(key)) {
        return Ok(SchemaVersion::suffixed());
    }

    let legacy_layout = LEGACY_LAYOUT_KEYS.iter().any(|key| mapping.contains_key(*key))
        || matches!(mapping.get("channels_recorded"), Some(Value::String(_)));
    if legacy_layout {
        return Ok(SchemaVersion::legacy_layout());
    }

    Ok(SchemaVersion::current())
}

/// Migrate with the standard rule set.
pub fn migrate(category: Category, mapping: &FlatMap, source: SchemaVersion) -> Result<FlatMap> {
    Migrator::new().migrate(category, mapping, source)
}

fn apply_rule(rule: &MigrationRule, mapping: &mut FlatMap) -> Result<()> {
    match rule.transform {
        Transform::Rename => {
            if let Some(value) = mapping.remove(rule.old_path) {
                debug!("[{}] {} -> {}", rule.name, rule.old_path, rule.new_path);
                insert_renamed(mapping, rule.old_path, rule.new_path, value)?;
            }
        }
        Transform::NestScalar => {
            if let Some(value) = mapping.get(rule.old_path) {
                if value.is_array() || value.is_object() {
                    return Err(MetadataError::Migration {
                        path: rule.old_path.to_string(),
                        expected: "a scalar".to_string(),
                        found: json_kind(value).to_string(),
                    });
                }
                if let Some(value) = mapping.remove(rule.old_path) {
                    debug!("[{}] nest {} -> {}", rule.name, rule.old_path, rule.new_path);
                    insert_renamed(mapping, rule.old_path, rule.new_path, value)?;
                }
            }
        }
        Transform::SplitList => {
            let items = match mapping.get(rule.old_path) {
                Some(Value::String(s)) => split_list(s),
                Some(Value::Array(_)) | Some(Value::Null) | None => return Ok(()),
                Some(other) => {
                    return Err(MetadataError::Migration {
                        path: rule.old_path.to_string(),
                        expected: "a comma separated string".to_string(),
                        found: json_kind(other).to_string(),
                    })
                }
            };
            debug!("[{}] split {}", rule.name, rule.old_path);
            mapping.remove(rule.old_path);
            mapping.insert(
                rule.new_path.to_string(),
                Value::Array(items.into_iter().map(Value::String).collect()),
            );
        }
        Transform::StripTypeSuffixes => {
            let suffixed: Vec<String> = mapping
                .keys()
                .filter(|key| has_type_suffix(key))
                .cloned()
                .collect();
            for old_path in suffixed {
                if let Some(value) = mapping.remove(&old_path) {
                    let new_path = strip_type_suffixes(&old_path);
                    debug!("[{}] {} -> {}", rule.name, old_path, new_path);
                    insert_renamed(mapping, &old_path, &new_path, value)?;
                }
            }
        }
    }
    Ok(())
}

fn insert_renamed(mapping: &mut FlatMap, old_path: &str, new_path: &str, value: Value) -> Result<()> {
    match mapping.get(new_path) {
        Some(existing) if *existing != value => Err(MetadataError::Migration {
            path: old_path.to_string(),
            expected: format!("'{}' to be unset or equal", new_path),
            found: existing.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            mapping.insert(new_path.to_string(), value);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn flat(value: Value) -> FlatMap {
        crate::utils::flatten::flatten(&value).unwrap()
    }

    #[test]
    fn test_battery_voltage_rename() {
        let input = flat(json!({"battery.start_voltage_d": 12.5}));
        let migrated = migrate(Category::DataLogger, &input, SchemaVersion::suffixed()).unwrap();
        assert_eq!(migrated, flat(json!({"battery.voltage.start": 12.5})));
    }

    #[test]
    fn test_power_source_becomes_battery() {
        let input = flat(json!({
            "power_source": {"type_s": "pb-acid", "end_voltage_d": 11.9},
            "n_channels_i": 5
        }));
        let migrated = migrate(Category::DataLogger, &input, SchemaVersion::suffixed()).unwrap();
        assert_eq!(
            migrated,
            flat(json!({
                "battery": {"type": "pb-acid", "voltage": {"end": 11.9}},
                "n_channels": 5
            }))
        );
    }

    #[test]
    fn test_station_legacy_layout() {
        let input = flat(json!({
            "sta_code_s": "MT001",
            "start_s": "2020-01-01T00:00:00",
            "channels_recorded_s": "Ex, Ey, Hx",
            "location": {"declination_d": 12.3, "latitude_d": 40.0}
        }));
        let migrated = migrate(Category::Station, &input, SchemaVersion::suffixed()).unwrap();
        assert_eq!(
            migrated,
            flat(json!({
                "archive_id": "MT001",
                "time_period": {"start": "2020-01-01T00:00:00"},
                "channels_recorded": ["Ex", "Ey", "Hx"],
                "location": {"declination": {"value": 12.3}, "latitude": 40.0}
            }))
        );
    }

    #[test]
    fn test_acquired_by_email_is_flattened() {
        let input = flat(json!({"id": "s1", "acquired_by": {"contact": {"email": "a@b.org"}}}));
        assert_eq!(detect_version(&input).unwrap(), SchemaVersion::legacy_layout());

        let (migrated, source) = Migrator::new().migrate_detected(Category::Survey, &input).unwrap();
        assert_eq!(source, SchemaVersion::legacy_layout());
        assert_eq!(migrated, flat(json!({"id": "s1", "acquired_by": {"email": "a@b.org"}})));
    }

    #[test]
    fn test_migration_is_idempotent() {
        let input = flat(json!({
            "sta_code_s": "MT001",
            "end_s": "2020-02-01",
            "location": {"declination_d": -3.0}
        }));
        let once = migrate(Category::Station, &input, SchemaVersion::suffixed()).unwrap();
        let again = migrate(Category::Station, &once, SchemaVersion::current()).unwrap();
        let replayed = migrate(Category::Station, &once, SchemaVersion::suffixed()).unwrap();
        assert_eq!(once, again);
        assert_eq!(once, replayed);
        assert_eq!(detect_version(&once).unwrap(), SchemaVersion::current());
    }

    #[test]
    fn test_rename_onto_conflicting_target_fails() {
        let input = flat(json!({"start": "2020-01-01", "time_period": {"start": "2021-01-01"}}));
        let err = migrate(Category::Run, &input, SchemaVersion::legacy_layout()).unwrap_err();
        assert!(matches!(err, MetadataError::Migration { ref path, .. } if path == "start"));

        let equal = flat(json!({"start": "2020-01-01", "time_period": {"start": "2020-01-01"}}));
        let migrated = migrate(Category::Run, &equal, SchemaVersion::legacy_layout()).unwrap();
        assert_eq!(migrated, flat(json!({"time_period": {"start": "2020-01-01"}})));
    }

    #[test]
    fn test_older_target_keeps_later_layout() {
        let input = flat(json!({
            "sta_code_s": "MT001",
            "start_s": "2020-01-01T00:00:00",
            "location": {"declination_d": 12.3}
        }));
        let migrated = Migrator::new()
            .with_target(SchemaVersion::legacy_layout())
            .migrate(Category::Station, &input, SchemaVersion::suffixed())
            .unwrap();
        assert_eq!(
            migrated,
            flat(json!({
                "archive_id": "MT001",
                "start": "2020-01-01T00:00:00",
                "location": {"declination": 12.3}
            }))
        );
        assert_eq!(detect_version(&migrated).unwrap(), SchemaVersion::legacy_layout());
    }

    #[test]
    fn test_split_list_rejects_numbers() {
        let input = flat(json!({"channels_recorded": 5}));
        assert!(matches!(
            migrate(Category::Run, &input, SchemaVersion::legacy_layout()),
            Err(MetadataError::Migration { .. })
        ));
    }

    #[test]
    fn test_explicit_version_key() {
        let input = flat(json!({"schema_version": "0.2.0", "start": "2020-01-01"}));
        assert_eq!(detect_version(&input).unwrap(), SchemaVersion::legacy_layout());

        let migrated = migrate(Category::Run, &input, SchemaVersion::legacy_layout()).unwrap();
        assert_eq!(migrated["schema_version"], json!("0.3.0"));

        assert!(detect_version(&flat(json!({"schema_version": 3}))).is_err());
        assert!(migrate(Category::Run, &input, SchemaVersion::new(9, 0, 0)).is_err());
    }
}
