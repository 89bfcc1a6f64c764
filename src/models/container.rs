use serde::ser::{Error as _, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{MetadataError, Result, ViolationKind};
use crate::migration::Migrator;
use crate::models::category::Category;
use crate::models::value::MetadataValue;
use crate::schema::registry::SchemaRegistry;
use crate::schema::version::SchemaVersion;
use crate::utils::flatten::{expand, flatten, FlatMap};
use crate::utils::naming::{normalize_path, parent_path};

/// Lifecycle of a container owned by a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Validated,
    Attached,
    Detached,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Validated => "validated",
            ContainerState::Attached => "attached",
            ContainerState::Detached => "detached",
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed metadata for one category instance, stored flat by dotted path.
#[derive(Clone)]
pub struct MetadataContainer {
    category: Category,
    registry: Arc<SchemaRegistry>,
    values: BTreeMap<String, MetadataValue>,
    non_standard: BTreeSet<String>,
    state: ContainerState,
}

impl MetadataContainer {
    pub fn new(category: Category, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            category,
            registry,
            values: BTreeMap::new(),
            non_standard: BTreeSet::new(),
            state: ContainerState::Created,
        }
    }

    /// Empty container against the process-wide registry.
    pub fn standard(category: Category) -> Result<Self> {
        Ok(Self::new(category, SchemaRegistry::shared()?))
    }

    /// Build from a nested (or dotted) mapping, migrating old layouts first.
    pub fn from_mapping(
        category: Category,
        registry: Arc<SchemaRegistry>,
        mapping: &Value,
    ) -> Result<Self> {
        Self::from_flat(category, registry, &flatten(mapping)?)
    }

    /// Same as [`from_mapping`](Self::from_mapping) with a known source version.
    pub fn from_mapping_version(
        category: Category,
        registry: Arc<SchemaRegistry>,
        mapping: &Value,
        source: SchemaVersion,
    ) -> Result<Self> {
        let migrated = Migrator::new()
            .with_target(registry.version())
            .migrate(category, &flatten(mapping)?, source)?;
        Self::from_validated(category, registry, &migrated)
    }

    pub fn from_flat(
        category: Category,
        registry: Arc<SchemaRegistry>,
        mapping: &FlatMap,
    ) -> Result<Self> {
        let (migrated, _) = Migrator::new()
            .with_target(registry.version())
            .migrate_detected(category, mapping)?;
        Self::from_validated(category, registry, &migrated)
    }

    pub fn from_json_str(
        category: Category,
        registry: Arc<SchemaRegistry>,
        json: &str,
    ) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_mapping(category, registry, &value)
    }

    fn from_validated(
        category: Category,
        registry: Arc<SchemaRegistry>,
        mapping: &FlatMap,
    ) -> Result<Self> {
        let validated = registry.validate(category, mapping)?;
        Ok(Self {
            category,
            registry,
            values: validated.values,
            non_standard: validated.non_standard,
            state: ContainerState::Validated,
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn non_standard_fields(&self) -> &BTreeSet<String> {
        &self.non_standard
    }

    pub fn is_non_standard(&self, path: &str) -> bool {
        self.non_standard.contains(&normalize_path(path))
    }

    /// Set one field. Either the value is stored or the container is untouched.
    ///
    /// Declared paths must match their type (integers widen to floats and
    /// timestamp strings are parsed) and their vocabulary. Undeclared paths
    /// become non-standard fields.
    pub fn set(&mut self, path: &str, value: impl Into<MetadataValue>) -> Result<()> {
        self.ensure_mutable()?;
        let path = normalize_path(path);
        let value = value.into();

        if let Some(f) = value.as_f64() {
            if !f.is_finite() {
                return Err(MetadataError::Value {
                    path,
                    message: format!("{} is not a finite number", f),
                });
            }
        }

        let schema = self.registry.schema(self.category)?;
        match schema.get(&path) {
            Some(descriptor) => {
                let typed = value
                    .conform(descriptor.value_type)
                    .map_err(|rejected| MetadataError::Type {
                        path: path.clone(),
                        expected: descriptor.value_type.to_string(),
                        found: rejected.type_name().to_string(),
                    })?;

                if let Some(violation) = descriptor.check_value(&typed) {
                    return Err(MetadataError::Value {
                        path,
                        message: describe_violation(&violation.kind),
                    });
                }

                self.values.insert(path, typed);
            }
            None => {
                if let Some(violation) = schema.undeclared_conflict(&path) {
                    return Err(match violation.kind {
                        ViolationKind::TypeMismatch { expected, found } => MetadataError::Type {
                            path,
                            expected,
                            found,
                        },
                        other => MetadataError::Value {
                            path,
                            message: describe_violation(&other),
                        },
                    });
                }
                self.check_non_standard_nesting(&path)?;
                debug!("Setting non-standard {} field '{}'", self.category, path);
                self.non_standard.insert(path.clone());
                self.values.insert(path, value);
            }
        }
        Ok(())
    }

    /// A stored value cannot sit above or below another stored value.
    fn check_non_standard_nesting(&self, path: &str) -> Result<()> {
        let mut current = path;
        while let Some(parent) = parent_path(current) {
            if self.values.contains_key(parent) {
                return Err(MetadataError::Type {
                    path: path.to_string(),
                    expected: format!("a value at '{}'", parent),
                    found: "a namespace".to_string(),
                });
            }
            current = parent;
        }

        let prefix = format!("{}.", path);
        if let Some(child) = self.values.keys().find(|key| key.starts_with(&prefix)) {
            return Err(MetadataError::Type {
                path: path.to_string(),
                expected: format!("namespace holding '{}'", child),
                found: "a value".to_string(),
            });
        }
        Ok(())
    }

    /// Set from an untyped JSON value, parsing strings the way input files are read.
    pub fn set_json(&mut self, path: &str, raw: &Value) -> Result<()> {
        let path = normalize_path(path);
        let coerced = match self.registry.descriptor(self.category, &path) {
            Some(descriptor) => descriptor.coerce(raw).map_err(|violation| match violation.kind {
                ViolationKind::TypeMismatch { expected, found } => MetadataError::Type {
                    path: path.clone(),
                    expected,
                    found,
                },
                other => MetadataError::Value {
                    path: path.clone(),
                    message: describe_violation(&other),
                },
            })?,
            None => MetadataValue::infer(raw).ok_or_else(|| MetadataError::Value {
                path: path.clone(),
                message: "null is not a value".to_string(),
            })?,
        };
        self.set(&path, coerced)
    }

    /// Stored value, else the declared default.
    ///
    /// `Ok(None)` means the path is declared but has neither.
    pub fn get(&self, path: &str) -> Result<Option<&MetadataValue>> {
        let path = normalize_path(path);
        if let Some(value) = self.values.get(&path) {
            return Ok(Some(value));
        }
        match self.registry.descriptor(self.category, &path) {
            Some(descriptor) => Ok(descriptor.default.as_ref()),
            None => Err(MetadataError::Key {
                path,
                category: self.category.to_string(),
            }),
        }
    }

    /// Stored value only.
    pub fn value(&self, path: &str) -> Option<&MetadataValue> {
        self.values.get(path)
    }

    pub fn get_string(&self, path: &str) -> Option<String> {
        self.get(path).ok().flatten().map(|v| v.to_string())
    }

    pub fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path).ok().flatten().and_then(MetadataValue::as_f64)
    }

    pub fn remove(&mut self, path: &str) -> Result<Option<MetadataValue>> {
        self.ensure_mutable()?;
        let path = normalize_path(path);
        if !self.values.contains_key(&path)
            && self.registry.descriptor(self.category, &path).is_none()
        {
            return Err(MetadataError::Key {
                path,
                category: self.category.to_string(),
            });
        }
        self.non_standard.remove(&path);
        Ok(self.values.remove(&path))
    }

    /// Value of the field that names this container inside its parent.
    pub fn identifier(&self) -> Option<String> {
        self.values
            .get(self.category.identifier_field())
            .map(|v| v.to_string())
    }

    /// Dotted mapping of the stored values.
    pub fn to_flat(&self) -> FlatMap {
        self.values
            .iter()
            .map(|(path, value)| (path.clone(), value.to_json()))
            .collect()
    }

    /// Nested mapping of the stored values.
    pub fn to_mapping(&self) -> Result<Value> {
        expand(&self.to_flat())
    }

    /// Nested mapping with declared defaults filled in.
    pub fn to_full_mapping(&self) -> Result<Value> {
        let mut flat = self.to_flat();
        for descriptor in self.registry.get_descriptors(self.category)? {
            if let Some(default) = &descriptor.default {
                flat.entry(descriptor.name.clone())
                    .or_insert_with(|| default.to_json());
            }
        }
        expand(&flat)
    }

    pub fn to_json_string(&self, pretty: bool) -> Result<String> {
        let mapping = self.to_mapping()?;
        let json = if pretty {
            serde_json::to_string_pretty(&mapping)?
        } else {
            serde_json::to_string(&mapping)?
        };
        Ok(json)
    }

    /// Whole-object validation (required fields included).
    pub fn validate(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.registry.validate(self.category, &self.to_flat())?;
        if self.state == ContainerState::Created {
            self.state = ContainerState::Validated;
        }
        Ok(())
    }

    pub(crate) fn mark_attached(&mut self) -> Result<()> {
        match self.state {
            ContainerState::Validated => {
                self.state = ContainerState::Attached;
                Ok(())
            }
            other => Err(MetadataError::InvalidState(format!(
                "Cannot attach a {} {} container",
                other, self.category
            ))),
        }
    }

    pub(crate) fn mark_detached(&mut self) {
        self.state = ContainerState::Detached;
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.state == ContainerState::Detached {
            return Err(MetadataError::InvalidState(format!(
                "{} container has been detached",
                self.category
            )));
        }
        Ok(())
    }
}

fn describe_violation(kind: &ViolationKind) -> String {
    match kind {
        ViolationKind::MissingRequired => "required field is missing".to_string(),
        ViolationKind::TypeMismatch { expected, found } => {
            format!("expected {}, found {}", expected, found)
        }
        ViolationKind::DisallowedValue { value, allowed } => {
            format!("'{}' is not one of [{}]", value, allowed.join(", "))
        }
        ViolationKind::OutOfRange { value, min, max } => {
            format!("{} is outside [{}, {}]", value, min, max)
        }
    }
}

impl PartialEq for MetadataContainer {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category
            && self.values == other.values
            && self.non_standard == other.non_standard
    }
}

impl fmt::Debug for MetadataContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataContainer")
            .field("category", &self.category)
            .field("state", &self.state)
            .field("values", &self.values)
            .field("non_standard", &self.non_standard)
            .finish()
    }
}

impl Serialize for MetadataContainer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_mapping()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        SchemaRegistry::shared().unwrap()
    }

    fn station() -> MetadataContainer {
        MetadataContainer::from_mapping(
            Category::Station,
            registry(),
            &json!({
                "archive_id": "MT001",
                "location": {"latitude": 40.1, "longitude": -116.2, "elevation": 1200.0},
                "time_period": {"start": "2020-01-01T00:00:00+00:00"},
                "channels_recorded": ["Ex", "Ey", "Hx", "Hy", "Hz"]
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_from_mapping_validates() {
        let station = station();
        assert_eq!(station.state(), ContainerState::Validated);
        assert_eq!(station.identifier().as_deref(), Some("MT001"));
        assert_eq!(station.get_f64("location.latitude"), Some(40.1));
    }

    #[test]
    fn test_round_trip() {
        let station = station();
        let rebuilt =
            MetadataContainer::from_mapping(Category::Station, registry(), &station.to_mapping().unwrap())
                .unwrap();
        assert_eq!(rebuilt, station);
    }

    #[test]
    fn test_set_type_error_leaves_container_unchanged() {
        let mut station = station();
        let before = station.clone();

        let err = station.set("location.latitude", "north").unwrap_err();
        assert!(matches!(err, MetadataError::Type { .. }));
        let err = station.set("location.latitude", 95.0).unwrap_err();
        assert!(matches!(err, MetadataError::Value { .. }));
        let err = station.set("data_type", "XMT").unwrap_err();
        assert!(matches!(err, MetadataError::Value { .. }));
        assert!(station.set("location.elevation", f64::NAN).is_err());

        assert_eq!(station, before);
    }

    #[test]
    fn test_set_widens_and_parses() {
        let mut run = MetadataContainer::standard(Category::Run).unwrap();
        run.set("sample_rate", 256i64).unwrap();
        run.set("time_period/start", "2020-01-01 10:00:00").unwrap();

        assert_eq!(run.get("sample_rate").unwrap(), Some(&MetadataValue::Float(256.0)));
        assert_eq!(
            run.get_string("time_period.start").as_deref(),
            Some("2020-01-01T10:00:00+00:00")
        );
    }

    #[test]
    fn test_get_defaults_and_key_errors() {
        let station = station();
        assert_eq!(
            station.get("data_type").unwrap(),
            Some(&MetadataValue::from("BBMT"))
        );
        assert_eq!(station.get("geographic_name").unwrap(), None);
        assert!(matches!(
            station.get("custom.note"),
            Err(MetadataError::Key { .. })
        ));
    }

    #[test]
    fn test_non_standard_fields_round_trip() {
        let mut mapping = station().to_mapping().unwrap();
        mapping["custom"] = json!({"note": "installed under a tree"});

        let station =
            MetadataContainer::from_mapping(Category::Station, registry(), &mapping).unwrap();
        assert!(station.is_non_standard("custom.note"));
        assert_eq!(station.to_mapping().unwrap(), mapping);
    }

    #[test]
    fn test_set_non_standard_and_conflicts() {
        let mut station = station();
        station.set("custom.note", "windy").unwrap();
        assert!(station.is_non_standard("custom.note"));

        assert!(matches!(
            station.set("location", "somewhere"),
            Err(MetadataError::Type { .. })
        ));
        assert!(matches!(
            station.set("location.latitude.deg", 40.0),
            Err(MetadataError::Type { .. })
        ));
    }

    #[test]
    fn test_non_standard_values_cannot_nest() {
        let mut station = station();
        station.set("custom", "a").unwrap();
        assert!(matches!(
            station.set("custom.note", "b"),
            Err(MetadataError::Type { ref path, .. }) if path == "custom.note"
        ));
        station.set("custom", "replaced").unwrap();
        assert!(station.to_mapping().is_ok());

        station.set("extra.note", "b").unwrap();
        assert!(matches!(station.set("extra", "a"), Err(MetadataError::Type { .. })));
        assert!(station.to_mapping().is_ok());
    }

    #[test]
    fn test_full_mapping_includes_defaults() {
        let full = station().to_full_mapping().unwrap();
        assert_eq!(full["location"]["datum"], json!("WGS84"));
        assert_eq!(full["data_type"], json!("BBMT"));
        assert!(station().to_mapping().unwrap().get("data_type").is_none());
    }

    #[test]
    fn test_detached_container_rejects_set() {
        let mut station = station();
        station.mark_attached().unwrap();
        station.set("comments", "ok").unwrap();
        station.mark_detached();
        assert!(matches!(
            station.set("comments", "late"),
            Err(MetadataError::InvalidState(_))
        ));
    }

    #[test]
    fn test_validate_reports_missing_required() {
        let mut run = MetadataContainer::standard(Category::Run).unwrap();
        run.set("id", "a").unwrap();
        let err = run.validate().unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(run.state(), ContainerState::Created);

        run.set("sample_rate", 8.0).unwrap();
        run.validate().unwrap();
        assert_eq!(run.state(), ContainerState::Validated);
    }

    #[test]
    fn test_legacy_mapping_is_migrated() {
        let logger = MetadataContainer::from_mapping(
            Category::DataLogger,
            registry(),
            &json!({"battery.start_voltage_d": 12.5}),
        )
        .unwrap();
        assert_eq!(logger.get_f64("battery.voltage.start"), Some(12.5));
    }
}
