use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::error::{MetadataError, Result, Violation, ViolationKind};
use crate::models::category::Category;
use crate::models::descriptor::AttributeDescriptor;
use crate::models::value::MetadataValue;
use crate::schema::definitions::{compose, COMPOSITIONS};
use crate::schema::version::SchemaVersion;
use crate::utils::constants::{PATH_SEPARATOR, SCHEMA_VERSION_KEY};
use crate::utils::flatten::{json_kind, FlatMap};
use crate::utils::naming::parent_path;

/// Ordered descriptor list for one category, indexed by dotted path.
#[derive(Debug, Clone)]
pub struct CategorySchema {
    category: Category,
    descriptors: Vec<AttributeDescriptor>,
    index: HashMap<String, usize>,
    namespaces: HashSet<String>,
}

impl CategorySchema {
    pub fn new(category: Category, descriptors: Vec<AttributeDescriptor>) -> Result<Self> {
        let mut index = HashMap::with_capacity(descriptors.len());
        let mut namespaces = HashSet::new();

        for (position, descriptor) in descriptors.iter().enumerate() {
            descriptor.check_consistency()?;
            if index.insert(descriptor.name.clone(), position).is_some() {
                return Err(MetadataError::InvalidFormat(format!(
                    "Attribute '{}' is declared twice for {}",
                    descriptor.name, category
                )));
            }

            let mut current = descriptor.name.as_str();
            while let Some(parent) = parent_path(current) {
                namespaces.insert(parent.to_string());
                current = parent;
            }
        }

        if let Some(clash) = namespaces.iter().find(|ns| index.contains_key(*ns)) {
            return Err(MetadataError::InvalidFormat(format!(
                "'{}' is both an attribute and a namespace for {}",
                clash, category
            )));
        }

        Ok(Self {
            category,
            descriptors,
            index,
            namespaces,
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, path: &str) -> Option<&AttributeDescriptor> {
        self.index.get(path).map(|&i| &self.descriptors[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// True for a declared sub-namespace such as `location` or `location.declination`.
    pub fn is_namespace(&self, path: &str) -> bool {
        self.namespaces.contains(path)
    }

    /// Why an undeclared path cannot coexist with the declared ones, if it cannot.
    pub fn undeclared_conflict(&self, path: &str) -> Option<Violation> {
        if self.is_namespace(path) {
            return Some(Violation::new(
                path,
                ViolationKind::TypeMismatch {
                    expected: format!("namespace '{}'", path),
                    found: "a value".to_string(),
                },
            ));
        }

        let mut current = path;
        while let Some(parent) = parent_path(current) {
            if let Some(descriptor) = self.get(parent) {
                return Some(Violation::new(
                    path,
                    ViolationKind::TypeMismatch {
                        expected: format!("{} at '{}'", descriptor.value_type, parent),
                        found: "a namespace".to_string(),
                    },
                ));
            }
            current = parent;
        }
        None
    }
}

/// Nearest dotted ancestor of `path` that holds a non-null value in `mapping`.
fn value_ancestor<'a>(mapping: &FlatMap, path: &'a str) -> Option<&'a str> {
    let mut current = path;
    while let Some(parent) = parent_path(current) {
        if mapping.get(parent).map_or(false, |raw| !raw.is_null()) {
            return Some(parent);
        }
        current = parent;
    }
    None
}

/// Output of a successful validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedMapping {
    pub values: BTreeMap<String, MetadataValue>,
    pub non_standard: BTreeSet<String>,
}

/// One row of the flattened standards table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardsRow {
    pub category: String,
    pub attribute: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub required: bool,
    pub units: String,
    pub style: String,
    pub allowed_values: String,
    pub default: String,
}

/// Category schemas for one schema version.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    version: SchemaVersion,
    schemas: BTreeMap<Category, CategorySchema>,
}

static SHARED: OnceLock<std::result::Result<Arc<SchemaRegistry>, String>> = OnceLock::new();

impl SchemaRegistry {
    /// Build the registry from the bundled standards tables.
    pub fn standard() -> Result<Self> {
        let mut schemas = BTreeMap::new();
        for composition in COMPOSITIONS {
            let descriptors = compose(composition)?;
            schemas.insert(
                composition.category,
                CategorySchema::new(composition.category, descriptors)?,
            );
        }

        let registry = Self {
            version: SchemaVersion::current(),
            schemas,
        };
        debug!(
            "Built schema registry {} with {} categories",
            registry.version,
            registry.schemas.len()
        );
        Ok(registry)
    }

    /// Process-wide registry, built on first use and shared read-only afterwards.
    pub fn shared() -> Result<Arc<SchemaRegistry>> {
        SHARED
            .get_or_init(|| {
                SchemaRegistry::standard()
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .clone()
            .map_err(MetadataError::InvalidState)
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.schemas.keys().copied()
    }

    pub fn schema(&self, category: Category) -> Result<&CategorySchema> {
        self.schemas.get(&category).ok_or_else(|| {
            MetadataError::InvalidState(format!("No schema registered for {}", category))
        })
    }

    pub fn get_descriptors(&self, category: Category) -> Result<&[AttributeDescriptor]> {
        Ok(self.schema(category)?.descriptors())
    }

    pub fn descriptor(&self, category: Category, path: &str) -> Option<&AttributeDescriptor> {
        self.schemas.get(&category).and_then(|schema| schema.get(path))
    }

    /// Validate a dotted mapping, reporting every violation at once.
    ///
    /// Declared values are coerced to their descriptor type. Undeclared keys
    /// are kept with an inferred type and listed in `non_standard`. `null`
    /// values count as absent.
    pub fn validate(&self, category: Category, mapping: &FlatMap) -> Result<ValidatedMapping> {
        let schema = self.schema(category)?;
        let mut validated = ValidatedMapping::default();
        let mut violations = Vec::new();

        for (path, raw) in mapping {
            if raw.is_null() || path == SCHEMA_VERSION_KEY {
                continue;
            }

            match schema.get(path) {
                Some(descriptor) => match descriptor.coerce(raw) {
                    Ok(value) => {
                        validated.values.insert(path.clone(), value);
                    }
                    Err(violation) => violations.push(violation),
                },
                None => {
                    if let Some(violation) = schema.undeclared_conflict(path) {
                        violations.push(violation);
                        continue;
                    }
                    if let Some(parent) = value_ancestor(mapping, path) {
                        violations.push(Violation::new(
                            path.clone(),
                            ViolationKind::TypeMismatch {
                                expected: format!("a value at '{}'", parent),
                                found: "a namespace".to_string(),
                            },
                        ));
                        continue;
                    }
                    if let Some(value) = MetadataValue::infer(raw) {
                        warn!(
                            "Non-standard {} field '{}' ({})",
                            category,
                            path,
                            json_kind(raw)
                        );
                        validated.values.insert(path.clone(), value);
                        validated.non_standard.insert(path.clone());
                    }
                }
            }
        }

        for descriptor in schema.descriptors().iter().filter(|d| d.required) {
            let present = mapping
                .get(&descriptor.name)
                .map_or(false, |raw| !raw.is_null());
            if !present {
                violations.push(Violation::new(
                    descriptor.name.clone(),
                    ViolationKind::MissingRequired,
                ));
            }
        }

        if violations.is_empty() {
            Ok(validated)
        } else {
            Err(MetadataError::Schema {
                category: category.to_string(),
                violations,
            })
        }
    }

    /// A new registry with extra descriptors for one category.
    ///
    /// The registry itself never changes; upgrading the schema means building
    /// a new one under a newer version tag.
    pub fn extend(
        &self,
        version: SchemaVersion,
        category: Category,
        extra: Vec<AttributeDescriptor>,
    ) -> Result<Self> {
        if version <= self.version {
            return Err(MetadataError::InvalidState(format!(
                "Schema upgrade must move past {}, got {}",
                self.version, version
            )));
        }

        let mut descriptors = self.get_descriptors(category)?.to_vec();
        descriptors.extend(extra);

        let mut schemas = self.schemas.clone();
        schemas.insert(category, CategorySchema::new(category, descriptors)?);

        debug!("Extended {} schema to version {}", category, version);
        Ok(Self { version, schemas })
    }

    pub fn standards_table(&self) -> Vec<StandardsRow> {
        self.schemas
            .values()
            .flat_map(|schema| {
                schema.descriptors().iter().map(move |d| StandardsRow {
                    category: schema.category().to_string(),
                    attribute: d.name.clone(),
                    value_type: d.value_type.to_string(),
                    required: d.required,
                    units: d.units.clone().unwrap_or_default(),
                    style: d.style.to_string(),
                    allowed_values: d
                        .allowed_values
                        .as_ref()
                        .map(|values| values.join("|"))
                        .unwrap_or_default(),
                    default: d
                        .default
                        .as_ref()
                        .map(|value| value.to_string())
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Top-level namespaces of a category (`location`, `time_period`, ...).
    pub fn namespaces(&self, category: Category) -> Result<Vec<String>> {
        let mut seen = BTreeSet::new();
        for descriptor in self.get_descriptors(category)? {
            if let Some((head, _)) = descriptor.name.split_once(PATH_SEPARATOR) {
                seen.insert(head.to_string());
            }
        }
        Ok(seen.into_iter().collect())
    }
}
