use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::{MetadataError, Result};
use crate::models::category::Category;
use crate::models::record::MetadataRecord;
use crate::schema::registry::SchemaRegistry;
use crate::tree::document::ArchiveDocument;
use crate::utils::flatten::flatten;

/// Reads metadata mappings from JSON.
///
/// A mapping is either wrapped in its category (`{"station": {...}}`) or
/// bare, in which case the reader's default category applies. Arrays hold
/// several mappings.
pub struct JsonReader {
    default_category: Option<Category>,
}

impl JsonReader {
    pub fn new() -> Self {
        Self {
            default_category: None,
        }
    }

    pub fn with_default_category(default_category: Option<Category>) -> Self {
        Self { default_category }
    }

    pub fn read_records(&self, path: &Path) -> Result<Vec<MetadataRecord>> {
        let text = fs::read_to_string(path)?;
        self.parse_records(&path.display().to_string(), &text)
    }

    pub fn parse_records(&self, source: &str, text: &str) -> Result<Vec<MetadataRecord>> {
        let value: Value = serde_json::from_str(text)?;
        if is_archive_document(&value) {
            return Err(MetadataError::InvalidFormat(format!(
                "{} is an archive document, not a metadata mapping",
                source
            )));
        }

        match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.record_from_value(&format!("{}[{}]", source, i), item))
                .collect(),
            other => Ok(vec![self.record_from_value(source, &other)?]),
        }
    }

    fn record_from_value(&self, source: &str, value: &Value) -> Result<MetadataRecord> {
        if let Some((key, category, inner)) = unwrap_category(value) {
            if !self.is_default_namespace(key)? {
                return Ok(MetadataRecord::new(source, category, flatten(inner)?));
            }
        }

        let category = self.default_category.ok_or_else(|| {
            MetadataError::InvalidFormat(format!(
                "{}: cannot tell the metadata category; wrap the mapping in its category name",
                source
            ))
        })?;
        Ok(MetadataRecord::new(source, category, flatten(value)?))
    }

    /// A bare mapping of the default category may hold a single namespace
    /// that shares a category name, like a channel's `filter`.
    fn is_default_namespace(&self, key: &str) -> Result<bool> {
        match self.default_category {
            Some(category) => Ok(SchemaRegistry::shared()?
                .namespaces(category)?
                .iter()
                .any(|namespace| namespace == key)),
            None => Ok(false),
        }
    }

    pub fn read_archive(&self, path: &Path) -> Result<ArchiveDocument> {
        let text = fs::read_to_string(path)?;
        ArchiveDocument::from_json_str(&text)
    }
}

impl Default for JsonReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Archive documents list stations or filters at the top level.
pub fn is_archive_document(value: &Value) -> bool {
    value
        .as_object()
        .map_or(false, |object| {
            object.contains_key("stations") || object.contains_key("filters")
        })
}

fn unwrap_category(value: &Value) -> Option<(&str, Category, &Value)> {
    let object = value.as_object()?;
    if object.len() != 1 {
        return None;
    }
    let (key, inner) = object.iter().next()?;
    let category = Category::parse(key)?;
    inner.is_object().then_some((key.as_str(), category, inner))
}
