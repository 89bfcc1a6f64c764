use std::sync::Arc;

use crate::error::Result;
use crate::models::category::Category;
use crate::models::container::MetadataContainer;
use crate::schema::registry::SchemaRegistry;
use crate::utils::flatten::FlatMap;

/// A dotted-path mapping read from some input, tagged with its category.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    /// File name, bundle entry or section the mapping came from.
    pub source: String,
    pub category: Category,
    pub mapping: FlatMap,
}

impl MetadataRecord {
    pub fn new(source: impl Into<String>, category: Category, mapping: FlatMap) -> Self {
        Self {
            source: source.into(),
            category,
            mapping,
        }
    }

    /// Migrate and validate into a container.
    pub fn to_container(&self, registry: Arc<SchemaRegistry>) -> Result<MetadataContainer> {
        MetadataContainer::from_flat(self.category, registry, &self.mapping)
    }
}
