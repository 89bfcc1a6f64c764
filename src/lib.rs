//! Schema-versioned metadata for magnetotelluric (MTH5) survey archives.
//!
//! Metadata lives in [`MetadataContainer`]s keyed by dotted attribute paths and
//! checked against a [`SchemaRegistry`] built from the bundled standards
//! tables. Legacy documents are brought up to date by the [`migration`] rules,
//! and containers are organised in a [`MetadataTree`] of survey, stations,
//! runs, channels and filters.

pub mod cli;
pub mod error;
pub mod migration;
pub mod models;
pub mod processors;
pub mod readers;
pub mod schema;
pub mod settings;
pub mod tree;
pub mod utils;
pub mod writers;

pub use error::{MetadataError, Result, Violation, ViolationKind};
pub use migration::{detect_version, migrate, Migrator};
pub use models::{
    AttributeDescriptor, Category, ContainerState, MetadataContainer, MetadataRecord,
    MetadataValue, SummaryRow, ValueType,
};
pub use schema::{SchemaRegistry, SchemaVersion};
pub use settings::Settings;
pub use tree::{ArchiveDocument, ArchiveHandle, MetadataTree, Node, NodeKind};
