pub mod definitions;
pub mod registry;
pub mod version;

pub use registry::{CategorySchema, SchemaRegistry, StandardsRow, ValidatedMapping};
pub use version::{SchemaVersion, VersionRange};
