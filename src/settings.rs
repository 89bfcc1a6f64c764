use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::schema::version::SchemaVersion;
use crate::utils::constants::{
    COMPRESSION_SNAPPY, CURRENT_SCHEMA_VERSION, DEFAULT_ROW_GROUP_SIZE, SETTINGS_ENV_PREFIX,
    SETTINGS_FILE,
};

/// Runtime defaults for the command line tool.
///
/// Layered from built-in defaults, an optional `mth5-metadata.{toml,yaml,json}`
/// in the working directory, then `MTH5_META_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Settings {
    pub target_version: String,

    pub strict: bool,

    #[validate(range(min = 1, max = 1024))]
    pub workers: usize,

    #[validate(length(min = 1))]
    pub compression: String,

    #[validate(range(min = 1))]
    pub row_group_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_version: CURRENT_SCHEMA_VERSION.to_string(),
            strict: false,
            workers: num_cpus::get(),
            compression: COMPRESSION_SNAPPY.to_string(),
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(SETTINGS_FILE)
    }

    /// Load with an explicit settings file base name (extension optional).
    pub fn load_from(file: &str) -> Result<Self> {
        let defaults = Settings::default();
        let settings: Settings = Config::builder()
            .set_default("target_version", defaults.target_version)?
            .set_default("strict", defaults.strict)?
            .set_default("workers", defaults.workers as u64)?
            .set_default("compression", defaults.compression)?
            .set_default("row_group_size", defaults.row_group_size as u64)?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix(SETTINGS_ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        settings.schema_version()?;
        Ok(settings)
    }

    pub fn schema_version(&self) -> Result<SchemaVersion> {
        self.target_version.parse()
    }
}
