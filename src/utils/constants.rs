/// Schema version tags
pub const CURRENT_SCHEMA_VERSION: &str = "0.3.0";
pub const SUFFIXED_SCHEMA_VERSION: &str = "0.1.0";
pub const LEGACY_LAYOUT_SCHEMA_VERSION: &str = "0.2.0";

/// Key that may carry an explicit schema version inside a metadata mapping
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Dotted path separator and the alternate separator accepted on input
pub const PATH_SEPARATOR: char = '.';
pub const ALT_PATH_SEPARATOR: char = '/';

/// Structural tree path separator (`station/MT001/run/MT001a`)
pub const TREE_SEPARATOR: char = '/';

/// Legacy type suffixes appended to attribute names before 0.2.0
pub const LEGACY_TYPE_SUFFIXES: [&str; 5] = ["_s", "_d", "_i", "_b", "_l"];

/// Coordinate bounds (inclusive)
pub const LATITUDE_BOUNDS: (f64, f64) = (-90.0, 90.0);
pub const LONGITUDE_BOUNDS: (f64, f64) = (-180.0, 180.0);

/// Standards table columns
pub const STANDARDS_REQUIRED_COLUMNS: [&str; 5] = ["attribute", "type", "required", "units", "style"];
pub const STANDARDS_OPTIONAL_COLUMNS: [&str; 2] = ["allowed_values", "default"];
pub const ALLOWED_VALUES_SEPARATOR: char = '|';

/// Summary table defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_SUMMARY_FILE: &str = "summary.parquet";

/// Settings file and environment prefix
pub const SETTINGS_FILE: &str = "mth5-metadata";
pub const SETTINGS_ENV_PREFIX: &str = "MTH5_META";

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
