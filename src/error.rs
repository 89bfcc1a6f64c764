use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Schema error ({category}): {}", format_violations(.violations))]
    Schema {
        category: String,
        violations: Vec<Violation>,
    },

    #[error("Migration error at '{path}': expected {expected}, found {found}")]
    Migration {
        path: String,
        expected: String,
        found: String,
    },

    #[error("{kind} '{id}' already exists under '{parent}'")]
    Duplicate {
        kind: String,
        id: String,
        parent: String,
    },

    #[error("'{path}' not found")]
    NotFound { path: String },

    #[error("Type error at '{path}': expected {expected}, found {found}")]
    Type {
        path: String,
        expected: String,
        found: String,
    },

    #[error("Value error at '{path}': {message}")]
    Value { path: String, message: String },

    #[error("Key error: '{path}' is not declared for {category}")]
    Key { path: String, category: String },

    #[error("Identifier mismatch: {field} is '{found}' but node id is '{expected}'")]
    IdentifierMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid coordinate format: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl MetadataError {
    /// Violations carried by a schema error, empty for every other variant.
    pub fn violations(&self) -> &[Violation] {
        match self {
            MetadataError::Schema { violations, .. } => violations,
            _ => &[],
        }
    }
}

/// One field-level problem found while validating a mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    MissingRequired,
    TypeMismatch { expected: String, found: String },
    DisallowedValue { value: String, allowed: Vec<String> },
    OutOfRange { value: f64, min: f64, max: f64 },
}

impl Violation {
    pub fn new(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.kind, ViolationKind::MissingRequired)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::MissingRequired => write!(f, "{}: required field is missing", self.path),
            ViolationKind::TypeMismatch { expected, found } => {
                write!(f, "{}: expected {}, found {}", self.path, expected, found)
            }
            ViolationKind::DisallowedValue { value, allowed } => write!(
                f,
                "{}: '{}' is not one of [{}]",
                self.path,
                value,
                allowed.join(", ")
            ),
            ViolationKind::OutOfRange { value, min, max } => write!(
                f,
                "{}: {} is outside [{}, {}]",
                self.path, value, min, max
            ),
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
