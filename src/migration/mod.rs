pub mod migrator;
pub mod rules;

pub use migrator::{detect_version, migrate, Migrator};
pub use rules::{MigrationRule, Transform, STANDARD_RULES};
