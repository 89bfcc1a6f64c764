pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod flatten;
pub mod naming;
pub mod progress;
pub mod time;

pub use constants::*;
pub use coordinates::{dms_to_decimal, parse_coordinate};
pub use filename::{generate_default_summary_filename, migrated_filename};
pub use flatten::{expand, flatten, FlatMap};
pub use progress::ProgressReporter;
