pub mod batch_validator;
pub mod integrity_checker;

pub use batch_validator::{BatchReport, BatchValidator, OutcomeStatus, RecordOutcome};
pub use integrity_checker::{IntegrityChecker, IntegrityIssue, IntegrityReport, IssueKind};
