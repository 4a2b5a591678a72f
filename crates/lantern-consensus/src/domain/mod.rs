//! Header rules and their errors.

pub mod errors;
pub mod rules;

pub use errors::{ConsensusError, RuleViolation};
pub use rules::check_header_rules;
