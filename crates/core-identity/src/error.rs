//! Error types for UID arithmetic

use crate::UidRange;
use thiserror::Error;

/// Violations of the UID arithmetic contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Range whose start lies after its stop
    #[error("Invalid UID range: start {start} is greater than stop {stop}")]
    InvalidRange { start: u32, stop: u32 },

    /// Two ranges of one set share at least one UID
    #[error("Overlapping UID ranges: {first} and {second}")]
    OverlappingRanges { first: UidRange, second: UidRange },

    /// User namespace would extend past the top of the UID space
    #[error("User {user} has no namespace in the UID space")]
    UserOutOfRange { user: u32 },
}
