//! Domain error types.
//!
//! Business outcomes (a disqualified bid, an insolvent team) are never
//! errors; these variants cover invalid input and out-of-phase calls only.

use super::session::Phase;
use super::team::TeamId;

/// Invalid session parameters, rejected at configuration time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("pooling price band is inverted: min {min} > max {max}")]
    InvertedPriceBand { min: f64, max: f64 },
}

/// Errors raised by session operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("operation requires phase {expected:?}, session is in {actual:?}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("unknown team: {0}")]
    UnknownTeam(TeamId),

    #[error("team already registered: {0}")]
    DuplicateTeam(TeamId),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("invalid decision for {field}: {reason}")]
    InvalidDecision { field: &'static str, reason: String },

    #[error("session has no teams")]
    NoTeams,

    #[error(transparent)]
    Config(#[from] ConfigError),
}
