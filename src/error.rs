//! Error types for the radio energy model
//!
//! Every error here is a contract violation: the simulation run that hits
//! one is expected to stop and report it.

use std::time::Duration;

use thiserror::Error;

use crate::state::PowerState;

/// Result type alias for energy model operations
pub type Result<T> = std::result::Result<T, EnergyError>;

/// Main error type for energy model operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnergyError {
    /// A state was requested for an operation it does not support
    #[error("Invalid state requested: {state}: {reason}")]
    InvalidState {
        state: PowerState,
        reason: &'static str,
    },

    /// Raw PHY state code with no power state behind it
    #[error("Undefined radio state code: {0}")]
    UnknownState(u8),

    /// A callback the operation depends on was never configured
    #[error("Missing required callback: {0}")]
    MissingCallback(&'static str),

    /// The model has no energy source attached
    #[error("No energy source attached")]
    NoEnergySource,

    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Accounting invariant broken
    #[error("Invariant violated: {0}")]
    Invariant(#[from] InvariantError),
}

/// Accounting invariants checked on every committed update
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantError {
    /// Simulated time went backwards between two updates
    #[error("Negative elapsed time: last update at {last_update:?}, now {now:?}")]
    NegativeElapsed { last_update: Duration, now: Duration },

    /// The model accounted for more energy than the store ever held
    #[error("Total consumption {consumed} J exceeds initial stored energy {initial} J")]
    ConsumptionExceedsInitial { consumed: f64, initial: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EnergyError::InvalidState {
            state: PowerState::Off,
            reason: "no maximum time in OFF",
        };
        let msg = format!("{}", err);
        assert!(msg.contains("OFF"));
        assert!(msg.contains("Invalid state"));

        let err = EnergyError::MissingCallback("change state");
        assert!(err.to_string().contains("change state"));
    }

    #[test]
    fn test_invariant_conversion() {
        let inv = InvariantError::ConsumptionExceedsInitial {
            consumed: 2.0,
            initial: 1.0,
        };
        let err: EnergyError = inv.into();
        assert!(matches!(err, EnergyError::Invariant(_)));
        assert!(err.to_string().contains("exceeds initial"));
    }
}
