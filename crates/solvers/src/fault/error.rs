//! The error module holds the [FaultError] taxonomy shared by the game core and the solver.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the fault dispute game core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultError {
    /// The move is illegal: unknown parent, occupied position, depth overflow or a defense of the
    /// root claim.
    #[error("invalid move: {0}")]
    InvalidMove(String),
    /// The mover's side would exceed its time budget.
    #[error("clock expired: move would use {used:?} of {max:?}")]
    ClockExpired {
        /// The duration the mover's side would have used.
        used: Duration,
        /// The maximum duration a side may use.
        max: Duration,
    },
    /// A live claim can still be countered.
    #[error("game is not resolvable yet")]
    NotResolvable,
    /// The game was already resolved.
    #[error("game is no longer in progress")]
    GameNotInProgress,
    /// The pre-state preimage does not hash to the committed pre-state.
    #[error("pre-state preimage does not match the committed pre-state")]
    InvalidPrestate,
    /// The one-step proof confirms the claim it was meant to counter.
    #[error("step confirms the countered claim")]
    ValidStep,
    /// The VM could not decode the pre-state.
    #[error("invalid state data: {0}")]
    InvalidStateData(String),
    /// The trace provider was asked for an index outside of the game.
    #[error("trace index {index} out of bounds (max {max})")]
    TraceIndexOutOfBounds {
        /// The requested trace index.
        index: u64,
        /// The largest valid trace index.
        max: u64,
    },
    /// No claim exists at the given index.
    #[error("claim {0} not found")]
    ClaimNotFound(usize),
    /// The contract returned a status byte outside of the known set.
    #[error("unknown game status {0}")]
    UnknownStatus(u8),
}

/// A [Result] alias for the fault dispute game core.
pub type FaultResult<T> = Result<T, FaultError>;
