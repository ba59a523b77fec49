//! The types module contains all of the types relevant to the fault dispute game.

use super::FaultError;
use ethers::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The [Claim] type represents a claim on the execution trace at a given trace index that is
/// made by a participant in a dispute game.
pub type Claim = H256;

/// The [Clock] struct represents the chess clock attached to a [Claim] within the game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// The cumulative duration used by the claimant's side, up to and including this claim.
    pub duration: Duration,
    /// The block timestamp at which the claim was made.
    pub timestamp: u64,
}

impl Clock {
    /// Creates a new [Clock].
    pub fn new(duration: Duration, timestamp: u64) -> Self {
        Self {
            duration,
            timestamp,
        }
    }

    /// Unpacks a contract clock: the duration in seconds in the upper 64 bits, the timestamp in
    /// the lower 64 bits.
    pub fn from_packed(packed: u128) -> Self {
        Self {
            duration: Duration::from_secs((packed >> 64) as u64),
            timestamp: packed as u64,
        }
    }
}

/// The [ClaimData] struct represents a [Claim] as well as the data associated with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimData {
    /// The index of the parent claim in the DAG array. `None` for the root claim.
    pub parent_index: Option<usize>,
    /// Whether or not the current claim has ever been countered.
    pub countered: bool,
    /// The claim that is being made at the trace index relative to the position.
    pub claim: Claim,
    /// The position of the claim within the game tree.
    pub position: u128,
    /// The account that made the claim.
    pub claimant: Address,
    /// The clock that is used to track the duration elapsed and timestamp of the claim.
    pub clock: Clock,
}

impl ClaimData {
    /// Returns true if this is the root claim of the game.
    pub fn is_root(&self) -> bool {
        self.parent_index.is_none()
    }
}

/// The direction of a move against a parent claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// Dispute the parent claim: the fault lies at or before its trace index.
    Attack,
    /// Agree with the parent claim: the fault lies after its trace index.
    Defend,
}

impl MoveKind {
    /// Returns true for [MoveKind::Attack].
    pub fn is_attack(&self) -> bool {
        matches!(self, MoveKind::Attack)
    }
}

/// The status of a dispute game, as encoded by the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GameStatus {
    /// Moves are still being accepted.
    #[default]
    InProgress = 0,
    /// The root claim was refuted.
    ChallengerWins = 1,
    /// The root claim stood.
    DefenderWins = 2,
}

impl GameStatus {
    /// Returns true once the game has been resolved.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, GameStatus::InProgress)
    }
}

impl TryFrom<u8> for GameStatus {
    type Error = FaultError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameStatus::InProgress),
            1 => Ok(GameStatus::ChallengerWins),
            2 => Ok(GameStatus::DefenderWins),
            _ => Err(FaultError::UnknownStatus(value)),
        }
    }
}

/// A [Response] is an action taken by a participant in the dispute game in response to
/// a claim made by another participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Do nothing.
    DoNothing,
    /// Create a counter claim against the parent claim.
    Move {
        /// The index of the claim being countered.
        parent_index: usize,
        /// Whether the counter attacks or defends the parent.
        kind: MoveKind,
        /// The counter claim.
        claim: Claim,
    },
    /// Perform a VM step against a leaf claim.
    Step {
        /// The index of the leaf claim being countered.
        claim_index: usize,
        /// Whether the step attacks or defends the leaf.
        kind: MoveKind,
        /// The pre-state preimage fed to the VM.
        state_data: Bytes,
        /// Auxiliary proof data for the VM.
        proof: Bytes,
    },
}
