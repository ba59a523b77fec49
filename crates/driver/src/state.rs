//! The state module holds the [GameWatch], the agent's local view of a single game.

use ethers::types::Address;
use fault_challenger_solvers::fault::{Claim, ClaimData, GameStatus};
use serde::Serialize;
use std::collections::HashSet;

/// The longest backoff, in ticks.
pub const MAX_BACKOFF_TICKS: u64 = 8;

/// The lifecycle of a watched game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GamePhase {
    /// Admitted from the factory, not yet read.
    Discovered,
    /// Read, with nothing to answer.
    Monitoring,
    /// At least one response was submitted this tick.
    Responding,
    /// Nothing left to answer; waiting for the game to become resolvable.
    AwaitingResolution,
    /// Terminal. The game is no longer polled.
    Resolved,
}

/// The [GameWatch] struct is the per-game state kept between ticks. Everything in it can be
/// rebuilt from the chain; none of it is authoritative.
#[derive(Debug, Clone)]
pub struct GameWatch {
    /// The address of the game proxy.
    pub address: Address,
    /// The factory timestamp of the game.
    pub created_at: u64,
    /// Where the game is in its lifecycle.
    pub phase: GamePhase,
    /// The status read on the last evaluation.
    pub status: GameStatus,
    /// (position, claim) of every claim seen on the last read.
    observed: Vec<(u128, Claim)>,
    /// Positions of claims whose counter was rejected as [ClockExpired][1].
    ///
    /// [1]: fault_challenger_solvers::fault::FaultError::ClockExpired
    expired: HashSet<u128>,
    /// Reads that contradicted the previous one.
    pub reorgs: u64,
    /// Moves and steps accepted by the chain.
    pub moves_submitted: u64,
    /// Consecutive ticks that ended in a transient failure.
    pub failures: u32,
    /// The first tick the game may be evaluated again.
    retry_at: u64,
}

impl GameWatch {
    /// Creates a new [GameWatch] for a freshly discovered game.
    pub fn new(address: Address, created_at: u64) -> Self {
        Self {
            address,
            created_at,
            phase: GamePhase::Discovered,
            status: GameStatus::InProgress,
            observed: Vec::new(),
            expired: HashSet::new(),
            reorgs: 0,
            moves_submitted: 0,
            failures: 0,
            retry_at: 0,
        }
    }

    /// Returns true once the game reached a terminal status.
    pub fn is_resolved(&self) -> bool {
        self.phase == GamePhase::Resolved
    }

    /// Records a fresh claim list. Returns true if it contradicts the previous read, in which case
    /// every cached derivation is dropped.
    pub fn observe(&mut self, claims: &[ClaimData]) -> bool {
        let fingerprint: Vec<_> = claims.iter().map(|c| (c.position, c.claim)).collect();
        let reorged = fingerprint.len() < self.observed.len()
            || fingerprint[..self.observed.len()] != self.observed[..];
        if reorged {
            tracing::warn!(
                target: "challenger-handler",
                "Reorg detected in game {:?}: {} claims known, {} read",
                self.address,
                self.observed.len(),
                fingerprint.len()
            );
            self.reorgs += 1;
            self.expired.clear();
        }
        self.observed = fingerprint;
        reorged
    }

    /// Remembers that the claim at `position` can no longer be countered.
    pub fn mark_expired(&mut self, position: u128) {
        self.expired.insert(position);
    }

    /// Returns true if a counter to the claim at `position` was already rejected as too late.
    pub fn is_expired(&self, position: u128) -> bool {
        self.expired.contains(&position)
    }

    /// Returns true if the game is backing off at `tick`.
    pub fn should_skip(&self, tick: u64) -> bool {
        tick < self.retry_at
    }

    /// Records a transient failure at `tick`. The game is retried after 1, 2, 4, then 8 ticks.
    pub fn record_failure(&mut self, tick: u64) {
        let delay = (1u64 << self.failures.min(3)).min(MAX_BACKOFF_TICKS);
        self.failures = self.failures.saturating_add(1);
        self.retry_at = tick + delay;
        tracing::debug!(
            target: "challenger-handler",
            "Game {:?} backing off for {} ticks after {} failures",
            self.address,
            delay,
            self.failures
        );
    }

    /// Clears the backoff after a successful evaluation.
    pub fn reset_backoff(&mut self) {
        self.failures = 0;
        self.retry_at = 0;
    }

    /// Returns a serializable summary of the watch.
    pub fn report(&self) -> GameReport {
        GameReport {
            address: self.address,
            phase: self.phase,
            status: self.status,
            claims: self.observed.len(),
            reorgs: self.reorgs,
            moves_submitted: self.moves_submitted,
            failures: self.failures,
        }
    }
}

/// A summary of one watched game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameReport {
    /// The address of the game proxy.
    pub address: Address,
    /// The phase the game is in.
    pub phase: GamePhase,
    /// The last status read.
    pub status: GameStatus,
    /// Number of claims on the last read.
    pub claims: usize,
    /// Reorgs detected so far.
    pub reorgs: u64,
    /// Moves and steps accepted so far.
    pub moves_submitted: u64,
    /// Consecutive transient failures.
    pub failures: u32,
}
