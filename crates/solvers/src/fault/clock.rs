//! The clock module holds the [ClockPolicy], which enforces the chess clock of a dispute game.

use super::{ClaimData, ClaimTree, FaultError, FaultResult};
use std::time::Duration;

/// The [ClockPolicy] computes time budgets for each side of a game.
///
/// Every claim records the cumulative time its claimant's side has used. A side is charged the
/// block time that passes between the opponent's claim and its own answer, and may use at most
/// `max_clock_duration` in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockPolicy {
    max_clock_duration: Duration,
}

impl ClockPolicy {
    /// Creates a new [ClockPolicy].
    pub fn new(max_clock_duration: Duration) -> Self {
        Self { max_clock_duration }
    }

    /// Returns the maximum duration a single side may use.
    pub fn max_clock_duration(&self) -> Duration {
        self.max_clock_duration
    }

    /// Returns the time left on the claimant's side of the clock as of `claim`.
    pub fn remaining_time(&self, claim: &ClaimData) -> Duration {
        self.max_clock_duration.saturating_sub(claim.clock.duration)
    }

    /// Computes the clock duration of a move against the claim at `parent_index` at block time
    /// `now`.
    ///
    /// The mover carries the duration of its previous claim on this path (the grandparent) and is
    /// charged the time elapsed since the parent was made. A move that lands exactly on the limit
    /// is accepted.
    pub fn checkpoint_for_move(
        &self,
        tree: &ClaimTree,
        parent_index: usize,
        now: u64,
    ) -> FaultResult<Duration> {
        let parent = tree.claim(parent_index)?;
        let carried = match parent.parent_index {
            Some(grandparent) => tree.claim(grandparent)?.clock.duration,
            None => Duration::ZERO,
        };
        let elapsed = Duration::from_secs(now.saturating_sub(parent.clock.timestamp));
        let used = carried + elapsed;

        if used > self.max_clock_duration {
            return Err(FaultError::ClockExpired {
                used,
                max: self.max_clock_duration,
            });
        }
        Ok(used)
    }

    /// Returns true if the claim at `index` can no longer be countered at block time `now`.
    pub fn is_expired(&self, tree: &ClaimTree, index: usize, now: u64) -> bool {
        matches!(
            self.checkpoint_for_move(tree, index, now),
            Err(FaultError::ClockExpired { .. })
        )
    }

    /// Returns true once no uncountered claim can be answered anymore.
    pub fn is_resolvable(&self, tree: &ClaimTree, now: u64) -> bool {
        (0..tree.len())
            .filter(|i| !tree.countered(*i))
            .all(|i| self.is_expired(tree, i, now))
    }
}
