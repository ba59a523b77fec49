//! The game module holds the [FaultDisputeGame], a local model of the on-chain fault dispute game
//! contract.

use super::{
    Claim, ClaimData, ClaimTree, Clock, ClockPolicy, FaultError, FaultResult, GameStatus, MoveKind,
    Position, StepVerifier,
};
use ethers::{types::Address, utils::keccak256};
use std::time::Duration;

/// A [FaultDisputeGame] combines a [ClaimTree] with a [ClockPolicy] and accepts the same moves as
/// the contract does.
#[derive(Debug, Clone)]
pub struct FaultDisputeGame {
    /// The address of the dispute game contract.
    address: Address,
    /// The UNIX timestamp of the game's creation.
    created_at: u64,
    /// The commitment to the state before trace index 0.
    absolute_prestate: Claim,
    /// The chess clock rules.
    clock: ClockPolicy,
    /// The current state of the game DAG.
    tree: ClaimTree,
    /// The outcome, set exactly once.
    status: GameStatus,
}

impl FaultDisputeGame {
    /// Creates a new game with `root_claim` posted by `claimant` at block time `now`.
    pub fn new(
        address: Address,
        root_claim: Claim,
        claimant: Address,
        max_depth: u64,
        max_clock_duration: Duration,
        absolute_prestate: Claim,
        now: u64,
    ) -> Self {
        Self {
            address,
            created_at: now,
            absolute_prestate,
            clock: ClockPolicy::new(max_clock_duration),
            tree: ClaimTree::new(max_depth, root_claim, claimant, Clock::new(Duration::ZERO, now)),
            status: GameStatus::InProgress,
        }
    }

    /// Returns the address of the game.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the block time the game was created at.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Returns the root claim of the game.
    pub fn root_claim(&self) -> Claim {
        self.tree.root().claim
    }

    /// Returns the maximum depth of the game tree.
    pub fn max_depth(&self) -> u64 {
        self.tree.max_depth()
    }

    /// Returns the clock rules of the game.
    pub fn clock(&self) -> &ClockPolicy {
        &self.clock
    }

    /// Returns the claim tree.
    pub fn tree(&self) -> &ClaimTree {
        &self.tree
    }

    /// Returns every claim in move order.
    pub fn claims(&self) -> &[ClaimData] {
        self.tree.claims()
    }

    /// Fetch the [ClaimData] at the given index in the DAG array.
    pub fn claim(&self, index: usize) -> FaultResult<&ClaimData> {
        self.tree.claim(index)
    }

    /// Returns the current status of the game.
    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// Drops every claim at or after `len`, as a chain reorg would. The root is always kept.
    pub fn truncate(&mut self, len: usize) {
        self.tree.truncate(len);
    }

    fn ensure_in_progress(&self) -> FaultResult<()> {
        if self.status.is_resolved() {
            return Err(FaultError::GameNotInProgress);
        }
        Ok(())
    }

    /// Attacks the claim at `parent_index`.
    pub fn attack(
        &mut self,
        parent_index: usize,
        value: Claim,
        claimant: Address,
        now: u64,
    ) -> FaultResult<&ClaimData> {
        self.make_move(parent_index, MoveKind::Attack, value, claimant, now)
    }

    /// Defends the claim at `parent_index`.
    pub fn defend(
        &mut self,
        parent_index: usize,
        value: Claim,
        claimant: Address,
        now: u64,
    ) -> FaultResult<&ClaimData> {
        self.make_move(parent_index, MoveKind::Defend, value, claimant, now)
    }

    /// Counters the claim at `parent_index` with a new claim.
    ///
    /// Submitting a claim identical to one already in the tree is a no-op that returns the
    /// existing claim, so racing submissions of the same move are harmless.
    pub fn make_move(
        &mut self,
        parent_index: usize,
        kind: MoveKind,
        value: Claim,
        claimant: Address,
        now: u64,
    ) -> FaultResult<&ClaimData> {
        self.ensure_in_progress()?;
        let parent_position = self.tree.claim(parent_index)?.position;
        let position = self.tree.move_target(parent_position, kind)?;

        if let Some(existing) = self.tree.index_of(position) {
            if self.tree.claims()[existing].claim == value {
                tracing::debug!(target: "fault-game", "Duplicate claim at position {} ignored", position);
                return self.tree.claim(existing);
            }
            return Err(FaultError::InvalidMove(format!(
                "position {position} is already claimed"
            )));
        }

        let duration = self.clock.checkpoint_for_move(&self.tree, parent_index, now)?;
        tracing::debug!(target: "fault-game", "{:?} against claim {} at position {}", kind, parent_index, position);
        self.tree.add_claim(
            parent_position,
            kind,
            value,
            claimant,
            Clock::new(duration, now),
        )
    }

    /// Counters the leaf claim at `claim_index` with a one-step proof executed by `vm`.
    ///
    /// An attack proves the leaf's own post-state wrong starting from the state before it; a
    /// defense proves the state after the leaf wrong starting from the leaf.
    pub fn step(
        &mut self,
        claim_index: usize,
        kind: MoveKind,
        state_data: &[u8],
        proof: &[u8],
        vm: &dyn StepVerifier,
        now: u64,
    ) -> FaultResult<()> {
        self.ensure_in_progress()?;
        let max_depth = self.tree.max_depth();
        let parent = self.tree.claim(claim_index)?;
        if parent.position.depth() != max_depth {
            return Err(FaultError::InvalidMove(format!(
                "claim {claim_index} is not at max depth {max_depth}"
            )));
        }
        if self.tree.countered(claim_index) {
            return Err(FaultError::InvalidMove(format!(
                "claim {claim_index} is already countered"
            )));
        }

        let trace_index = parent.position.trace_index(max_depth);
        let ancestor = |index: Option<u64>| {
            let start = parent.parent_index;
            index
                .zip(start)
                .and_then(|(index, start)| self.tree.trace_ancestor(index, start))
                .ok_or_else(|| {
                    FaultError::InvalidMove(format!(
                        "no claim commits to the state around leaf {claim_index}"
                    ))
                })
        };
        let (pre_state, post_state) = match kind {
            MoveKind::Attack => {
                let pre_state = if trace_index == 0 {
                    self.absolute_prestate
                } else {
                    ancestor(trace_index.checked_sub(1))?.claim
                };
                (pre_state, parent)
            }
            MoveKind::Defend => (parent.claim, ancestor(trace_index.checked_add(1))?),
        };

        if Claim::from(keccak256(state_data)) != pre_state {
            return Err(FaultError::InvalidPrestate);
        }
        let valid_step = vm.step(state_data, proof)? == post_state.claim;
        // The leaf and the post-state were claimed by the same side iff their depths share parity.
        let parent_post_agree = (max_depth - post_state.position.depth()) % 2 == 0;
        if parent_post_agree == valid_step {
            return Err(FaultError::ValidStep);
        }

        self.clock.checkpoint_for_move(&self.tree, claim_index, now)?;
        tracing::debug!(target: "fault-game", "Leaf claim {} countered by {:?} step", claim_index, kind);
        self.tree.mark_stepped(claim_index)
    }

    /// Resolves the game at block time `now`.
    ///
    /// Fails with [FaultError::NotResolvable] while any uncountered claim can still be answered.
    /// Once resolved, further calls return the stored status.
    pub fn resolve(&mut self, now: u64) -> FaultResult<GameStatus> {
        if self.status.is_resolved() {
            return Ok(self.status);
        }
        if !self.clock.is_resolvable(&self.tree, now) {
            return Err(FaultError::NotResolvable);
        }
        self.status = self.tree.resolve();
        tracing::info!(target: "fault-game", "Game {:?} resolved: {:?}", self.address, self.status);
        Ok(self.status)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fault::{
        alphabet::{absolute_prestate_claim, AlphabetTraceProvider, AlphabetVm},
        PreimageOracle, TraceProvider, ROOT_POSITION,
    };
    use ethers::types::H256;

    const MAX_DEPTH: u64 = 4;
    const MAX_CLOCK: Duration = Duration::from_secs(1_000);
    const HONEST: &str = "abcdefghijklmnop";

    fn game(root: Claim) -> FaultDisputeGame {
        FaultDisputeGame::new(
            Address::repeat_byte(0xAA),
            root,
            Address::zero(),
            MAX_DEPTH,
            MAX_CLOCK,
            absolute_prestate_claim(),
            0,
        )
    }

    #[test]
    fn duplicate_move_is_noop() {
        let mut game = game(H256::repeat_byte(1));
        game.attack(0, H256::repeat_byte(2), Address::zero(), 10).unwrap();
        let again = game.attack(0, H256::repeat_byte(2), Address::zero(), 20).unwrap();
        assert_eq!(again.clock.timestamp, 10);
        assert_eq!(game.claims().len(), 2);
        assert!(matches!(
            game.attack(0, H256::repeat_byte(3), Address::zero(), 20),
            Err(FaultError::InvalidMove(_))
        ));
    }

    #[test]
    fn move_rejected_after_clock_expiry() {
        let mut game = game(H256::repeat_byte(1));
        assert!(matches!(
            game.attack(0, H256::repeat_byte(2), Address::zero(), 1_001),
            Err(FaultError::ClockExpired { .. })
        ));
        assert!(game.attack(0, H256::repeat_byte(2), Address::zero(), 1_000).is_ok());
    }

    #[test]
    fn resolve_waits_for_clock_and_is_idempotent() {
        let mut game = game(H256::repeat_byte(1));
        assert_eq!(game.resolve(1_000), Err(FaultError::NotResolvable));
        assert_eq!(game.resolve(1_001), Ok(GameStatus::DefenderWins));
        assert_eq!(game.resolve(5_000), Ok(GameStatus::DefenderWins));
        assert_eq!(
            game.attack(0, H256::repeat_byte(2), Address::zero(), 1_002).unwrap_err(),
            FaultError::GameNotInProgress
        );
    }

    /// Builds the path root -> 7 -> 3 -> 5 -> 4 with the honest trace everywhere but the root.
    fn leaf_game(trace: &AlphabetTraceProvider) -> FaultDisputeGame {
        let mut game = game(H256::repeat_byte(0xFF));
        let claim_at = |pos: u128| trace.get(pos.trace_index(MAX_DEPTH)).unwrap();
        let p1 = ROOT_POSITION.attack();
        game.attack(0, claim_at(p1), Address::zero(), 1).unwrap();
        game.attack(1, claim_at(p1.attack()), Address::zero(), 2).unwrap();
        game.defend(2, claim_at(p1.attack().defend()), Address::zero(), 3).unwrap();
        game.attack(3, claim_at(p1.attack().defend().attack()), Address::zero(), 4)
            .unwrap();
        assert_eq!(game.claim(4).unwrap().position.trace_index(MAX_DEPTH), 4);
        game
    }

    #[test]
    fn defend_step_counters_leaf_when_next_state_is_honest() {
        let trace = AlphabetTraceProvider::new(HONEST, MAX_DEPTH).unwrap();
        let mut game = leaf_game(&trace);
        let vm = AlphabetVm;

        // Wrong pre-state is rejected.
        assert_eq!(
            game.step(4, MoveKind::Defend, &trace.preimage(3).unwrap(), &[], &vm, 5),
            Err(FaultError::InvalidPrestate)
        );
        // The leaf at index 4 is honest and so is its trace ancestor at index 5: the leaf and the
        // post-state are on opposite sides, so the valid transition refutes the leaf's side.
        game.step(4, MoveKind::Defend, &trace.preimage(4).unwrap(), &[], &vm, 5)
            .unwrap();
        assert!(game.tree().countered(4));
        assert_eq!(game.resolve(2_000), Ok(GameStatus::ChallengerWins));
    }

    #[test]
    fn attack_step_rejected_when_leaf_is_honest() {
        let trace = AlphabetTraceProvider::new(HONEST, MAX_DEPTH).unwrap();
        let mut game = leaf_game(&trace);
        assert_eq!(
            game.step(4, MoveKind::Attack, &trace.preimage(3).unwrap(), &[], &AlphabetVm, 5),
            Err(FaultError::ValidStep)
        );
        assert!(matches!(
            game.step(3, MoveKind::Attack, &trace.preimage(3).unwrap(), &[], &AlphabetVm, 5),
            Err(FaultError::InvalidMove(_))
        ));
    }

    #[test]
    fn attack_step_from_absolute_prestate() {
        let trace = AlphabetTraceProvider::new(HONEST, MAX_DEPTH).unwrap();
        let mut game = game(H256::repeat_byte(0xFF));
        let mut position = ROOT_POSITION;
        for (parent, now) in (0..4).zip(1..) {
            position = position.attack();
            // A wrong leaf at trace index 0.
            let value = if position.depth() == MAX_DEPTH {
                H256::repeat_byte(0xEE)
            } else {
                trace.get(position.trace_index(MAX_DEPTH)).unwrap()
            };
            game.attack(parent, value, Address::zero(), now).unwrap();
        }
        game.step(4, MoveKind::Attack, &trace.absolute_prestate(), &[], &AlphabetVm, 6)
            .unwrap();
        assert!(game.tree().countered(4));
    }
}
