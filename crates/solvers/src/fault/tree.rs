//! The tree module holds the [ClaimTree], the append-only arena of claims backing a dispute game.

use super::{
    Claim, ClaimData, Clock, FaultError, FaultResult, GameStatus, MoveKind, Position, ROOT_POSITION,
};
use ethers::types::Address;
use std::collections::{BTreeSet, HashMap};

/// The [ClaimTree] stores the claims of a single game in move order, keyed by position.
///
/// Children are never stored on their parents; they are looked up from the attack and defend
/// positions of a claim, so the arena holds no back-links.
#[derive(Debug, Clone)]
pub struct ClaimTree {
    /// The maximum depth of the game tree.
    max_depth: u64,
    /// Claims in insertion order. Index 0 is always the root claim.
    claims: Vec<ClaimData>,
    /// Position -> index into `claims`.
    positions: HashMap<u128, usize>,
    /// Leaf claims countered by a one-step proof.
    stepped: BTreeSet<usize>,
}

impl ClaimTree {
    /// Creates a new [ClaimTree] holding only the root claim.
    pub fn new(max_depth: u64, root: Claim, claimant: Address, clock: Clock) -> Self {
        let root = ClaimData {
            parent_index: None,
            countered: false,
            claim: root,
            position: ROOT_POSITION,
            claimant,
            clock,
        };
        Self {
            max_depth,
            claims: vec![root],
            positions: HashMap::from([(ROOT_POSITION, 0)]),
            stepped: BTreeSet::new(),
        }
    }

    /// Rebuilds a [ClaimTree] from an authoritative claim list, validating every tree invariant.
    ///
    /// Leaf claims reported as countered without any children were countered by a step.
    pub fn from_claims(max_depth: u64, claims: Vec<ClaimData>) -> FaultResult<Self> {
        let mut claims = claims.into_iter();
        let root = claims
            .next()
            .ok_or_else(|| FaultError::InvalidMove("claim list is empty".to_string()))?;
        if !root.is_root() || !root.position.is_root() {
            return Err(FaultError::InvalidMove(
                "first claim is not a root claim".to_string(),
            ));
        }

        let mut reported = vec![root.countered];
        let mut tree = Self::new(max_depth, root.claim, root.claimant, root.clock);
        for data in claims {
            let index = tree.claims.len();
            let parent_index = data.parent_index.filter(|p| *p < index).ok_or_else(|| {
                FaultError::InvalidMove(format!("claim {index} does not follow its parent"))
            })?;
            let parent_position = tree.claims[parent_index].position;
            let kind = if data.position == parent_position.attack() {
                MoveKind::Attack
            } else if data.position == parent_position.defend() {
                MoveKind::Defend
            } else {
                return Err(FaultError::InvalidMove(format!(
                    "claim {index} at position {} is not a move against position {parent_position}",
                    data.position
                )));
            };
            let position = tree.move_target(parent_position, kind)?;
            tree.push(parent_index, position, data.claim, data.claimant, data.clock)?;
            reported.push(data.countered);
        }

        for (index, countered) in reported.into_iter().enumerate() {
            if countered && !tree.claims[index].countered {
                tree.mark_stepped(index)?;
            }
        }
        Ok(tree)
    }

    /// Returns the maximum depth of the tree.
    pub fn max_depth(&self) -> u64 {
        self.max_depth
    }

    /// Returns the number of claims in the tree.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// A tree always holds its root, so it is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns every claim in move order.
    pub fn claims(&self) -> &[ClaimData] {
        &self.claims
    }

    /// Returns the root claim.
    pub fn root(&self) -> &ClaimData {
        &self.claims[0]
    }

    /// Fetch the [ClaimData] at the given index in the DAG array.
    pub fn claim(&self, index: usize) -> FaultResult<&ClaimData> {
        self.claims
            .get(index)
            .ok_or(FaultError::ClaimNotFound(index))
    }

    /// Returns the index of the claim at `position`, if any.
    pub fn index_of(&self, position: u128) -> Option<usize> {
        self.positions.get(&position).copied()
    }

    /// Returns the claim at `position`, if any.
    pub fn claim_at(&self, position: u128) -> Option<&ClaimData> {
        self.index_of(position).map(|i| &self.claims[i])
    }

    /// Computes the position of a move against `parent_position`, checking it stays in the tree.
    pub fn move_target(&self, parent_position: u128, kind: MoveKind) -> FaultResult<u128> {
        if !kind.is_attack() && parent_position.is_root() {
            return Err(FaultError::InvalidMove(
                "the root claim cannot be defended".to_string(),
            ));
        }
        let position = parent_position.make_move(kind);
        if position.depth() > self.max_depth {
            return Err(FaultError::InvalidMove(format!(
                "move to depth {} exceeds max depth {}",
                position.depth(),
                self.max_depth
            )));
        }
        Ok(position)
    }

    /// Appends a claim countering the claim at `parent_position`.
    ///
    /// Clock legality is not checked here; see [ClockPolicy](super::ClockPolicy).
    pub fn add_claim(
        &mut self,
        parent_position: u128,
        kind: MoveKind,
        value: Claim,
        claimant: Address,
        clock: Clock,
    ) -> FaultResult<&ClaimData> {
        let parent_index = self.index_of(parent_position).ok_or_else(|| {
            FaultError::InvalidMove(format!("no claim at parent position {parent_position}"))
        })?;
        let position = self.move_target(parent_position, kind)?;
        self.push(parent_index, position, value, claimant, clock)
    }

    fn push(
        &mut self,
        parent_index: usize,
        position: u128,
        value: Claim,
        claimant: Address,
        clock: Clock,
    ) -> FaultResult<&ClaimData> {
        if self.positions.contains_key(&position) {
            return Err(FaultError::InvalidMove(format!(
                "position {position} is already claimed"
            )));
        }

        let index = self.claims.len();
        self.claims.push(ClaimData {
            parent_index: Some(parent_index),
            countered: false,
            claim: value,
            position,
            claimant,
            clock,
        });
        self.positions.insert(position, index);
        self.claims[parent_index].countered = true;
        Ok(&self.claims[index])
    }

    /// Returns the claims at the attack and defend positions of `position`.
    pub fn children(&self, position: u128) -> Vec<&ClaimData> {
        let attack = position.attack();
        let mut targets = vec![attack];
        if !position.is_root() && position.defend() != attack {
            targets.push(position.defend());
        }
        targets
            .into_iter()
            .filter_map(|p| self.claim_at(p))
            .collect()
    }

    /// Returns true if the claim at `index` has been countered by a move or a step.
    pub fn countered(&self, index: usize) -> bool {
        self.claims.get(index).map_or(false, |c| c.countered)
    }

    /// Records a successful one-step proof against the leaf claim at `index`.
    pub fn mark_stepped(&mut self, index: usize) -> FaultResult<()> {
        let max_depth = self.max_depth;
        let claim = self
            .claims
            .get_mut(index)
            .ok_or(FaultError::ClaimNotFound(index))?;
        if claim.position.depth() != max_depth {
            return Err(FaultError::InvalidMove(format!(
                "claim {index} is not a leaf and cannot be stepped"
            )));
        }
        claim.countered = true;
        self.stepped.insert(index);
        Ok(())
    }

    /// Walks from the claim at `start` towards the root and returns the first claim that commits
    /// to `trace_index`.
    pub fn trace_ancestor(&self, trace_index: u64, start: usize) -> Option<&ClaimData> {
        let mut cursor = Some(start);
        while let Some(index) = cursor {
            let claim = self.claims.get(index)?;
            if claim.position.trace_index(self.max_depth) == trace_index {
                return Some(claim);
            }
            cursor = claim.parent_index;
        }
        None
    }

    /// Drops every claim at or after `len`. The root claim is always kept.
    pub fn truncate(&mut self, len: usize) {
        let len = len.max(1);
        if len >= self.claims.len() {
            return;
        }
        for dropped in self.claims.drain(len..) {
            self.positions.remove(&dropped.position);
        }
        self.stepped.retain(|i| *i < len);

        for index in 0..self.claims.len() {
            self.claims[index].countered = self.stepped.contains(&index);
        }
        for index in 1..self.claims.len() {
            if let Some(parent) = self.claims[index].parent_index {
                self.claims[parent].countered = true;
            }
        }
    }

    /// Computes the outcome of the game from the current tree.
    ///
    /// A claim survives iff none of its counters survive; a stepped leaf never survives. Parents
    /// always precede their children, so reverse move order visits every child before its parent.
    pub fn resolve(&self) -> GameStatus {
        let mut refuted = vec![false; self.claims.len()];
        for index in &self.stepped {
            refuted[*index] = true;
        }
        for (index, claim) in self.claims.iter().enumerate().rev() {
            if refuted[index] {
                continue;
            }
            if let Some(parent) = claim.parent_index {
                refuted[parent] = true;
            }
        }

        if refuted[0] {
            GameStatus::ChallengerWins
        } else {
            GameStatus::DefenderWins
        }
    }
}
