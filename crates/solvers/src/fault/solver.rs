//! The solver module holds the [Solver], which computes the correct response to every claim in a
//! game from the participant's view of the trace.

use super::{
    Claim, ClaimData, ClaimTree, FaultResult, MoveKind, Position, PreimageOracle, Response,
};
use ethers::types::Bytes;

/// The [Solver] decides how to respond to claims, given a [PreimageOracle] it trusts.
///
/// The solver plays one side of the game. When it agrees with the proposed output it sides with
/// the root claim and owns the even depths; otherwise it owns the odd depths. Claims on its own
/// depths are never answered.
#[derive(Debug, Clone)]
pub struct Solver<T> {
    /// Our view of the execution trace.
    trace: T,
    /// The maximum depth of the games being solved.
    max_depth: u64,
    /// Whether we side with the root claim.
    agree_with_proposed_output: bool,
}

impl<T: PreimageOracle> Solver<T> {
    /// Creates a new [Solver].
    pub fn new(trace: T, max_depth: u64, agree_with_proposed_output: bool) -> Self {
        Self {
            trace,
            max_depth,
            agree_with_proposed_output,
        }
    }

    /// Returns the maximum depth of the games being solved.
    pub fn max_depth(&self) -> u64 {
        self.max_depth
    }

    /// Returns true if `claim` sits on a depth owned by our side.
    pub fn agree_with_claim_level(&self, claim: &ClaimData) -> bool {
        let even = claim.position.depth() % 2 == 0;
        even == self.agree_with_proposed_output
    }

    /// Fetch the [Claim] at the given position in the game tree. This [Claim] is always true in
    /// the relative view of the participant.
    pub fn claim_at(&self, position: u128) -> FaultResult<Claim> {
        self.trace.get(position.trace_index(self.max_depth))
    }

    /// Returns true if our trace commits to the same value as `claim`.
    pub fn agree_with_claim(&self, claim: &ClaimData) -> FaultResult<bool> {
        Ok(self.claim_at(claim.position)? == claim.claim)
    }

    /// Respond to the claim at `index`.
    ///
    /// A claim we disagree with is attacked: the fault lies at or before its trace index. An
    /// opposing claim we agree with is defended: the fault lies after it. An honest root needs no
    /// answer. Leaf claims are countered with a step instead of a move.
    pub fn respond(&self, tree: &ClaimTree, index: usize) -> FaultResult<Response> {
        let claim = tree.claim(index)?;
        if self.agree_with_claim_level(claim) {
            return Ok(Response::DoNothing);
        }

        let agree = self.agree_with_claim(claim)?;
        if claim.position.depth() >= self.max_depth {
            return self.attempt_step(index, claim, agree);
        }
        if claim.is_root() && agree {
            return Ok(Response::DoNothing);
        }

        let kind = if agree {
            MoveKind::Defend
        } else {
            MoveKind::Attack
        };
        Ok(Response::Move {
            parent_index: index,
            kind,
            claim: self.claim_at(claim.position.make_move(kind))?,
        })
    }

    fn attempt_step(&self, index: usize, claim: &ClaimData, agree: bool) -> FaultResult<Response> {
        let trace_index = claim.position.trace_index(self.max_depth);
        let (kind, state_data) = if agree {
            // There is no state after the final one to defend towards.
            if claim.position.right_index(self.max_depth)
                == (1u128 << (self.max_depth + 1)) - 1
            {
                return Ok(Response::DoNothing);
            }
            (MoveKind::Defend, self.trace.preimage(trace_index)?)
        } else if trace_index == 0 {
            (MoveKind::Attack, self.trace.absolute_prestate())
        } else {
            (MoveKind::Attack, self.trace.preimage(trace_index - 1)?)
        };

        Ok(Response::Step {
            claim_index: index,
            kind,
            state_data,
            proof: Bytes::default(),
        })
    }

    /// Returns the responses to every claim in `tree` that still needs one.
    ///
    /// A move whose target position is occupied, or a step against a leaf that is already
    /// countered, has been made already and is not repeated.
    pub fn actionable(&self, tree: &ClaimTree) -> FaultResult<Vec<Response>> {
        let mut responses = Vec::new();
        for index in 0..tree.len() {
            let response = self.respond(tree, index)?;
            let answered = match &response {
                Response::DoNothing => true,
                Response::Move {
                    parent_index, kind, ..
                } => {
                    let parent = tree.claim(*parent_index)?;
                    tree.move_target(parent.position, *kind)
                        .map_or(true, |position| tree.index_of(position).is_some())
                }
                Response::Step { claim_index, .. } => tree.countered(*claim_index),
            };
            if !answered {
                responses.push(response);
            }
        }
        Ok(responses)
    }
}
