//! The position module holds the [Position] trait and its implementation for generalized indices.

use super::MoveKind;

/// The gindex of the root claim.
pub const ROOT_POSITION: u128 = 1;

/// The [Position] trait defines the interface of a generalized index within the dispute game tree.
/// A "Generalized Index" is calculated as `2^{depth} + index_at_depth`.
pub trait Position: Copy {
    /// Returns the depth of the [Position] within the tree.
    fn depth(&self) -> u64;
    /// Returns the index at depth of the [Position] within the tree.
    fn index_at_depth(&self) -> u64;
    /// Returns true if the [Position] is the root of the tree.
    fn is_root(&self) -> bool;
    /// Returns the rightmost [Position] at `max_depth` that commits to the same trace index as the
    /// current [Position].
    fn right_index(&self, max_depth: u64) -> Self;
    /// Returns the trace index that the current [Position] commits to.
    fn trace_index(&self, max_depth: u64) -> u64;
    /// Returns the [Position] of a move of the given [MoveKind] against the current [Position].
    fn make_move(&self, kind: MoveKind) -> Self;

    /// Returns the [Position] of an attack against the current [Position]: its left child.
    fn attack(&self) -> Self {
        self.make_move(MoveKind::Attack)
    }

    /// Returns the [Position] of a defense of the current [Position].
    ///
    /// Non-root claims always sit at left children, so this is the left child of the right
    /// sibling: the midpoint of the upper half of the range between this position and its parent.
    fn defend(&self) -> Self {
        self.make_move(MoveKind::Defend)
    }
}

/// Computes a generalized index from a depth and index at depth.
///
/// ### Takes
/// - `depth`: The depth of the generalized index.
/// - `index_at_depth`: The index at depth of the generalized index.
///
/// ### Returns
/// - `u128`: The generalized index: `2^{depth} + index_at_depth`.
pub fn compute_gindex(depth: u8, index_at_depth: u64) -> u128 {
    2u128.pow(depth as u32) + index_at_depth as u128
}

/// Implementation of the [Position] trait for the [std::u128] primitive type.
impl Position for u128 {
    fn depth(&self) -> u64 {
        127 - self.leading_zeros() as u64
    }

    fn index_at_depth(&self) -> u64 {
        (self - (1u128 << self.depth())) as u64
    }

    fn is_root(&self) -> bool {
        *self == ROOT_POSITION
    }

    fn right_index(&self, max_depth: u64) -> Self {
        let remaining = max_depth.saturating_sub(self.depth());
        (self << remaining) | ((1u128 << remaining) - 1)
    }

    fn trace_index(&self, max_depth: u64) -> u64 {
        self.right_index(max_depth).index_at_depth()
    }

    fn make_move(&self, kind: MoveKind) -> Self {
        ((!kind.is_attack() as u128) | self) << 1
    }
}
