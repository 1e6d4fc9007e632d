//! Admissible heuristic strategies.
//!
//! Each strategy carries its lookup tables and threads a small [`Copy`]
//! node through the search recursion, so one move costs one table probe
//! instead of a full board evaluation. Strategies compose with
//! [`MaxOf`], which keeps both component nodes and reports the larger
//! bound; the maximum of admissible bounds is admissible.

pub mod manhattan;
pub mod pattern;
pub mod walking;

use fifteen_core::{Board, Direction, SIZE};

pub use manhattan::ManhattanHeuristic;
pub use pattern::PatternHeuristic;
pub use walking::WalkingHeuristic;

/// Walking distance maxed with Manhattan distance and linear conflict.
pub type WdMd = MaxOf<WalkingHeuristic, ManhattanHeuristic>;
/// Pattern database maxed with walking distance.
pub type PdbWd = MaxOf<PatternHeuristic, WalkingHeuristic>;

/// An admissible lower bound maintained incrementally along the search
/// path.
///
/// `estimate` is zero exactly at the goal, which doubles as the engine's
/// goal test. [`Heuristic::shift`] is handed the position *before* the
/// move: the tile sliding into the blank still sits in its source cell
/// in both `tiles` and `mirror`.
pub trait Heuristic {
    type Node: Copy;

    /// Full evaluation of a board, used at the search root.
    fn root(&self, board: &Board) -> Self::Node;

    /// The lower bound carried by a node.
    fn estimate(&self, node: &Self::Node) -> u8;

    /// The node after sliding the blank, given the pre-move tile arrays
    /// and blank cells.
    fn shift(
        &self,
        tiles: &[u8; SIZE],
        mirror: &[u8; SIZE],
        zero: u8,
        zero_mirror: u8,
        node: &Self::Node,
        dir: Direction,
    ) -> Self::Node;
}

/// Pointwise maximum of two heuristics.
#[derive(Clone)]
pub struct MaxOf<A, B> {
    first: A,
    second: B,
}

impl<A, B> MaxOf<A, B> {
    pub const fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Heuristic, B: Heuristic> Heuristic for MaxOf<A, B> {
    type Node = (A::Node, B::Node);

    fn root(&self, board: &Board) -> Self::Node {
        (self.first.root(board), self.second.root(board))
    }

    fn estimate(&self, node: &Self::Node) -> u8 {
        self.first
            .estimate(&node.0)
            .max(self.second.estimate(&node.1))
    }

    fn shift(
        &self,
        tiles: &[u8; SIZE],
        mirror: &[u8; SIZE],
        zero: u8,
        zero_mirror: u8,
        node: &Self::Node,
        dir: Direction,
    ) -> Self::Node {
        (
            self.first
                .shift(tiles, mirror, zero, zero_mirror, &node.0, dir),
            self.second
                .shift(tiles, mirror, zero, zero_mirror, &node.1, dir),
        )
    }
}
