//! Walking-distance heuristic, backed by [`WalkingDistance`] tables.

use std::sync::Arc;

use fifteen_core::{Board, Direction, ROW_SIZE, SIZE};

use crate::heuristic::Heuristic;
use crate::tables::walking::{LinkKind, WalkingDistance};

#[derive(Clone, Copy)]
pub struct WalkingNode {
    horizontal: u32,
    vertical: u32,
    value_h: u8,
    value_v: u8,
}

#[derive(Clone)]
pub struct WalkingHeuristic {
    table: Arc<WalkingDistance>,
}

impl WalkingHeuristic {
    #[must_use]
    pub const fn new(table: Arc<WalkingDistance>) -> Self {
        Self { table }
    }
}

impl Heuristic for WalkingHeuristic {
    type Node = WalkingNode;

    fn root(&self, board: &Board) -> Self::Node {
        let (horizontal, vertical) =
            self.table
                .indices(board.tiles(), board.zero_row(), board.zero_col());
        WalkingNode {
            horizontal,
            vertical,
            value_h: self.table.distance(horizontal),
            value_v: self.table.distance(vertical),
        }
    }

    fn estimate(&self, node: &Self::Node) -> u8 {
        node.value_h + node.value_v
    }

    fn shift(
        &self,
        tiles: &[u8; SIZE],
        _mirror: &[u8; SIZE],
        zero: u8,
        _zero_mirror: u8,
        node: &Self::Node,
        dir: Direction,
    ) -> Self::Node {
        let zero = zero as usize;
        let mut next = *node;
        match dir {
            // vertical blank moves change the horizontal projection
            Direction::Down => {
                let class = (tiles[zero + ROW_SIZE] - 1) as usize / ROW_SIZE;
                next.horizontal = self.table.advance(node.horizontal, class, LinkKind::Forward);
                next.value_h = self.table.distance(next.horizontal);
            }
            Direction::Up => {
                let class = (tiles[zero - ROW_SIZE] - 1) as usize / ROW_SIZE;
                next.horizontal = self
                    .table
                    .advance(node.horizontal, class, LinkKind::Backward);
                next.value_h = self.table.distance(next.horizontal);
            }
            Direction::Right => {
                let class = (tiles[zero + 1] - 1) as usize % ROW_SIZE;
                next.vertical = self.table.advance(node.vertical, class, LinkKind::Forward);
                next.value_v = self.table.distance(next.vertical);
            }
            Direction::Left => {
                let class = (tiles[zero - 1] - 1) as usize % ROW_SIZE;
                next.vertical = self.table.advance(node.vertical, class, LinkKind::Backward);
                next.value_v = self.table.distance(next.vertical);
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_matches_full_recompute() {
        let heuristic = WalkingHeuristic::new(Arc::new(WalkingDistance::new()));
        let mut board = Board::random();
        let mut node = heuristic.root(&board);
        for _ in 0..200 {
            let moves: Vec<_> = board.neighbors().collect();
            let (dir, next) = moves[fastrand::usize(..moves.len())].clone();
            node = heuristic.shift(
                board.tiles(),
                board.mirror_tiles(),
                board.zero(),
                board.zero_mirror(),
                &node,
                dir,
            );
            board = next;
            let full = heuristic.root(&board);
            assert_eq!(heuristic.estimate(&node), heuristic.estimate(&full));
            assert_eq!(node.horizontal, full.horizontal);
            assert_eq!(node.vertical, full.vertical);
        }
    }

    #[test]
    fn zero_only_at_goal() {
        let heuristic = WalkingHeuristic::new(Arc::new(WalkingDistance::new()));
        let goal = heuristic.root(&Board::goal());
        assert_eq!(heuristic.estimate(&goal), 0);
        for _ in 0..20 {
            let board = Board::random();
            if !board.is_goal() {
                // walking distance is zero only when every tile is in
                // its goal row and column
                let node = heuristic.root(&board);
                assert!(heuristic.estimate(&node) > 0);
            }
        }
    }
}
