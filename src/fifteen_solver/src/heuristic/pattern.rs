//! Additive pattern-database heuristic.
//!
//! Both the board and its mirror image are scored; the mirror image is
//! also a position whose solution length equals the board's, so the
//! larger of the two sums is still admissible and noticeably stronger
//! on boards with most of their displacement in one orientation.

use std::sync::Arc;

use fifteen_core::{Board, Direction, MIRROR_POS, MIRROR_VAL, SIZE};

use crate::heuristic::Heuristic;
use crate::tables::pattern::{MAX_GROUPS, PatternDb, rekey};

#[derive(Clone, Copy)]
pub struct PatternNode {
    keys: [u32; MAX_GROUPS],
    mirror_keys: [u32; MAX_GROUPS],
    costs: [u8; MAX_GROUPS],
    mirror_costs: [u8; MAX_GROUPS],
    total: u8,
    mirror_total: u8,
}

#[derive(Clone)]
pub struct PatternHeuristic {
    db: Arc<PatternDb>,
}

impl PatternHeuristic {
    #[must_use]
    pub const fn new(db: Arc<PatternDb>) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn db(&self) -> &PatternDb {
        &self.db
    }
}

impl Heuristic for PatternHeuristic {
    type Node = PatternNode;

    fn root(&self, board: &Board) -> Self::Node {
        let (keys, costs) = self.db.keys(board.tiles());
        let (mirror_keys, mirror_costs) = self.db.keys(board.mirror_tiles());
        let groups = self.db.group_count();
        PatternNode {
            keys,
            mirror_keys,
            costs,
            mirror_costs,
            total: costs[..groups].iter().sum(),
            mirror_total: mirror_costs[..groups].iter().sum(),
        }
    }

    fn estimate(&self, node: &Self::Node) -> u8 {
        node.total.max(node.mirror_total)
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
        let mut next = *node;

        // tile sliding into the blank cell
        let offset = dir
            .offset_from(zero)
            .unwrap_or_else(|| unreachable!("engine only shifts legal moves"));
        let from = zero.wrapping_add_signed(offset);
        let value = tiles[from as usize];
        let group = self.db.group_of(value);
        next.keys[group] = rekey(node.keys[group], self.db.slot_of(value), u32::from(zero));
        let cost = self.db.cost(group, next.keys[group]);
        next.total = next.total + cost - next.costs[group];
        next.costs[group] = cost;

        // same move seen in the mirror image
        let mirror_from = MIRROR_POS[from as usize];
        let mirror_value = mirror[mirror_from as usize];
        debug_assert_eq!(mirror_value, MIRROR_VAL[value as usize]);
        let group = self.db.group_of(mirror_value);
        next.mirror_keys[group] = rekey(
            node.mirror_keys[group],
            self.db.slot_of(mirror_value),
            u32::from(zero_mirror),
        );
        let cost = self.db.cost(group, next.mirror_keys[group]);
        next.mirror_total = next.mirror_total + cost - next.mirror_costs[group];
        next.mirror_costs[group] = cost;

        next
    }
}

#[cfg(test)]
mod tests {
    use crate::tables::pattern::Partition;

    use super::*;

    fn tiny_db() -> Arc<PatternDb> {
        Arc::new(PatternDb::generate(
            Partition::new(vec![
                vec![1, 2, 3],
                vec![4, 5, 6],
                vec![7, 8, 9],
                vec![10, 11, 12],
                vec![13, 14, 15],
            ])
            .unwrap(),
        ))
    }

    #[test]
    fn incremental_matches_full_recompute() {
        let heuristic = PatternHeuristic::new(tiny_db());
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
            assert_eq!(node.keys, full.keys);
            assert_eq!(node.mirror_keys, full.mirror_keys);
            assert_eq!(heuristic.estimate(&node), heuristic.estimate(&full));
        }
    }

    #[test]
    fn mirror_side_can_dominate() {
        let heuristic = PatternHeuristic::new(tiny_db());
        let mut saw_mirror_win = false;
        for _ in 0..200 {
            let board = Board::random();
            let node = heuristic.root(&board);
            assert!(heuristic.estimate(&node) >= node.total);
            if node.mirror_total > node.total {
                saw_mirror_win = true;
            }
        }
        assert!(saw_mirror_win, "mirror evaluation never dominated");
    }

    #[test]
    fn at_least_manhattan_distance() {
        // each group cost alone is at least the manhattan distance of
        // that group's tiles
        let heuristic = PatternHeuristic::new(tiny_db());
        let board = Board::random();
        let node = heuristic.root(&board);
        assert!(heuristic.estimate(&node) >= board.manhattan());
    }
}
