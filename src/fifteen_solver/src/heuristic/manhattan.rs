//! Manhattan distance with the linear-conflict refinement.
//!
//! Linear conflict adds two moves for every tile that sits in its goal
//! line but is blocked by a later tile of the same line with a smaller
//! value; one of the pair has to leave the line and come back. Row
//! conflicts are counted on the tile array, column conflicts on the
//! mirror image, whose rows are the board's columns.

use fifteen_core::{Board, Direction, ROW_SIZE, SIZE};

use crate::heuristic::Heuristic;

#[derive(Clone, Copy)]
pub struct ManhattanNode {
    estimate: u8,
}

#[derive(Clone, Copy)]
pub struct ManhattanHeuristic {
    linear_conflict: bool,
}

impl ManhattanHeuristic {
    /// Plain Manhattan distance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            linear_conflict: false,
        }
    }

    /// Manhattan distance plus linear conflict.
    #[must_use]
    pub const fn with_linear_conflict() -> Self {
        Self {
            linear_conflict: true,
        }
    }

    // Incremental update for a move expressed vertically on `arr`: the
    // blank at `zero` swaps with the tile one row below (`downward`, the
    // blank moving down) or above. Horizontal moves pass the mirror
    // image, where they are vertical.
    fn vertical_shift(&self, arr: &[u8; SIZE], zero: usize, downward: bool, estimate: u8) -> u8 {
        let from = if downward { zero + ROW_SIZE } else { zero - ROW_SIZE };
        let value = arr[from];
        let goal_row = (value - 1) as usize / ROW_SIZE;
        let zero_row = zero / ROW_SIZE;

        // the tile slides toward the blank's row
        let closing = if downward {
            goal_row <= zero_row
        } else {
            goal_row >= zero_row
        };
        let mut estimate = if closing { estimate - 1 } else { estimate + 1 };

        if self.linear_conflict && (goal_row == zero_row || goal_row == from / ROW_SIZE) {
            estimate -= line_conflicts(arr, goal_row);
            let mut moved = *arr;
            moved[zero] = value;
            moved[from] = 0;
            estimate += line_conflicts(&moved, goal_row);
        }
        estimate
    }
}

impl Default for ManhattanHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl Heuristic for ManhattanHeuristic {
    type Node = ManhattanNode;

    fn root(&self, board: &Board) -> Self::Node {
        let mut estimate = board.manhattan();
        if self.linear_conflict {
            for line in 0..ROW_SIZE {
                estimate += line_conflicts(board.tiles(), line);
                estimate += line_conflicts(board.mirror_tiles(), line);
            }
        }
        ManhattanNode { estimate }
    }

    fn estimate(&self, node: &Self::Node) -> u8 {
        node.estimate
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
        let estimate = match dir {
            Direction::Down => self.vertical_shift(tiles, zero as usize, true, node.estimate),
            Direction::Up => self.vertical_shift(tiles, zero as usize, false, node.estimate),
            Direction::Right => {
                self.vertical_shift(mirror, zero_mirror as usize, true, node.estimate)
            }
            Direction::Left => {
                self.vertical_shift(mirror, zero_mirror as usize, false, node.estimate)
            }
        };
        ManhattanNode { estimate }
    }
}

// Two per tile in its goal line blocked by a smaller later tile of the
// same line, each blocked tile counted once.
fn line_conflicts(arr: &[u8; SIZE], line: usize) -> u8 {
    let base = line * ROW_SIZE;
    let in_line = |value: usize| value > base && value <= base + ROW_SIZE;
    let mut total = 0;
    for col in 0..ROW_SIZE {
        let value = arr[base + col] as usize;
        if !in_line(value) {
            continue;
        }
        if arr[base + col + 1..base + ROW_SIZE]
            .iter()
            .any(|&later| in_line(later as usize) && (later as usize) < value)
        {
            total += 2;
        }
    }
    total
}
