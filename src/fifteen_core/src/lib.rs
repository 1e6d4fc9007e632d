#![warn(clippy::pedantic)]
#![allow(clippy::similar_names, clippy::too_many_lines)]

//! Core model of the 15 puzzle: the board, the four slide directions, and
//! the constants shared by every solver component.

pub mod board;
pub mod direction;

pub use board::{Board, Difficulty, InvalidBoardError};
pub use direction::Direction;

/// Number of cells on the board.
pub const SIZE: usize = 16;
/// Cells per row (and column).
pub const ROW_SIZE: usize = 4;
/// No solvable position needs more moves than this.
pub const MAX_MOVES: u8 = 80;

/// The solved arrangement, tiles 1 to 15 followed by the blank.
pub const GOAL_TILES: [u8; SIZE] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 0];

/// Cell index of each cell reflected across the main diagonal.
pub const MIRROR_POS: [u8; SIZE] = [0, 4, 8, 12, 1, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15];

/// Tile value each tile maps to under the main-diagonal reflection.
///
/// `MIRROR_VAL[v]` is the tile whose goal cell is the reflection of `v`'s
/// goal cell; the blank maps to itself.
pub const MIRROR_VAL: [u8; SIZE] = [0, 1, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15, 4, 8, 12];
