use std::fmt;
use std::hash::{Hash, Hasher};

use itertools::Itertools;
use thiserror::Error;

use crate::{Direction, GOAL_TILES, MIRROR_POS, MIRROR_VAL, ROW_SIZE, SIZE};

/// Rejected tile arrays for [`Board::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidBoardError {
    #[error("tile value {0} is out of range, expected 0 through 15")]
    OutOfRange(u8),
    #[error("tile value {0} appears more than once")]
    Duplicate(u8),
}

/// Target difficulty band for random board generation, measured by the
/// Manhattan distance of the generated position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

/// An immutable 15-puzzle position.
///
/// Everything the solvers ask for repeatedly is computed once at
/// construction: the mirror image across the main diagonal, the blank
/// index in both images, the two nibble-packed key halves, solvability,
/// and the set of legal blank moves.
#[derive(Clone, Debug)]
pub struct Board {
    tiles: [u8; SIZE],
    mirror: [u8; SIZE],
    zero: u8,
    zero_mirror: u8,
    key_high: u32,
    key_low: u32,
    valid_moves: u8,
    solvable: bool,
    self_mirrored: bool,
}

impl Board {
    /// Builds a board from a tile array, with the blank as 0.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoardError`] unless the array is a permutation of
    /// 0 through 15. Unsolvable permutations are accepted; check
    /// [`Board::is_solvable`].
    pub fn new(tiles: [u8; SIZE]) -> Result<Self, InvalidBoardError> {
        if let Some(&value) = tiles.iter().find(|&&value| value as usize >= SIZE) {
            return Err(InvalidBoardError::OutOfRange(value));
        }
        if let Some(&value) = tiles.iter().duplicates().next() {
            return Err(InvalidBoardError::Duplicate(value));
        }
        Ok(Self::from_permutation(tiles))
    }

    /// The solved position.
    #[must_use]
    pub fn goal() -> Self {
        Self::from_permutation(GOAL_TILES)
    }

    // Callers must pass a permutation of 0..16.
    fn from_permutation(tiles: [u8; SIZE]) -> Self {
        let mut mirror = [0u8; SIZE];
        for (cell, &value) in tiles.iter().enumerate() {
            mirror[MIRROR_POS[cell] as usize] = MIRROR_VAL[value as usize];
        }

        #[allow(clippy::cast_possible_truncation)]
        let zero = tiles.iter().position(|&value| value == 0).unwrap_or(0) as u8;
        let zero_mirror = MIRROR_POS[zero as usize];

        let key_high = tiles[..SIZE / 2]
            .iter()
            .fold(0u32, |key, &value| key << 4 | u32::from(value));
        let key_low = tiles[SIZE / 2..]
            .iter()
            .fold(0u32, |key, &value| key << 4 | u32::from(value));

        let self_mirrored = tiles == mirror;
        let mut valid_moves = 0u8;
        for dir in Direction::ALL {
            if dir.offset_from(zero).is_some() {
                valid_moves |= 1 << dir.index();
            }
        }
        if self_mirrored {
            // up/down mirror right/left from a symmetric position
            valid_moves &= !(1 << Direction::Down.index());
            valid_moves &= !(1 << Direction::Up.index());
        }

        Self {
            tiles,
            mirror,
            zero,
            zero_mirror,
            key_high,
            key_low,
            valid_moves,
            solvable: solvable(&tiles, zero),
            self_mirrored,
        }
    }

    #[must_use]
    pub const fn tiles(&self) -> &[u8; SIZE] {
        &self.tiles
    }

    /// The board reflected across the main diagonal, with tile values
    /// relabeled so its goal is the standard goal.
    #[must_use]
    pub const fn mirror_tiles(&self) -> &[u8; SIZE] {
        &self.mirror
    }

    /// Linear cell index of the blank.
    #[must_use]
    pub const fn zero(&self) -> u8 {
        self.zero
    }

    /// Linear cell index of the blank in the mirror image.
    #[must_use]
    pub const fn zero_mirror(&self) -> u8 {
        self.zero_mirror
    }

    #[must_use]
    pub const fn zero_row(&self) -> u8 {
        self.zero / ROW_SIZE as u8
    }

    #[must_use]
    pub const fn zero_col(&self) -> u8 {
        self.zero % ROW_SIZE as u8
    }

    /// Nibble-packed tiles of cells 0 through 7.
    #[must_use]
    pub const fn key_high(&self) -> u32 {
        self.key_high
    }

    /// Nibble-packed tiles of cells 8 through 15.
    #[must_use]
    pub const fn key_low(&self) -> u32 {
        self.key_low
    }

    #[must_use]
    pub const fn is_solvable(&self) -> bool {
        self.solvable
    }

    #[must_use]
    pub fn is_goal(&self) -> bool {
        self.tiles == GOAL_TILES
    }

    /// Whether the board equals its own mirror image.
    #[must_use]
    pub const fn is_self_mirrored(&self) -> bool {
        self.self_mirrored
    }

    /// Bitset over [`Direction::index`] of the moves worth exploring from
    /// this position. Up and down are dropped on self-mirrored boards
    /// since they lead to mirror images of the right and left branches.
    #[must_use]
    pub const fn valid_moves(&self) -> u8 {
        self.valid_moves
    }

    /// The board after sliding the blank one cell, or `None` when the
    /// blank sits on that edge or the board is unsolvable.
    #[must_use]
    pub fn shift(&self, dir: Direction) -> Option<Board> {
        if !self.solvable {
            return None;
        }
        let offset = dir.offset_from(self.zero)?;
        let mut tiles = self.tiles;
        let from = self.zero.wrapping_add_signed(offset) as usize;
        tiles[self.zero as usize] = tiles[from];
        tiles[from] = 0;
        Some(Self::from_permutation(tiles))
    }

    /// Successor positions with their moves, symmetry-pruned.
    pub fn neighbors(&self) -> impl Iterator<Item = (Direction, Board)> + '_ {
        Direction::ALL.into_iter().filter_map(|dir| {
            if self.valid_moves & (1 << dir.index()) == 0 {
                None
            } else {
                self.shift(dir).map(|board| (dir, board))
            }
        })
    }

    /// Applies a move sequence, returning the final position or `None`
    /// if any move is illegal.
    #[must_use]
    pub fn replay(&self, moves: &[Direction]) -> Option<Board> {
        moves
            .iter()
            .try_fold(self.clone(), |board, &dir| board.shift(dir))
    }

    /// Whether the move sequence solves this board.
    #[must_use]
    pub fn is_solution(&self, moves: &[Direction]) -> bool {
        self.replay(moves).is_some_and(|board| board.is_goal())
    }

    /// Sum over tiles of the grid distance to each tile's goal cell.
    #[must_use]
    pub fn manhattan(&self) -> u8 {
        let mut total = 0u8;
        for (cell, &value) in self.tiles.iter().enumerate() {
            if value == 0 {
                continue;
            }
            let goal = (value - 1) as usize;
            total += (cell / ROW_SIZE).abs_diff(goal / ROW_SIZE) as u8;
            total += (cell % ROW_SIZE).abs_diff(goal % ROW_SIZE) as u8;
        }
        total
    }

    /// A uniformly random solvable board.
    #[must_use]
    pub fn random() -> Self {
        let mut tiles = [0u8; SIZE];
        for count in 1..SIZE {
            let swap = fastrand::usize(..=count);
            tiles[count] = tiles[swap];
            #[allow(clippy::cast_possible_truncation)]
            {
                tiles[swap] = count as u8;
            }
        }
        let mut board = Self::from_permutation(tiles);
        if !board.solvable {
            // swapping one adjacent tile pair flips the inversion parity
            let (a, b) = if board.zero_row() == 0 { (4, 5) } else { (0, 1) };
            board.tiles.swap(a, b);
            board = Self::from_permutation(board.tiles);
        }
        board
    }

    /// A random solvable board within the given difficulty band.
    #[must_use]
    pub fn random_with(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Moderate => loop {
                let board = Self::random();
                if (20..=45).contains(&board.manhattan()) {
                    return board;
                }
            },
            Difficulty::Easy => loop {
                let board = walk_shuffled(GOAL_TILES, 15);
                if !board.is_goal() && board.manhattan() < 25 {
                    return board;
                }
            },
            Difficulty::Hard => loop {
                let (seed, zero) = if fastrand::u8(..5) == 0 {
                    (HARD_ZERO_15[fastrand::usize(..HARD_ZERO_15.len())], 15)
                } else {
                    (HARD_ZERO_0[fastrand::usize(..HARD_ZERO_0.len())], 0)
                };
                let board = walk_shuffled(seed, zero);
                if !board.is_goal() && board.manhattan() > 40 {
                    return board;
                }
            },
        }
    }
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.key_high == other.key_high && self.key_low == other.key_low
    }
}

impl Eq for Board {}

impl Hash for Board {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(u64::from(self.key_high) << 32 | u64::from(self.key_low));
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.tiles.chunks(ROW_SIZE) {
            for &value in row {
                if value == 0 {
                    write!(f, "  . ")?;
                } else {
                    write!(f, "{value:3} ")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// A position is unsolvable exactly when the blank row and the tile
// inversion count have the same parity.
fn solvable(tiles: &[u8; SIZE], zero: u8) -> bool {
    let mut inversions = 0usize;
    for (cell, &value) in tiles.iter().enumerate() {
        if value == 0 {
            continue;
        }
        inversions += tiles[cell + 1..]
            .iter()
            .filter(|&&later| later != 0 && later < value)
            .count();
    }
    (zero as usize / ROW_SIZE) % 2 != inversions % 2
}

// Random walk of up to 100 blank moves from a seed arrangement.
fn walk_shuffled(mut tiles: [u8; SIZE], mut zero: usize) -> Board {
    let steps = fastrand::u8(..100);
    for _ in 0..steps {
        let next = match fastrand::u8(..4) {
            0 if zero % ROW_SIZE < ROW_SIZE - 1 => zero + 1,
            1 if zero % ROW_SIZE > 0 => zero - 1,
            2 if zero >= ROW_SIZE => zero - ROW_SIZE,
            3 if zero < SIZE - ROW_SIZE => zero + ROW_SIZE,
            _ => continue,
        };
        tiles[zero] = tiles[next];
        tiles[next] = 0;
        zero = next;
    }
    Board::from_permutation(tiles)
}

// Hand-picked boards at or near the 80-move diameter, blank in cell 0.
const HARD_ZERO_0: [[u8; SIZE]; 38] = [
    [0, 11, 9, 13, 12, 15, 10, 14, 3, 7, 6, 2, 4, 8, 5, 1],
    [0, 15, 9, 13, 11, 12, 10, 14, 3, 7, 6, 2, 4, 8, 5, 1],
    [0, 12, 9, 13, 15, 11, 10, 14, 3, 7, 6, 2, 4, 8, 5, 1],
    [0, 12, 9, 13, 15, 11, 10, 14, 3, 7, 2, 5, 4, 8, 6, 1],
    [0, 12, 10, 13, 15, 11, 14, 9, 3, 7, 2, 5, 4, 8, 6, 1],
    [0, 12, 14, 13, 15, 11, 9, 10, 3, 7, 6, 2, 4, 8, 5, 1],
    [0, 12, 10, 13, 15, 11, 14, 9, 3, 7, 6, 2, 4, 8, 5, 1],
    [0, 12, 11, 13, 15, 14, 10, 9, 3, 7, 6, 2, 4, 8, 5, 1],
    [0, 12, 10, 13, 15, 11, 9, 14, 7, 3, 6, 2, 4, 8, 5, 1],
    [0, 12, 9, 13, 15, 11, 14, 10, 3, 8, 6, 2, 4, 7, 5, 1],
    [0, 12, 9, 13, 15, 11, 10, 14, 8, 3, 6, 2, 4, 7, 5, 1],
    [0, 12, 14, 13, 15, 11, 9, 10, 8, 3, 6, 2, 4, 7, 5, 1],
    [0, 12, 9, 13, 15, 11, 10, 14, 7, 8, 6, 2, 4, 3, 5, 1],
    [0, 12, 10, 13, 15, 11, 14, 9, 7, 8, 6, 2, 4, 3, 5, 1],
    [0, 12, 9, 13, 15, 8, 10, 14, 11, 7, 6, 2, 4, 3, 5, 1],
    [0, 12, 9, 13, 15, 11, 10, 14, 3, 7, 5, 6, 4, 8, 2, 1],
    [0, 12, 9, 13, 15, 11, 10, 14, 7, 8, 5, 6, 4, 3, 2, 1],
    [0, 15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1],
    [0, 15, 8, 3, 12, 11, 7, 4, 14, 10, 6, 5, 9, 13, 2, 1],
    [0, 12, 14, 4, 15, 11, 7, 3, 8, 10, 6, 5, 13, 9, 2, 1],
    [0, 12, 7, 3, 15, 11, 8, 4, 10, 14, 6, 2, 9, 13, 5, 1],
    [0, 12, 7, 4, 15, 11, 8, 3, 10, 14, 6, 2, 13, 9, 5, 1],
    [0, 12, 8, 3, 15, 11, 10, 4, 14, 7, 6, 5, 9, 13, 2, 1],
    [0, 12, 8, 3, 15, 11, 7, 4, 14, 10, 6, 2, 9, 13, 5, 1],
    [0, 12, 8, 4, 15, 11, 7, 3, 14, 10, 6, 2, 13, 9, 5, 1],
    [0, 12, 8, 7, 15, 11, 4, 3, 14, 13, 6, 2, 10, 9, 5, 1],
    [0, 15, 4, 10, 12, 11, 8, 3, 13, 14, 6, 2, 7, 9, 5, 1],
    [0, 15, 7, 4, 12, 11, 8, 5, 10, 14, 6, 3, 13, 2, 9, 1],
    [0, 15, 7, 8, 12, 11, 4, 3, 10, 13, 6, 5, 14, 9, 2, 1],
    [0, 15, 8, 10, 12, 11, 4, 3, 14, 13, 6, 2, 7, 9, 5, 1],
    [0, 15, 8, 3, 12, 11, 10, 4, 14, 7, 6, 2, 9, 13, 5, 1],
    [0, 15, 8, 4, 12, 11, 7, 3, 14, 10, 6, 5, 13, 9, 2, 1],
    [0, 15, 8, 4, 12, 11, 7, 5, 14, 10, 6, 3, 13, 2, 9, 1],
    [0, 15, 8, 7, 12, 11, 4, 3, 14, 13, 6, 5, 10, 9, 2, 1],
    [0, 2, 9, 13, 5, 1, 10, 14, 3, 7, 6, 15, 4, 8, 12, 11],
    [0, 5, 9, 13, 2, 1, 10, 14, 3, 7, 11, 15, 4, 8, 12, 6],
    [0, 5, 9, 13, 2, 6, 10, 14, 3, 7, 1, 15, 4, 8, 12, 11],
    [0, 5, 9, 14, 2, 6, 10, 13, 3, 7, 1, 15, 8, 4, 12, 11],
];

// Same, blank in cell 15.
const HARD_ZERO_15: [[u8; SIZE]; 8] = [
    [1, 10, 14, 13, 7, 6, 5, 9, 8, 2, 11, 15, 4, 3, 12, 0],
    [1, 10, 9, 13, 7, 6, 5, 14, 3, 2, 11, 15, 4, 8, 12, 0],
    [1, 5, 14, 13, 2, 6, 10, 9, 8, 7, 11, 15, 4, 3, 12, 0],
    [1, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15, 4, 8, 12, 0],
    [6, 5, 13, 9, 2, 1, 10, 14, 4, 7, 11, 12, 3, 8, 15, 0],
    [6, 5, 14, 13, 2, 1, 10, 9, 8, 7, 11, 12, 4, 3, 15, 0],
    [6, 5, 9, 13, 2, 1, 10, 14, 3, 7, 11, 12, 4, 8, 15, 0],
    [6, 5, 9, 14, 2, 1, 10, 13, 3, 7, 11, 12, 8, 4, 15, 0],
];
