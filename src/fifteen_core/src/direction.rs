use std::fmt;

use crate::{MIRROR_POS, ROW_SIZE};

/// One move of the blank cell. The name is the direction the blank travels;
/// the tile it swaps with travels the opposite way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ];

    /// Index used for packed 2-bit encodings and per-direction tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Direction::Right => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Up => 3,
        }
    }

    /// Inverse of [`Direction::index`].
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Direction> {
        match index {
            0 => Some(Direction::Right),
            1 => Some(Direction::Down),
            2 => Some(Direction::Left),
            3 => Some(Direction::Up),
            _ => None,
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Up => Direction::Down,
        }
    }

    /// The equivalent move on the board reflected across the main diagonal.
    #[must_use]
    pub const fn mirrored(self) -> Direction {
        match self {
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Right,
            Direction::Left => Direction::Up,
            Direction::Up => Direction::Left,
        }
    }

    /// Next direction in the clockwise turn cycle R -> D -> L -> U -> R.
    #[must_use]
    pub const fn clockwise(self) -> Direction {
        match self {
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
            Direction::Up => Direction::Right,
        }
    }

    /// Next direction in the counterclockwise turn cycle R -> U -> L -> D -> R.
    #[must_use]
    pub const fn counterclockwise(self) -> Direction {
        match self {
            Direction::Right => Direction::Up,
            Direction::Up => Direction::Left,
            Direction::Left => Direction::Down,
            Direction::Down => Direction::Right,
        }
    }

    /// Signed change of the blank's linear cell index for this move.
    #[must_use]
    pub const fn offset(self) -> i8 {
        match self {
            Direction::Right => 1,
            Direction::Down => 4,
            Direction::Left => -1,
            Direction::Up => -4,
        }
    }

    /// Signed offset of the blank's linear cell index for this move, or
    /// `None` when the blank at `zero` sits on the matching edge.
    #[must_use]
    pub const fn offset_from(self, zero: u8) -> Option<i8> {
        let (col, row) = (zero as usize % ROW_SIZE, zero as usize / ROW_SIZE);
        match self {
            Direction::Right if col < ROW_SIZE - 1 => Some(1),
            Direction::Down if row < ROW_SIZE - 1 => Some(4),
            Direction::Left if col > 0 => Some(-1),
            Direction::Up if row > 0 => Some(-4),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Direction::Right => 'R',
            Direction::Down => 'D',
            Direction::Left => 'L',
            Direction::Up => 'U',
        };
        write!(f, "{letter}")
    }
}
