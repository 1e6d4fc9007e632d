//! Canonical form of an archived board.
//!
//! Boards whose blanks sit one blank-walk apart, or that are mirror
//! images or rotations of each other, collapse to one stored entry.
//! The blank is walked toward a corner along a fixed per-group path,
//! group 3 folds onto group 1 through the diagonal mirror, and the
//! result is rotated so every canonical blank lands in the same corner
//! region.

use std::hash::{Hash, Hasher};

use fifteen_core::{Board, SIZE};

/// Blank cells per group, four lookup classes each.
pub(crate) const LOOKUPS: usize = 4;

/// Lookup class of each blank cell, the number of shifts to its
/// group's corner.
const LOOKUP_OF: [u8; SIZE] = [0, 1, 3, 0, 3, 2, 2, 1, 3, 2, 2, 3, 0, 1, 1, 0];

/// Corner group of each blank cell.
const GROUP_OF: [u8; SIZE] = [2, 2, 1, 1, 2, 2, 1, 1, 3, 3, 0, 0, 3, 3, 0, 0];

/// Group 3 is stored as its mirror image in group 1.
pub(crate) const MIRROR_GROUP: u8 = 3;

/// `CELL_OF[group][lookup]` is the blank cell with that lookup class.
pub(crate) const CELL_OF: [[u8; LOOKUPS]; LOOKUPS] = [
    [15, 14, 10, 11],
    [3, 7, 6, 2],
    [0, 1, 5, 4],
    [12, 13, 9, 8],
];

const ROTATE_90: [u8; SIZE] = [12, 8, 4, 0, 13, 9, 5, 1, 14, 10, 6, 2, 15, 11, 7, 3];
const ROTATE_180: [u8; SIZE] = [15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0];

/// Lookup class of a board's blank cell.
pub(crate) fn lookup_of(board: &Board) -> u8 {
    LOOKUP_OF[board.zero() as usize]
}

/// Corner group of a board's blank cell, before mirror folding.
pub(crate) fn group_of(board: &Board) -> u8 {
    GROUP_OF[board.zero() as usize]
}

/// A board reduced to its canonical archived form.
#[derive(Clone, Debug)]
pub struct ReferenceBoard {
    /// Tile relabeling that turns a sibling board into a position whose
    /// goal is this entry's canonical tiles.
    transform: [u8; SIZE],
    /// Rotation group after mirror folding, 0 to 2.
    group: u8,
    /// Nibble-packed cells 0-7 of the canonical tiles.
    hash_high: u32,
    /// Nibble-packed cells 8-15.
    hash_low: u32,
}

impl ReferenceBoard {
    #[must_use]
    pub fn new(board: &Board) -> Self {
        let zero = board.zero() as usize;
        let mut group = GROUP_OF[zero];
        let mut lookup = usize::from(LOOKUP_OF[zero]);
        let mut tiles = if group == MIRROR_GROUP {
            group = 1;
            *board.mirror_tiles()
        } else {
            *board.tiles()
        };

        // walk the blank to the group's corner cell
        while lookup > 0 {
            let to = CELL_OF[group as usize][lookup] as usize;
            let from = CELL_OF[group as usize][lookup - 1] as usize;
            tiles[to] = tiles[from];
            tiles[from] = 0;
            lookup -= 1;
        }

        let rotated = rotate(&tiles, group);
        let mut transform = [0u8; SIZE];
        #[allow(clippy::cast_possible_truncation)]
        for (cell, &value) in rotated.iter().enumerate().take(SIZE - 1) {
            transform[value as usize] = cell as u8 + 1;
        }

        let (hash_high, hash_low) = pack_halves(&tiles);
        Self {
            transform,
            group,
            hash_high,
            hash_low,
        }
    }

    /// Rebuilds an entry from its stored fields. The transform key must
    /// unpack to a permutation.
    pub(crate) fn from_stored(
        transform_key: u64,
        group: u8,
        hash_high: u32,
        hash_low: u32,
    ) -> Option<Self> {
        if group > 2 {
            return None;
        }
        let mut transform = [0u8; SIZE];
        let mut seen = 0u16;
        let mut key = transform_key;
        for cell in (0..SIZE).rev() {
            #[allow(clippy::cast_possible_truncation)]
            let value = (key & 0xF) as u8;
            if seen & (1 << value) != 0 {
                return None;
            }
            seen |= 1 << value;
            transform[cell] = value;
            key >>= 4;
        }
        Some(Self {
            transform,
            group,
            hash_high,
            hash_low,
        })
    }

    /// The transform packed into 16 nibbles for storage.
    pub(crate) fn transform_key(&self) -> u64 {
        self.transform
            .iter()
            .fold(0u64, |key, &value| key << 4 | u64::from(value))
    }

    pub(crate) const fn group(&self) -> u8 {
        self.group
    }

    pub(crate) const fn hash_high(&self) -> u32 {
        self.hash_high
    }

    pub(crate) const fn hash_low(&self) -> u32 {
        self.hash_low
    }

    /// The canonical tile arrangement this entry was stored under.
    #[must_use]
    pub fn canonical_tiles(&self) -> [u8; SIZE] {
        let mut tiles = [0u8; SIZE];
        let mut high = self.hash_high;
        for cell in (0..SIZE / 2).rev() {
            #[allow(clippy::cast_possible_truncation)]
            let value = (high & 0xF) as u8;
            tiles[cell] = value;
            high >>= 4;
        }
        let mut low = self.hash_low;
        for cell in (SIZE / 2..SIZE).rev() {
            #[allow(clippy::cast_possible_truncation)]
            let value = (low & 0xF) as u8;
            tiles[cell] = value;
            low >>= 4;
        }
        tiles
    }

    /// Relabels and rotates `tiles` so this entry's canonical tiles
    /// become the goal; the result's solving distance is the distance
    /// between the two boards.
    #[must_use]
    pub fn apply_transform(&self, tiles: &[u8; SIZE]) -> [u8; SIZE] {
        let mut relabeled = [0u8; SIZE];
        for (cell, &value) in tiles.iter().enumerate() {
            relabeled[cell] = self.transform[value as usize];
        }
        rotate(&relabeled, self.group)
    }
}

fn rotate(tiles: &[u8; SIZE], group: u8) -> [u8; SIZE] {
    match group {
        0 => *tiles,
        1 => std::array::from_fn(|cell| tiles[ROTATE_90[cell] as usize]),
        _ => std::array::from_fn(|cell| tiles[ROTATE_180[cell] as usize]),
    }
}

fn pack_halves(tiles: &[u8; SIZE]) -> (u32, u32) {
    let high = tiles[..SIZE / 2]
        .iter()
        .fold(0u32, |key, &value| key << 4 | u32::from(value));
    let low = tiles[SIZE / 2..]
        .iter()
        .fold(0u32, |key, &value| key << 4 | u32::from(value));
    (high, low)
}

impl PartialEq for ReferenceBoard {
    fn eq(&self, other: &Self) -> bool {
        self.hash_high == other.hash_high && self.hash_low == other.hash_low
    }
}

impl Eq for ReferenceBoard {}

impl Hash for ReferenceBoard {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(
            self.hash_high
                .wrapping_mul(self.hash_low.wrapping_add(0x1111)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifteen_core::Direction;

    #[test]
    fn goal_canonicalizes_to_identity_transform() {
        let canonical = ReferenceBoard::new(&Board::goal());
        assert_eq!(canonical.group(), 0);
        // every tile already carries its canonical label
        for value in 0..16u8 {
            assert_eq!(canonical.transform[value as usize], value);
        }
        assert_eq!(canonical.canonical_tiles(), *Board::goal().tiles());
    }

    #[test]
    fn blank_walk_siblings_share_an_entry() {
        // sliding the blank along its group's corner path must not
        // change the canonical form
        let board = Board::goal();
        let shifted = board.shift(Direction::Left).unwrap();
        assert_eq!(ReferenceBoard::new(&board), ReferenceBoard::new(&shifted));
    }

    #[test]
    fn transform_distance_is_symmetric_to_goal() {
        // canonical entry used as a goal: transforming its own
        // canonical tiles yields the solved arrangement
        fastrand::seed(3);
        let board = Board::random();
        let canonical = ReferenceBoard::new(&board);
        let tiles = canonical.canonical_tiles();
        let transformed = canonical.apply_transform(&tiles);
        assert_eq!(transformed, *Board::goal().tiles());
    }

    #[test]
    fn stored_round_trip() {
        fastrand::seed(11);
        let board = Board::random();
        let canonical = ReferenceBoard::new(&board);
        let restored = ReferenceBoard::from_stored(
            canonical.transform_key(),
            canonical.group(),
            canonical.hash_high(),
            canonical.hash_low(),
        )
        .unwrap();
        assert_eq!(canonical, restored);
        assert_eq!(canonical.transform, restored.transform);
        assert_eq!(canonical.group(), restored.group());
    }

    #[test]
    fn duplicate_nibbles_rejected() {
        assert!(ReferenceBoard::from_stored(0, 0, 0, 0).is_none());
    }
}
