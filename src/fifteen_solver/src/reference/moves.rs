//! Move counts and solution prefixes attached to a canonical board.
//!
//! One record covers the four lookup classes of its entry, the blank
//! cells along the corner walk. A class is verified once an optimal
//! solve has been stored for it; until then the move count is only a
//! bound seeded from a neighboring class.

use fifteen_core::{Direction, SIZE};

use super::board::{CELL_OF, LOOKUPS};

/// Number of leading solution moves kept per lookup class, packed two
/// bits per move.
pub const PARTIAL_MOVES: usize = 8;

const STATUS_COMPLETE: u8 = 0b1111;

/// Per-lookup-class solve data of one archived board.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceMoves {
    steps: [u8; LOOKUPS],
    prefixes: [u16; LOOKUPS],
    status: u8,
}

impl ReferenceMoves {
    /// Seeds all four classes from one known move count. Neighboring
    /// classes are a single blank shift away, so `steps - distance`
    /// stays a valid lower bound on both sides.
    #[must_use]
    pub(crate) fn seeded(lookup: u8, steps: u8) -> Self {
        let lookup = usize::from(lookup);
        let mut moves = Self::default();
        for (class, entry) in moves.steps.iter_mut().enumerate() {
            let distance = class.abs_diff(lookup) as u8;
            *entry = steps.saturating_sub(distance);
        }
        moves
    }

    pub(crate) const fn from_stored(
        steps: [u8; LOOKUPS],
        prefixes: [u16; LOOKUPS],
        status: u8,
    ) -> Self {
        Self {
            steps,
            prefixes,
            status,
        }
    }

    pub(crate) const fn steps(&self) -> &[u8; LOOKUPS] {
        &self.steps
    }

    pub(crate) const fn prefixes(&self) -> &[u16; LOOKUPS] {
        &self.prefixes
    }

    pub(crate) const fn status(&self) -> u8 {
        self.status
    }

    /// Best known move count for a lookup class.
    #[must_use]
    pub fn estimate(&self, lookup: usize) -> u8 {
        self.steps[lookup]
    }

    /// Move count of the corner class, the entry's headline estimate.
    #[must_use]
    pub fn primary_estimate(&self) -> u8 {
        self.steps[0]
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == STATUS_COMPLETE
    }

    pub(crate) fn is_verified(&self, lookup: usize) -> bool {
        self.status & (1 << lookup) != 0
    }

    /// Merges a second stored record for the same board, keeping the
    /// larger bound per class.
    pub(crate) fn merge(&mut self, other: &ReferenceMoves) {
        self.status |= other.status;
        for class in 0..LOOKUPS {
            if self.steps[class] < other.steps[class] {
                self.steps[class] = other.steps[class];
                self.prefixes[class] = other.prefixes[class];
            } else if self.prefixes[class] == 0 {
                self.prefixes[class] = other.prefixes[class];
            }
        }
    }

    /// Records a verified optimal solution for one lookup class. When
    /// the solving board was the mirror image of the stored entry the
    /// prefix is stored mirrored.
    pub(crate) fn set_solution(
        &mut self,
        lookup: usize,
        steps: u8,
        solution: &[Direction],
        mirrored: bool,
    ) {
        self.status |= 1 << lookup;
        self.steps[lookup] = steps;
        self.prefixes[lookup] = pack_prefix(solution, mirrored);
    }

    /// The stored 8-move prefix of a class, re-mirrored on request, or
    /// `None` when no solution has been archived for it.
    #[must_use]
    pub fn prefix(&self, lookup: usize, mirrored: bool) -> Option<[Direction; PARTIAL_MOVES]> {
        let mut value = self.prefixes[lookup];
        if value == 0 {
            return None;
        }
        let mut moves = [Direction::Right; PARTIAL_MOVES];
        for entry in &mut moves {
            let dir = Direction::from_index(usize::from(value & 0x3))?;
            *entry = if mirrored { dir.mirrored() } else { dir };
            value >>= 2;
        }
        Some(moves)
    }

    /// The canonical tiles one blank shift further along the corner
    /// walk, the position belonging to the next lookup class.
    pub(crate) fn shift_blank(tiles: &[u8; SIZE], group: u8, lookup: usize) -> [u8; SIZE] {
        if lookup > 2 {
            return *tiles;
        }
        let mut shifted = *tiles;
        let here = CELL_OF[group as usize][lookup] as usize;
        let next = CELL_OF[group as usize][lookup + 1] as usize;
        shifted[here] = tiles[next];
        shifted[next] = 0;
        shifted
    }
}

fn pack_prefix(solution: &[Direction], mirrored: bool) -> u16 {
    debug_assert!(solution.len() >= PARTIAL_MOVES);
    let mut value = 0u16;
    for &dir in solution.iter().take(PARTIAL_MOVES).rev() {
        let dir = if mirrored { dir.mirrored() } else { dir };
        #[allow(clippy::cast_possible_truncation)]
        {
            value = value << 2 | dir.index() as u16;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifteen_core::Board;

    #[test]
    fn seeding_fills_neighbor_bounds() {
        let moves = ReferenceMoves::seeded(2, 70);
        assert_eq!(*moves.steps(), [68, 69, 70, 69]);
        assert!(!moves.is_complete());
    }

    #[test]
    fn prefix_round_trips_with_mirror() {
        let solution = [
            Direction::Up,
            Direction::Left,
            Direction::Left,
            Direction::Down,
            Direction::Right,
            Direction::Up,
            Direction::Left,
            Direction::Down,
            Direction::Down,
        ];
        let mut moves = ReferenceMoves::default();
        moves.set_solution(1, 9, &solution, false);
        assert!(moves.is_verified(1));

        let plain = moves.prefix(1, false).unwrap();
        assert_eq!(plain, solution[..PARTIAL_MOVES]);

        let mirrored = moves.prefix(1, true).unwrap();
        for (stored, original) in mirrored.iter().zip(&solution) {
            assert_eq!(*stored, original.mirrored());
        }
    }

    #[test]
    fn merge_keeps_larger_bounds() {
        let mut first = ReferenceMoves::seeded(0, 60);
        let second = ReferenceMoves::seeded(3, 64);
        first.merge(&second);
        assert_eq!(*first.steps(), [61, 62, 63, 64]);
    }

    #[test]
    fn blank_walk_shifts_one_cell() {
        let tiles = *Board::goal().tiles();
        // group 0 walk moves the blank from cell 15 toward cell 14
        let shifted = ReferenceMoves::shift_blank(&tiles, 0, 0);
        assert_eq!(shifted[15], 15);
        assert_eq!(shifted[14], 0);
        // the last class has nowhere further to walk
        assert_eq!(ReferenceMoves::shift_blank(&tiles, 0, 3), tiles);
    }
}
