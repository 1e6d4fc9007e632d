//! Walking-distance table.
//!
//! The walking distance projects the board onto row occupancy counts: for
//! each board row, how many of its tiles belong in each goal row. The
//! minimal number of vertical blank moves to sort that projection is a
//! lower bound on the vertical component of the solution; the transposed
//! projection bounds the horizontal component, and the two add up.
//!
//! A row's four counts pack into 12 bits (3 bits each); the 55 reachable
//! row keys index into 6 bits, so a full pattern is four row-key indices
//! plus the blank row in 28 bits. All 24,964 reachable patterns and their
//! distances are generated here by BFS from the goal, along with a link
//! table that advances a pattern index in O(1) when a tile crosses rows.

use fxhash::FxHashMap;

use fifteen_core::{ROW_SIZE, SIZE};

/// Reachable 12-bit row keys.
pub const ROW_KEY_COUNT: usize = 55;
/// Reachable 28-bit patterns.
pub const PATTERN_COUNT: usize = 24_964;

const ROW_BITS: u32 = 6;
const ZERO_BITS: u32 = 4;
const NO_LINK: u32 = u32::MAX;

// Bit masks over a 12-bit row key covering the counts before and after a
// given column class.
const PRIOR_KEY: [u16; ROW_SIZE] = [0, 0x0E00, 0x0FC0, 0x0FF8];
const AFTER_KEY: [u16; ROW_SIZE] = [0x01FF, 0x003F, 0x0007, 0];

// Bit masks over a 24-bit pattern combo covering the row keys untouched by
// a blank move between two adjacent rows.
const PARTIAL_PATTERN: [u32; ROW_SIZE] = [0x0000_0FFF, 0x00FC_0000, 0x0000_003F, 0x00FF_F000];

/// Direction of a link-table step: `Forward` when the blank's row or
/// column index grows, `Backward` when it shrinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    Forward = 0,
    Backward = 1,
}

pub struct WalkingDistance {
    row_keys: FxHashMap<u16, u32>,
    pattern_keys: FxHashMap<u32, u32>,
    distances: Box<[u8]>,
    links: Box<[u32]>,
}

impl WalkingDistance {
    /// Generates the full table. Takes a few milliseconds.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            row_keys: FxHashMap::default(),
            pattern_keys: FxHashMap::default(),
            distances: vec![0; PATTERN_COUNT].into_boxed_slice(),
            links: vec![NO_LINK; PATTERN_COUNT * ROW_SIZE * 2].into_boxed_slice(),
        };
        let key_link = table.generate_row_keys();
        table.generate_patterns(&key_link);
        table
    }

    /// Walking-distance lower bound stored for a pattern index.
    #[must_use]
    pub fn distance(&self, index: u32) -> u8 {
        self.distances[index as usize]
    }

    /// Pattern index after the blank crosses a row boundary, swapping
    /// with a tile of the given goal-line class.
    #[must_use]
    pub fn advance(&self, index: u32, line_class: usize, kind: LinkKind) -> u32 {
        let link = self.links[index as usize * ROW_SIZE * 2 + line_class * 2 + kind as usize];
        debug_assert_ne!(link, NO_LINK, "link from a line with no such tile");
        link
    }

    /// Pattern indices (horizontal, vertical) of a full tile array.
    #[must_use]
    pub fn indices(&self, tiles: &[u8; SIZE], zero_row: u8, zero_col: u8) -> (u32, u32) {
        let mut horizontal = [0u8; SIZE];
        let mut vertical = [0u8; SIZE];
        for (cell, &value) in tiles.iter().enumerate() {
            if value == 0 {
                continue;
            }
            let goal = (value - 1) as usize;
            horizontal[(cell / ROW_SIZE) * ROW_SIZE + goal / ROW_SIZE] += 1;
            vertical[(cell % ROW_SIZE) * ROW_SIZE + goal % ROW_SIZE] += 1;
        }
        (
            self.index_of(&horizontal, zero_row),
            self.index_of(&vertical, zero_col),
        )
    }

    // Look up the pattern index of sixteen occupancy counts (four lines of
    // four goal-line classes) plus the blank line.
    fn index_of(&self, counts: &[u8; SIZE], zero_line: u8) -> u32 {
        let mut key = 0u32;
        for line in counts.chunks(ROW_SIZE) {
            let row_key = line
                .iter()
                .fold(0u16, |key, &count| key << 3 | u16::from(count));
            key = key << ROW_BITS | self.row_keys[&row_key];
        }
        self.pattern_keys[&(key << ZERO_BITS | u32::from(zero_line))]
    }

    // Enumerates the 35 four-tile and 20 three-tile row keys by moving one
    // tile at a time between column classes, then builds the per-column
    // shift links between the two halves.
    fn generate_row_keys(&mut self) -> Vec<u32> {
        let mut combos: Vec<u16> = Vec::with_capacity(ROW_KEY_COUNT);

        let mut split = 0;
        for tile_count in [ROW_SIZE as u8, ROW_SIZE as u8 - 1] {
            let mut frontier: Vec<[u8; ROW_SIZE]> = Vec::new();
            for class in 0..ROW_SIZE {
                let mut counts = [0u8; ROW_SIZE];
                counts[class] = tile_count;
                let key = row_combo_key(&counts);
                if !self.row_keys.contains_key(&key) {
                    #[allow(clippy::cast_possible_truncation)]
                    self.row_keys.insert(key, combos.len() as u32);
                    combos.push(key);
                    frontier.push(counts);
                }
            }
            while let Some(counts) = frontier.pop() {
                for from in 0..ROW_SIZE {
                    if counts[from] == 0 {
                        continue;
                    }
                    for to in 0..ROW_SIZE {
                        if from == to {
                            continue;
                        }
                        let mut moved = counts;
                        moved[from] -= 1;
                        moved[to] += 1;
                        let key = row_combo_key(&moved);
                        if !self.row_keys.contains_key(&key) {
                            #[allow(clippy::cast_possible_truncation)]
                            self.row_keys.insert(key, combos.len() as u32);
                            combos.push(key);
                            frontier.push(moved);
                        }
                    }
                }
            }
            if tile_count == ROW_SIZE as u8 {
                split = combos.len();
            }
        }
        debug_assert_eq!(combos.len(), ROW_KEY_COUNT);

        let mut key_link = vec![NO_LINK; ROW_KEY_COUNT * ROW_SIZE];
        for (index, &combo) in combos.iter().enumerate() {
            let four_tiles = index < split;
            for class in 0..ROW_SIZE {
                let shift = ((ROW_SIZE - class - 1) * 3) as u32;
                let count = combo >> shift & 0x7;
                if four_tiles && count == 0 {
                    continue; // no tile of this class to shift out
                }
                let replaced = if four_tiles { count - 1 } else { count + 1 };
                let next = (combo & PRIOR_KEY[class]) | (combo & AFTER_KEY[class]) | replaced << shift;
                key_link[index * ROW_SIZE + class] = self.row_keys[&next];
            }
        }
        key_link
    }

    // BFS over full patterns from the goal pattern, filling distances and
    // the pattern-level link table.
    fn generate_patterns(&mut self, key_link: &[u32]) {
        let mut combos: Vec<u32> = Vec::with_capacity(PATTERN_COUNT);

        // goal: rows 0-2 hold their own four tiles, row 3 its own three,
        // blank in row 3
        let mut goal_combo = 0u32;
        for row in 0..ROW_SIZE - 1 {
            let mut counts = [0u8; ROW_SIZE];
            counts[row] = ROW_SIZE as u8;
            goal_combo = goal_combo << ROW_BITS | self.row_keys[&row_combo_key(&counts)];
        }
        let mut counts = [0u8; ROW_SIZE];
        counts[ROW_SIZE - 1] = ROW_SIZE as u8 - 1;
        goal_combo = goal_combo << ROW_BITS | self.row_keys[&row_combo_key(&counts)];
        goal_combo = goal_combo << ZERO_BITS | (ROW_SIZE as u32 - 1);

        self.pattern_keys.insert(goal_combo, 0);
        combos.push(goal_combo);
        self.distances[0] = 0;

        let mut level_start = 0usize;
        let mut moves = 0u8;
        while level_start < combos.len() {
            let level_end = combos.len();
            moves += 1;
            for index in level_start..level_end {
                let full = combos[index];
                let combo = full >> ZERO_BITS;
                let zero_row = (full & 0xF) as usize;
                let zero_key = row_key_of(combo, zero_row) as usize;
                let link_base = index * ROW_SIZE * 2;

                // blank down: a tile from the row below moves up
                if zero_row < ROW_SIZE - 1 {
                    let lower_key = row_key_of(combo, zero_row + 1) as usize;
                    for class in 0..ROW_SIZE {
                        let slot = link_base + class * 2;
                        if key_link[lower_key * ROW_SIZE + class] == NO_LINK {
                            continue;
                        }
                        let pair = key_link[zero_key * ROW_SIZE + class] << ROW_BITS
                            | key_link[lower_key * ROW_SIZE + class];
                        let next = splice_pair(combo, zero_row, pair) << ZERO_BITS
                            | (zero_row as u32 + 1);
                        self.links[slot] = self.intern_pattern(next, moves, &mut combos);
                    }
                }

                // blank up: a tile from the row above moves down
                if zero_row > 0 {
                    let upper_key = row_key_of(combo, zero_row - 1) as usize;
                    for class in 0..ROW_SIZE {
                        let slot = link_base + class * 2 + 1;
                        if key_link[upper_key * ROW_SIZE + class] == NO_LINK {
                            continue;
                        }
                        let pair = key_link[upper_key * ROW_SIZE + class] << ROW_BITS
                            | key_link[zero_key * ROW_SIZE + class];
                        let next = splice_pair(combo, zero_row - 1, pair) << ZERO_BITS
                            | (zero_row as u32 - 1);
                        self.links[slot] = self.intern_pattern(next, moves, &mut combos);
                    }
                }
            }
            level_start = level_end;
        }
        debug_assert_eq!(combos.len(), PATTERN_COUNT);
    }

    fn intern_pattern(&mut self, combo: u32, moves: u8, combos: &mut Vec<u32>) -> u32 {
        if let Some(&index) = self.pattern_keys.get(&combo) {
            return index;
        }
        #[allow(clippy::cast_possible_truncation)]
        let index = combos.len() as u32;
        self.pattern_keys.insert(combo, index);
        combos.push(combo);
        self.distances[index as usize] = moves;
        index
    }
}

impl Default for WalkingDistance {
    fn default() -> Self {
        Self::new()
    }
}

fn row_combo_key(counts: &[u8; ROW_SIZE]) -> u16 {
    counts
        .iter()
        .fold(0u16, |key, &count| key << 3 | u16::from(count))
}

fn row_key_of(combo: u32, row: usize) -> u32 {
    combo >> ((ROW_SIZE - row - 1) as u32 * ROW_BITS) & 0x3F
}

// Replace the row keys of rows `upper` and `upper + 1` with the packed
// pair, keeping the other two rows.
fn splice_pair(combo: u32, upper: usize, pair: u32) -> u32 {
    match upper {
        0 => pair << (2 * ROW_BITS) | (combo & PARTIAL_PATTERN[0]),
        1 => (combo & PARTIAL_PATTERN[1]) | pair << ROW_BITS | (combo & PARTIAL_PATTERN[2]),
        2 => (combo & PARTIAL_PATTERN[3]) | pair,
        _ => unreachable!("pair splice row out of range"),
    }
}

#[cfg(test)]
mod tests {
    use fifteen_core::{Board, GOAL_TILES};

    use super::*;

    #[test]
    fn table_has_expected_shape() {
        let table = WalkingDistance::new();
        assert_eq!(table.row_keys.len(), ROW_KEY_COUNT);
        assert_eq!(table.pattern_keys.len(), PATTERN_COUNT);
    }

    #[test]
    fn goal_distances_are_zero() {
        let table = WalkingDistance::new();
        let (horizontal, vertical) = table.indices(&GOAL_TILES, 3, 3);
        assert_eq!(table.distance(horizontal), 0);
        assert_eq!(table.distance(vertical), 0);
    }

    #[test]
    fn forward_and_backward_links_cancel() {
        let table = WalkingDistance::new();
        let board = Board::goal().shift(fifteen_core::Direction::Up).unwrap();
        let (horizontal, _) = table.indices(board.tiles(), board.zero_row(), board.zero_col());

        // the tile below the blank is 12, goal-row class 2
        let down = table.advance(horizontal, 2, LinkKind::Forward);
        assert_eq!(table.advance(down, 2, LinkKind::Backward), horizontal);
    }

    #[test]
    fn blank_up_costs_one_row_crossing() {
        // blank up from the goal: tile 12 lands one row below its goal row
        let board = Board::goal().shift(fifteen_core::Direction::Up).unwrap();
        let table = WalkingDistance::new();
        let (horizontal, vertical) =
            table.indices(board.tiles(), board.zero_row(), board.zero_col());
        assert_eq!(table.distance(horizontal), 1);
        assert_eq!(table.distance(vertical), 0);
    }

    #[test]
    fn never_exceeds_true_distance_on_short_walks() {
        let table = WalkingDistance::new();
        let mut board = Board::goal();
        let mut walked = 0u8;
        for _ in 0..12 {
            let moves: Vec<_> = board.neighbors().collect();
            let (_, next) = moves[fastrand::usize(..moves.len())].clone();
            board = next;
            walked += 1;
            let (horizontal, vertical) =
                table.indices(board.tiles(), board.zero_row(), board.zero_col());
            assert!(table.distance(horizontal) + table.distance(vertical) <= walked);
        }
    }
}
