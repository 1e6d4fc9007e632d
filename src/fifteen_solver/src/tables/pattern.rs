//! Additive pattern databases.
//!
//! The fifteen tiles are split into disjoint groups. For each group, a
//! table stores the exact minimal number of moves of that group's tiles
//! needed to bring them home, ignoring every other tile and the blank.
//! Because the groups are disjoint and each puzzle move slides exactly
//! one tile, the per-group costs add up to an admissible bound.
//!
//! A group of `k` tiles is keyed by the nibble-packed cell indices of its
//! tiles, slot 0 in the low nibble: `key = pos(t0) | pos(t1) << 4 | ...`
//! with the group's tiles in ascending value order. The table is a dense
//! `16^k` byte array; keys with duplicate cells are never visited and
//! keep the `UNREACHED` marker. Groups are capped at six tiles, which
//! bounds a table at 16 MiB.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use itertools::Itertools;
use thiserror::Error;

use fifteen_core::{Direction, ROW_SIZE, SIZE};

/// Partitions never have more groups than this (five groups of three).
pub const MAX_GROUPS: usize = 5;
/// Dense keys cap the group size; larger groups need a sparser key scheme.
pub const MAX_GROUP_TILES: usize = 6;

const UNREACHED: u8 = u8::MAX;
const MAGIC: [u8; 4] = *b"FPDB";
const VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum PatternDbError {
    #[error("invalid tile partition: {0}")]
    BadPartition(String),
    #[error("pattern database file is corrupt: {0}")]
    Corrupt(&'static str),
    #[error("pattern database file was built for a different partition")]
    PartitionMismatch,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A disjoint cover of tiles 1 through 15 by groups of at most six.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    groups: Vec<Vec<u8>>,
}

impl Partition {
    /// Validates and normalizes a grouping; tiles inside each group are
    /// sorted so slot order is deterministic.
    ///
    /// # Errors
    ///
    /// Rejects groups that are empty or oversized, tiles outside
    /// 1 through 15, and covers that miss or repeat a tile.
    pub fn new(groups: Vec<Vec<u8>>) -> Result<Self, PatternDbError> {
        if groups.is_empty() || groups.len() > MAX_GROUPS {
            return Err(PatternDbError::BadPartition(format!(
                "expected 1 to {MAX_GROUPS} groups, got {}",
                groups.len()
            )));
        }
        let mut groups: Vec<Vec<u8>> = groups;
        let mut seen = [false; SIZE];
        for group in &mut groups {
            if group.is_empty() || group.len() > MAX_GROUP_TILES {
                return Err(PatternDbError::BadPartition(format!(
                    "group size {} out of range",
                    group.len()
                )));
            }
            for &tile in group.iter() {
                if tile == 0 || tile as usize >= SIZE {
                    return Err(PatternDbError::BadPartition(format!(
                        "tile {tile} out of range"
                    )));
                }
                if seen[tile as usize] {
                    return Err(PatternDbError::BadPartition(format!(
                        "tile {tile} appears twice"
                    )));
                }
                seen[tile as usize] = true;
            }
            group.sort_unstable();
        }
        if let Some(missing) = (1..SIZE).find(|&tile| !seen[tile]) {
            return Err(PatternDbError::BadPartition(format!(
                "tile {missing} is not covered"
            )));
        }
        Ok(Self { groups })
    }

    /// The 6-6-3 split, the strongest partition a dense key supports.
    #[must_use]
    pub fn preset_663() -> Self {
        Self {
            groups: vec![
                vec![1, 2, 5, 6, 9, 13],
                vec![3, 4, 7, 8, 11, 12],
                vec![10, 14, 15],
            ],
        }
    }

    /// The 5-5-5 split, cheaper to build and load.
    #[must_use]
    pub fn preset_555() -> Self {
        Self {
            groups: vec![
                vec![1, 2, 5, 6, 9],
                vec![3, 4, 7, 8, 12],
                vec![10, 11, 13, 14, 15],
            ],
        }
    }

    #[must_use]
    pub fn groups(&self) -> &[Vec<u8>] {
        &self.groups
    }
}

pub struct PatternDb {
    partition: Partition,
    group_of: [u8; SIZE],
    slot_of: [u8; SIZE],
    tables: Vec<Box<[u8]>>,
}

impl PatternDb {
    /// Builds all group tables by breadth-first search from the goal
    /// placement. A 6-tile group takes a few seconds.
    #[must_use]
    pub fn generate(partition: Partition) -> Self {
        let (group_of, slot_of) = tile_maps(&partition);
        let tables = partition
            .groups
            .iter()
            .map(|group| generate_group(group))
            .collect();
        Self {
            partition,
            group_of,
            slot_of,
            tables,
        }
    }

    /// Loads a previously saved database, verifying it matches the
    /// requested partition.
    ///
    /// # Errors
    ///
    /// [`PatternDbError::Corrupt`] or [`PatternDbError::PartitionMismatch`]
    /// when the file does not decode to tables for `partition`; I/O
    /// errors pass through.
    pub fn load(path: &Path, partition: &Partition) -> Result<Self, PatternDbError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut header = [0u8; 6];
        reader.read_exact(&mut header)?;
        if header[..4] != MAGIC {
            return Err(PatternDbError::Corrupt("bad magic bytes"));
        }
        if header[4] != VERSION {
            return Err(PatternDbError::Corrupt("unsupported version"));
        }
        let group_count = header[5] as usize;
        if group_count != partition.groups.len() {
            return Err(PatternDbError::PartitionMismatch);
        }

        let mut groups = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            let mut len = [0u8; 1];
            reader.read_exact(&mut len)?;
            if len[0] as usize > MAX_GROUP_TILES {
                return Err(PatternDbError::Corrupt("oversized group"));
            }
            let mut tiles = vec![0u8; len[0] as usize];
            reader.read_exact(&mut tiles)?;
            groups.push(tiles);
        }
        if groups != partition.groups {
            return Err(PatternDbError::PartitionMismatch);
        }

        let mut tables = Vec::with_capacity(group_count);
        for group in &partition.groups {
            let mut table = vec![0u8; 1 << (4 * group.len())];
            reader.read_exact(&mut table)?;
            tables.push(table.into_boxed_slice());
        }
        if reader.bytes().next().is_some() {
            return Err(PatternDbError::Corrupt("trailing bytes"));
        }

        let (group_of, slot_of) = tile_maps(partition);
        Ok(Self {
            partition: partition.clone(),
            group_of,
            slot_of,
            tables,
        })
    }

    /// Writes the database to disk in the format [`PatternDb::load`] reads.
    ///
    /// # Errors
    ///
    /// Any I/O error from creating or writing the file.
    pub fn save(&self, path: &Path) -> Result<(), PatternDbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&MAGIC)?;
        #[allow(clippy::cast_possible_truncation)]
        writer.write_all(&[VERSION, self.partition.groups.len() as u8])?;
        for group in &self.partition.groups {
            #[allow(clippy::cast_possible_truncation)]
            writer.write_all(&[group.len() as u8])?;
            writer.write_all(group)?;
        }
        for table in &self.tables {
            writer.write_all(table)?;
        }
        writer.flush()?;
        Ok(())
    }

    #[must_use]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.tables.len()
    }

    /// Group index of a tile value; the blank belongs to no group.
    #[must_use]
    pub fn group_of(&self, tile: u8) -> usize {
        self.group_of[tile as usize] as usize
    }

    /// Nibble slot of a tile value inside its group key.
    #[must_use]
    pub fn slot_of(&self, tile: u8) -> u32 {
        u32::from(self.slot_of[tile as usize])
    }

    /// Stored cost for a group key.
    #[must_use]
    pub fn cost(&self, group: usize, key: u32) -> u8 {
        let cost = self.tables[group][key as usize];
        debug_assert_ne!(cost, UNREACHED, "lookup of an impossible key");
        cost
    }

    /// Packed keys and costs of a full tile array, one pair per group.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn keys(&self, tiles: &[u8; SIZE]) -> ([u32; MAX_GROUPS], [u8; MAX_GROUPS]) {
        let mut keys = [0u32; MAX_GROUPS];
        for (cell, &value) in tiles.iter().enumerate() {
            if value == 0 {
                continue;
            }
            let group = self.group_of(value);
            keys[group] |= (cell as u32) << (4 * self.slot_of(value));
        }
        let mut costs = [0u8; MAX_GROUPS];
        for group in 0..self.group_count() {
            costs[group] = self.cost(group, keys[group]);
        }
        (keys, costs)
    }

    /// Sum of the group costs of a tile array.
    #[must_use]
    pub fn evaluate(&self, tiles: &[u8; SIZE]) -> u8 {
        let (_, costs) = self.keys(tiles);
        costs[..self.group_count()].iter().sum()
    }
}

/// Replace one tile's cell nibble inside a packed group key.
#[must_use]
pub fn rekey(key: u32, slot: u32, cell: u32) -> u32 {
    key & !(0xF << (4 * slot)) | cell << (4 * slot)
}

fn tile_maps(partition: &Partition) -> ([u8; SIZE], [u8; SIZE]) {
    let mut group_of = [u8::MAX; SIZE];
    let mut slot_of = [u8::MAX; SIZE];
    for (group, tiles) in partition.groups.iter().enumerate() {
        for (slot, &tile) in tiles.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            {
                group_of[tile as usize] = group as u8;
                slot_of[tile as usize] = slot as u8;
            }
        }
    }
    (group_of, slot_of)
}

// BFS over placements of one group's tiles. A state is the packed key;
// a transition slides one group tile to an adjacent cell that no other
// group tile occupies. Cells held by the blank or by other groups' tiles
// are free, which is what makes the bound a relaxation.
#[allow(clippy::cast_possible_truncation)]
fn generate_group(group: &[u8]) -> Box<[u8]> {
    let tile_count = group.len();
    let mut table = vec![UNREACHED; 1 << (4 * tile_count)].into_boxed_slice();

    let goal_key = group
        .iter()
        .enumerate()
        .fold(0u32, |key, (slot, &tile)| {
            key | u32::from(tile - 1) << (4 * slot)
        });
    table[goal_key as usize] = 0;

    let mut frontier = vec![goal_key];
    let mut cost = 0u8;
    while !frontier.is_empty() {
        cost += 1;
        let mut next_frontier = Vec::with_capacity(frontier.len() * 2);
        for key in frontier {
            let mut occupied = 0u16;
            for slot in 0..tile_count {
                occupied |= 1 << (key >> (4 * slot) & 0xF);
            }
            for slot in 0..tile_count {
                let cell = (key >> (4 * slot as u32) & 0xF) as u8;
                for dir in Direction::ALL {
                    let Some(offset) = dir.offset_from(cell) else {
                        continue;
                    };
                    let target = cell.wrapping_add_signed(offset);
                    if occupied & (1 << target) != 0 {
                        continue;
                    }
                    let next = rekey(key, slot as u32, u32::from(target));
                    if table[next as usize] == UNREACHED {
                        table[next as usize] = cost;
                        next_frontier.push(next);
                    }
                }
            }
        }
        frontier = next_frontier;
    }
    table
}

#[cfg(test)]
mod tests {
    use fifteen_core::{Board, GOAL_TILES};

    use super::*;

    fn tiny_partition() -> Partition {
        Partition::new(vec![
            vec![1, 2, 3],
            vec![4, 5, 6],
            vec![7, 8, 9],
            vec![10, 11, 12],
            vec![13, 14, 15],
        ])
        .unwrap()
    }

    #[test]
    fn rejects_bad_partitions() {
        assert!(Partition::new(vec![]).is_err());
        // tile 15 missing
        assert!(
            Partition::new(vec![
                vec![1, 2, 3],
                vec![4, 5, 6],
                vec![7, 8, 9],
                vec![10, 11, 12],
                vec![13, 14],
            ])
            .is_err()
        );
        // tile 3 repeated
        assert!(
            Partition::new(vec![
                vec![1, 2, 3],
                vec![3, 4, 5, 6],
                vec![7, 8, 9, 10],
                vec![11, 12, 13, 14, 15],
            ])
            .is_err()
        );
        // oversized group
        assert!(Partition::new(vec![(1u8..8).collect(), (8u8..16).collect()]).is_err());
    }

    #[test]
    fn goal_costs_nothing() {
        let db = PatternDb::generate(tiny_partition());
        assert_eq!(db.evaluate(&GOAL_TILES), 0);
    }

    #[test]
    fn single_move_costs_one() {
        let db = PatternDb::generate(tiny_partition());
        let board = Board::goal().shift(fifteen_core::Direction::Left).unwrap();
        assert_eq!(db.evaluate(board.tiles()), 1);
    }

    #[test]
    fn admissible_on_short_walks() {
        let db = PatternDb::generate(tiny_partition());
        let mut board = Board::goal();
        for walked in 1..=15u8 {
            let moves: Vec<_> = board.neighbors().collect();
            board = moves[fastrand::usize(..moves.len())].1.clone();
            assert!(db.evaluate(board.tiles()) <= walked);
        }
    }

    #[test]
    fn incremental_rekey_matches_full_evaluation() {
        let db = PatternDb::generate(tiny_partition());
        let mut board = Board::goal();
        let (mut keys, _) = db.keys(board.tiles());
        for _ in 0..25 {
            let moves: Vec<_> = board.neighbors().collect();
            let (_, next) = moves[fastrand::usize(..moves.len())].clone();
            // tile that slid into the old blank cell
            let value = next.tiles()[board.zero() as usize];
            let group = db.group_of(value);
            keys[group] = rekey(keys[group], db.slot_of(value), u32::from(board.zero()));
            board = next;

            let (full_keys, _) = db.keys(board.tiles());
            assert_eq!(keys[..db.group_count()], full_keys[..db.group_count()]);
        }
    }

    #[test]
    fn cache_file_round_trips() {
        let db = PatternDb::generate(tiny_partition());
        let path = std::env::temp_dir().join(format!("fifteen-pdb-{}.bin", std::process::id()));
        db.save(&path).unwrap();

        let loaded = PatternDb::load(&path, &tiny_partition()).unwrap();
        assert_eq!(loaded.tables, db.tables);

        // a different partition must be refused
        let other = Partition::new(vec![
            vec![1, 2, 3, 4, 5],
            vec![6, 7, 8, 9, 10],
            vec![11, 12, 13, 14, 15],
        ])
        .unwrap();
        assert!(matches!(
            PatternDb::load(&path, &other),
            Err(PatternDbError::PartitionMismatch)
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn truncated_cache_is_corrupt() {
        let db = PatternDb::generate(tiny_partition());
        let path = std::env::temp_dir().join(format!("fifteen-pdb-cut-{}.bin", std::process::id()));
        db.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        assert!(PatternDb::load(&path, &tiny_partition()).is_err());
        std::fs::remove_file(&path).ok();
    }
}
