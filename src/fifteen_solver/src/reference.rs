//! Persistent collection of hard boards and their known distances.
//!
//! Boards that took long enough to solve are archived in canonical form
//! together with their optimal move counts and the first eight solution
//! moves. A later solve of the same board, its mirror image, or a
//! blank-walk sibling skips deepening entirely; boards merely *near* an
//! archived entry start from a boosted estimate instead of the plain
//! heuristic bound.

mod board;
mod moves;
mod store;

use std::path::PathBuf;
use std::time::Duration;

use fxhash::FxHashMap;
use log::warn;

use fifteen_core::{Board, Direction, SIZE};

use crate::engine::{SearchEngine, SearchOutcome};
use crate::heuristic::ManhattanHeuristic;

pub use board::ReferenceBoard;
pub use moves::{ReferenceMoves, PARTIAL_MOVES};
pub use store::StoreError;

use board::{group_of, lookup_of, LOOKUPS, MIRROR_GROUP};

/// Solves slower than this (less a safety margin) get archived.
pub const DEFAULT_CUTOFF_SECONDS: u32 = 10;
const CUTOFF_FRACTION: f64 = 0.95;

/// Plain estimates below this skip the boost scan entirely; cheap
/// boards never gain enough to pay for it.
pub(crate) const BOOST_FLOOR: u8 = 32;
/// An entry only helps when the board sits within this Manhattan
/// distance of it.
const BOOST_ALLOWANCE: u8 = 20;

/// A cache hit for a board: its proven or bounded move count and, when
/// archived, the first eight solution moves.
#[derive(Clone, Debug)]
pub struct CachedSolve {
    pub steps: u8,
    pub prefix: Option<[Direction; PARTIAL_MOVES]>,
}

/// The accumulator: canonical boards mapped to their solve records,
/// optionally mirrored to a file.
pub struct ReferenceCollection {
    map: FxHashMap<ReferenceBoard, ReferenceMoves>,
    cutoff_seconds: u32,
    path: Option<PathBuf>,
}

impl Default for ReferenceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCollection {
    /// An in-memory collection holding only the seed boards.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: seeded_map(),
            cutoff_seconds: DEFAULT_CUTOFF_SECONDS,
            path: None,
        }
    }

    /// Opens a file-backed collection. A missing or corrupt file falls
    /// back to the seed boards and writes a fresh copy.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let mut collection = match store::load(&path) {
            Ok(stored) => {
                let mut map = seeded_map();
                for (entry, record) in stored.entries {
                    match map.entry(entry) {
                        std::collections::hash_map::Entry::Occupied(mut occupied) => {
                            occupied.get_mut().merge(&record);
                        }
                        std::collections::hash_map::Entry::Vacant(vacant) => {
                            vacant.insert(record);
                        }
                    }
                }
                Self {
                    map,
                    cutoff_seconds: stored.cutoff_seconds.clamp(1, 10),
                    path: Some(path),
                }
            }
            Err(err) => {
                if !matches!(&err, StoreError::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
                {
                    warn!("reference store unreadable, reseeding: {err}");
                }
                let mut fresh = Self::new();
                fresh.path = Some(path);
                fresh
            }
        };
        collection.persist();
        collection
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[must_use]
    pub const fn cutoff_seconds(&self) -> u32 {
        self.cutoff_seconds
    }

    /// The elapsed-time threshold for archiving, the cutoff setting
    /// less a five percent margin.
    #[must_use]
    pub fn cutoff_limit(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.cutoff_seconds) * CUTOFF_FRACTION)
    }

    /// Changes the cutoff setting, clamped to 1 through 10 seconds.
    pub fn set_cutoff(&mut self, seconds: u32) {
        self.cutoff_seconds = seconds.clamp(1, 10);
        self.persist();
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ReferenceBoard, &ReferenceMoves)> {
        self.map.iter()
    }

    /// Number of entries with all four lookup classes verified.
    #[must_use]
    pub fn verified_len(&self) -> usize {
        self.map.values().filter(|moves| moves.is_complete()).count()
    }

    /// Probes the collection for a board, its blank-walk siblings, and
    /// (for the two groups the mirror fold leaves distinct) its mirror
    /// image.
    #[must_use]
    pub fn lookup(&self, board: &Board) -> Option<CachedSolve> {
        let lookup = usize::from(lookup_of(board));
        let group = group_of(board);

        if let Some(record) = self.map.get(&ReferenceBoard::new(board)) {
            let mirrored = group == MIRROR_GROUP;
            return Some(CachedSolve {
                steps: record.estimate(lookup),
                prefix: record.prefix(lookup, mirrored),
            });
        }

        if group == 0 || group == 2 {
            let mirror = Board::new(*board.mirror_tiles()).ok()?;
            if let Some(record) = self.map.get(&ReferenceBoard::new(&mirror)) {
                // the mirror swaps the two middle blank cells of a walk
                let swapped = match lookup {
                    1 => 3,
                    3 => 1,
                    other => other,
                };
                return Some(CachedSolve {
                    steps: record.estimate(swapped),
                    prefix: record.prefix(swapped, true),
                });
            }
        }
        None
    }

    #[must_use]
    pub fn contains(&self, board: &Board) -> bool {
        self.lookup(board).is_some()
    }

    /// Best estimate reachable through the collection: each entry is
    /// tried as an alternative goal, and a short bounded Manhattan
    /// search bridges the board to it. Returns `bound` unchanged when
    /// nothing helps. The result is not parity-corrected.
    #[must_use]
    pub fn boost(&self, board: &Board, bound: u8, bridge: &SearchEngine<ManhattanHeuristic>) -> u8 {
        let mut best = bound;
        for (entry, record) in &self.map {
            let Ok(relative) = Board::new(entry.apply_transform(board.tiles())) else {
                continue;
            };
            let distance = relative.manhattan();
            if distance > BOOST_ALLOWANCE {
                continue;
            }
            let target = record.primary_estimate();
            if target.saturating_sub(distance) <= best {
                continue;
            }
            if let SearchOutcome::Solved(bridge_moves) =
                bridge.solve_within(&relative, target - best).outcome
            {
                #[allow(clippy::cast_possible_truncation)]
                let bridged = bridge_moves.len() as u8;
                best = target - bridged;
            }
        }
        best
    }

    /// Archives a solved board, merging into an existing entry for the
    /// board or its mirror image when one exists.
    pub fn record(&mut self, board: &Board, steps: u8, solution: &[Direction]) -> bool {
        if solution.len() < PARTIAL_MOVES || !board.is_solution(solution) {
            return false;
        }
        let lookup = usize::from(lookup_of(board));
        let group = group_of(board);
        let canonical = ReferenceBoard::new(board);

        let updated = self.map.get_mut(&canonical).map(|record| {
            record.set_solution(lookup, steps, solution, group == MIRROR_GROUP);
            record.clone()
        });
        if let Some(record) = updated {
            self.persist_entry(&canonical, &record);
            return true;
        }

        if group == 0 || group == 2 {
            if let Ok(mirror) = Board::new(*board.mirror_tiles()) {
                let mirror_canonical = ReferenceBoard::new(&mirror);
                let swapped = match lookup {
                    1 => 3,
                    3 => 1,
                    other => other,
                };
                let updated = self.map.get_mut(&mirror_canonical).map(|record| {
                    record.set_solution(swapped, steps, solution, true);
                    record.clone()
                });
                if let Some(record) = updated {
                    self.persist_entry(&mirror_canonical, &record);
                    return true;
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let mut record = ReferenceMoves::seeded(lookup as u8, steps);
        record.set_solution(lookup, steps, solution, group == MIRROR_GROUP);
        self.persist_entry(&canonical, &record);
        self.map.insert(canonical, record);
        true
    }

    /// Removes a learned board; seed boards stay.
    pub fn remove(&mut self, board: &Board) -> bool {
        let canonical = ReferenceBoard::new(board);
        if seeded_map().contains_key(&canonical) {
            return false;
        }
        let removed = self.map.remove(&canonical).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    /// Drops every learned entry, keeping the seeds and the cutoff.
    pub fn reset(&mut self) {
        self.map = seeded_map();
        self.persist();
    }

    /// Solves the remaining unverified lookup classes of every entry
    /// with the supplied solver. The callback receives the position and
    /// the current bound, and returns the optimal move count with its
    /// solution, or `None` to stop early.
    pub fn verify_pending<F>(&mut self, mut solve: F) -> usize
    where
        F: FnMut(&Board, u8) -> Option<(u8, Vec<Direction>)>,
    {
        let mut verified = 0;
        'entries: for (entry, record) in &mut self.map {
            if record.is_complete() {
                continue;
            }
            let mut tiles = entry.canonical_tiles();
            for lookup in 0..LOOKUPS {
                if !record.is_verified(lookup) {
                    let Ok(position) = Board::new(tiles) else {
                        break;
                    };
                    let Some((steps, solution)) = solve(&position, record.estimate(lookup)) else {
                        break 'entries;
                    };
                    record.set_solution(lookup, steps, &solution, false);
                    verified += 1;
                }
                tiles = ReferenceMoves::shift_blank(&tiles, entry.group(), lookup);
            }
        }
        if verified > 0 {
            self.persist();
        }
        verified
    }

    fn persist(&mut self) {
        if let Some(path) = &self.path {
            if let Err(err) = store::rewrite_all(path, self.cutoff_seconds, self.map.iter()) {
                warn!("unable to write reference store {}: {err}", path.display());
                self.path = None;
            }
        }
    }

    fn persist_entry(&mut self, entry: &ReferenceBoard, record: &ReferenceMoves) {
        if let Some(path) = &self.path {
            if store::append(path, entry, record).is_err() {
                self.persist();
            }
        }
    }
}

fn seeded_map() -> FxHashMap<ReferenceBoard, ReferenceMoves> {
    let mut map = FxHashMap::default();
    for &(tiles, steps) in &PRESET_BOARDS {
        seed(&mut map, tiles, steps);
        // the two mid-board blank seeds cover a close sibling as well
        if let Some(zero) = tiles.iter().position(|&value| value == 0) {
            if zero == 5 || zero == 10 {
                let mut shifted = tiles;
                shifted[zero] = shifted[6];
                shifted[6] = 0;
                seed(&mut map, shifted, steps - 1);
            }
        }
    }
    map
}

fn seed(map: &mut FxHashMap<ReferenceBoard, ReferenceMoves>, tiles: [u8; SIZE], steps: u8) {
    let Ok(board) = Board::new(tiles) else {
        return;
    };
    let record = ReferenceMoves::seeded(lookup_of(&board), steps);
    map.insert(ReferenceBoard::new(&board), record);
}

/// Curated hard boards seeded into every collection, with their known
/// optimal move counts.
const PRESET_BOARDS: [([u8; SIZE], u8); 34] = [
    ([0, 15, 8, 3, 12, 11, 7, 4, 14, 10, 6, 5, 9, 13, 2, 1], 70),
    ([6, 5, 9, 13, 2, 1, 10, 14, 3, 7, 0, 15, 4, 8, 12, 11], 72),
    ([0, 12, 8, 4, 15, 11, 7, 3, 14, 10, 6, 2, 13, 9, 5, 1], 72),
    ([6, 5, 14, 13, 2, 1, 10, 9, 8, 7, 0, 15, 4, 3, 12, 11], 70),
    ([0, 5, 9, 13, 2, 1, 10, 14, 3, 7, 11, 15, 4, 8, 12, 6], 72),
    ([0, 12, 7, 4, 15, 11, 8, 3, 10, 14, 6, 2, 13, 9, 5, 1], 70),
    ([0, 15, 8, 7, 12, 11, 4, 3, 14, 13, 6, 5, 10, 9, 2, 1], 72),
    ([11, 12, 8, 3, 15, 0, 7, 4, 14, 10, 6, 5, 9, 13, 2, 1], 66),
    ([1, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15, 4, 8, 12, 0], 72),
    ([0, 15, 8, 4, 12, 11, 7, 5, 14, 10, 6, 3, 13, 2, 9, 1], 70),
    ([1, 10, 14, 13, 7, 6, 5, 9, 8, 2, 11, 15, 4, 3, 12, 0], 72),
    ([0, 12, 8, 7, 15, 11, 4, 3, 14, 13, 6, 2, 10, 9, 5, 1], 72),
    ([6, 5, 14, 13, 2, 1, 10, 9, 8, 7, 11, 12, 4, 3, 15, 0], 70),
    ([0, 5, 9, 13, 2, 6, 10, 14, 3, 7, 1, 15, 4, 8, 12, 11], 72),
    ([6, 5, 13, 9, 2, 1, 10, 14, 4, 7, 11, 12, 3, 8, 15, 0], 68),
    ([6, 5, 9, 13, 2, 1, 10, 14, 3, 7, 11, 12, 4, 8, 15, 0], 70),
    ([11, 15, 8, 3, 12, 0, 7, 4, 14, 10, 6, 2, 9, 13, 5, 1], 66),
    ([1, 10, 9, 13, 7, 0, 5, 14, 3, 2, 6, 15, 4, 8, 12, 11], 70),
    ([0, 15, 9, 13, 11, 12, 10, 14, 3, 7, 6, 2, 4, 8, 5, 1], 80),
    ([0, 12, 9, 13, 15, 11, 10, 14, 8, 3, 6, 2, 4, 7, 5, 1], 80),
    ([0, 12, 9, 13, 15, 11, 10, 14, 7, 8, 6, 2, 4, 3, 5, 1], 80),
    ([0, 12, 9, 13, 15, 8, 10, 14, 11, 7, 6, 2, 4, 3, 5, 1], 80),
    ([0, 12, 9, 13, 15, 11, 10, 14, 3, 7, 5, 6, 4, 8, 2, 1], 80),
    ([0, 12, 9, 13, 15, 11, 10, 14, 7, 8, 5, 6, 4, 3, 2, 1], 80),
    ([0, 12, 9, 13, 15, 11, 10, 14, 3, 7, 6, 2, 4, 8, 5, 1], 80),
    ([0, 12, 9, 13, 15, 11, 14, 10, 3, 8, 6, 2, 4, 7, 5, 1], 80),
    ([0, 12, 10, 13, 15, 11, 9, 14, 7, 3, 6, 2, 4, 8, 5, 1], 80),
    ([0, 12, 14, 13, 15, 11, 9, 10, 8, 3, 6, 2, 4, 7, 5, 1], 80),
    ([0, 12, 10, 13, 15, 11, 14, 9, 7, 8, 6, 2, 4, 3, 5, 1], 80),
    ([0, 15, 8, 13, 12, 11, 9, 10, 14, 3, 6, 2, 4, 7, 5, 1], 78),
    ([11, 15, 9, 13, 12, 0, 10, 14, 3, 7, 6, 2, 4, 8, 5, 1], 78),
    ([0, 12, 5, 13, 15, 6, 10, 9, 2, 7, 11, 14, 4, 3, 8, 1], 78),
    ([0, 12, 8, 13, 15, 11, 7, 9, 14, 10, 6, 2, 4, 3, 5, 1], 78),
    ([0, 14, 15, 13, 8, 11, 10, 5, 12, 7, 6, 9, 4, 2, 3, 1], 78),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_include_mid_board_expansions() {
        let collection = ReferenceCollection::new();
        // 34 curated boards, 4 with the blank at cell 5 and 2 at cell
        // 10, each contributing one extra sibling
        assert_eq!(collection.len(), 40);
    }

    #[test]
    fn seed_boards_hit_on_lookup() {
        let collection = ReferenceCollection::new();
        let board = Board::new(PRESET_BOARDS[0].0).unwrap();
        let hit = collection.lookup(&board).unwrap();
        assert_eq!(hit.steps, PRESET_BOARDS[0].1);
        // seeds carry bounds, not verified solutions
        assert!(hit.prefix.is_none());
    }

    #[test]
    fn mirror_image_of_a_seed_hits() {
        let board = Board::new(PRESET_BOARDS[0].0).unwrap();
        let mirror = Board::new(*board.mirror_tiles()).unwrap();
        let collection = ReferenceCollection::new();
        let hit = collection.lookup(&mirror).unwrap();
        assert_eq!(hit.steps, PRESET_BOARDS[0].1);
    }

    #[test]
    fn recording_a_solution_enables_prefix_replay() {
        fastrand::seed(21);
        let mut walk = Board::goal();
        for _ in 0..30 {
            let neighbors: Vec<_> = walk.neighbors().collect();
            let (_, next) = neighbors[fastrand::usize(..neighbors.len())].clone();
            walk = next;
        }
        let engine = SearchEngine::new(ManhattanHeuristic::with_linear_conflict());
        let SearchOutcome::Solved(solution) = engine.solve(&walk).outcome else {
            panic!("walk must solve");
        };
        if solution.len() < PARTIAL_MOVES {
            return;
        }

        let mut collection = ReferenceCollection::new();
        #[allow(clippy::cast_possible_truncation)]
        let steps = solution.len() as u8;
        assert!(collection.record(&walk, steps, &solution));

        let hit = collection.lookup(&walk).unwrap();
        assert_eq!(hit.steps, steps);
        let prefix = hit.prefix.unwrap();
        assert_eq!(prefix, solution[..PARTIAL_MOVES]);
        assert!(walk.replay(&prefix).is_some());
    }

    #[test]
    fn removing_a_seed_is_refused() {
        let mut collection = ReferenceCollection::new();
        let board = Board::new(PRESET_BOARDS[3].0).unwrap();
        assert!(!collection.remove(&board));
        assert!(collection.contains(&board));
    }

    #[test]
    fn file_backed_collection_round_trips() {
        let path = std::env::temp_dir().join(format!("ref-coll-{}.db", std::process::id()));
        std::fs::remove_file(&path).ok();

        fastrand::seed(33);
        let mut walk = Board::goal();
        for _ in 0..26 {
            let neighbors: Vec<_> = walk.neighbors().collect();
            let (_, next) = neighbors[fastrand::usize(..neighbors.len())].clone();
            walk = next;
        }
        let engine = SearchEngine::new(ManhattanHeuristic::with_linear_conflict());
        let SearchOutcome::Solved(solution) = engine.solve(&walk).outcome else {
            panic!("walk must solve");
        };
        if solution.len() >= PARTIAL_MOVES {
            let mut collection = ReferenceCollection::open(path.clone());
            #[allow(clippy::cast_possible_truncation)]
            let steps = solution.len() as u8;
            collection.record(&walk, steps, &solution);
            let before = collection.len();

            let reloaded = ReferenceCollection::open(path.clone());
            assert_eq!(reloaded.len(), before);
            assert_eq!(reloaded.lookup(&walk).unwrap().steps, steps);
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn corrupt_file_reseeds() {
        let path = std::env::temp_dir().join(format!("ref-corrupt-{}.db", std::process::id()));
        std::fs::write(&path, b"not a reference store").unwrap();
        let collection = ReferenceCollection::open(path.clone());
        assert_eq!(collection.len(), 40);
        // the fresh copy must now load cleanly
        let reloaded = ReferenceCollection::open(path.clone());
        assert_eq!(reloaded.len(), 40);
        std::fs::remove_file(&path).ok();
    }
}
