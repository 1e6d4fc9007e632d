//! The solver facade: strategy selection, table construction, and the
//! reference-collection fast paths wrapped around the search engine.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use fifteen_core::{Board, Direction, InvalidBoardError, MAX_MOVES};

use crate::engine::{SearchEngine, SearchOutcome, SearchReport};
use crate::heuristic::{
    Heuristic, ManhattanHeuristic, MaxOf, PatternHeuristic, PdbWd, WalkingHeuristic, WdMd,
};
use crate::reference::{ReferenceCollection, BOOST_FLOOR};
use crate::tables::{Partition, PatternDb, PatternDbError, WalkingDistance};
use crate::{start, success};

#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    InvalidBoard(#[from] InvalidBoardError),
    #[error(transparent)]
    PatternDb(#[from] PatternDbError),
    #[error("no solution within the {MAX_MOVES}-move cap")]
    DepthExhausted,
}

/// Pattern-database tile groupings offered out of the box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternPreset {
    /// Groups of six, six, and three tiles. Strongest, slowest to build.
    SixSixThree,
    /// Three groups of five tiles.
    FiveFiveFive,
}

impl PatternPreset {
    fn partition(self) -> Partition {
        match self {
            PatternPreset::SixSixThree => Partition::preset_663(),
            PatternPreset::FiveFiveFive => Partition::preset_555(),
        }
    }

    const fn cache_name(self) -> &'static str {
        match self {
            PatternPreset::SixSixThree => "pattern-663.db",
            PatternPreset::FiveFiveFive => "pattern-555.db",
        }
    }
}

/// Which admissible bound drives the search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Manhattan,
    ManhattanConflict,
    Walking,
    WalkingManhattan,
    Pattern(PatternPreset),
    PatternWalking(PatternPreset),
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Manhattan => "manhattan distance",
            Strategy::ManhattanConflict => "manhattan distance with linear conflict",
            Strategy::Walking => "walking distance",
            Strategy::WalkingManhattan => "walking distance with manhattan fallback",
            Strategy::Pattern(PatternPreset::SixSixThree) => "pattern database 6-6-3",
            Strategy::Pattern(PatternPreset::FiveFiveFive) => "pattern database 5-5-5",
            Strategy::PatternWalking(PatternPreset::SixSixThree) => {
                "pattern database 6-6-3 with walking distance"
            }
            Strategy::PatternWalking(PatternPreset::FiveFiveFive) => {
                "pattern database 5-5-5 with walking distance"
            }
        };
        f.write_str(name)
    }
}

/// How a solve ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// An optimal move sequence.
    Solved(Vec<Direction>),
    Unsolvable,
    TimedOut,
}

/// Outcome and accounting of one solve.
#[derive(Clone, Debug)]
pub struct Summary {
    pub verdict: Verdict,
    /// Search nodes expanded.
    pub nodes: u64,
    pub elapsed: Duration,
    /// The lower bound deepening started from.
    pub estimate: u8,
}

impl Summary {
    /// Move count when solved.
    #[must_use]
    pub fn steps(&self) -> Option<usize> {
        match &self.verdict {
            Verdict::Solved(moves) => Some(moves.len()),
            _ => None,
        }
    }
}

/// Configures and builds a [`Solver`].
#[derive(Clone, Debug)]
pub struct SolverBuilder {
    strategy: Strategy,
    timeout: Option<Duration>,
    rotation_limit: bool,
    symmetry: bool,
    data_dir: Option<PathBuf>,
    use_reference: bool,
}

impl SolverBuilder {
    #[must_use]
    pub const fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            timeout: None,
            rotation_limit: true,
            symmetry: true,
            data_dir: None,
            use_reference: true,
        }
    }

    /// Abandon searches that run longer than this.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Toggles the rotation limiter inside the search.
    #[must_use]
    pub const fn rotation_limit(mut self, on: bool) -> Self {
        self.rotation_limit = on;
        self
    }

    /// Toggles mirror-symmetry pruning inside the search.
    #[must_use]
    pub const fn symmetry(mut self, on: bool) -> Self {
        self.symmetry = on;
        self
    }

    /// Directory for the pattern-database cache and the reference
    /// store. Without one, tables build in memory and learned boards
    /// are not persisted.
    #[must_use]
    pub fn data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }

    /// Toggles the reference accumulator.
    #[must_use]
    pub const fn reference(mut self, on: bool) -> Self {
        self.use_reference = on;
        self
    }

    /// Builds the solver, constructing or loading whatever tables the
    /// strategy needs.
    ///
    /// # Errors
    ///
    /// Propagates pattern-database I/O and decoding errors.
    pub fn build(self) -> Result<Solver, SolverError> {
        let engine = self.build_engine()?;
        let bridge = SearchEngine::new(ManhattanHeuristic::new());
        let reference = if self.use_reference {
            let collection = match &self.data_dir {
                Some(dir) => ReferenceCollection::open(dir.join("reference.db")),
                None => ReferenceCollection::new(),
            };
            info!(
                "reference collection ready with {} boards",
                collection.len()
            );
            Some(RwLock::new(collection))
        } else {
            None
        };
        Ok(Solver {
            strategy: self.strategy,
            engine,
            bridge,
            reference,
        })
    }

    fn build_engine(&self) -> Result<EngineKind, SolverError> {
        let kind = match self.strategy {
            Strategy::Manhattan => {
                EngineKind::Manhattan(self.configure(ManhattanHeuristic::new()))
            }
            Strategy::ManhattanConflict => {
                EngineKind::Manhattan(self.configure(ManhattanHeuristic::with_linear_conflict()))
            }
            Strategy::Walking => {
                EngineKind::Walking(self.configure(WalkingHeuristic::new(self.walking_table())))
            }
            Strategy::WalkingManhattan => EngineKind::WalkingManhattan(self.configure(MaxOf::new(
                WalkingHeuristic::new(self.walking_table()),
                ManhattanHeuristic::with_linear_conflict(),
            ))),
            Strategy::Pattern(preset) => EngineKind::Pattern(
                self.configure(PatternHeuristic::new(self.pattern_db(preset)?)),
            ),
            Strategy::PatternWalking(preset) => EngineKind::PatternWalking(self.configure(
                MaxOf::new(
                    PatternHeuristic::new(self.pattern_db(preset)?),
                    WalkingHeuristic::new(self.walking_table()),
                ),
            )),
        };
        Ok(kind)
    }

    fn configure<H: Heuristic>(&self, heuristic: H) -> SearchEngine<H> {
        SearchEngine::new(heuristic)
            .with_timeout(self.timeout)
            .with_rotation_limit(self.rotation_limit)
            .with_symmetry(self.symmetry)
    }

    fn walking_table(&self) -> Arc<WalkingDistance> {
        debug!(start!("building walking distance table..."));
        let table = Arc::new(WalkingDistance::new());
        debug!(success!("walking distance table ready"));
        table
    }

    fn pattern_db(&self, preset: PatternPreset) -> Result<Arc<PatternDb>, SolverError> {
        let partition = preset.partition();
        if let Some(dir) = &self.data_dir {
            let path = dir.join(preset.cache_name());
            match PatternDb::load(&path, &partition) {
                Ok(db) => {
                    debug!(success!("loaded pattern database from {}"), path.display());
                    return Ok(Arc::new(db));
                }
                Err(PatternDbError::Io(err))
                    if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!("pattern database cache unusable, rebuilding: {err}");
                }
            }
            info!(start!("generating pattern database, this takes a while..."));
            let db = PatternDb::generate(partition);
            if let Err(err) = db.save(&path) {
                warn!("unable to cache pattern database: {err}");
            }
            info!(success!("pattern database ready"));
            return Ok(Arc::new(db));
        }
        info!(start!("generating pattern database, this takes a while..."));
        let db = PatternDb::generate(partition);
        info!(success!("pattern database ready"));
        Ok(Arc::new(db))
    }
}

enum EngineKind {
    Manhattan(SearchEngine<ManhattanHeuristic>),
    Walking(SearchEngine<WalkingHeuristic>),
    WalkingManhattan(SearchEngine<WdMd>),
    Pattern(SearchEngine<PatternHeuristic>),
    PatternWalking(SearchEngine<PdbWd>),
}

macro_rules! with_engine {
    ($kind:expr, $engine:ident => $body:expr) => {
        match $kind {
            EngineKind::Manhattan($engine) => $body,
            EngineKind::Walking($engine) => $body,
            EngineKind::WalkingManhattan($engine) => $body,
            EngineKind::Pattern($engine) => $body,
            EngineKind::PatternWalking($engine) => $body,
        }
    };
}

/// An optimal solver with a fixed strategy and an optional learned
/// collection of hard boards.
pub struct Solver {
    strategy: Strategy,
    engine: EngineKind,
    bridge: SearchEngine<ManhattanHeuristic>,
    reference: Option<RwLock<ReferenceCollection>>,
}

impl Solver {
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The strategy's lower bound, or `None` for unsolvable boards.
    #[must_use]
    pub fn heuristic_value(&self, board: &Board) -> Option<u8> {
        if !board.is_solvable() {
            return None;
        }
        Some(self.evaluate(board))
    }

    /// The bound after consulting the reference collection, or `None`
    /// for unsolvable boards. Equals [`Solver::heuristic_value`] when
    /// nothing in the collection applies.
    #[must_use]
    pub fn boosted_value(&self, board: &Board) -> Option<u8> {
        if !board.is_solvable() {
            return None;
        }
        let basis = self.evaluate(board);
        let Some(lock) = &self.reference else {
            return Some(basis);
        };
        let Ok(collection) = lock.read() else {
            return Some(basis);
        };
        if let Some(hit) = collection.lookup(board) {
            return Some(hit.steps.max(basis));
        }
        if basis < BOOST_FLOOR {
            return Some(basis);
        }
        Some(parity_corrected(
            collection.boost(board, basis, &self.bridge),
            basis,
        ))
    }

    /// Finds an optimal solution.
    ///
    /// # Errors
    ///
    /// [`SolverError::DepthExhausted`] when deepening hits the 80-move
    /// cap without a solution, which a sound heuristic never triggers.
    pub fn solve(&self, board: &Board) -> Result<Summary, SolverError> {
        let start = Instant::now();
        if !board.is_solvable() {
            return Ok(Summary {
                verdict: Verdict::Unsolvable,
                nodes: 0,
                elapsed: start.elapsed(),
                estimate: 0,
            });
        }
        if board.is_goal() {
            return Ok(Summary {
                verdict: Verdict::Solved(Vec::new()),
                nodes: 0,
                elapsed: start.elapsed(),
                estimate: 0,
            });
        }

        let basis = self.evaluate(board);
        let mut from_cache = false;
        let mut boosted = false;
        let mut estimate = basis;
        let mut report: Option<SearchReport> = None;

        if let Some(lock) = &self.reference {
            if let Ok(collection) = lock.read() {
                if let Some(hit) = collection.lookup(board) {
                    from_cache = true;
                    debug!(
                        "reference hit: {} moves known, prefix {}",
                        hit.steps,
                        if hit.prefix.is_some() { "cached" } else { "absent" },
                    );
                    if let Some(prefix) = hit.prefix {
                        report = self
                            .replay(board, &prefix, hit.steps)
                            .filter(|replayed| {
                                !matches!(replayed.outcome, SearchOutcome::Exhausted)
                            });
                    }
                    if report.is_none() && hit.steps > basis && (hit.steps - basis) % 2 == 0 {
                        estimate = hit.steps;
                    }
                } else if basis >= BOOST_FLOOR {
                    let raised = parity_corrected(
                        collection.boost(board, basis, &self.bridge),
                        basis,
                    );
                    if raised > basis {
                        debug!("boosted estimate {basis} -> {raised}");
                        boosted = true;
                        estimate = raised;
                    }
                }
            }
        }

        let report = match report {
            Some(report) => report,
            None if estimate > basis => {
                with_engine!(&self.engine, engine => engine.solve_from(board, estimate))
            }
            None => with_engine!(&self.engine, engine => engine.solve(board)),
        };

        if let SearchOutcome::Solved(moves) = &report.outcome {
            debug_assert!(board.is_solution(moves));
            self.maybe_record(board, moves, report.elapsed, from_cache || boosted);
        }

        let verdict = match report.outcome {
            SearchOutcome::Solved(moves) => Verdict::Solved(moves),
            SearchOutcome::TimedOut => Verdict::TimedOut,
            SearchOutcome::Exhausted => return Err(SolverError::DepthExhausted),
        };
        Ok(Summary {
            verdict,
            nodes: report.nodes,
            elapsed: start.elapsed(),
            estimate,
        })
    }

    /// Verifies every pending lookup class in the reference collection
    /// with this solver. Returns how many got verified.
    pub fn verify_reference_pending(&self) -> usize {
        let Some(lock) = &self.reference else {
            return 0;
        };
        let Ok(mut collection) = lock.write() else {
            return 0;
        };
        collection.verify_pending(|position, hint| {
            let basis = self.evaluate(position);
            let initial = if hint > basis && (hint - basis) % 2 == 0 {
                hint
            } else {
                basis
            };
            let report =
                with_engine!(&self.engine, engine => engine.solve_from(position, initial));
            match report.outcome {
                SearchOutcome::Solved(moves) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let steps = moves.len() as u8;
                    Some((steps, moves))
                }
                _ => None,
            }
        })
    }

    /// Boards stored, boards fully verified, and the cutoff setting.
    #[must_use]
    pub fn reference_stats(&self) -> Option<(usize, usize, u32)> {
        let lock = self.reference.as_ref()?;
        let collection = lock.read().ok()?;
        Some((
            collection.len(),
            collection.verified_len(),
            collection.cutoff_seconds(),
        ))
    }

    /// Drops learned reference boards, keeping the seeds.
    pub fn reset_reference(&self) {
        if let Some(lock) = &self.reference {
            if let Ok(mut collection) = lock.write() {
                collection.reset();
            }
        }
    }

    /// Changes the archive cutoff, clamped to 1 through 10 seconds.
    pub fn set_reference_cutoff(&self, seconds: u32) {
        if let Some(lock) = &self.reference {
            if let Ok(mut collection) = lock.write() {
                collection.set_cutoff(seconds);
            }
        }
    }

    fn evaluate(&self, board: &Board) -> u8 {
        with_engine!(&self.engine, engine => engine.evaluate(board))
    }

    fn replay(&self, board: &Board, prefix: &[Direction], exact: u8) -> Option<SearchReport> {
        with_engine!(&self.engine, engine => engine.solve_with_prefix(board, prefix, exact))
    }

    fn maybe_record(&self, board: &Board, moves: &[Direction], elapsed: Duration, shortcut: bool) {
        if shortcut {
            return;
        }
        let Some(lock) = &self.reference else {
            return;
        };
        let Ok(mut collection) = lock.write() else {
            return;
        };
        if elapsed < collection.cutoff_limit() {
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        let steps = moves.len() as u8;
        if collection.record(board, steps, moves) {
            info!(success!("archived a {}-move board for future solves"), steps);
        }
    }
}

/// Boosted estimates keep the parity of the true distance, which the
/// plain bound already has.
fn parity_corrected(boosted: u8, basis: u8) -> u8 {
    if boosted <= basis {
        basis
    } else if (boosted - basis) % 2 == 0 {
        boosted
    } else {
        boosted + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scramble(seed: u64, steps: usize) -> Board {
        fastrand::seed(seed);
        let mut board = Board::goal();
        for _ in 0..steps {
            let neighbors: Vec<_> = board.neighbors().collect();
            let (_, next) = neighbors[fastrand::usize(..neighbors.len())].clone();
            board = next;
        }
        board
    }

    fn manhattan_solver() -> Solver {
        SolverBuilder::new(Strategy::ManhattanConflict)
            .reference(false)
            .build()
            .unwrap()
    }

    #[test]
    fn goal_board_needs_no_moves() {
        let summary = manhattan_solver().solve(&Board::goal()).unwrap();
        assert_eq!(summary.verdict, Verdict::Solved(Vec::new()));
    }

    #[test]
    fn unsolvable_board_is_reported() {
        // swap two tiles of the goal to flip parity
        let mut tiles = *Board::goal().tiles();
        tiles.swap(0, 1);
        let board = Board::new(tiles).unwrap();
        let summary = manhattan_solver().solve(&board).unwrap();
        assert_eq!(summary.verdict, Verdict::Unsolvable);
    }

    #[test]
    fn solutions_replay_to_goal() {
        let solver = manhattan_solver();
        for seed in 0..8 {
            let board = scramble(seed, 16);
            let summary = solver.solve(&board).unwrap();
            let Verdict::Solved(moves) = summary.verdict else {
                panic!("scramble must solve");
            };
            assert!(board.is_solution(&moves));
            assert!(moves.len() <= 16);
        }
    }

    #[test]
    fn cached_board_resolves_through_prefix() {
        let solver = SolverBuilder::new(Strategy::ManhattanConflict)
            .build()
            .unwrap();
        let board = scramble(77, 28);
        let first = solver.solve(&board).unwrap();
        let Verdict::Solved(first_moves) = first.verdict else {
            panic!("must solve");
        };

        // force the board into the collection regardless of timing
        if let Some(lock) = &solver.reference {
            #[allow(clippy::cast_possible_truncation)]
            let steps = first_moves.len() as u8;
            lock.write().unwrap().record(&board, steps, &first_moves);
        }

        let second = solver.solve(&board).unwrap();
        let Verdict::Solved(second_moves) = second.verdict else {
            panic!("must solve again");
        };
        assert_eq!(second_moves.len(), first_moves.len());
        assert!(board.is_solution(&second_moves));
    }

    #[test]
    fn heuristic_value_is_admissible() {
        let solver = manhattan_solver();
        for seed in 20..26 {
            let board = scramble(seed, 14);
            let bound = solver.heuristic_value(&board).unwrap();
            let summary = solver.solve(&board).unwrap();
            let steps = summary.steps().unwrap();
            assert!(usize::from(bound) <= steps);
        }
    }

    #[test]
    fn parity_correction_rounds_up() {
        assert_eq!(parity_corrected(40, 36), 40);
        assert_eq!(parity_corrected(41, 36), 42);
        assert_eq!(parity_corrected(30, 36), 36);
    }
}
