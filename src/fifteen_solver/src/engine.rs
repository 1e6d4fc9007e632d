//! Iterative-deepening A* over the slide graph.
//!
//! The engine owns no per-search state; every call builds a fresh
//! [`SearchState`] holding the mutable tile arrays, the move stack, and
//! the per-direction summary that orders root branches by how cheap they
//! looked at the previous depth. Inside the recursion a branch first
//! continues straight ahead, never reverses, and takes perpendicular
//! turns only while the rotation limiter's swirl chain allows them,
//! which caps how far the blank can circle in place.

use std::time::{Duration, Instant};

use fifteen_core::{Board, Direction, MAX_MOVES, SIZE};
use log::debug;

use crate::heuristic::Heuristic;
use crate::working;

/// Larger than any reachable estimate; marks a root branch as finished.
const END_OF_SEARCH: u8 = MAX_MOVES + 1;

/// Fresh swirl chain, carried by straight continuations.
const SWIRL_RESET: u32 = 0;
const SWIRL_CLOCKWISE: u32 = 1;
const SWIRL_COUNTERCLOCKWISE: u32 = 2;
/// Five clockwise turns in a row spell a full circle of the blank.
const CLOCKWISE_MASK: u32 = 0x03FF;
const CLOCKWISE_FULL_CIRCLE: u32 = 0x0155;
/// Counterclockwise circles close one turn earlier.
const COUNTERCLOCKWISE_MASK: u32 = 0x00FF;
const COUNTERCLOCKWISE_FULL_CIRCLE: u32 = 0x00AA;

/// Root branches hotter than this end the ordering warm-up early.
const WARM_UP_NODE_CAP: u64 = 10_000;

/// How a search ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// An optimal move sequence from the start position to the goal.
    Solved(Vec<Direction>),
    /// The deadline passed before any depth completed with a solution.
    TimedOut,
    /// No solution within the depth cap.
    Exhausted,
}

/// Result of one engine call.
#[derive(Clone, Debug)]
pub struct SearchReport {
    pub outcome: SearchOutcome,
    /// Nodes expanded across all deepening iterations.
    pub nodes: u64,
    pub elapsed: Duration,
    /// The last depth limit searched.
    pub depth: u8,
}

impl SearchReport {
    #[must_use]
    pub fn solution(&self) -> Option<&[Direction]> {
        match &self.outcome {
            SearchOutcome::Solved(moves) => Some(moves),
            _ => None,
        }
    }
}

/// Mutable working set of one search call.
struct SearchState {
    tiles: [u8; SIZE],
    mirror: [u8; SIZE],
    zero: u8,
    zero_mirror: u8,
    path: Vec<Direction>,
    solution: Option<Vec<Direction>>,
    nodes: u64,
    deadline: Option<Instant>,
    terminated: bool,
    timed_out: bool,
    /// Per-direction minimum estimate seen at the last completed depth;
    /// `END_OF_SEARCH` for root moves that are off the board.
    summary_estimates: [u8; 4],
    /// Per-direction node counts at the last completed depth.
    summary_nodes: [u64; 4],
}

impl SearchState {
    fn new(board: &Board, deadline: Option<Instant>) -> Self {
        Self {
            tiles: *board.tiles(),
            mirror: *board.mirror_tiles(),
            zero: board.zero(),
            zero_mirror: board.zero_mirror(),
            path: Vec::with_capacity(MAX_MOVES as usize),
            solution: None,
            nodes: 0,
            deadline,
            terminated: false,
            timed_out: false,
            summary_estimates: [END_OF_SEARCH; 4],
            summary_nodes: [0; 4],
        }
    }
}

/// IDA* search driver parameterized over the heuristic strategy.
#[derive(Clone)]
pub struct SearchEngine<H> {
    heuristic: H,
    timeout: Option<Duration>,
    rotation_limit: bool,
    symmetry: bool,
}

impl<H: Heuristic> SearchEngine<H> {
    pub const fn new(heuristic: H) -> Self {
        Self {
            heuristic,
            timeout: None,
            rotation_limit: true,
            symmetry: true,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_rotation_limit(mut self, on: bool) -> Self {
        self.rotation_limit = on;
        self
    }

    #[must_use]
    pub const fn with_symmetry(mut self, on: bool) -> Self {
        self.symmetry = on;
        self
    }

    pub const fn heuristic(&self) -> &H {
        &self.heuristic
    }

    /// The heuristic's lower bound for a board.
    pub fn evaluate(&self, board: &Board) -> u8 {
        let node = self.heuristic.root(board);
        self.heuristic.estimate(&node)
    }

    /// Searches for an optimal solution, deepening from the heuristic
    /// bound up to the 80-move cap.
    pub fn solve(&self, board: &Board) -> SearchReport {
        self.run(board, None, MAX_MOVES, None)
    }

    /// Like [`SearchEngine::solve`] but deepening starts at
    /// `initial_limit`, which must share the heuristic bound's parity.
    /// Cheap ordering scans fill the root summary for the skipped
    /// depths first.
    pub fn solve_from(&self, board: &Board, initial_limit: u8) -> SearchReport {
        self.run(board, Some(initial_limit), MAX_MOVES, None)
    }

    /// Searches only up to `max_limit` moves; [`SearchOutcome::Exhausted`]
    /// means no solution that short exists.
    pub fn solve_within(&self, board: &Board, max_limit: u8) -> SearchReport {
        self.run(board, None, max_limit, None)
    }

    /// Replays a known `exact`-move solution prefix and searches only the
    /// remainder. The first `prefix.len() - 1` moves are applied outright
    /// and the root of the residual search is pinned to the final prefix
    /// move. Returns `None` when the prefix does not apply to `board`.
    pub fn solve_with_prefix(
        &self,
        board: &Board,
        prefix: &[Direction],
        exact: u8,
    ) -> Option<SearchReport> {
        let (head, last) = prefix.split_last().map(|(last, head)| (head, *last))?;
        if prefix.len() >= usize::from(exact) {
            return None;
        }
        let walked = board.replay(head)?;
        walked.shift(last)?;

        #[allow(clippy::cast_possible_truncation)]
        let residual = exact - head.len() as u8;
        let mut report = self.run(&walked, Some(residual), residual, Some(last));
        if let SearchOutcome::Solved(tail) = &report.outcome {
            let mut moves = head.to_vec();
            moves.extend_from_slice(tail);
            debug_assert!(board.is_solution(&moves));
            report.outcome = SearchOutcome::Solved(moves);
        }
        Some(report)
    }

    fn run(
        &self,
        board: &Board,
        initial_limit: Option<u8>,
        max_limit: u8,
        pinned_root: Option<Direction>,
    ) -> SearchReport {
        debug_assert!(board.is_solvable());
        let start = Instant::now();
        let mut state = SearchState::new(board, self.timeout.map(|timeout| start + timeout));

        let node = self.heuristic.root(board);
        let bound = self.heuristic.estimate(&node);
        if bound == 0 {
            return SearchReport {
                outcome: SearchOutcome::Solved(Vec::new()),
                nodes: 0,
                elapsed: start.elapsed(),
                depth: 0,
            };
        }

        let root_moves = match pinned_root {
            Some(dir) => 1 << dir.index(),
            None if self.symmetry => board.valid_moves(),
            None => Direction::ALL
                .into_iter()
                .filter(|dir| dir.offset_from(board.zero()).is_some())
                .fold(0u8, |moves, dir| moves | 1 << dir.index()),
        };
        let mut root_count = 0;
        for dir in Direction::ALL {
            if root_moves & (1 << dir.index()) != 0 {
                state.summary_estimates[dir.index()] = 0;
                root_count += 1;
            }
        }

        let mut limit = bound;
        if let Some(initial) = initial_limit {
            // a starting limit below the bound or off its parity can
            // only come from stale cached data
            if initial < bound || (initial - bound) % 2 != 0 {
                return SearchReport {
                    outcome: SearchOutcome::Exhausted,
                    nodes: 0,
                    elapsed: start.elapsed(),
                    depth: initial,
                };
            }
            // scan the skipped depths cheaply so the summary still
            // orders the root branches, bailing once one runs hot
            if root_count > 1 {
                let mut scan = bound;
                while scan < initial && !state.terminated {
                    self.root_pass(&mut state, &node, scan);
                    if state.summary_nodes.iter().any(|&n| n > WARM_UP_NODE_CAP) {
                        break;
                    }
                    scan += 2;
                }
            }
            limit = initial;
        }

        let outcome = loop {
            if let Some(moves) = state.solution.take() {
                break SearchOutcome::Solved(moves);
            }
            if state.timed_out {
                break SearchOutcome::TimedOut;
            }
            if limit > max_limit {
                break SearchOutcome::Exhausted;
            }
            let before = state.nodes;
            self.root_pass(&mut state, &node, limit);
            debug!(
                working!("depth {}: {} nodes"),
                limit,
                state.nodes - before
            );
            if state.solution.is_none() && !state.terminated {
                limit += 2;
            }
        };

        SearchReport {
            outcome,
            nodes: state.nodes,
            elapsed: start.elapsed(),
            depth: limit,
        }
    }

    /// One deepening iteration. Root branches run cheapest-first by the
    /// previous iteration's estimates, ties broken by fewer nodes.
    fn root_pass(&self, state: &mut SearchState, node: &H::Node, limit: u8) {
        let order_estimates = state.summary_estimates;
        let order_nodes = state.summary_nodes;
        let mut done = [false; 4];

        loop {
            let mut pick: Option<usize> = None;
            for index in 0..4 {
                if done[index] || order_estimates[index] >= END_OF_SEARCH {
                    continue;
                }
                let better = match pick {
                    None => true,
                    Some(best) => {
                        (order_estimates[index], order_nodes[index])
                            < (order_estimates[best], order_nodes[best])
                    }
                };
                if better {
                    pick = Some(index);
                }
            }
            let Some(index) = pick else { return };
            done[index] = true;

            let Some(dir) = Direction::from_index(index) else {
                return;
            };
            let before = state.nodes;
            let estimate = self.branch(state, node, dir, limit, SWIRL_RESET);
            if state.terminated {
                return;
            }
            state.summary_estimates[index] = estimate;
            state.summary_nodes[index] = state.nodes - before;
        }
    }

    /// Evaluates the child reached by `dir` and descends when it can
    /// still fit under `limit`. Returns the branch's minimum estimate,
    /// the next iteration's deepening hint.
    fn branch(
        &self,
        state: &mut SearchState,
        node: &H::Node,
        dir: Direction,
        limit: u8,
        swirl: u32,
    ) -> u8 {
        let child = self.heuristic.shift(
            &state.tiles,
            &state.mirror,
            state.zero,
            state.zero_mirror,
            node,
            dir,
        );
        let priority = self.heuristic.estimate(&child);
        state.path.push(dir);
        if priority == 0 {
            state.solution = Some(state.path.clone());
            state.terminated = true;
            state.path.pop();
            return END_OF_SEARCH;
        }
        let mut best = priority;
        if priority < limit {
            apply(state, dir);
            best = best.min(self.descend(state, &child, dir, limit - 1, swirl));
            apply(state, dir.opposite());
        }
        state.path.pop();
        best
    }

    /// Expands one interior node: straight ahead first, then the two
    /// perpendicular turns, never the reverse of the move just made.
    fn descend(
        &self,
        state: &mut SearchState,
        node: &H::Node,
        prev: Direction,
        limit: u8,
        swirl: u32,
    ) -> u8 {
        state.nodes += 1;
        if state.terminated {
            return END_OF_SEARCH;
        }
        if let Some(deadline) = state.deadline {
            if state.nodes.trailing_zeros() >= 10 && Instant::now() >= deadline {
                state.timed_out = true;
                state.terminated = true;
                return END_OF_SEARCH;
            }
        }

        let mut best = END_OF_SEARCH;
        if prev.offset_from(state.zero).is_some() {
            best = best.min(self.branch(state, node, prev, limit, SWIRL_RESET));
            if state.terminated {
                return best;
            }
        }

        // a self-mirrored position makes the two turns mirror images
        // of each other, so neither is worth a separate branch
        if self.symmetry && state.zero == state.zero_mirror && state.tiles == state.mirror {
            return best;
        }

        let clockwise = prev.clockwise();
        let counterclockwise = prev.counterclockwise();
        let turns = match prev {
            Direction::Down | Direction::Up => [
                (clockwise, SWIRL_CLOCKWISE),
                (counterclockwise, SWIRL_COUNTERCLOCKWISE),
            ],
            Direction::Right | Direction::Left => [
                (counterclockwise, SWIRL_COUNTERCLOCKWISE),
                (clockwise, SWIRL_CLOCKWISE),
            ],
        };
        for (dir, twist) in turns {
            if dir.offset_from(state.zero).is_none() || !self.allows_turn(swirl, twist) {
                continue;
            }
            best = best.min(self.branch(state, node, dir, limit, swirl << 2 | twist));
            if state.terminated {
                return best;
            }
        }
        best
    }

    /// The rotation limiter refuses the turn that would close a full
    /// circle of the blank around one cell.
    const fn allows_turn(&self, swirl: u32, twist: u32) -> bool {
        if !self.rotation_limit {
            return true;
        }
        match twist {
            SWIRL_CLOCKWISE => (swirl << 2 | twist) & CLOCKWISE_MASK != CLOCKWISE_FULL_CIRCLE,
            _ => {
                (swirl << 2 | twist) & COUNTERCLOCKWISE_MASK != COUNTERCLOCKWISE_FULL_CIRCLE
            }
        }
    }
}

/// Slides the blank in place on both tile arrays.
fn apply(state: &mut SearchState, dir: Direction) {
    let from = state.zero.wrapping_add_signed(dir.offset());
    state.tiles[state.zero as usize] = state.tiles[from as usize];
    state.tiles[from as usize] = 0;

    let mirror_dir = dir.mirrored();
    let mirror_from = state.zero_mirror.wrapping_add_signed(mirror_dir.offset());
    state.mirror[state.zero_mirror as usize] = state.mirror[mirror_from as usize];
    state.mirror[mirror_from as usize] = 0;

    state.zero = from;
    state.zero_mirror = mirror_from;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristic::ManhattanHeuristic;

    fn engine() -> SearchEngine<ManhattanHeuristic> {
        SearchEngine::new(ManhattanHeuristic::with_linear_conflict())
    }

    #[test]
    fn goal_solves_in_zero_moves() {
        let report = engine().solve(&Board::goal());
        assert_eq!(report.outcome, SearchOutcome::Solved(Vec::new()));
        assert_eq!(report.nodes, 0);
    }

    #[test]
    fn one_move_from_goal() {
        let board = Board::goal().shift(Direction::Left).unwrap();
        let report = engine().solve(&board);
        assert_eq!(
            report.outcome,
            SearchOutcome::Solved(vec![Direction::Right])
        );
    }

    #[test]
    fn scrambles_solve_optimally() {
        // walk away from the goal and check the found length never
        // exceeds the walk length
        for seed in 0..20 {
            fastrand::seed(seed);
            let mut board = Board::goal();
            let steps = 12;
            for _ in 0..steps {
                let neighbors: Vec<_> = board.neighbors().collect();
                let (_, next) = neighbors[fastrand::usize(..neighbors.len())].clone();
                board = next;
            }
            let report = engine().solve(&board);
            let moves = report.solution().unwrap().to_vec();
            assert!(moves.len() <= steps);
            assert!(board.is_solution(&moves));
            assert_eq!(moves.len() % 2, usize::from(board.manhattan()) % 2);
        }
    }

    #[test]
    fn rotation_limiter_preserves_optimality() {
        fastrand::seed(7);
        for _ in 0..10 {
            let mut board = Board::goal();
            for _ in 0..14 {
                let neighbors: Vec<_> = board.neighbors().collect();
                let (_, next) = neighbors[fastrand::usize(..neighbors.len())].clone();
                board = next;
            }
            let limited = engine().solve(&board);
            let free = engine().with_rotation_limit(false).solve(&board);
            assert_eq!(
                limited.solution().unwrap().len(),
                free.solution().unwrap().len()
            );
        }
    }

    #[test]
    fn bounded_search_reports_exhaustion() {
        let board = Board::goal()
            .replay(&[Direction::Left, Direction::Up, Direction::Left])
            .unwrap();
        let report = engine().solve_within(&board, 1);
        assert_eq!(report.outcome, SearchOutcome::Exhausted);
    }

    #[test]
    fn prefix_replay_matches_direct_search() {
        fastrand::seed(99);
        let mut board = Board::goal();
        for _ in 0..24 {
            let neighbors: Vec<_> = board.neighbors().collect();
            let (_, next) = neighbors[fastrand::usize(..neighbors.len())].clone();
            board = next;
        }
        let direct = engine().solve(&board);
        let moves = direct.solution().unwrap().to_vec();
        if moves.len() > 8 {
            #[allow(clippy::cast_possible_truncation)]
            let exact = moves.len() as u8;
            let replayed = engine()
                .solve_with_prefix(&board, &moves[..8], exact)
                .unwrap();
            let spliced = replayed.solution().unwrap();
            assert_eq!(spliced.len(), moves.len());
            assert!(board.is_solution(spliced));
        }
    }

    #[test]
    fn bad_prefix_is_rejected() {
        let board = Board::goal().shift(Direction::Left).unwrap();
        // second move walks off the board
        let prefix = [Direction::Right, Direction::Right];
        assert!(engine().solve_with_prefix(&board, &prefix, 10).is_none());
    }
}
