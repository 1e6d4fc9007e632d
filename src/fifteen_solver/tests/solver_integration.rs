use std::collections::VecDeque;
use std::time::Duration;

use fifteen_solver::{
    SearchEngine, SearchOutcome, SolverBuilder, Strategy, Verdict,
    heuristic::ManhattanHeuristic,
    reference::ReferenceCollection,
};
use fxhash::FxHashMap;
use log::info;

use fifteen_core::Board;

/// True optimal distances for every board within `depth` moves of the
/// goal, from breadth-first search.
fn known_distances(depth: usize) -> FxHashMap<(u32, u32), (Board, usize)> {
    let mut seen = FxHashMap::default();
    let goal = Board::goal();
    seen.insert((goal.key_high(), goal.key_low()), (goal.clone(), 0));
    let mut frontier = VecDeque::from([(goal, 0)]);
    while let Some((board, dist)) = frontier.pop_front() {
        if dist == depth {
            continue;
        }
        for (_, next) in board.neighbors() {
            let key = (next.key_high(), next.key_low());
            if !seen.contains_key(&key) {
                seen.insert(key, (next.clone(), dist + 1));
                frontier.push_back((next, dist + 1));
            }
        }
    }
    seen
}

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

#[test_log::test]
fn every_strategy_matches_breadth_first_distances() {
    let distances = known_distances(9);
    info!("checking {} boards", distances.len());
    let strategies = [
        Strategy::Manhattan,
        Strategy::ManhattanConflict,
        Strategy::Walking,
        Strategy::WalkingManhattan,
    ];
    for strategy in strategies {
        let solver = SolverBuilder::new(strategy)
            .reference(false)
            .build()
            .unwrap();
        for (board, dist) in distances.values() {
            let summary = solver.solve(board).unwrap();
            let Verdict::Solved(moves) = summary.verdict else {
                panic!("board {dist} moves out must solve");
            };
            assert_eq!(moves.len(), *dist, "strategy {strategy} on\n{board:?}");
            assert!(board.is_solution(&moves));
        }
    }
}

#[test_log::test]
fn strategies_agree_on_deep_scrambles() {
    let reference_solver = SolverBuilder::new(Strategy::Manhattan)
        .reference(false)
        .build()
        .unwrap();
    let walking_solver = SolverBuilder::new(Strategy::WalkingManhattan)
        .reference(false)
        .build()
        .unwrap();
    for seed in 0..6 {
        let board = scramble(seed, 30);
        let a = reference_solver.solve(&board).unwrap();
        let b = walking_solver.solve(&board).unwrap();
        assert_eq!(a.steps(), b.steps(), "disagreement on seed {seed}");
    }
}

#[test_log::test]
fn goal_and_single_move_boards() {
    let solver = SolverBuilder::new(Strategy::ManhattanConflict)
        .reference(false)
        .build()
        .unwrap();

    let summary = solver.solve(&Board::goal()).unwrap();
    assert_eq!(summary.verdict, Verdict::Solved(Vec::new()));
    assert_eq!(summary.nodes, 0);

    let (dir, board) = Board::goal().neighbors().next().unwrap();
    let summary = solver.solve(&board).unwrap();
    assert_eq!(summary.verdict, Verdict::Solved(vec![dir.opposite()]));
}

#[test_log::test]
fn unsolvable_board_gets_the_verdict() {
    let mut tiles = *Board::goal().tiles();
    tiles.swap(14, 15);
    let board = Board::new(tiles).unwrap();
    assert!(!board.is_solvable());

    let solver = SolverBuilder::new(Strategy::WalkingManhattan)
        .reference(false)
        .build()
        .unwrap();
    let summary = solver.solve(&board).unwrap();
    assert_eq!(summary.verdict, Verdict::Unsolvable);
}

#[test_log::test]
fn timeout_is_honored() {
    // one of the known hardest boards, far beyond a 1ms budget
    let board = Board::new([0, 12, 9, 13, 15, 11, 10, 14, 3, 7, 2, 5, 4, 8, 6, 1]).unwrap();
    let solver = SolverBuilder::new(Strategy::Manhattan)
        .reference(false)
        .timeout(Some(Duration::from_millis(1)))
        .build()
        .unwrap();
    let summary = solver.solve(&board).unwrap();
    assert_eq!(summary.verdict, Verdict::TimedOut);
}

#[test_log::test]
fn warmed_archive_replays_a_cached_prefix() {
    let dir = std::env::temp_dir().join(format!("fifteen-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("reference.db");

    let board = scramble(99, 34);
    let engine = SearchEngine::new(ManhattanHeuristic::with_linear_conflict());
    let report = engine.solve(&board);
    let SearchOutcome::Solved(moves) = report.outcome else {
        panic!("scramble must solve");
    };
    assert!(moves.len() >= 8, "scramble too shallow for this check");

    {
        let mut collection = ReferenceCollection::open(path.clone());
        assert!(collection.record(&board, moves.len() as u8, &moves));
    }

    // a fresh solver picks the board up from disk and replays the prefix
    let solver = SolverBuilder::new(Strategy::ManhattanConflict)
        .data_dir(Some(dir.clone()))
        .build()
        .unwrap();
    let summary = solver.solve(&board).unwrap();
    let Verdict::Solved(replayed) = summary.verdict else {
        panic!("cached board must solve");
    };
    assert_eq!(replayed.len(), moves.len());
    assert!(board.is_solution(&replayed));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test_log::test]
fn solutions_never_backtrack() {
    let solver = SolverBuilder::new(Strategy::WalkingManhattan)
        .reference(false)
        .build()
        .unwrap();
    for seed in 40..48 {
        let board = scramble(seed, 26);
        let summary = solver.solve(&board).unwrap();
        let Verdict::Solved(moves) = summary.verdict else {
            panic!("must solve");
        };
        for pair in moves.windows(2) {
            assert_ne!(pair[1], pair[0].opposite(), "seed {seed}: {moves:?}");
        }
    }
}

// Runs for minutes even with walking distance. The answer is 80 moves.
#[test_log::test]
#[ignore]
fn hardest_board_takes_eighty_moves() {
    let board = Board::new([0, 12, 9, 13, 15, 11, 10, 14, 3, 7, 2, 5, 4, 8, 6, 1]).unwrap();
    let solver = SolverBuilder::new(Strategy::WalkingManhattan)
        .reference(false)
        .build()
        .unwrap();
    let summary = solver.solve(&board).unwrap();
    assert_eq!(summary.steps(), Some(80));
}

// Generating the 6-6-3 database dominates the runtime.
#[test_log::test]
#[ignore]
fn pattern_database_strategy_is_optimal() {
    let distances = known_distances(8);
    let solver = SolverBuilder::new(Strategy::PatternWalking(
        fifteen_solver::PatternPreset::SixSixThree,
    ))
    .reference(false)
    .build()
    .unwrap();
    for (board, dist) in distances.values() {
        let summary = solver.solve(board).unwrap();
        assert_eq!(summary.steps(), Some(*dist));
    }
}
