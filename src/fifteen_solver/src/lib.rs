#![warn(clippy::pedantic)]
#![allow(clippy::similar_names, clippy::too_many_lines)]

//! Optimal 15-puzzle solving: admissible heuristics backed by precomputed
//! tables, an IDA* engine with symmetry and rotation-cycle reductions, and
//! a persistent collection of hard reference boards that boosts the
//! initial estimate and replays cached solution prefixes.

pub mod engine;
pub mod heuristic;
pub mod reference;
pub mod solver;
pub mod tables;

pub use engine::{SearchEngine, SearchOutcome, SearchReport};
pub use solver::{
    PatternPreset, Solver, SolverBuilder, SolverError, Strategy, Summary, Verdict,
};

#[macro_export]
macro_rules! start {
    ($msg:expr) => {
        concat!("⏳ ", $msg)
    };
}

#[macro_export]
macro_rules! working {
    ($msg:expr) => {
        concat!("🛠  ", $msg)
    };
}

#[macro_export]
macro_rules! success {
    ($msg:expr) => {
        concat!("✅ ", $msg)
    };
}
