//! Precomputed heuristic tables: walking distance and additive pattern
//! databases. Both are built from the goal state by breadth-first search;
//! the pattern database can round-trip through a binary cache file.

pub mod pattern;
pub mod walking;

pub use pattern::{PatternDb, PatternDbError, Partition};
pub use walking::WalkingDistance;
