//! Admission control: adaptive puzzles plus reputation gate relaying.

pub mod pow;
pub mod reputation;
pub mod solver;

pub use pow::{AdaptivePuzzle, Puzzle, Solution};
pub use reputation::{ReputationTable, ReputationTracker};
pub use solver::{CancelFlag, PuzzleSolver, SolveTask};
