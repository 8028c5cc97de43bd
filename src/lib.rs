//! Multi-round column stitching sort.
//!
//! Lexicographically sorts a wide table of 32-bit columns by splitting the
//! columns into an ordered sequence of rounds. Each round stitches its
//! columns next to a row id into fixed-width tuples, sorts the tuples (the
//! first round globally, later rounds only inside the groups still tied), and
//! hands the refined equal-key groups to the next round.
//!
//! The crate ships the engine ([`column`]), a synthetic data generator
//! ([`generator`]), and a benchmark harness ([`bench`], [`report`]) that
//! times the stitch / sort / group operators per round and writes a
//! per-plan summary.

pub mod bench;
pub mod column;
pub mod error;
pub mod generator;
pub mod report;

pub use bench::{sort_with_plan, Benchmark, StitchPlan};
pub use column::{RawColumn, SortingGroup, SortingState, StitchedColumn};
pub use error::StitchError;
