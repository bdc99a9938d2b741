//! Polycube Packing Solver Library
//!
//! Finds every way to fill a 3D target volume with a multiset of polycube
//! pieces, treating the problem as exact cover. Pieces may rotate (and, if
//! the puzzle allows it, reflect); solutions that are symmetric images of
//! each other under the container's symmetries are reported once.
//!
//! ```no_run
//! use polypack::{pieces, SolveOptions};
//!
//! let report = polypack::solve(&pieces::soma(), &SolveOptions::all())?;
//! println!("{} distinct solutions", report.count());
//! # Ok::<(), polypack::Error>(())
//! ```

pub mod collector;
pub mod error;
pub mod geometry;
pub mod persistence;
pub mod pieces;
pub mod placement;
pub mod puzzle_file;
pub mod scheduler;
pub mod solution;
pub mod solver;
pub mod voxel;

pub use error::{ConfigError, Error, Result, VerifyError};
pub use geometry::Symmetry;
pub use pieces::{Piece, PieceId, Puzzle};
pub use scheduler::{solve, SearchStatus, SolveMode, SolveOptions, SolveReport, Solver, StopReason};
pub use solution::{format_solution, PlacedPiece, Solution};
pub use voxel::{Cell, VoxelSet};
