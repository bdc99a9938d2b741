//! Error types for the polycube packing solver.

use thiserror::Error;

/// Result type alias for solver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or solving a puzzle.
///
/// An unsolvable puzzle, a cancelled search and a crashed worker are not
/// errors; they are reported through [`crate::SolveReport`].
#[derive(Debug, Error)]
pub enum Error {
    /// The puzzle is malformed; search never starts.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A puzzle definition file could not be parsed.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The worker pool could not be built.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// I/O failure while reading a puzzle file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ways in which a puzzle definition can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("target volume is empty")]
    EmptyTarget,

    #[error("target bounding box {dims:?} exceeds {limit} cells")]
    TargetTooLarge { dims: (i32, i32, i32), limit: usize },

    #[error("puzzle has no pieces")]
    NoPieces,

    #[error("piece {piece} has no cells")]
    EmptyPiece { piece: usize },

    #[error("piece {piece} has multiplicity 0")]
    ZeroMultiplicity { piece: usize },

    #[error("piece {piece} is not face-connected")]
    Disconnected { piece: usize },

    #[error("pieces cover {pieces} cells but the target has {target}")]
    CellCountMismatch { pieces: usize, target: usize },

    #[error("piece {piece} does not fit the target bounding box in any orientation")]
    PieceDoesNotFit { piece: usize },

    #[error("mirror pair ({first}, {second}) is invalid")]
    InvalidMirrorPair { first: usize, second: usize },
}

/// Ways in which a reported solution can fail to be an exact cover.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("placement {placement} refers to unknown piece {piece}")]
    UnknownPiece { placement: usize, piece: usize },

    #[error("placement {placement} refers to unknown orientation {orientation}")]
    UnknownOrientation { placement: usize, orientation: usize },

    #[error("placement {placement} leaves the target at {cell:?}")]
    OutsideTarget {
        placement: usize,
        cell: (i32, i32, i32),
    },

    #[error("cell {cell:?} is covered more than once")]
    Overlap { cell: (i32, i32, i32) },

    #[error("{uncovered} target cells are not covered")]
    Uncovered { uncovered: usize },

    #[error("piece {piece} is used {found} times but must be used {expected} times")]
    WrongCount {
        piece: usize,
        expected: u32,
        found: u32,
    },
}
