//! Puzzle and piece definitions.
//!
//! Pieces are plain data: a shape, how many copies are available and which
//! rigid transforms are legal for it. All puzzle-specific rules live in these
//! values, so the orientation, placement and search code is shared by every
//! puzzle.

use crate::error::ConfigError;
use crate::geometry::{orientations, Symmetry, Transform};
use crate::voxel::{Cell, VoxelSet, MAX_LATTICE_SLOTS};

/// Index of a piece in [`Puzzle::pieces`].
pub type PieceId = usize;

/// A rigid polycube piece.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Piece {
    pub name: String,
    /// Display color, carried through from puzzle files.
    pub color: Option<String>,
    /// Normalized shape.
    pub shape: VoxelSet,
    /// Number of identical copies that must all be placed.
    pub multiplicity: u32,
    pub symmetry: Symmetry,
}

impl Piece {
    /// A single rotation-only copy of the given shape.
    pub fn new(name: impl Into<String>, cells: impl IntoIterator<Item = Cell>) -> Self {
        Self {
            name: name.into(),
            color: None,
            shape: VoxelSet::new(cells).normalized(),
            multiplicity: 1,
            symmetry: Symmetry::Rotations,
        }
    }

    pub fn with_multiplicity(mut self, multiplicity: u32) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    pub fn with_symmetry(mut self, symmetry: Symmetry) -> Self {
        self.symmetry = symmetry;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// The distinct orientations of this piece under its own symmetry group.
    pub fn orientations(&self) -> Vec<VoxelSet> {
        orientations(&self.shape, self.symmetry)
    }
}

/// Single-character label for a piece: `0`-`9`, then `A`-`Z`, then `a`-`z`.
pub fn char_id(piece: PieceId) -> char {
    match piece {
        0..=9 => char::from(b'0' + piece as u8),
        10..=35 => char::from(b'A' + (piece - 10) as u8),
        36..=61 => char::from(b'a' + (piece - 36) as u8),
        _ => '#',
    }
}

/// A complete puzzle definition: the volume to fill and the pieces to fill it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Puzzle {
    pub name: String,
    /// Normalized target volume.
    pub target: VoxelSet,
    pub pieces: Vec<Piece>,
    /// Symmetry group used to canonicalize solutions.
    pub container_symmetry: Symmetry,
    /// Rotation-only pieces that are mirror images of each other; an improper
    /// container symmetry exchanges them.
    pub mirror_pairs: Vec<(PieceId, PieceId)>,
}

impl Puzzle {
    pub fn new(name: impl Into<String>, target: VoxelSet, pieces: Vec<Piece>) -> Self {
        Self {
            name: name.into(),
            target: target.normalized(),
            pieces,
            container_symmetry: Symmetry::Rotations,
            mirror_pairs: Vec::new(),
        }
    }

    pub fn with_container_symmetry(mut self, symmetry: Symmetry) -> Self {
        self.container_symmetry = symmetry;
        self
    }

    pub fn with_mirror_pair(mut self, first: PieceId, second: PieceId) -> Self {
        self.mirror_pairs.push((first, second));
        self
    }

    /// Total cells covered when every copy of every piece is placed.
    pub fn piece_cells(&self) -> usize {
        self.pieces
            .iter()
            .map(|piece| piece.shape.len() * piece.multiplicity as usize)
            .sum()
    }

    /// Total number of placements in a complete solution.
    pub fn total_copies(&self) -> usize {
        self.pieces
            .iter()
            .map(|piece| piece.multiplicity as usize)
            .sum()
    }

    /// The piece an improper container transform turns `piece` into.
    pub fn mirror_of(&self, piece: PieceId) -> PieceId {
        self.mirror_pairs
            .iter()
            .find_map(|&(first, second)| match piece {
                p if p == first => Some(second),
                p if p == second => Some(first),
                _ => None,
            })
            .unwrap_or(piece)
    }

    /// Checks that the puzzle is well formed before any search starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self
            .target
            .bounding_volume()
            .map_or(true, |volume| volume > MAX_LATTICE_SLOTS)
        {
            return Err(ConfigError::TargetTooLarge {
                dims: self.target.dims(),
                limit: MAX_LATTICE_SLOTS,
            });
        }
        if self.pieces.is_empty() {
            return Err(ConfigError::NoPieces);
        }

        for (index, piece) in self.pieces.iter().enumerate() {
            if piece.shape.is_empty() {
                return Err(ConfigError::EmptyPiece { piece: index });
            }
            if piece.multiplicity == 0 {
                return Err(ConfigError::ZeroMultiplicity { piece: index });
            }
            if !piece.shape.is_connected() {
                return Err(ConfigError::Disconnected { piece: index });
            }
        }

        let piece_cells = self.piece_cells();
        if piece_cells != self.target.len() {
            return Err(ConfigError::CellCountMismatch {
                pieces: piece_cells,
                target: self.target.len(),
            });
        }

        let (tx, ty, tz) = self.target.dims();
        for (index, piece) in self.pieces.iter().enumerate() {
            let fits = piece.orientations().iter().any(|orientation| {
                let (px, py, pz) = orientation.dims();
                px <= tx && py <= ty && pz <= tz
            });
            if !fits {
                return Err(ConfigError::PieceDoesNotFit { piece: index });
            }
        }

        for &(first, second) in &self.mirror_pairs {
            if !self.is_mirror_pair(first, second) {
                return Err(ConfigError::InvalidMirrorPair { first, second });
            }
        }

        Ok(())
    }

    fn is_mirror_pair(&self, first: PieceId, second: PieceId) -> bool {
        let (Some(a), Some(b)) = (self.pieces.get(first), self.pieces.get(second)) else {
            return false;
        };
        if first == second || a.multiplicity != b.multiplicity {
            return false;
        }
        let mirror = Transform {
            rotation: 0,
            mirrored: true,
        };
        let mirrored = a.shape.mapped(|cell| mirror.apply(cell)).normalized();
        orientations(&b.shape, Symmetry::Rotations).contains(&mirrored)
    }
}

/// The seven Soma cube pieces that must fit into a 3x3x3 cube.
///
/// Each piece is defined by its constituent unit cube positions,
/// normalized so the minimum coordinates are at the origin.
pub const SOMA_PIECES: &[(&str, &[Cell])] = &[
    ("L", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0)]),
    ("T", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (1, 1, 0)]),
    ("S", &[(0, 0, 0), (1, 0, 0), (1, 1, 0), (2, 1, 0)]),
    ("V", &[(0, 0, 0), (1, 0, 0), (0, 1, 0)]),
    // 3d corner pieces: A and C are mirror images, B is achiral
    ("A", &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (1, 0, 1)]),
    ("B", &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 0, 1)]),
    ("C", &[(0, 0, 0), (1, 0, 0), (0, 1, 0), (0, 1, 1)]),
];

/// The thirteen Bedlam cube pieces that must fit into a 4x4x4 cube.
pub const BEDLAM_PIECES: &[(&str, &[Cell])] = &[
    ("Little Corner", &[(0, 0, 0), (0, 1, 0), (1, 0, 0), (0, 0, 1)]),
    ("Long Stick", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (3, 0, 0), (3, 1, 0)]),
    ("Hat", &[(0, 0, 0), (0, 1, 0), (1, 1, 0), (1, 2, 0), (2, 2, 0)]),
    ("Bucket", &[(0, 0, 0), (0, 1, 0), (1, 1, 0), (1, 2, 0), (1, 1, 1)]),
    ("Screw", &[(0, 0, 0), (1, 0, 0), (1, 0, 1), (1, 1, 1), (2, 1, 1)]),
    ("Twist", &[(0, 0, 0), (1, 0, 0), (1, 1, 0), (1, 1, 1), (2, 1, 1)]),
    ("Signpost", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (1, 1, 0), (1, 0, 1)]),
    ("Ducktail", &[(0, 0, 0), (1, 0, 0), (1, 1, 0), (2, 1, 0), (1, 0, 1)]),
    ("Plane", &[(0, 0, 0), (0, 1, 0), (1, 1, 0), (2, 1, 0), (1, 2, 0)]),
    ("Bridge", &[(0, 0, 0), (1, 0, 0), (2, 0, 0), (0, 1, 0), (2, 1, 0)]),
    ("Staircase", &[(0, 0, 0), (1, 0, 0), (1, 1, 0), (2, 1, 0), (2, 2, 0)]),
    ("Spikey Zag", &[(0, 0, 1), (0, 1, 0), (0, 1, 1), (1, 1, 0), (1, 2, 0)]),
    ("Middle Zig", &[(0, 0, 0), (0, 1, 0), (0, 1, 1), (1, 1, 0), (1, 2, 0)]),
];

fn pieces_from_table(table: &[(&str, &[Cell])]) -> Vec<Piece> {
    table
        .iter()
        .map(|&(name, cells)| Piece::new(name, cells.iter().copied()))
        .collect()
}

/// The Soma cube: solutions are counted up to rotation and reflection, with
/// the chiral corner pieces exchanged under reflection.
pub fn soma() -> Puzzle {
    Puzzle::new("Soma", VoxelSet::cuboid(3, 3, 3), pieces_from_table(SOMA_PIECES))
        .with_container_symmetry(Symmetry::RotationsAndReflections)
        .with_mirror_pair(4, 6)
}

/// The Bedlam cube. Its physical pieces cannot be mirrored, so solutions are
/// counted up to rotation only.
pub fn bedlam() -> Puzzle {
    Puzzle::new("Bedlam", VoxelSet::cuboid(4, 4, 4), pieces_from_table(BEDLAM_PIECES))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domino_puzzle(dims: (i32, i32, i32), copies: u32) -> Puzzle {
        Puzzle::new(
            "dominoes",
            VoxelSet::cuboid(dims.0, dims.1, dims.2),
            vec![Piece::new("domino", [(0, 0, 0), (1, 0, 0)]).with_multiplicity(copies)],
        )
    }

    #[test]
    fn test_builtin_puzzles_are_valid() {
        assert_eq!(soma().validate(), Ok(()));
        assert_eq!(bedlam().validate(), Ok(()));
        assert_eq!(soma().piece_cells(), 27);
        assert_eq!(bedlam().piece_cells(), 64);
        assert_eq!(bedlam().total_copies(), 13);
    }

    #[test]
    fn test_cell_count_mismatch() {
        assert_eq!(
            domino_puzzle((2, 2, 2), 3).validate(),
            Err(ConfigError::CellCountMismatch {
                pieces: 6,
                target: 8
            })
        );
    }

    #[test]
    fn test_sparse_target_is_too_large() {
        let puzzle = Puzzle::new(
            "far apart",
            VoxelSet::new([(0, 0, 0), (2000, 2000, 2000)]),
            vec![Piece::new("mono", [(0, 0, 0)]).with_multiplicity(2)],
        );
        assert_eq!(
            puzzle.validate(),
            Err(ConfigError::TargetTooLarge {
                dims: (2001, 2001, 2001),
                limit: MAX_LATTICE_SLOTS
            })
        );
    }

    #[test]
    fn test_piece_that_never_fits() {
        let puzzle = Puzzle::new(
            "L in a column",
            VoxelSet::cuboid(1, 1, 3),
            vec![Piece::new("L", [(0, 0, 0), (1, 0, 0), (0, 1, 0)])],
        );
        assert_eq!(
            puzzle.validate(),
            Err(ConfigError::PieceDoesNotFit { piece: 0 })
        );
    }

    #[test]
    fn test_fixed_piece_must_fit_as_given() {
        // lying along x it cannot enter a 1x1x2 column unless rotated
        let rotating = domino_puzzle((1, 1, 2), 1);
        let mut fixed = rotating.clone();
        fixed.pieces[0].symmetry = Symmetry::Fixed;

        assert_eq!(rotating.validate(), Ok(()));
        assert_eq!(
            fixed.validate(),
            Err(ConfigError::PieceDoesNotFit { piece: 0 })
        );
    }

    #[test]
    fn test_malformed_pieces() {
        let mut puzzle = domino_puzzle((2, 1, 1), 1);
        puzzle.pieces[0].multiplicity = 0;
        assert_eq!(
            puzzle.validate(),
            Err(ConfigError::ZeroMultiplicity { piece: 0 })
        );

        let split = Puzzle::new(
            "split",
            VoxelSet::cuboid(3, 1, 1),
            vec![Piece::new("gap", [(0, 0, 0), (2, 0, 0), (1, 5, 0)])],
        );
        assert_eq!(split.validate(), Err(ConfigError::Disconnected { piece: 0 }));

        let empty = Puzzle::new("empty", VoxelSet::default(), vec![]);
        assert_eq!(empty.validate(), Err(ConfigError::EmptyTarget));
    }

    #[test]
    fn test_mirror_pairs() {
        let puzzle = soma();
        assert_eq!(puzzle.mirror_of(4), 6);
        assert_eq!(puzzle.mirror_of(6), 4);
        assert_eq!(puzzle.mirror_of(0), 0);

        let bad = soma().with_mirror_pair(0, 1);
        assert_eq!(
            bad.validate(),
            Err(ConfigError::InvalidMirrorPair {
                first: 0,
                second: 1
            })
        );
    }

    #[test]
    fn test_char_ids() {
        assert_eq!(char_id(0), '0');
        assert_eq!(char_id(9), '9');
        assert_eq!(char_id(10), 'A');
        assert_eq!(char_id(35), 'Z');
        assert_eq!(char_id(36), 'a');
        assert_eq!(char_id(99), '#');
    }
}
