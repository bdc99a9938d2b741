//! Solution representation, verification and text rendering.
//!
//! A [`Solution`] is a list of (piece, orientation index, offset) triples.
//! Orientation indices refer to [`Piece::orientations`], so a solution can be
//! turned back into cells without the placement universe that produced it.
//!
//! [`Piece::orientations`]: crate::pieces::Piece::orientations

use rustc_hash::FxHashMap;

use crate::error::VerifyError;
use crate::pieces::{char_id, PieceId, Puzzle};
use crate::placement::PlacementUniverse;
use crate::voxel::{Cell, CellMask, VoxelSet};

/// A piece placed at specific coordinates within the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlacedPiece {
    pub piece: PieceId,
    pub orientation: usize,
    pub offset: Cell,
}

/// A complete, non-overlapping cover of the target volume.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Solution {
    pub placements: Vec<PlacedPiece>,
}

impl Solution {
    pub fn new(placements: Vec<PlacedPiece>) -> Self {
        Self { placements }
    }

    /// Converts placement indices from a search into a solution.
    pub fn from_indices<M: CellMask>(universe: &PlacementUniverse<M>, indices: &[usize]) -> Self {
        Self {
            placements: indices
                .iter()
                .map(|&index| {
                    let placement = universe.placement(index);
                    PlacedPiece {
                        piece: placement.piece,
                        orientation: placement.orientation,
                        offset: placement.offset,
                    }
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedPiece> {
        self.placements.iter()
    }

    /// Rebuilds the absolute cells of every placement from the puzzle.
    pub fn footprints(&self, puzzle: &Puzzle) -> Result<Vec<VoxelSet>, VerifyError> {
        let mut orientation_cache: FxHashMap<PieceId, Vec<VoxelSet>> = FxHashMap::default();

        self.placements
            .iter()
            .enumerate()
            .map(|(placement, placed)| {
                let piece = puzzle
                    .pieces
                    .get(placed.piece)
                    .ok_or(VerifyError::UnknownPiece {
                        placement,
                        piece: placed.piece,
                    })?;
                let orientations = orientation_cache
                    .entry(placed.piece)
                    .or_insert_with(|| piece.orientations());
                let orientation =
                    orientations
                        .get(placed.orientation)
                        .ok_or(VerifyError::UnknownOrientation {
                            placement,
                            orientation: placed.orientation,
                        })?;
                Ok(orientation.translated(placed.offset))
            })
            .collect()
    }

    /// Maps every covered cell to the piece covering it.
    pub fn cell_owners(&self, puzzle: &Puzzle) -> Result<FxHashMap<Cell, PieceId>, VerifyError> {
        let mut owners = FxHashMap::default();
        for (placed, footprint) in self.placements.iter().zip(self.footprints(puzzle)?) {
            for cell in footprint.iter() {
                if owners.insert(cell, placed.piece).is_some() {
                    return Err(VerifyError::Overlap { cell });
                }
            }
        }
        Ok(owners)
    }

    /// Independently checks that this is an exact cover of the puzzle.
    ///
    /// Every placement must lie inside the target, no cell may be covered
    /// twice, every target cell must be covered, and each piece must be used
    /// exactly `multiplicity` times.
    pub fn verify(&self, puzzle: &Puzzle) -> Result<(), VerifyError> {
        let footprints = self.footprints(puzzle)?;

        for (placement, footprint) in footprints.iter().enumerate() {
            if let Some(cell) = footprint.iter().find(|&cell| !puzzle.target.contains(cell)) {
                return Err(VerifyError::OutsideTarget { placement, cell });
            }
        }

        let owners = self.cell_owners(puzzle)?;
        if owners.len() != puzzle.target.len() {
            return Err(VerifyError::Uncovered {
                uncovered: puzzle.target.len() - owners.len(),
            });
        }

        let mut used = vec![0u32; puzzle.pieces.len()];
        for placed in &self.placements {
            used[placed.piece] += 1;
        }
        for (piece, (found, definition)) in used.into_iter().zip(&puzzle.pieces).enumerate() {
            if found != definition.multiplicity {
                return Err(VerifyError::WrongCount {
                    piece,
                    expected: definition.multiplicity,
                    found,
                });
            }
        }

        Ok(())
    }
}

/// Formats a solution as a human-readable string.
///
/// Displays the z-slices of the target's bounding box side by side, rows from
/// top (high y) to bottom, with piece ids from [`char_id`]. Uncovered target
/// cells show as '.', cells outside the target as ' '.
pub fn format_solution(puzzle: &Puzzle, solution: &Solution) -> String {
    // rendering is best effort: placements that cannot be rebuilt are skipped
    let mut owners: FxHashMap<Cell, PieceId> = FxHashMap::default();
    let footprints = solution.footprints(puzzle).unwrap_or_default();
    for (placed, footprint) in solution.placements.iter().zip(&footprints) {
        for cell in footprint.iter() {
            owners.insert(cell, placed.piece);
        }
    }

    let (dx, dy, dz) = puzzle.target.dims();
    let header_width = |z: i32| format!("z={z}").len();
    let slice_width = (0..dz).map(header_width).max().unwrap_or(0).max(dx as usize);

    let mut lines = Vec::with_capacity(dy as usize + 1);
    lines.push(
        (0..dz)
            .map(|z| format!("{:<slice_width$}", format!("z={z}")))
            .collect::<Vec<_>>()
            .join("  "),
    );

    for y in (0..dy).rev() {
        let row = (0..dz)
            .map(|z| {
                let slice: String = (0..dx)
                    .map(|x| match owners.get(&(x, y, z)) {
                        Some(&piece) => char_id(piece),
                        None if puzzle.target.contains((x, y, z)) => '.',
                        None => ' ',
                    })
                    .collect();
                format!("{slice:<slice_width$}")
            })
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(row);
    }

    let mut output = String::new();
    for line in lines {
        output.push_str(line.trim_end());
        output.push('\n');
    }
    output
}
