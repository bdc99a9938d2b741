//! Placement enumeration: every way each piece can sit inside the target.
//!
//! The resulting [`PlacementUniverse`] is built once per solve and shared
//! read-only by every search worker.

use log::debug;

use crate::pieces::{PieceId, Puzzle};
use crate::voxel::{Cell, CellMask, Lattice, VoxelSet};

/// One orientation of one piece translated to a fixed position.
///
/// `mask` is the footprint in lattice indices; it is always a subset of the
/// target, which is established here and never re-checked during search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement<M> {
    pub piece: PieceId,
    /// Index into the piece's orientation list.
    pub orientation: usize,
    /// Translation applied to the normalized orientation.
    pub offset: Cell,
    pub mask: M,
}

/// All legal placements of all pieces, indexed by the cells they cover.
#[derive(Debug)]
pub struct PlacementUniverse<M> {
    lattice: Lattice,
    orientations: Vec<Vec<VoxelSet>>,
    placements: Vec<Placement<M>>,
    /// `covering[cell]` lists the placements that occupy `cell`.
    covering: Vec<Vec<usize>>,
    multiplicities: Vec<u32>,
}

impl<M: CellMask> PlacementUniverse<M> {
    /// Builds the universe for a puzzle that has already passed validation.
    pub fn build(puzzle: &Puzzle) -> Self {
        let lattice = Lattice::new(&puzzle.target);
        let orientations: Vec<Vec<VoxelSet>> =
            puzzle.pieces.iter().map(|piece| piece.orientations()).collect();

        let placements: Vec<Placement<M>> = orientations
            .iter()
            .enumerate()
            .flat_map(|(piece, piece_orientations)| {
                enumerate_placements(&lattice, piece, piece_orientations)
            })
            .collect();

        let mut covering = vec![Vec::new(); lattice.len()];
        for (index, placement) in placements.iter().enumerate() {
            for cell in placement.mask.ones() {
                covering[cell].push(index);
            }
        }

        debug!(
            "{} placements of {} pieces over {} cells",
            placements.len(),
            puzzle.pieces.len(),
            lattice.len()
        );

        Self {
            lattice,
            orientations,
            placements,
            covering,
            multiplicities: puzzle.pieces.iter().map(|piece| piece.multiplicity).collect(),
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn placements(&self) -> &[Placement<M>] {
        &self.placements
    }

    #[inline]
    pub fn placement(&self, index: usize) -> &Placement<M> {
        &self.placements[index]
    }

    /// Placements that occupy the given lattice cell.
    #[inline]
    pub fn covering(&self, cell: usize) -> &[usize] {
        &self.covering[cell]
    }

    pub fn orientations(&self, piece: PieceId) -> &[VoxelSet] {
        &self.orientations[piece]
    }

    pub fn multiplicities(&self) -> &[u32] {
        &self.multiplicities
    }

    pub fn num_pieces(&self) -> usize {
        self.multiplicities.len()
    }

    /// Number of placements available to each piece.
    pub fn counts_per_piece(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_pieces()];
        for placement in &self.placements {
            counts[placement.piece] += 1;
        }
        counts
    }

    /// The absolute cells a placement occupies.
    pub fn footprint(&self, index: usize) -> VoxelSet {
        self.lattice.cells_of(&self.placements[index].mask)
    }
}

/// Computes every translation of every orientation that lies inside the target.
///
/// Candidate offsets are limited to those keeping the orientation's bounding
/// box inside the target's; each candidate is then checked cell by cell
/// against the lattice, which rejects holes in non-box targets.
pub fn enumerate_placements<M: CellMask>(
    lattice: &Lattice,
    piece: PieceId,
    orientations: &[VoxelSet],
) -> Vec<Placement<M>> {
    let (tx, ty, tz) = lattice.dims();
    let mut placements = Vec::new();

    for (orientation_index, orientation) in orientations.iter().enumerate() {
        let (px, py, pz) = orientation.dims();
        for dx in 0..=(tx - px) {
            for dy in 0..=(ty - py) {
                for dz in 0..=(tz - pz) {
                    let offset = (dx, dy, dz);
                    if let Some(mask) = try_create_mask(lattice, orientation, offset) {
                        placements.push(Placement {
                            piece,
                            orientation: orientation_index,
                            offset,
                            mask,
                        });
                    }
                }
            }
        }
    }

    placements
}

/// Returns `None` if any translated cube falls outside the target volume.
#[inline]
fn try_create_mask<M: CellMask>(
    lattice: &Lattice,
    orientation: &VoxelSet,
    (dx, dy, dz): Cell,
) -> Option<M> {
    lattice.mask_of(orientation.iter().map(|(x, y, z)| (x + dx, y + dy, z + dz)))
}
