//! 3D rotation and reflection utilities.
//!
//! A cube has 24 possible orientations in 3D space (the rotation group of a cube).
//! These are the 6 ways to choose which face points up, times 4 rotations around
//! the vertical axis. Composing each with a mirror through the yz plane gives
//! the 24 improper transforms of the full 48-element group.

use rustc_hash::FxHashSet;

use crate::voxel::{Cell, Lattice, VoxelSet};

/// Number of proper rotations of a cube.
pub const NUM_ROTATIONS: usize = 24;

/// All 24 rotation functions for a cube.
///
/// Organized as 6 face-up choices x 4 rotations around vertical:
/// - Rotations 0-3: +Z face up
/// - Rotations 4-7: +Y face up
/// - Rotations 8-11: -Z face up
/// - Rotations 12-15: -Y face up
/// - Rotations 16-19: +X face up
/// - Rotations 20-23: -X face up
pub const ROTATIONS: [fn(Cell) -> Cell; NUM_ROTATIONS] = [
    // +Z face up (identity orientation), rotate around Z axis
    |(x, y, z)| (x, y, z),      // 0 degrees
    |(x, y, z)| (-y, x, z),     // 90 degrees
    |(x, y, z)| (-x, -y, z),    // 180 degrees
    |(x, y, z)| (y, -x, z),     // 270 degrees
    // +Y face up, rotate around Y axis
    |(x, y, z)| (x, -z, y),
    |(x, y, z)| (z, x, y),
    |(x, y, z)| (-x, z, y),
    |(x, y, z)| (-z, -x, y),
    // -Z face up, rotate around Z axis
    |(x, y, z)| (x, -y, -z),
    |(x, y, z)| (y, x, -z),
    |(x, y, z)| (-x, y, -z),
    |(x, y, z)| (-y, -x, -z),
    // -Y face up, rotate around Y axis
    |(x, y, z)| (x, z, -y),
    |(x, y, z)| (-z, x, -y),
    |(x, y, z)| (-x, -z, -y),
    |(x, y, z)| (z, -x, -y),
    // +X face up, rotate around X axis
    |(x, y, z)| (z, y, -x),
    |(x, y, z)| (-y, z, -x),
    |(x, y, z)| (-z, -y, -x),
    |(x, y, z)| (y, -z, -x),
    // -X face up, rotate around X axis
    |(x, y, z)| (-z, y, x),
    |(x, y, z)| (-y, -z, x),
    |(x, y, z)| (z, -y, x),
    |(x, y, z)| (y, z, x),
];

/// Which rigid transforms are allowed for a piece or a container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Symmetry {
    /// Identity only: the shape is used exactly as given.
    Fixed,
    /// The 24 proper rotations.
    #[default]
    Rotations,
    /// Rotations plus their mirror images (48 transforms).
    RotationsAndReflections,
}

impl Symmetry {
    /// Upper bound on distinct orientations under this group.
    pub const fn order(self) -> usize {
        match self {
            Symmetry::Fixed => 1,
            Symmetry::Rotations => NUM_ROTATIONS,
            Symmetry::RotationsAndReflections => 2 * NUM_ROTATIONS,
        }
    }

    /// The transforms of this group, identity first.
    pub fn transforms(self) -> impl Iterator<Item = Transform> {
        let rotations = match self {
            Symmetry::Fixed => 1,
            _ => NUM_ROTATIONS,
        };
        let mirrors: &'static [bool] = match self {
            Symmetry::RotationsAndReflections => &[false, true],
            _ => &[false],
        };
        mirrors.iter().flat_map(move |&mirrored| {
            (0..rotations).map(move |rotation| Transform { rotation, mirrored })
        })
    }
}

/// One element of the cube's symmetry group: an optional mirror followed by
/// a rotation from [`ROTATIONS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Transform {
    pub rotation: usize,
    pub mirrored: bool,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: 0,
        mirrored: false,
    };

    #[inline]
    pub fn apply(self, (x, y, z): Cell) -> Cell {
        let cell = if self.mirrored { (-x, y, z) } else { (x, y, z) };
        ROTATIONS[self.rotation](cell)
    }

    /// Whether this transform preserves handedness.
    pub fn is_proper(self) -> bool {
        !self.mirrored
    }
}

/// Generates all unique orientations of a shape.
///
/// Applies every transform of the group to the shape, normalizes each result
/// so the minimum coordinates are at the origin, and keeps the first
/// occurrence of each distinct set. Symmetric shapes produce fewer than
/// `symmetry.order()` orientations. Index 0 is always the shape itself.
pub fn orientations(shape: &VoxelSet, symmetry: Symmetry) -> Vec<VoxelSet> {
    let mut seen: FxHashSet<VoxelSet> = FxHashSet::default();
    let mut unique = Vec::new();

    for transform in symmetry.transforms() {
        let oriented = shape.mapped(|cell| transform.apply(cell)).normalized();
        if seen.insert(oriented.clone()) {
            unique.push(oriented);
        }
    }

    unique
}

/// A transform that maps the target volume onto itself, as a permutation of
/// lattice indices: cell `i` moves to cell `permutation[i]`.
#[derive(Clone, Debug)]
pub struct ContainerSymmetry {
    pub transform: Transform,
    pub permutation: Vec<usize>,
}

/// Finds the transforms of `symmetry` that leave the target volume unchanged.
///
/// The transformed target is re-normalized before comparison, so a box that
/// is not a cube keeps only the subgroup that preserves its proportions.
/// The identity always comes first.
pub fn container_symmetries(lattice: &Lattice, symmetry: Symmetry) -> Vec<ContainerSymmetry> {
    let target = lattice.target();

    symmetry
        .transforms()
        .filter_map(|transform| {
            let image = target.mapped(|cell| transform.apply(cell));
            let (mx, my, mz) = image.min_corner();
            if image.translated((-mx, -my, -mz)) != *target {
                return None;
            }

            let permutation = target
                .iter()
                .map(|cell| {
                    let (x, y, z) = transform.apply(cell);
                    lattice.index_of((x - mx, y - my, z - mz))
                })
                .collect::<Option<Vec<usize>>>()?;

            Some(ContainerSymmetry {
                transform,
                permutation,
            })
        })
        .collect()
}
