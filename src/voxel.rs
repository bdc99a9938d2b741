//! Integer lattice cells, voxel sets and bitmask cell sets.
//!
//! A [`VoxelSet`] is the structural form of a shape (piece, target or
//! footprint). Once a target volume is fixed, a [`Lattice`] numbers its cells
//! so footprints can be stored as [`CellMask`] bitmasks: `u128` when the
//! target has at most [`FIXED_MASK_CELLS`] cells, [`BitSet`] otherwise.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;

use rustc_hash::FxHashSet;

/// A unit cube position in 3D space.
pub type Cell = (i32, i32, i32);

/// Largest target volume that uses the fixed-width `u128` mask.
pub const FIXED_MASK_CELLS: usize = 128;

/// Largest bounding box a [`Lattice`] will index.
pub const MAX_LATTICE_SLOTS: usize = 1 << 22;

/// The six face-adjacent neighbor offsets.
const FACE_NEIGHBORS: [Cell; 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// A finite set of lattice cells.
///
/// Cells are kept sorted and deduplicated, so equality, hashing and ordering
/// are structural. Construction does not translate; call
/// [`VoxelSet::normalized`] to move the minimum corner to the origin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelSet {
    cells: Vec<Cell>,
}

impl VoxelSet {
    /// Builds a set from any sequence of cells, dropping duplicates.
    pub fn new(cells: impl IntoIterator<Item = Cell>) -> Self {
        let mut cells: Vec<Cell> = cells.into_iter().collect();
        cells.sort_unstable();
        cells.dedup();
        Self { cells }
    }

    /// A solid `dx` x `dy` x `dz` box with its minimum corner at the origin.
    pub fn cuboid(dx: i32, dy: i32, dz: i32) -> Self {
        let mut cells = Vec::with_capacity((dx.max(0) * dy.max(0) * dz.max(0)) as usize);
        for x in 0..dx {
            for y in 0..dy {
                for z in 0..dz {
                    cells.push((x, y, z));
                }
            }
        }
        Self { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.binary_search(&cell).is_ok()
    }

    /// The per-axis minimum, or the origin for an empty set.
    pub fn min_corner(&self) -> Cell {
        let Some(&first) = self.cells.first() else {
            return (0, 0, 0);
        };
        self.cells.iter().fold(first, |(mx, my, mz), &(x, y, z)| {
            (mx.min(x), my.min(y), mz.min(z))
        })
    }

    /// The per-axis maximum, or the origin for an empty set.
    pub fn max_corner(&self) -> Cell {
        let Some(&first) = self.cells.first() else {
            return (0, 0, 0);
        };
        self.cells.iter().fold(first, |(mx, my, mz), &(x, y, z)| {
            (mx.max(x), my.max(y), mz.max(z))
        })
    }

    /// Bounding box extent along each axis (0 for an empty set).
    pub fn dims(&self) -> Cell {
        if self.cells.is_empty() {
            return (0, 0, 0);
        }
        let (lx, ly, lz) = self.min_corner();
        let (hx, hy, hz) = self.max_corner();
        (hx - lx + 1, hy - ly + 1, hz - lz + 1)
    }

    /// Number of cells in the bounding box, `None` if it overflows `usize`.
    pub fn bounding_volume(&self) -> Option<usize> {
        if self.cells.is_empty() {
            return Some(0);
        }
        let (lx, ly, lz) = self.min_corner();
        let (hx, hy, hz) = self.max_corner();
        let extent = |low: i32, high: i32| {
            usize::try_from(i64::from(high) - i64::from(low) + 1).ok()
        };
        extent(lx, hx)?
            .checked_mul(extent(ly, hy)?)?
            .checked_mul(extent(lz, hz)?)
    }

    /// Translates the set so the minimum x, y, z values are all zero.
    pub fn normalized(&self) -> Self {
        let (mx, my, mz) = self.min_corner();
        self.translated((-mx, -my, -mz))
    }

    pub fn is_normalized(&self) -> bool {
        self.min_corner() == (0, 0, 0)
    }

    pub fn translated(&self, (dx, dy, dz): Cell) -> Self {
        // translation preserves the sort order
        Self {
            cells: self
                .cells
                .iter()
                .map(|&(x, y, z)| (x + dx, y + dy, z + dz))
                .collect(),
        }
    }

    /// Applies a point transform to every cell.
    pub fn mapped(&self, transform: impl Fn(Cell) -> Cell) -> Self {
        Self::new(self.cells.iter().map(|&cell| transform(cell)))
    }

    pub fn union(&self, other: &Self) -> Self {
        Self::new(self.iter().chain(other.iter()))
    }

    pub fn difference(&self, other: &Self) -> Self {
        Self {
            cells: self.iter().filter(|&cell| !other.contains(cell)).collect(),
        }
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().all(|cell| !large.contains(cell))
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.iter().all(|cell| other.contains(cell))
    }

    /// Whether every cell is reachable from every other through shared faces.
    pub fn is_connected(&self) -> bool {
        let Some(&start) = self.cells.first() else {
            return true;
        };
        let mut seen: FxHashSet<Cell> = FxHashSet::default();
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some((x, y, z)) = queue.pop_front() {
            for (dx, dy, dz) in FACE_NEIGHBORS {
                let neighbor = (x + dx, y + dy, z + dz);
                if self.contains(neighbor) && seen.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        seen.len() == self.cells.len()
    }
}

impl FromIterator<Cell> for VoxelSet {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// A set of lattice indices, sized for one target volume.
///
/// Every operation on the `u128` form is a single word op; [`BitSet`]
/// operations are linear in the number of 64-bit words.
pub trait CellMask: Clone + Debug + Eq + Ord + Hash + Send + Sync {
    /// An empty mask able to hold indices `0..len`.
    fn empty(len: usize) -> Self;

    /// A mask with every index in `0..len` set.
    fn full(len: usize) -> Self {
        let mut mask = Self::empty(len);
        for index in 0..len {
            mask.insert(index);
        }
        mask
    }

    fn insert(&mut self, index: usize);
    fn contains(&self, index: usize) -> bool;
    fn is_empty(&self) -> bool;
    fn count(&self) -> usize;
    fn is_subset(&self, other: &Self) -> bool;
    fn is_disjoint(&self, other: &Self) -> bool;
    fn union_with(&mut self, other: &Self);
    fn difference_with(&mut self, other: &Self);

    /// Set indices in increasing order.
    fn ones(&self) -> impl Iterator<Item = usize> + '_;
}

/// Iterates the set bits of a single word, lowest first.
struct WordOnes(u128);

impl Iterator for WordOnes {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let index = self.0.trailing_zeros() as usize;
        // clear the lowest set bit
        self.0 &= self.0 - 1;
        Some(index)
    }
}

impl CellMask for u128 {
    #[inline]
    fn empty(len: usize) -> Self {
        debug_assert!(len <= FIXED_MASK_CELLS);
        0
    }

    #[inline]
    fn full(len: usize) -> Self {
        if len >= FIXED_MASK_CELLS {
            u128::MAX
        } else {
            (1u128 << len) - 1
        }
    }

    #[inline]
    fn insert(&mut self, index: usize) {
        *self |= 1u128 << index;
    }

    #[inline]
    fn contains(&self, index: usize) -> bool {
        (*self >> index) & 1 == 1
    }

    #[inline]
    fn is_empty(&self) -> bool {
        *self == 0
    }

    #[inline]
    fn count(&self) -> usize {
        self.count_ones() as usize
    }

    #[inline]
    fn is_subset(&self, other: &Self) -> bool {
        self & !other == 0
    }

    #[inline]
    fn is_disjoint(&self, other: &Self) -> bool {
        self & other == 0
    }

    #[inline]
    fn union_with(&mut self, other: &Self) {
        *self |= other;
    }

    #[inline]
    fn difference_with(&mut self, other: &Self) {
        *self &= !other;
    }

    fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        WordOnes(*self)
    }
}

/// Heap-allocated bitset for target volumes beyond [`FIXED_MASK_CELLS`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BitSet {
    words: Box<[u64]>,
}

impl CellMask for BitSet {
    fn empty(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(64)].into_boxed_slice(),
        }
    }

    #[inline]
    fn insert(&mut self, index: usize) {
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    #[inline]
    fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|word| (word >> (index % 64)) & 1 == 1)
    }

    fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    fn is_subset(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & !b == 0)
    }

    fn is_disjoint(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == 0)
    }

    fn union_with(&mut self, other: &Self) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
    }

    fn difference_with(&mut self, other: &Self) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a &= !b;
        }
    }

    fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                WordOnes(word as u128).map(move |bit| word_index * 64 + bit)
            })
    }
}

/// Index table for the cells of one target volume.
///
/// Indices follow the sorted cell order, which is x-major
/// (`x`, then `y`, then `z`), so a full box numbers its cells as
/// `x * dy * dz + y * dz + z`.
#[derive(Clone, Debug)]
pub struct Lattice {
    target: VoxelSet,
    dims: Cell,
    /// Dense bounding-box table: slot -> index into `target.cells()`.
    slots: Vec<Option<u32>>,
}

impl Lattice {
    /// Builds the table for a target volume, normalizing it first.
    ///
    /// The table covers the whole bounding box, so targets are expected to
    /// have passed [`Puzzle::validate`](crate::pieces::Puzzle::validate),
    /// which caps its volume at [`MAX_LATTICE_SLOTS`].
    pub fn new(target: &VoxelSet) -> Self {
        let target = target.normalized();
        let dims = target.dims();
        let volume = target.bounding_volume().unwrap_or(0).min(MAX_LATTICE_SLOTS);
        let mut slots = vec![None; volume];
        for (index, &(x, y, z)) in target.cells().iter().enumerate() {
            if let Some(slot) = slots.get_mut(Self::slot(dims, x, y, z)) {
                *slot = Some(index as u32);
            }
        }
        Self {
            target,
            dims,
            slots,
        }
    }

    /// Bounding-box slot of an in-bounds cell.
    #[inline(always)]
    fn slot((_, dy, dz): Cell, x: i32, y: i32, z: i32) -> usize {
        (x as usize * dy as usize + y as usize) * dz as usize + z as usize
    }

    /// The normalized target volume.
    pub fn target(&self) -> &VoxelSet {
        &self.target
    }

    pub fn dims(&self) -> Cell {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Whether the cell lies inside the target's bounding box.
    #[inline]
    pub fn in_bounds(&self, (x, y, z): Cell) -> bool {
        (0..self.dims.0).contains(&x) && (0..self.dims.1).contains(&y) && (0..self.dims.2).contains(&z)
    }

    #[inline]
    pub fn index_of(&self, cell: Cell) -> Option<usize> {
        if !self.in_bounds(cell) {
            return None;
        }
        let (x, y, z) = cell;
        self.slots
            .get(Self::slot(self.dims, x, y, z))
            .copied()
            .flatten()
            .map(|index| index as usize)
    }

    #[inline]
    pub fn cell(&self, index: usize) -> Cell {
        self.target.cells()[index]
    }

    /// The mask of a set of cells, or `None` if any cell is outside the target.
    pub fn mask_of<M: CellMask>(&self, cells: impl IntoIterator<Item = Cell>) -> Option<M> {
        let mut mask = M::empty(self.len());
        for cell in cells {
            mask.insert(self.index_of(cell)?);
        }
        Some(mask)
    }

    pub fn cells_of<M: CellMask>(&self, mask: &M) -> VoxelSet {
        VoxelSet {
            cells: mask.ones().map(|index| self.cell(index)).collect(),
        }
    }

    pub fn full_mask<M: CellMask>(&self) -> M {
        M::full(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sorts_and_dedups() {
        let set = VoxelSet::new([(1, 0, 0), (0, 0, 0), (1, 0, 0)]);
        assert_eq!(set.cells(), &[(0, 0, 0), (1, 0, 0)]);
    }

    #[test]
    fn test_normalized_moves_min_corner_to_origin() {
        let set = VoxelSet::new([(3, -1, 2), (4, -1, 2), (3, 0, 5)]);
        let normalized = set.normalized();
        assert!(normalized.is_normalized());
        assert_eq!(normalized.cells(), &[(0, 0, 0), (0, 1, 3), (1, 0, 0)]);
        assert_eq!(normalized.dims(), (2, 2, 4));
    }

    #[test]
    fn test_structural_equality_ignores_input_order() {
        let a = VoxelSet::new([(0, 0, 0), (0, 1, 0), (1, 0, 0)]);
        let b = VoxelSet::new([(1, 0, 0), (0, 0, 0), (0, 1, 0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_set_operations() {
        let a = VoxelSet::cuboid(2, 1, 1);
        let b = VoxelSet::new([(1, 0, 0), (2, 0, 0)]);
        let c = VoxelSet::new([(5, 5, 5)]);

        assert_eq!(a.union(&b), VoxelSet::cuboid(3, 1, 1));
        assert_eq!(a.difference(&b), VoxelSet::new([(0, 0, 0)]));
        assert!(!a.is_disjoint(&b));
        assert!(a.is_disjoint(&c));
        assert!(VoxelSet::new([(1, 0, 0)]).is_subset(&a));
        assert!(!b.is_subset(&a));
    }

    #[test]
    fn test_connectivity() {
        let l_tromino = VoxelSet::new([(0, 0, 0), (1, 0, 0), (0, 1, 0)]);
        let diagonal = VoxelSet::new([(0, 0, 0), (1, 1, 0)]);
        assert!(l_tromino.is_connected());
        assert!(!diagonal.is_connected(), "Edge contact is not face contact");
    }

    #[test]
    fn test_lattice_index_roundtrip_4x4x4() {
        let lattice = Lattice::new(&VoxelSet::cuboid(4, 4, 4));
        for index in 0..64 {
            let (x, y, z) = lattice.cell(index);
            assert_eq!(
                index,
                (x * 16 + y * 4 + z) as usize,
                "Box lattices should be x-major"
            );
            assert_eq!(lattice.index_of((x, y, z)), Some(index));
        }
        assert_eq!(lattice.index_of((4, 0, 0)), None);
        assert_eq!(lattice.index_of((-1, 0, 0)), None);
    }

    #[test]
    fn test_lattice_skips_holes() {
        // an L-shaped target: the bounding box slot (1, 1, 0) is not part of it
        let target = VoxelSet::new([(0, 0, 0), (1, 0, 0), (0, 1, 0)]);
        let lattice = Lattice::new(&target);
        assert_eq!(lattice.len(), 3);
        assert!(lattice.in_bounds((1, 1, 0)));
        assert_eq!(lattice.index_of((1, 1, 0)), None);
        assert_eq!(lattice.mask_of::<u128>([(1, 1, 0)]), None);
    }

    #[test]
    fn test_u128_and_bitset_agree() {
        let lattice = Lattice::new(&VoxelSet::cuboid(4, 4, 4));
        let cells_a = [(0, 0, 0), (1, 2, 3), (3, 3, 3)];
        let cells_b = [(1, 2, 3), (2, 2, 2)];

        let small_a: u128 = lattice.mask_of(cells_a).unwrap();
        let small_b: u128 = lattice.mask_of(cells_b).unwrap();
        let big_a: BitSet = lattice.mask_of(cells_a).unwrap();
        let big_b: BitSet = lattice.mask_of(cells_b).unwrap();

        assert_eq!(small_a.ones().collect::<Vec<_>>(), big_a.ones().collect::<Vec<_>>());
        assert_eq!(small_a.is_disjoint(&small_b), big_a.is_disjoint(&big_b));

        let mut small = small_a;
        small.union_with(&small_b);
        let mut big = big_a.clone();
        big.union_with(&big_b);
        assert_eq!(small.count(), 4);
        assert_eq!(big.count(), 4);

        small.difference_with(&small_a);
        big.difference_with(&big_a);
        assert_eq!(small.ones().collect::<Vec<_>>(), big.ones().collect::<Vec<_>>());
        assert!(big.is_subset(&big_b));
        assert_eq!(lattice.cells_of(&big), VoxelSet::new([(2, 2, 2)]));
    }

    #[test]
    fn test_bounding_volume() {
        assert_eq!(VoxelSet::cuboid(2, 3, 4).bounding_volume(), Some(24));
        assert_eq!(VoxelSet::default().bounding_volume(), Some(0));
        let spread = VoxelSet::new([(0, 0, 0), (2000, 2000, 2000)]);
        assert_eq!(spread.bounding_volume(), Some(2001 * 2001 * 2001));
    }

    #[test]
    fn test_full_masks() {
        assert_eq!(<u128 as CellMask>::full(128), u128::MAX);
        assert_eq!(<u128 as CellMask>::full(3), 0b111);
        let big = BitSet::full(130);
        assert_eq!(big.count(), 130);
        assert!(big.contains(129));
        assert!(!big.contains(130));
    }
}
