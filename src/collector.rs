//! Thread-safe collection and canonicalization of solutions.
//!
//! Workers hand every complete cover to a shared [`SolutionCollector`]. When
//! canonicalization is on, each cover is reduced to the smallest of its images
//! under the container's symmetries, so symmetric duplicates are kept once.

use std::sync::{Mutex, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::geometry::{container_symmetries, ContainerSymmetry};
use crate::pieces::{PieceId, Puzzle};
use crate::placement::PlacementUniverse;
use crate::scheduler::StopReason;
use crate::solution::Solution;
use crate::solver::{Flow, Interrupt};
use crate::voxel::CellMask;

/// Maps solutions to a canonical representative under container symmetry.
pub struct Canonicalizer<M> {
    symmetries: Vec<ContainerSymmetry>,
    /// (piece, footprint) -> placement index
    lookup: FxHashMap<(PieceId, M), usize>,
    /// The piece each piece becomes under an improper transform.
    mirror: Vec<PieceId>,
}

impl<M: CellMask> Canonicalizer<M> {
    pub fn new(puzzle: &Puzzle, universe: &PlacementUniverse<M>) -> Self {
        let lookup = universe
            .placements()
            .iter()
            .enumerate()
            .map(|(index, placement)| ((placement.piece, placement.mask.clone()), index))
            .collect();

        Self {
            symmetries: container_symmetries(universe.lattice(), puzzle.container_symmetry),
            lookup,
            mirror: (0..puzzle.pieces.len())
                .map(|piece| puzzle.mirror_of(piece))
                .collect(),
        }
    }

    pub fn num_symmetries(&self) -> usize {
        self.symmetries.len()
    }

    /// Returns the placement indices of the canonical image of a cover,
    /// sorted by piece and footprint.
    ///
    /// An image only counts if every transformed footprint is itself a legal
    /// placement, which rules out mirroring chiral pieces that have no
    /// mirror partner.
    pub fn canonicalize(&self, universe: &PlacementUniverse<M>, chosen: &[usize]) -> Vec<usize> {
        let mut best: Option<Vec<(PieceId, M, usize)>> = None;

        for symmetry in &self.symmetries {
            let Some(mut image) = self.image(universe, symmetry, chosen) else {
                continue;
            };
            image.sort_unstable();
            if best.as_ref().map_or(true, |current| image < *current) {
                best = Some(image);
            }
        }

        match best {
            Some(image) => image.into_iter().map(|(_, _, index)| index).collect(),
            // the identity image always exists, this only guards an empty group
            None => {
                let mut sorted = chosen.to_vec();
                sorted.sort_unstable();
                sorted
            }
        }
    }

    fn image(
        &self,
        universe: &PlacementUniverse<M>,
        symmetry: &ContainerSymmetry,
        chosen: &[usize],
    ) -> Option<Vec<(PieceId, M, usize)>> {
        let cells = universe.lattice().len();
        chosen
            .iter()
            .map(|&index| {
                let placement = universe.placement(index);
                let piece = if symmetry.transform.is_proper() {
                    placement.piece
                } else {
                    self.mirror[placement.piece]
                };

                let mut mask = M::empty(cells);
                for cell in placement.mask.ones() {
                    mask.insert(symmetry.permutation[cell]);
                }

                let key = (piece, mask);
                let image_index = *self.lookup.get(&key)?;
                let (piece, mask) = key;
                Some((piece, mask, image_index))
            })
            .collect()
    }
}

/// Everything a collector gathered during one solve.
#[derive(Debug, Default)]
pub struct Collected {
    /// Kept solutions, sorted.
    pub solutions: Vec<Solution>,
    /// Complete covers submitted, including symmetric duplicates.
    pub raw: usize,
    /// Set when the collector itself stopped the search.
    pub stopped: Option<StopReason>,
}

struct CollectorState {
    seen: FxHashSet<Vec<usize>>,
    solutions: Vec<Solution>,
    raw: usize,
    stopped: Option<StopReason>,
}

/// Append-only sink shared by all workers of a solve.
///
/// At most `capacity` solutions are kept. The shared interrupt is raised
/// when a further distinct solution arrives, or as soon as the first one is
/// kept in first-solution mode, so every worker unwinds.
pub struct SolutionCollector<'u, M> {
    universe: &'u PlacementUniverse<M>,
    canonicalizer: Option<Canonicalizer<M>>,
    capacity: Option<usize>,
    stop_reason: StopReason,
    interrupt: &'u Interrupt,
    state: Mutex<CollectorState>,
}

impl<'u, M: CellMask> SolutionCollector<'u, M> {
    /// A collector that keeps at most `capacity` solutions, reporting
    /// `stop_reason` when it fills up.
    pub fn new(
        universe: &'u PlacementUniverse<M>,
        canonicalizer: Option<Canonicalizer<M>>,
        capacity: Option<usize>,
        stop_reason: StopReason,
        interrupt: &'u Interrupt,
    ) -> Self {
        Self {
            universe,
            canonicalizer,
            capacity,
            stop_reason,
            interrupt,
            state: Mutex::new(CollectorState {
                seen: FxHashSet::default(),
                solutions: Vec::new(),
                raw: 0,
                stopped: None,
            }),
        }
    }

    /// Records a complete cover given as placement indices.
    pub fn submit(&self, chosen: &[usize]) -> Flow {
        // canonicalize outside the lock, it is the expensive part
        let canonical = self
            .canonicalizer
            .as_ref()
            .map(|canonicalizer| canonicalizer.canonicalize(self.universe, chosen));

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.raw += 1;
        if state.stopped.is_some() {
            return Flow::Stop;
        }

        if canonical.as_ref().is_some_and(|key| state.seen.contains(key)) {
            return Flow::Continue;
        }

        let full = |state: &CollectorState| {
            self.capacity
                .is_some_and(|capacity| state.solutions.len() >= capacity)
        };
        // a distinct solution past the limit proves the search was cut short
        if full(&state) {
            return self.stop(&mut state);
        }

        let solution = match canonical {
            Some(key) => {
                let solution = Solution::from_indices(self.universe, &key);
                state.seen.insert(key);
                solution
            }
            None => Solution::from_indices(self.universe, chosen),
        };
        state.solutions.push(solution);

        if self.stop_reason == StopReason::FirstSolution && full(&state) {
            return self.stop(&mut state);
        }
        Flow::Continue
    }

    fn stop(&self, state: &mut CollectorState) -> Flow {
        state.stopped = Some(self.stop_reason);
        self.interrupt.halt();
        Flow::Stop
    }

    /// Number of solutions kept so far.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .solutions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn finish(self) -> Collected {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let mut solutions = state.solutions;
        solutions.sort();
        Collected {
            solutions,
            raw: state.raw,
            stopped: state.stopped,
        }
    }
}
