//! Exact-cover backtracking search over a placement universe.
//!
//! Key choices:
//! - Bitmask of empty cells, so fit tests are word ops
//! - Minimum-remaining-candidates cell selection: branch on the empty cell
//!   with the fewest placements that still fit, which also detects dead
//!   ends (a cell nothing can cover) as early as possible
//! - Explicit frame stack instead of recursion, so depth is bounded only by
//!   the number of pieces
//! - Commit/undo on a single mutable state rather than copying it per node

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::placement::PlacementUniverse;
use crate::voxel::CellMask;

/// How often (in nodes) the deadline is compared against the clock.
const DEADLINE_POLL_INTERVAL: u64 = 1024;

/// Per-branch search state: which cells are still empty, how many copies of
/// each piece are left and which placements have been chosen so far.
///
/// Owned by exactly one search; other workers get their own copy.
#[derive(Clone, Debug)]
pub struct SearchState<M> {
    empty: M,
    remaining: Vec<u32>,
    chosen: Vec<usize>,
}

impl<M: CellMask> SearchState<M> {
    /// The root state: every cell empty, every copy available.
    pub fn new(universe: &PlacementUniverse<M>) -> Self {
        Self {
            empty: universe.lattice().full_mask(),
            remaining: universe.multiplicities().to_vec(),
            chosen: Vec::new(),
        }
    }

    pub fn empty_cells(&self) -> &M {
        &self.empty
    }

    pub fn remaining(&self) -> &[u32] {
        &self.remaining
    }

    /// Placements chosen so far, in the order they were committed.
    pub fn chosen(&self) -> &[usize] {
        &self.chosen
    }

    pub fn depth(&self) -> usize {
        self.chosen.len()
    }

    /// Whether the placement's piece has a copy left and its cells are empty.
    #[inline]
    pub fn fits(&self, universe: &PlacementUniverse<M>, index: usize) -> bool {
        let placement = universe.placement(index);
        self.remaining[placement.piece] > 0 && placement.mask.is_subset(&self.empty)
    }

    /// Places a placement that [`fits`](Self::fits).
    #[inline]
    pub fn commit(&mut self, universe: &PlacementUniverse<M>, index: usize) {
        let placement = universe.placement(index);
        debug_assert!(self.fits(universe, index));
        self.empty.difference_with(&placement.mask);
        self.remaining[placement.piece] -= 1;
        self.chosen.push(index);
    }

    /// Reverts the most recent commit, returning the placement it removed.
    #[inline]
    pub fn undo(&mut self, universe: &PlacementUniverse<M>) -> Option<usize> {
        let index = self.chosen.pop()?;
        let placement = universe.placement(index);
        self.empty.union_with(&placement.mask);
        self.remaining[placement.piece] += 1;
        Some(index)
    }

    /// Every cell is filled and every piece copy is used.
    pub fn is_complete(&self) -> bool {
        self.empty.is_empty() && self.remaining.iter().all(|&left| left == 0)
    }
}

/// Result of choosing where to branch next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// The state is a complete solution.
    Solved,
    /// Some empty cell cannot be covered by any remaining placement.
    DeadEnd,
    /// Branch on the placements covering this lattice cell.
    Branch(usize),
}

/// Picks the empty cell with the fewest fitting placements.
///
/// Ties go to the lowest lattice index. Counting for a cell stops once it
/// can no longer beat the best cell seen so far.
pub fn select_cell<M: CellMask>(
    universe: &PlacementUniverse<M>,
    state: &SearchState<M>,
) -> Selection {
    if state.empty_cells().is_empty() {
        // cell counts were validated, so a full volume uses every copy
        return if state.is_complete() {
            Selection::Solved
        } else {
            Selection::DeadEnd
        };
    }

    let mut best: Option<(usize, usize)> = None;
    for cell in state.empty_cells().ones() {
        let limit = best.map_or(usize::MAX, |(_, count)| count);
        let mut count = 0;
        for &index in universe.covering(cell) {
            if state.fits(universe, index) {
                count += 1;
                if count >= limit {
                    break;
                }
            }
        }

        if count == 0 {
            return Selection::DeadEnd;
        }
        if count < limit {
            best = Some((cell, count));
            if count == 1 {
                break;
            }
        }
    }

    match best {
        Some((cell, _)) => Selection::Branch(cell),
        None => Selection::DeadEnd,
    }
}

/// What the search should do after reporting a solution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// How a search run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every branch was explored.
    Exhausted,
    /// The run was interrupted or a solution callback asked to stop.
    Stopped,
}

/// Counters accumulated by a search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Branching decisions made.
    pub nodes: u64,
    /// States where some cell had no fitting placement.
    pub dead_ends: u64,
    /// Complete covers found (before any deduplication).
    pub solutions: u64,
}

impl SearchStats {
    pub fn merge(&mut self, other: &SearchStats) {
        self.nodes += other.nodes;
        self.dead_ends += other.dead_ends;
        self.solutions += other.solutions;
    }
}

/// Cancellation shared by every worker of one solve.
///
/// `cancel` is the caller's handle; `halt` is raised internally once enough
/// solutions have been collected. Both are polled at every search step.
#[derive(Debug)]
pub struct Interrupt {
    cancel: Arc<AtomicBool>,
    halt: AtomicBool,
    deadline: Option<Instant>,
    timed_out: AtomicBool,
}

impl Interrupt {
    pub fn new(cancel: Arc<AtomicBool>, deadline: Option<Instant>) -> Self {
        Self {
            cancel,
            halt: AtomicBool::new(false),
            deadline,
            timed_out: AtomicBool::new(false),
        }
    }

    /// An interrupt that only stops when halted internally.
    pub fn never() -> Self {
        Self::new(Arc::new(AtomicBool::new(false)), None)
    }

    /// Stops all searches sharing this interrupt.
    pub fn halt(&self) {
        self.halt.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.halt.load(Ordering::Relaxed) || self.cancel.load(Ordering::Relaxed)
    }

    pub fn is_halted(&self) -> bool {
        self.halt.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Raises the interrupt if the deadline has passed.
    fn check_deadline(&self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.timed_out.store(true, Ordering::Relaxed);
                self.halt();
                true
            }
            _ => false,
        }
    }
}

/// One entry of the explicit search stack.
#[derive(Clone, Copy, Debug)]
struct Frame {
    /// Lattice cell being covered at this depth.
    cell: usize,
    /// Next position in the cell's covering list.
    next: usize,
    /// Whether a placement from this frame is currently committed.
    placed: bool,
}

/// A depth-first exact-cover search rooted at some [`SearchState`].
///
/// Placements committed before [`Search::run`] (for example a scheduler's
/// anchor placement) are part of every reported solution and are never
/// undone by the run.
pub struct Search<'u, M> {
    universe: &'u PlacementUniverse<M>,
    state: SearchState<M>,
    stats: SearchStats,
}

impl<'u, M: CellMask> Search<'u, M> {
    pub fn new(universe: &'u PlacementUniverse<M>) -> Self {
        Self::from_state(universe, SearchState::new(universe))
    }

    pub fn from_state(universe: &'u PlacementUniverse<M>, state: SearchState<M>) -> Self {
        Self {
            universe,
            state,
            stats: SearchStats::default(),
        }
    }

    pub fn state(&self) -> &SearchState<M> {
        &self.state
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Runs the search to completion or interruption.
    ///
    /// `on_solution` receives the chosen placement indices of each complete
    /// cover; returning [`Flow::Stop`] ends the run.
    pub fn run<F>(&mut self, interrupt: &Interrupt, mut on_solution: F) -> SearchOutcome
    where
        F: FnMut(&[usize]) -> Flow,
    {
        let universe = self.universe;
        let mut frames: Vec<Frame> = Vec::with_capacity(universe.num_pieces());

        'descend: loop {
            if interrupt.is_raised() {
                return SearchOutcome::Stopped;
            }
            self.stats.nodes += 1;
            if self.stats.nodes % DEADLINE_POLL_INTERVAL == 0 && interrupt.check_deadline() {
                return SearchOutcome::Stopped;
            }

            match select_cell(universe, &self.state) {
                Selection::Solved => {
                    self.stats.solutions += 1;
                    if on_solution(self.state.chosen()) == Flow::Stop {
                        return SearchOutcome::Stopped;
                    }
                }
                Selection::DeadEnd => self.stats.dead_ends += 1,
                Selection::Branch(cell) => frames.push(Frame {
                    cell,
                    next: 0,
                    placed: false,
                }),
            }

            // backtrack until some frame has an untried placement that fits
            while let Some(frame) = frames.last_mut() {
                if frame.placed {
                    self.state.undo(universe);
                    frame.placed = false;
                }

                let candidates = universe.covering(frame.cell);
                while frame.next < candidates.len() {
                    let index = candidates[frame.next];
                    frame.next += 1;
                    if self.state.fits(universe, index) {
                        self.state.commit(universe, index);
                        frame.placed = true;
                        continue 'descend;
                    }
                }

                frames.pop();
                if interrupt.is_raised() {
                    return SearchOutcome::Stopped;
                }
            }

            return SearchOutcome::Exhausted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::{Piece, Puzzle};
    use crate::voxel::VoxelSet;

    fn dominoes(dims: (i32, i32, i32), copies: u32) -> PlacementUniverse<u128> {
        let puzzle = Puzzle::new(
            "dominoes",
            VoxelSet::cuboid(dims.0, dims.1, dims.2),
            vec![Piece::new("domino", [(0, 0, 0), (1, 0, 0)]).with_multiplicity(copies)],
        );
        PlacementUniverse::build(&puzzle)
    }

    fn collect_all(universe: &PlacementUniverse<u128>) -> (Vec<Vec<usize>>, SearchOutcome) {
        let mut found = Vec::new();
        let outcome = Search::new(universe).run(&Interrupt::never(), |chosen| {
            found.push(chosen.to_vec());
            Flow::Continue
        });
        (found, outcome)
    }

    #[test]
    fn test_single_domino() {
        let universe = dominoes((1, 1, 2), 1);
        let (found, outcome) = collect_all(&universe);
        assert_eq!(outcome, SearchOutcome::Exhausted);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_domino_tilings_of_2x2x2() {
        let universe = dominoes((2, 2, 2), 4);
        let (found, _) = collect_all(&universe);
        assert_eq!(found.len(), 9, "A 2x2x2 cube has 9 domino tilings");

        for chosen in &found {
            let mut covered = 0u128;
            for &index in chosen {
                let mask = universe.placement(index).mask;
                assert_eq!(covered & mask, 0, "Placements overlap");
                covered |= mask;
            }
            assert_eq!(covered, 0xff);
        }
    }

    #[test]
    fn test_l_trominoes_cannot_tile_3x3() {
        let puzzle = Puzzle::new(
            "3x3",
            VoxelSet::cuboid(3, 3, 1),
            vec![Piece::new("L", [(0, 0, 0), (1, 0, 0), (0, 1, 0)]).with_multiplicity(3)],
        );
        let universe = PlacementUniverse::<u128>::build(&puzzle);
        let mut search = Search::new(&universe);
        let outcome = search.run(&Interrupt::never(), |_| Flow::Continue);

        assert_eq!(outcome, SearchOutcome::Exhausted);
        assert_eq!(search.stats().solutions, 0);
        assert!(search.stats().dead_ends > 0);
        assert_eq!(search.state().depth(), 0, "Search should unwind to its root");
    }

    #[test]
    fn test_flow_stop_ends_run() {
        let universe = dominoes((2, 2, 2), 4);
        let mut calls = 0;
        let outcome = Search::new(&universe).run(&Interrupt::never(), |_| {
            calls += 1;
            Flow::Stop
        });
        assert_eq!(outcome, SearchOutcome::Stopped);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_raised_interrupt_stops_before_searching() {
        let universe = dominoes((2, 2, 2), 4);
        let interrupt = Interrupt::new(Arc::new(AtomicBool::new(true)), None);
        let mut search = Search::new(&universe);
        let outcome = search.run(&interrupt, |_| Flow::Continue);
        assert_eq!(outcome, SearchOutcome::Stopped);
        assert_eq!(search.stats().solutions, 0);
        assert!(interrupt.is_cancelled());
        assert!(!interrupt.is_halted());
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let universe = dominoes((4, 4, 4), 32);
        let interrupt = Interrupt::new(Arc::new(AtomicBool::new(false)), Some(Instant::now()));
        let outcome = Search::new(&universe).run(&interrupt, |_| Flow::Continue);
        assert_eq!(outcome, SearchOutcome::Stopped);
        assert!(interrupt.timed_out());
    }

    #[test]
    fn test_commit_and_undo_restore_state() {
        let universe = dominoes((2, 2, 2), 4);
        let mut state = SearchState::new(&universe);
        let before = state.clone();

        let index = universe.covering(0)[0];
        assert!(state.fits(&universe, index));
        state.commit(&universe, index);
        assert_eq!(state.remaining(), &[3]);
        assert!(!state.fits(&universe, index), "Cells are now occupied");

        assert_eq!(state.undo(&universe), Some(index));
        assert_eq!(state.empty_cells(), before.empty_cells());
        assert_eq!(state.remaining(), before.remaining());
        assert_eq!(state.undo(&universe), None);
    }

    #[test]
    fn test_select_cell_prefers_constrained_cells() {
        // in a 1x1x3 column filled by a monocube and a domino, the middle
        // cell is covered by 3 placements and the ends by 2 each
        let puzzle = Puzzle::new(
            "column",
            VoxelSet::cuboid(1, 1, 3),
            vec![
                Piece::new("mono", [(0, 0, 0)]),
                Piece::new("domino", [(0, 0, 0), (1, 0, 0)]),
            ],
        );
        let universe = PlacementUniverse::<u128>::build(&puzzle);
        let mut state = SearchState::new(&universe);
        assert_eq!(select_cell(&universe, &state), Selection::Branch(0));

        // once the monocube sits in the middle, neither end can be covered
        let middle = universe
            .covering(1)
            .iter()
            .copied()
            .find(|&index| universe.placement(index).piece == 0)
            .unwrap();
        state.commit(&universe, middle);
        assert_eq!(select_cell(&universe, &state), Selection::DeadEnd);
    }
}
