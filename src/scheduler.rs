//! Parallel solve driver.
//!
//! The root of the search is split on one anchor cell: every placement that
//! covers it starts an independent subtree. Subtrees are queued on a rayon
//! pool; each worker owns its [`SearchState`] and shares only the read-only
//! placement universe, the solution collector and the interrupt.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::collector::{Canonicalizer, SolutionCollector};
use crate::error::Result;
use crate::pieces::Puzzle;
use crate::placement::PlacementUniverse;
use crate::solution::Solution;
use crate::solver::{select_cell, Interrupt, Search, SearchOutcome, SearchState, SearchStats, Selection};
use crate::voxel::{BitSet, CellMask, FIXED_MASK_CELLS};

/// Whether to stop at the first solution or enumerate them all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SolveMode {
    /// Return one solution (whichever worker finds one first).
    First,
    /// Explore the whole search tree.
    #[default]
    All,
}

/// Solver configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolveOptions {
    pub mode: SolveMode,
    /// Worker threads (0 = one per logical CPU).
    pub workers: usize,
    /// Merge solutions that are symmetric images of each other (All mode).
    pub canonicalize: bool,
    /// Stop once this many solutions are kept (All mode).
    pub max_solutions: Option<usize>,
    /// Stop searching after this long.
    pub time_limit: Option<Duration>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            mode: SolveMode::All,
            workers: 0,
            canonicalize: true,
            max_solutions: None,
            time_limit: None,
        }
    }
}

impl SolveOptions {
    pub fn first() -> Self {
        Self {
            mode: SolveMode::First,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_canonicalize(mut self, canonicalize: bool) -> Self {
        self.canonicalize = canonicalize;
        self
    }

    pub fn with_max_solutions(mut self, max_solutions: usize) -> Self {
        self.max_solutions = Some(max_solutions);
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }
}

/// Why a search ended before exploring every branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// First-solution mode found its solution.
    FirstSolution,
    /// `max_solutions` were collected.
    SolutionLimit,
    /// The caller raised the cancel handle.
    Cancelled,
    /// The time limit expired.
    TimeLimit,
}

/// Whether the reported solutions are all that exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    /// The whole tree was explored (apart from failed subtrees).
    Exhausted,
    Stopped(StopReason),
}

/// The outcome of a solve that passed validation.
#[derive(Clone, Debug)]
pub struct SolveReport {
    /// Kept solutions, sorted; at most one in first-solution mode.
    pub solutions: Vec<Solution>,
    pub status: SearchStatus,
    pub stats: SearchStats,
    /// Complete covers found before deduplication.
    pub raw_solutions: usize,
    /// Anchor subtrees the search was split into.
    pub subtrees: usize,
    /// Subtrees whose worker panicked; their branches were not fully explored.
    pub failed_subtrees: usize,
    pub elapsed: Duration,
}

impl SolveReport {
    pub fn first(&self) -> Option<&Solution> {
        self.solutions.first()
    }

    pub fn count(&self) -> usize {
        self.solutions.len()
    }

    /// The search completed and proved that no solution exists.
    pub fn is_unsolvable(&self) -> bool {
        self.status == SearchStatus::Exhausted && self.solutions.is_empty() && !self.is_degraded()
    }

    /// Some subtree was lost to a worker failure.
    pub fn is_degraded(&self) -> bool {
        self.failed_subtrees > 0
    }
}

/// Parallel exact-cover solver.
pub struct Solver {
    options: SolveOptions,
    cancelled: Arc<AtomicBool>,
    /// Anchor placement whose subtree panics, to exercise failure handling.
    #[cfg(test)]
    fail_anchor: Option<usize>,
}

impl Solver {
    pub fn new(options: SolveOptions) -> Self {
        Self {
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
            #[cfg(test)]
            fail_anchor: None,
        }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    /// Returns a handle to cancel a solve from another thread.
    ///
    /// Raising it stops the running solve, or the next one if none is
    /// running. The flag is cleared when a search finishes.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Validates the puzzle and searches it.
    ///
    /// Malformed puzzles return [`crate::Error::Config`] without searching.
    /// Everything else, including "no solution", is reported in the
    /// [`SolveReport`].
    pub fn solve(&self, puzzle: &Puzzle) -> Result<SolveReport> {
        puzzle.validate()?;

        info!(
            "Solving {}: {} cells, {} pieces ({} copies), mode {:?}",
            puzzle.name,
            puzzle.target.len(),
            puzzle.pieces.len(),
            puzzle.total_copies(),
            self.options.mode
        );

        let report = if puzzle.target.len() <= FIXED_MASK_CELLS {
            self.run::<u128>(puzzle)
        } else {
            self.run::<BitSet>(puzzle)
        };

        // a cancel only applies to the solve it interrupted
        self.cancelled.store(false, Ordering::Relaxed);
        report
    }

    #[cfg(test)]
    fn before_subtree(&self, anchor: usize) {
        if self.fail_anchor == Some(anchor) {
            panic!("subtree {anchor} failed");
        }
    }

    #[cfg(not(test))]
    #[inline(always)]
    fn before_subtree(&self, _anchor: usize) {}

    fn run<M: CellMask>(&self, puzzle: &Puzzle) -> Result<SolveReport> {
        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()?;

        let universe = PlacementUniverse::<M>::build(puzzle);
        let interrupt = Interrupt::new(
            self.cancelled.clone(),
            self.options.time_limit.map(|limit| start + limit),
        );

        let (capacity, stop_reason, canonicalizer) = match self.options.mode {
            SolveMode::First => (Some(1), StopReason::FirstSolution, None),
            SolveMode::All => (
                self.options.max_solutions,
                StopReason::SolutionLimit,
                self.options
                    .canonicalize
                    .then(|| Canonicalizer::new(puzzle, &universe)),
            ),
        };
        let collector =
            SolutionCollector::new(&universe, canonicalizer, capacity, stop_reason, &interrupt);

        let root = SearchState::new(&universe);
        let anchors = anchor_placements(&universe, &root);
        debug!(
            "Split into {} subtrees on {} worker threads",
            anchors.len(),
            pool.current_num_threads()
        );

        let stats = Mutex::new(SearchStats::default());
        let failed = AtomicUsize::new(0);
        let interrupted = AtomicBool::new(false);

        pool.install(|| {
            anchors.par_iter().with_max_len(1).for_each(|&anchor| {
                if interrupt.is_raised() {
                    interrupted.store(true, Ordering::Relaxed);
                    return;
                }

                let result = isolate(|| {
                    self.before_subtree(anchor);
                    let mut state = root.clone();
                    state.commit(&universe, anchor);
                    let mut search = Search::from_state(&universe, state);
                    let outcome = search.run(&interrupt, |chosen| collector.submit(chosen));
                    (outcome, search.stats())
                });

                match result {
                    Ok((outcome, subtree_stats)) => {
                        if outcome == SearchOutcome::Stopped {
                            interrupted.store(true, Ordering::Relaxed);
                        }
                        debug!(
                            "Subtree {anchor}: {} nodes, {} solutions",
                            subtree_stats.nodes, subtree_stats.solutions
                        );
                        stats
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .merge(&subtree_stats);
                    }
                    Err(message) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        error!("Worker for subtree {anchor} failed: {message}");
                    }
                }
            });
        });

        let collected = collector.finish();
        let status = match collected.stopped {
            Some(reason) => SearchStatus::Stopped(reason),
            None if !interrupted.load(Ordering::Relaxed) => SearchStatus::Exhausted,
            None if interrupt.timed_out() => SearchStatus::Stopped(StopReason::TimeLimit),
            None => SearchStatus::Stopped(StopReason::Cancelled),
        };

        let failed_subtrees = failed.load(Ordering::Relaxed);
        if failed_subtrees > 0 {
            warn!(
                "{failed_subtrees} of {} subtrees failed; results may be incomplete",
                anchors.len()
            );
        }
        if status == SearchStatus::Stopped(StopReason::TimeLimit) {
            warn!("Time limit reached before the search finished");
        }

        let report = SolveReport {
            solutions: collected.solutions,
            status,
            stats: stats.into_inner().unwrap_or_else(PoisonError::into_inner),
            raw_solutions: collected.raw,
            subtrees: anchors.len(),
            failed_subtrees,
            elapsed: start.elapsed(),
        };
        info!(
            "Found {} solutions ({} raw) in {:.2?}, status {:?}",
            report.count(),
            report.raw_solutions,
            report.elapsed,
            report.status
        );
        Ok(report)
    }
}

/// Solves a puzzle with the given options.
pub fn solve(puzzle: &Puzzle, options: &SolveOptions) -> Result<SolveReport> {
    Solver::new(options.clone()).solve(puzzle)
}

/// The placements covering the root's most constrained cell.
///
/// Together they partition the search: every solution contains exactly one
/// of them. Empty when some cell cannot be covered at all.
pub fn anchor_placements<M: CellMask>(
    universe: &PlacementUniverse<M>,
    root: &SearchState<M>,
) -> Vec<usize> {
    match select_cell(universe, root) {
        Selection::Branch(cell) => {
            debug!("Anchor cell {:?}", universe.lattice().cell(cell));
            universe
                .covering(cell)
                .iter()
                .copied()
                .filter(|&index| root.fits(universe, index))
                .collect()
        }
        Selection::Solved | Selection::DeadEnd => Vec::new(),
    }
}

/// Runs a worker task, turning a panic into an error message so it cannot
/// take down the rest of the pool.
fn isolate<T>(task: impl FnOnce() -> T) -> std::result::Result<T, String> {
    catch_unwind(AssertUnwindSafe(task)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pieces::{soma, Piece};
    use crate::voxel::VoxelSet;

    fn dominoes(dims: (i32, i32, i32), copies: u32) -> Puzzle {
        Puzzle::new(
            "dominoes",
            VoxelSet::cuboid(dims.0, dims.1, dims.2),
            vec![Piece::new("domino", [(0, 0, 0), (1, 0, 0)]).with_multiplicity(copies)],
        )
    }

    #[test]
    fn test_anchor_subtrees_partition_the_search() {
        let puzzle = dominoes((2, 2, 2), 4);
        let universe = PlacementUniverse::<u128>::build(&puzzle);
        let root = SearchState::new(&universe);
        let anchors = anchor_placements(&universe, &root);
        // every cell of a 2x2x2 cube is covered by 3 dominoes
        assert_eq!(anchors.len(), 3);

        let total: u64 = anchors
            .iter()
            .map(|&anchor| {
                let mut state = root.clone();
                state.commit(&universe, anchor);
                let mut search = Search::from_state(&universe, state);
                search.run(&Interrupt::never(), |_| crate::solver::Flow::Continue);
                search.stats().solutions
            })
            .sum();
        assert_eq!(total, 9);
    }

    #[test]
    fn test_raw_count_does_not_depend_on_workers() {
        for workers in [1, 2, 4] {
            let options = SolveOptions::all()
                .with_workers(workers)
                .with_canonicalize(false);
            let report = solve(&dominoes((2, 2, 2), 4), &options).unwrap();
            assert_eq!(report.count(), 9, "Wrong count with {workers} workers");
            assert_eq!(report.status, SearchStatus::Exhausted);
            assert_eq!(report.stats.solutions, 9);
        }
    }

    #[test]
    fn test_first_mode_returns_one_solution() {
        let puzzle = soma();
        let report = solve(&puzzle, &SolveOptions::first().with_workers(4)).unwrap();
        assert_eq!(report.count(), 1);
        assert_eq!(report.status, SearchStatus::Stopped(StopReason::FirstSolution));
        assert_eq!(report.first().unwrap().verify(&puzzle), Ok(()));
    }

    #[test]
    fn test_solution_limit() {
        let options = SolveOptions::all().with_max_solutions(5).with_workers(2);
        let report = solve(&soma(), &options).unwrap();
        assert_eq!(report.count(), 5);
        assert_eq!(report.status, SearchStatus::Stopped(StopReason::SolutionLimit));
    }

    #[test]
    fn test_cancel_handle_stops_the_search() {
        // 4x4x4 domino tilings are far too many to enumerate
        let solver = Solver::new(SolveOptions::all().with_workers(2).with_canonicalize(false));
        let handle = solver.cancel_handle();
        let puzzle = dominoes((4, 4, 4), 32);

        let report = std::thread::scope(|scope| {
            let running = scope.spawn(|| solver.solve(&puzzle));
            std::thread::sleep(Duration::from_millis(20));
            handle.store(true, Ordering::Relaxed);
            running.join().unwrap()
        })
        .unwrap();

        assert_eq!(report.status, SearchStatus::Stopped(StopReason::Cancelled));
        assert!(!report.is_unsolvable());
        assert!(!handle.load(Ordering::Relaxed), "Flag is cleared on return");
    }

    #[test]
    fn test_cancel_before_solve_is_kept() {
        let solver = Solver::new(SolveOptions::all().with_canonicalize(false));
        solver.cancel_handle().store(true, Ordering::Relaxed);

        let report = solver.solve(&dominoes((4, 4, 4), 32)).unwrap();
        assert_eq!(report.status, SearchStatus::Stopped(StopReason::Cancelled));

        // the next solve runs normally
        let report = solver.solve(&dominoes((2, 2, 2), 4)).unwrap();
        assert_eq!(report.status, SearchStatus::Exhausted);
        assert_eq!(report.count(), 9);
    }

    #[test]
    fn test_time_limit() {
        let options = SolveOptions::all()
            .with_canonicalize(false)
            .with_time_limit(Duration::from_millis(20));
        let report = solve(&dominoes((4, 4, 4), 32), &options).unwrap();
        assert_eq!(report.status, SearchStatus::Stopped(StopReason::TimeLimit));
    }

    #[test]
    fn test_isolate_catches_panics() {
        assert_eq!(isolate(|| 7), Ok(7));
        let failed: std::result::Result<(), String> = isolate(|| panic!("subtree exploded"));
        assert_eq!(failed, Err("subtree exploded".to_string()));
    }

    #[test]
    fn test_limit_equal_to_total_is_exhausted() {
        let puzzle = dominoes((2, 2, 2), 4);
        let report = solve(&puzzle, &SolveOptions::all().with_canonicalize(false).with_max_solutions(9))
            .unwrap();
        assert_eq!(report.count(), 9);
        assert_eq!(report.status, SearchStatus::Exhausted);

        let report = solve(&puzzle, &SolveOptions::all().with_canonicalize(false).with_max_solutions(8))
            .unwrap();
        assert_eq!(report.count(), 8);
        assert_eq!(report.status, SearchStatus::Stopped(StopReason::SolutionLimit));
    }

    fn first_anchor(puzzle: &Puzzle) -> usize {
        let universe = PlacementUniverse::<u128>::build(puzzle);
        anchor_placements(&universe, &SearchState::new(&universe))[0]
    }

    #[test]
    fn test_failed_subtree_degrades_the_report() {
        let puzzle = dominoes((2, 2, 2), 4);
        let mut solver = Solver::new(SolveOptions::all().with_workers(2).with_canonicalize(false));
        solver.fail_anchor = Some(first_anchor(&puzzle));

        let report = solver.solve(&puzzle).unwrap();
        assert_eq!(report.subtrees, 3);
        assert_eq!(report.failed_subtrees, 1);
        assert!(report.is_degraded());
        // the other two anchors each contribute 3 tilings
        assert_eq!(report.count(), 6);
        assert_eq!(report.status, SearchStatus::Exhausted);
        for solution in &report.solutions {
            assert_eq!(solution.verify(&puzzle), Ok(()));
        }
    }

    #[test]
    fn test_degraded_search_is_not_unsolvable() {
        let puzzle = Puzzle::new(
            "3x3",
            VoxelSet::cuboid(3, 3, 1),
            vec![Piece::new("L", [(0, 0, 0), (1, 0, 0), (0, 1, 0)]).with_multiplicity(3)],
        );
        let mut solver = Solver::new(SolveOptions::all());
        assert!(solver.solve(&puzzle).unwrap().is_unsolvable());

        solver.fail_anchor = Some(first_anchor(&puzzle));
        let report = solver.solve(&puzzle).unwrap();
        assert!(report.solutions.is_empty());
        assert!(report.is_degraded());
        assert!(!report.is_unsolvable());
    }

    #[test]
    fn test_sparse_target_is_rejected_before_indexing() {
        let puzzle = Puzzle::new(
            "far apart",
            VoxelSet::new([(0, 0, 0), (2000, 2000, 2000)]),
            vec![Piece::new("mono", [(0, 0, 0)]).with_multiplicity(2)],
        );
        let result = solve(&puzzle, &SolveOptions::all());
        assert!(matches!(
            result,
            Err(crate::Error::Config(crate::ConfigError::TargetTooLarge { .. }))
        ));
    }

    #[test]
    fn test_config_errors_skip_the_search() {
        let result = solve(&dominoes((2, 2, 2), 3), &SolveOptions::all());
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}
