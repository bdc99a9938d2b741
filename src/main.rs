//! Polycube Packing Solver
//!
//! Fills a 3D target volume with a set of polycube pieces and reports every
//! distinct solution. Puzzles come from a definition file or one of the
//! built-in sets (Soma cube, Bedlam cube).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use polypack::geometry::container_symmetries;
use polypack::placement::PlacementUniverse;
use polypack::voxel::{BitSet, CellMask, Lattice, FIXED_MASK_CELLS};
use polypack::{
    format_solution, persistence, pieces, puzzle_file, Puzzle, SearchStatus, SolveOptions, Solver,
};

/// Solves polycube packing puzzles.
#[derive(Parser)]
#[command(name = "polypack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Puzzle definition file.
    #[arg(long, global = true, value_name = "FILE")]
    puzzle: Option<PathBuf>,
    /// Built-in puzzle, used when no file is given.
    #[arg(long, global = true, value_enum)]
    builtin: Option<Builtin>,
    /// Log search progress.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Builtin {
    Soma,
    Bedlam,
}

#[derive(Subcommand)]
enum Command {
    /// Search for solutions.
    Solve(SolveArgs),
    /// Describe the puzzle and its placement counts.
    Info,
    /// Show the number of saved solutions.
    Count {
        /// Path of the saved solutions without extension.
        stem: PathBuf,
    },
    /// Print a saved solution.
    Show {
        stem: PathBuf,
        /// 1-based solution number.
        #[arg(long, default_value_t = 1)]
        index: usize,
    },
}

#[derive(clap::Args, Default)]
struct SolveArgs {
    /// Enumerate every solution instead of stopping at the first.
    #[arg(long)]
    all: bool,
    /// Worker threads (0 = one per CPU).
    #[arg(long, default_value_t = 0)]
    workers: usize,
    /// Keep symmetric duplicates.
    #[arg(long)]
    raw: bool,
    /// Stop after this many solutions.
    #[arg(long)]
    limit: Option<usize>,
    /// Stop after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    time_limit: Option<f64>,
    /// Write `<STEM>.txt` and `<STEM>.bin`.
    #[arg(long, value_name = "STEM")]
    save: Option<PathBuf>,
    /// Print every solution.
    #[arg(long)]
    print: bool,
}

impl SolveArgs {
    fn options(&self) -> anyhow::Result<SolveOptions> {
        let mut options = if self.all || self.limit.is_some() {
            SolveOptions::all()
        } else {
            SolveOptions::first()
        };
        options = options
            .with_workers(self.workers)
            .with_canonicalize(!self.raw);
        if let Some(limit) = self.limit {
            options = options.with_max_solutions(limit);
        }
        if let Some(seconds) = self.time_limit {
            if !seconds.is_finite() || seconds < 0.0 {
                bail!("Invalid time limit {seconds}");
            }
            options = options.with_time_limit(Duration::from_secs_f64(seconds));
        }
        Ok(options)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let puzzle = load_puzzle(&cli)?;
    match cli.command {
        Some(Command::Solve(args)) => run_solver(&puzzle, &args),
        Some(Command::Info) => run_info(&puzzle),
        Some(Command::Count { stem }) => run_count(&stem),
        Some(Command::Show { stem, index }) => run_show(&puzzle, &stem, index),
        None => {
            // default: enumerate all distinct solutions
            let args = SolveArgs {
                all: true,
                ..SolveArgs::default()
            };
            run_solver(&puzzle, &args)
        }
    }
}

fn load_puzzle(cli: &Cli) -> anyhow::Result<Puzzle> {
    match (&cli.puzzle, cli.builtin) {
        (Some(_), Some(_)) => bail!("Use either --puzzle or --builtin, not both"),
        (Some(path), None) => puzzle_file::load(path)
            .with_context(|| format!("Failed to load puzzle from {}", path.display())),
        (None, Some(Builtin::Bedlam)) => Ok(pieces::bedlam()),
        (None, Some(Builtin::Soma) | None) => Ok(pieces::soma()),
    }
}

/// Solves the puzzle, then prints and saves the solutions as requested.
fn run_solver(puzzle: &Puzzle, args: &SolveArgs) -> anyhow::Result<()> {
    let solver = Solver::new(args.options()?);
    let report = solver.solve(puzzle)?;

    match report.status {
        SearchStatus::Exhausted if report.is_unsolvable() => {
            println!("{}: no solution exists", puzzle.name)
        }
        SearchStatus::Exhausted => println!("{}: {} solutions", puzzle.name, report.count()),
        SearchStatus::Stopped(reason) => println!(
            "{}: {} solutions (stopped: {reason:?})",
            puzzle.name,
            report.count()
        ),
    }
    if report.is_degraded() {
        println!(
            "Warning: {} of {} subtrees failed, results are incomplete",
            report.failed_subtrees, report.subtrees
        );
    }
    info!(
        "{} nodes, {} dead ends, {} raw solutions",
        report.stats.nodes, report.stats.dead_ends, report.raw_solutions
    );

    if args.print {
        for (i, solution) in report.solutions.iter().enumerate() {
            println!("\nSolution {}:", i + 1);
            print!("{}", format_solution(puzzle, solution));
        }
    }

    if let Some(stem) = &args.save {
        persistence::save(stem, puzzle, &report.solutions)
            .with_context(|| format!("Failed to save solutions to {}", stem.display()))?;
        println!("Wrote {0}.txt and {0}.bin", stem.display());
    }

    Ok(())
}

/// Prints the puzzle summary.
fn run_info(puzzle: &Puzzle) -> anyhow::Result<()> {
    print!("{}", describe(puzzle)?);
    Ok(())
}

/// Summary of a puzzle's target and per-piece placement statistics.
fn describe(puzzle: &Puzzle) -> anyhow::Result<String> {
    puzzle.validate()?;

    let mut out = String::new();
    let (dx, dy, dz) = puzzle.target.dims();
    writeln!(out, "{}", puzzle.name)?;
    writeln!(
        out,
        "Target: {} cells in a {dx}x{dy}x{dz} box, container symmetry {:?} ({} transforms)",
        puzzle.target.len(),
        puzzle.container_symmetry,
        container_symmetries(&Lattice::new(&puzzle.target), puzzle.container_symmetry).len()
    )?;

    let placements = if puzzle.target.len() <= FIXED_MASK_CELLS {
        placement_counts::<u128>(puzzle)
    } else {
        placement_counts::<BitSet>(puzzle)
    };
    writeln!(
        out,
        "{:<4} {:<12} {:<8} {:>5} {:>5} {:>12} {:>10}",
        "id", "name", "color", "cells", "count", "orientations", "placements"
    )?;
    for (id, (piece, placements)) in puzzle.pieces.iter().zip(placements).enumerate() {
        writeln!(
            out,
            "{:<4} {:<12} {:<8} {:>5} {:>5} {:>12} {:>10}",
            pieces::char_id(id),
            piece.name,
            piece.color.as_deref().unwrap_or("-"),
            piece.shape.len(),
            piece.multiplicity,
            piece.orientations().len(),
            placements
        )?;
    }
    for &(first, second) in &puzzle.mirror_pairs {
        writeln!(
            out,
            "Mirror pair: {} <-> {}",
            puzzle.pieces[first].name, puzzle.pieces[second].name
        )?;
    }
    Ok(out)
}

fn placement_counts<M: CellMask>(puzzle: &Puzzle) -> Vec<usize> {
    PlacementUniverse::<M>::build(puzzle).counts_per_piece()
}

/// Prints the count of saved solutions.
fn run_count(stem: &Path) -> anyhow::Result<()> {
    let count = persistence::count(stem)
        .with_context(|| format!("No saved solutions at {}.bin", stem.display()))?;
    println!("{count} solutions");
    Ok(())
}

/// Loads saved solutions and prints one of them.
fn run_show(puzzle: &Puzzle, stem: &Path, index: usize) -> anyhow::Result<()> {
    let solutions = persistence::load_all(stem)
        .with_context(|| format!("No saved solutions at {}.bin", stem.display()))?;
    let Some(solution) = index.checked_sub(1).and_then(|i| solutions.get(i)) else {
        bail!("Solution {index} out of range (1..={})", solutions.len());
    };
    if let Err(e) = solution.verify(puzzle) {
        bail!("Solution {index} does not fit {}: {e}", puzzle.name);
    }
    println!("Solution {index} of {}:", solutions.len());
    print!("{}", format_solution(puzzle, solution));
    Ok(())
}
