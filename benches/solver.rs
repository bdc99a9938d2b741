//! Benchmarks for the polycube packing solver.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use polypack::collector::Canonicalizer;
use polypack::geometry::{orientations, Symmetry};
use polypack::pieces::{bedlam, soma};
use polypack::placement::PlacementUniverse;
use polypack::solver::{Flow, Interrupt, Search};
use polypack::{format_solution, solve, SolveOptions};

/// Benchmark enumerating all distinct Soma solutions.
fn bench_solve(c: &mut Criterion) {
    let puzzle = soma();
    let options = SolveOptions::all();
    c.bench_function("solve_soma", |b| {
        b.iter(|| solve(black_box(&puzzle), &options))
    });
}

/// Benchmark the first Bedlam solution and the first 5.
fn bench_solve_bedlam(c: &mut Criterion) {
    let puzzle = bedlam();
    let first = SolveOptions::first();
    let five = SolveOptions::all().with_max_solutions(5);

    let mut group = c.benchmark_group("bedlam");
    group.sample_size(10);
    group.bench_function("solve_first", |b| {
        b.iter(|| solve(black_box(&puzzle), &first))
    });
    group.bench_function("solve_5", |b| b.iter(|| solve(black_box(&puzzle), &five)));
    group.finish();
}

/// Benchmark computing all orientations for a single piece.
fn bench_orientations(c: &mut Criterion) {
    let shape = soma().pieces[0].shape.clone();

    c.bench_function("orientations_with_reflection", |b| {
        b.iter(|| orientations(black_box(&shape), Symmetry::RotationsAndReflections))
    });
}

/// Benchmark canonicalizing one cover under the 48 cube symmetries.
fn bench_canonicalize(c: &mut Criterion) {
    let puzzle = soma();
    let universe = PlacementUniverse::<u128>::build(&puzzle);
    let canonicalizer = Canonicalizer::new(&puzzle, &universe);

    let mut cover = Vec::new();
    Search::new(&universe).run(&Interrupt::never(), |chosen| {
        cover = chosen.to_vec();
        Flow::Stop
    });

    c.bench_function("canonicalize_with_reflection", |b| {
        b.iter(|| canonicalizer.canonicalize(&universe, black_box(&cover)))
    });
}

/// Benchmark formatting a solution for display.
fn bench_format_solution(c: &mut Criterion) {
    let puzzle = soma();
    let Ok(report) = solve(&puzzle, &SolveOptions::first()) else {
        return;
    };
    let Some(solution) = report.first() else {
        return;
    };

    c.bench_function("format_solution", |b| {
        b.iter(|| format_solution(&puzzle, black_box(solution)))
    });
}

criterion_group!(
    benches,
    bench_solve,
    bench_solve_bedlam,
    bench_orientations,
    bench_canonicalize,
    bench_format_solution
);
criterion_main!(benches);
