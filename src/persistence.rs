//! File I/O for saving and loading puzzle solutions.
//!
//! Binary format for `<stem>.bin` (little endian):
//! - u32: solution count
//! - repeat per solution:
//!   - u32: placement count
//!   - repeat per placement:
//!     - u32: piece index (0-based)
//!     - u32: orientation index
//!     - 3 x i32: offset (x, y, z)
//!
//! `<stem>.txt` holds the same solutions rendered as z-slices.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::pieces::Puzzle;
use crate::solution::{format_solution, PlacedPiece, Solution};

fn with_extension(stem: &Path, extension: &str) -> PathBuf {
    let mut path = stem.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Saves solutions to both `<stem>.txt` and `<stem>.bin`.
pub fn save(stem: impl AsRef<Path>, puzzle: &Puzzle, solutions: &[Solution]) -> std::io::Result<()> {
    let stem = stem.as_ref();
    save_text(&with_extension(stem, "txt"), puzzle, solutions)?;
    save_binary(&with_extension(stem, "bin"), solutions)?;
    Ok(())
}

/// Saves solutions in human-readable text format.
fn save_text(path: &Path, puzzle: &Puzzle, solutions: &[Solution]) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{}: {} solutions\n", puzzle.name, solutions.len())?;
    for (i, solution) in solutions.iter().enumerate() {
        writeln!(file, "Solution {}:", i + 1)?;
        write!(file, "{}", format_solution(puzzle, solution))?;
        writeln!(file)?;
    }
    file.flush()
}

/// Saves solutions in compact binary format for fast loading.
fn save_binary(path: &Path, solutions: &[Solution]) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    write_solutions(&mut file, solutions)?;
    file.flush()
}

fn write_solutions(writer: &mut impl Write, solutions: &[Solution]) -> std::io::Result<()> {
    writer.write_all(&(solutions.len() as u32).to_le_bytes())?;

    for solution in solutions {
        writer.write_all(&(solution.len() as u32).to_le_bytes())?;
        for placed in solution.iter() {
            writer.write_all(&(placed.piece as u32).to_le_bytes())?;
            writer.write_all(&(placed.orientation as u32).to_le_bytes())?;
            let (x, y, z) = placed.offset;
            for coordinate in [x, y, z] {
                writer.write_all(&coordinate.to_le_bytes())?;
            }
        }
    }

    Ok(())
}

fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(u32::from_le_bytes(buffer))
}

fn read_i32(reader: &mut impl Read) -> std::io::Result<i32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(i32::from_le_bytes(buffer))
}

fn read_solutions(reader: &mut impl Read) -> std::io::Result<Vec<Solution>> {
    let solution_count = read_u32(reader)? as usize;
    let mut solutions = Vec::with_capacity(solution_count.min(1 << 16));

    for _ in 0..solution_count {
        let placement_count = read_u32(reader)? as usize;
        let mut placements = Vec::with_capacity(placement_count.min(1 << 10));
        for _ in 0..placement_count {
            let piece = read_u32(reader)? as usize;
            let orientation = read_u32(reader)? as usize;
            let offset = (read_i32(reader)?, read_i32(reader)?, read_i32(reader)?);
            placements.push(PlacedPiece {
                piece,
                orientation,
                offset,
            });
        }
        solutions.push(Solution::new(placements));
    }

    Ok(solutions)
}

/// Loads all solutions from `<stem>.bin`.
pub fn load_all(stem: impl AsRef<Path>) -> std::io::Result<Vec<Solution>> {
    let file = File::open(with_extension(stem.as_ref(), "bin"))?;
    read_solutions(&mut BufReader::new(file))
}

/// Returns the number of saved solutions without loading them all.
pub fn count(stem: impl AsRef<Path>) -> std::io::Result<usize> {
    let mut file = File::open(with_extension(stem.as_ref(), "bin"))?;
    Ok(read_u32(&mut file)? as usize)
}
