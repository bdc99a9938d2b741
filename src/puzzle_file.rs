//! Text puzzle definitions.
//!
//! Format (comma separated, one record per line, `#` starts a comment line):
//!
//! ```text
//! # name, target, options...
//! Soma,3,reflect
//! # name, color, cells, options...
//! V,red,000-100-010
//! A,yellow,000-100-010-101,mirror=C
//! ```
//!
//! The target is `N` (an N x N x N cube), `AxBxC` (a box) or a cell list.
//! Cells are `-` separated triples of single digits `xyz`; a bare three-digit
//! target such as `000` is a one-cell list.
//!
//! Puzzle options: `fixed`, `rotate` (default) or `reflect` select the
//! container symmetry used for canonicalization. Piece options: `xN` sets the
//! multiplicity, `fixed` / `rotate` (default) / `reflect` the legal
//! transforms, and `mirror=<piece>` declares a mirror-image partner.

use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::error::{Error, Result};
use crate::geometry::Symmetry;
use crate::pieces::{Piece, Puzzle};
use crate::voxel::{Cell, VoxelSet};

/// Reads and parses a puzzle definition file.
pub fn load(path: impl AsRef<Path>) -> Result<Puzzle> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let puzzle = parse(&text)?;
    debug!(
        "Loaded {} from {}: {} pieces",
        puzzle.name,
        path.display(),
        puzzle.pieces.len()
    );
    Ok(puzzle)
}

/// Parses a puzzle definition. The result is not validated.
pub fn parse(text: &str) -> Result<Puzzle> {
    let mut records = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let Some((header_line, header)) = records.next() else {
        return Err(parse_error(1, "missing puzzle header"));
    };
    let fields = split_fields(header);
    if fields.len() < 2 {
        return Err(parse_error(header_line, "expected `name,target[,options]`"));
    }
    let target = parse_target(fields[1]).map_err(|message| parse_error(header_line, message))?;
    let mut puzzle = Puzzle::new(fields[0], target, Vec::new());
    for option in &fields[2..] {
        puzzle.container_symmetry = parse_symmetry(option)
            .ok_or_else(|| parse_error(header_line, format!("unknown puzzle option `{option}`")))?;
    }

    // mirror names are resolved once every piece is known
    let mut mirrors: Vec<(usize, usize, String)> = Vec::new();
    for (line, record) in records {
        let fields = split_fields(record);
        if fields.len() < 3 {
            return Err(parse_error(line, "expected `name,color,cells[,options]`"));
        }
        let cells = parse_cells(fields[2]).map_err(|message| parse_error(line, message))?;
        let mut piece = Piece::new(fields[0], cells).with_color(fields[1]);

        for option in &fields[3..] {
            if let Some(symmetry) = parse_symmetry(option) {
                piece.symmetry = symmetry;
            } else if let Some(partner) = option.strip_prefix("mirror=") {
                mirrors.push((line, puzzle.pieces.len(), partner.to_string()));
            } else if let Some(count) = option.strip_prefix('x') {
                piece.multiplicity = count
                    .parse()
                    .map_err(|_| parse_error(line, format!("bad multiplicity `{option}`")))?;
            } else {
                return Err(parse_error(line, format!("unknown piece option `{option}`")));
            }
        }
        puzzle.pieces.push(piece);
    }

    for (line, piece, partner) in mirrors {
        let other = puzzle
            .pieces
            .iter()
            .position(|candidate| candidate.name == partner)
            .ok_or_else(|| parse_error(line, format!("unknown mirror piece `{partner}`")))?;
        let pair = (piece.min(other), piece.max(other));
        if !puzzle.mirror_pairs.contains(&pair) {
            puzzle.mirror_pairs.push(pair);
        }
    }

    Ok(puzzle)
}

impl FromStr for Puzzle {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        parse(text)
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

fn split_fields(record: &str) -> Vec<&str> {
    record.split(',').map(str::trim).collect()
}

fn parse_symmetry(option: &str) -> Option<Symmetry> {
    match option {
        "fixed" => Some(Symmetry::Fixed),
        "rotate" => Some(Symmetry::Rotations),
        "reflect" => Some(Symmetry::RotationsAndReflections),
        _ => None,
    }
}

fn parse_target(field: &str) -> std::result::Result<VoxelSet, String> {
    // a lone three-digit token is a single cell, not a cube size
    let single_cell = field.len() == 3 && field.bytes().all(|b| b.is_ascii_digit());
    if field.contains('-') || single_cell {
        return parse_cells(field).map(|cells| VoxelSet::new(cells).normalized());
    }

    let dims: Vec<i32> = field
        .split('x')
        .map(|part| part.trim().parse::<i32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| format!("bad target `{field}`"))?;
    match dims[..] {
        [n] if n > 0 => Ok(VoxelSet::cuboid(n, n, n)),
        [dx, dy, dz] if dx > 0 && dy > 0 && dz > 0 => Ok(VoxelSet::cuboid(dx, dy, dz)),
        _ => Err(format!("bad target `{field}`")),
    }
}

fn parse_cells(field: &str) -> std::result::Result<Vec<Cell>, String> {
    field
        .split('-')
        .map(|block| {
            let digits: Vec<i32> = block
                .trim()
                .chars()
                .map(|c| c.to_digit(10).map(|digit| digit as i32))
                .collect::<Option<_>>()
                .ok_or_else(|| format!("bad cell `{block}`"))?;
            match digits[..] {
                [x, y, z] => Ok((x, y, z)),
                _ => Err(format!("cell `{block}` must have three digits")),
            }
        })
        .collect()
}
