//! The `.pgg` elevation grid file format.
//!
//! Little-endian binary layout:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "PGG1"
//! 4       4     rows (u32)
//! 8       4     cols (u32)
//! 12      8     origin_x (f64)
//! 20      8     origin_y (f64)
//! 28      8     cell_size (f64)
//! 36      8*n   cell values, row-major (f64)
//! ```
//!
//! Values pass through bit-for-bit, so NaN no-data cells survive a
//! write/read cycle. Writing replaces any existing file at the path.

use std::fs;
use std::path::Path;

use paleogeo_core::{GeoTransform, Grid};

use crate::error::{IoError, Result};

/// File magic of version 1 grid files.
pub const MAGIC: [u8; 4] = *b"PGG1";

const HEADER_LEN: usize = 36;

/// Writes a grid, replacing any file already at `path`.
pub fn write_grid(path: &Path, grid: &Grid) -> Result<()> {
    let (rows, cols) = grid.shape();
    let (rows32, cols32) = match (u32::try_from(rows), u32::try_from(cols)) {
        (Ok(r), Ok(c)) => (r, c),
        _ => return Err(IoError::TooLarge { rows, cols }),
    };
    let transform = grid.transform();

    let mut buf = Vec::with_capacity(HEADER_LEN + rows * cols * 8);
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&rows32.to_le_bytes());
    buf.extend_from_slice(&cols32.to_le_bytes());
    buf.extend_from_slice(&transform.origin_x.to_le_bytes());
    buf.extend_from_slice(&transform.origin_y.to_le_bytes());
    buf.extend_from_slice(&transform.cell_size.to_le_bytes());
    for value in grid.array() {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    fs::write(path, buf)?;
    log::debug!("wrote {rows}x{cols} grid to {}", path.display());
    Ok(())
}

/// Reads a grid written by [`write_grid`].
pub fn read_grid(path: &Path) -> Result<Grid> {
    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_LEN {
        return Err(IoError::Truncated {
            expected: HEADER_LEN,
            found: bytes.len(),
        });
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[0..4]);
    if magic != MAGIC {
        return Err(IoError::BadMagic { found: magic });
    }

    let rows = read_u32(&bytes, 4) as usize;
    let cols = read_u32(&bytes, 8) as usize;
    let transform = GeoTransform {
        origin_x: read_f64(&bytes, 12),
        origin_y: read_f64(&bytes, 20),
        cell_size: read_f64(&bytes, 28),
    };

    // Header fields are attacker-controlled; size the body without
    // overflowing, mirroring the write-side dimension guard.
    let expected = rows
        .checked_mul(cols)
        .and_then(|cells| cells.checked_mul(8))
        .and_then(|body| body.checked_add(HEADER_LEN))
        .ok_or(IoError::TooLarge { rows, cols })?;
    if bytes.len() != expected {
        return Err(IoError::Truncated {
            expected,
            found: bytes.len(),
        });
    }

    let data: Vec<f64> = bytes[HEADER_LEN..]
        .chunks_exact(8)
        .map(read_f64_chunk)
        .collect();
    let mut grid = Grid::from_vec(data, rows, cols)?;
    grid.set_transform(transform);
    Ok(grid)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    read_f64_chunk(&bytes[offset..offset + 8])
}

fn read_f64_chunk(chunk: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(chunk);
    f64::from_le_bytes(raw)
}
