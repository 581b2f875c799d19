//! Typed column facades: element sizes, per-type block sizes, and the
//! mapping from the user-facing compression level to a write strategy.
//!
//! Level mapping for numeric columns (`c` in `0..=100`):
//!
//! | range        | strategy                                        |
//! |--------------|-------------------------------------------------|
//! | `c == 0`     | uncompressed                                    |
//! | `1..=50`     | LinearMix(LZ4 @ 2c, mix 2c)                     |
//! | `51..=100`   | CompositeMix(LZ4 @ 100, ZSTD @ 20, mix 2(c−50)) |
//!
//! Logical columns ignore the interpolation: any `c > 0` takes the
//! fixed-ratio LOGIC8 path, whose deterministic 8:1 reduction beats any
//! variable-ratio setting for that type.

use std::io::{Read, Seek, Write};

use cbs_codecs::CompAlgo;

use crate::compressor::{BlockCompressor, CompositeCompressor, LinearCompressor, SingleCompressor};
use crate::format::{BLOCK_ELEMS_F64, BLOCK_ELEMS_I32, BLOCK_ELEMS_I64};
use crate::reader::read_column;
use crate::writer::{write_column, ColumnCompression, WrittenColumn};

/// Build the block strategy for compression level `c`, or `None` for the
/// uncompressed path.
pub fn strategy_for_level(c: u8) -> anyhow::Result<Option<Box<dyn BlockCompressor>>> {
    match c {
        0 => Ok(None),
        1..=50 => Ok(Some(Box::new(LinearCompressor::new(
            CompAlgo::Lz4,
            2 * c,
            2 * c,
        )))),
        51..=100 => Ok(Some(Box::new(CompositeCompressor::new(
            SingleCompressor::new(CompAlgo::Lz4, 100),
            SingleCompressor::new(CompAlgo::Zstd, 20),
            2 * (c - 50),
        )))),
        _ => anyhow::bail!("usage: compression level {} outside 0..=100", c),
    }
}

fn write_numeric<W: Write + Seek>(
    sink: &mut W,
    data: &[u8],
    element_size: usize,
    block_elems: usize,
    level: u8,
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    match strategy_for_level(level)? {
        None => write_column(sink, data, element_size, ColumnCompression::None, annotation),
        Some(compressor) => write_column(
            sink,
            data,
            element_size,
            ColumnCompression::Blocked { compressor: compressor.as_ref(), block_elems },
            annotation,
        ),
    }
}

// ── int32 ──────────────────────────────────────────────────────────────────

pub fn write_i32_column<W: Write + Seek>(
    sink: &mut W,
    values: &[i32],
    level: u8,
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    write_numeric(sink, bytemuck::cast_slice(values), 4, BLOCK_ELEMS_I32, level, annotation)
}

pub fn read_i32_column<R: Read + Seek>(
    source: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
) -> anyhow::Result<Vec<i32>> {
    let mut values = vec![0i32; length as usize];
    read_column(
        source,
        block_pos,
        start_row,
        length,
        total_rows,
        4,
        bytemuck::cast_slice_mut(&mut values),
    )?;
    Ok(values)
}

// ── int64 ──────────────────────────────────────────────────────────────────

pub fn write_i64_column<W: Write + Seek>(
    sink: &mut W,
    values: &[i64],
    level: u8,
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    write_numeric(sink, bytemuck::cast_slice(values), 8, BLOCK_ELEMS_I64, level, annotation)
}

pub fn read_i64_column<R: Read + Seek>(
    source: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
) -> anyhow::Result<Vec<i64>> {
    let mut values = vec![0i64; length as usize];
    read_column(
        source,
        block_pos,
        start_row,
        length,
        total_rows,
        8,
        bytemuck::cast_slice_mut(&mut values),
    )?;
    Ok(values)
}

// ── double ─────────────────────────────────────────────────────────────────

pub fn write_f64_column<W: Write + Seek>(
    sink: &mut W,
    values: &[f64],
    level: u8,
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    write_numeric(sink, bytemuck::cast_slice(values), 8, BLOCK_ELEMS_F64, level, annotation)
}

pub fn read_f64_column<R: Read + Seek>(
    source: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
) -> anyhow::Result<Vec<f64>> {
    let mut values = vec![0f64; length as usize];
    read_column(
        source,
        block_pos,
        start_row,
        length,
        total_rows,
        8,
        bytemuck::cast_slice_mut(&mut values),
    )?;
    Ok(values)
}

// ── logical ────────────────────────────────────────────────────────────────

/// Write a logical column. `values` holds canonical `0`/`1` bytes; only the
/// low bit of each byte is persisted on the compressed path.
pub fn write_logical_column<W: Write + Seek>(
    sink: &mut W,
    values: &[u8],
    level: u8,
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    if level > 100 {
        anyhow::bail!("usage: compression level {} outside 0..=100", level);
    }
    let compression = if level == 0 {
        ColumnCompression::None
    } else {
        ColumnCompression::FixedRatio(CompAlgo::Logic8)
    };
    write_column(sink, values, 1, compression, annotation)
}

pub fn read_logical_column<R: Read + Seek>(
    source: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
) -> anyhow::Result<Vec<u8>> {
    let mut values = vec![0u8; length as usize];
    read_column(source, block_pos, start_row, length, total_rows, 1, &mut values)?;
    Ok(values)
}
