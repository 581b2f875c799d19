//! Block encoder: turns a typed vector into the on-disk column layout.
//!
//! Three paths, selected by [`ColumnCompression`]:
//!
//! - **None** — header `(0, 0)` followed by the raw little-endian elements.
//! - **FixedRatio** — header `(0, algo)` followed by a stream of fixed
//!   target units; the final source unit is zero-padded before compression
//!   and the reader clips output to the element count.
//! - **Blocked** — header `(version, blockElems)`, a reserved block index,
//!   then one independently compressed payload per block. The index is
//!   back-patched once all payload sizes are known, which bounds writer
//!   memory to a single block.
//!
//! Any sink failure is fatal and propagated; the file must be considered
//! corrupt by the caller. There is no partial rollback.

use std::io::{Seek, SeekFrom, Write};

use cbs_codecs::{self as codecs, CompAlgo, ALGO_UNCOMPRESSED};
use log::debug;

use crate::compressor::BlockCompressor;
use crate::format::{
    nr_of_blocks, BlockIndexEntry, ColumnHeader, BLOCK_INDEX_ENTRY_SIZE, COL_HEADER_SIZE,
    PREF_BLOCK_SIZE,
};

/// How to encode a column.
pub enum ColumnCompression<'a> {
    /// Store elements verbatim.
    None,
    /// Deterministic fixed-ratio unit stream (no block index).
    FixedRatio(CompAlgo),
    /// Block-compressed stream driven by a per-block strategy.
    Blocked {
        compressor: &'a dyn BlockCompressor,
        block_elems: usize,
    },
}

/// Layout summary of a written column.
#[derive(Debug, Clone, Copy)]
pub struct WrittenColumn {
    /// Total bytes the column occupies, annotation included.
    pub total_bytes: u64,
    /// Absolute offset one past the last payload byte. For variable-ratio
    /// columns this equals the sentinel index entry.
    pub payload_end: u64,
    /// Absolute offset and byte length of the annotation, if one was
    /// written. The enclosing container is responsible for persisting these.
    pub annotation: Option<(u64, u32)>,
}

/// Write one column at the sink's current position.
///
/// `data` is the raw little-endian element bytes (`N × element_size`).
/// Returns the layout summary; the caller keeps the column's start offset.
pub fn write_column<W: Write + Seek>(
    sink: &mut W,
    data: &[u8],
    element_size: usize,
    compression: ColumnCompression<'_>,
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    if element_size == 0 || data.len() % element_size != 0 {
        anyhow::bail!(
            "usage: column byte length {} is not a multiple of element size {}",
            data.len(),
            element_size
        );
    }

    match compression {
        ColumnCompression::None => write_uncompressed(sink, data, annotation),
        ColumnCompression::FixedRatio(algo) => write_fixed_ratio(sink, data, algo, annotation),
        ColumnCompression::Blocked { compressor, block_elems } => {
            write_blocked(sink, data, element_size, compressor, block_elems, annotation)
        }
    }
}

fn write_uncompressed<W: Write + Seek>(
    sink: &mut W,
    data: &[u8],
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    let header_pos = sink.stream_position()?;
    sink.write_all(&ColumnHeader::uncompressed().to_bytes())?;
    sink.write_all(data)?;
    let payload_end = header_pos + COL_HEADER_SIZE + data.len() as u64;

    let annotation = write_annotation(sink, payload_end, annotation)?;
    let total_bytes = end_of(payload_end, annotation) - header_pos;

    debug!(
        "wrote uncompressed column: {} payload bytes at {}",
        data.len(),
        header_pos
    );
    Ok(WrittenColumn { total_bytes, payload_end, annotation })
}

fn write_fixed_ratio<W: Write + Seek>(
    sink: &mut W,
    data: &[u8],
    algo: CompAlgo,
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    let src_rep = codecs::source_rep_size(algo);
    let tgt_rep = codecs::target_rep_size(algo);
    if src_rep == 0 {
        anyhow::bail!("usage: {} is not a fixed-ratio algorithm", algo.name());
    }

    let header_pos = sink.stream_position()?;
    sink.write_all(&ColumnHeader::fixed_ratio(algo).to_bytes())?;

    // Full units in large batches, the padded tail unit on its own.
    let units_per_batch = (PREF_BLOCK_SIZE / src_rep).max(1);
    let mut out_buf = vec![0u8; units_per_batch * tgt_rep];
    let full_len = data.len() - data.len() % src_rep;
    let mut written = 0u64;

    for batch in data[..full_len].chunks(units_per_batch * src_rep) {
        let n = codecs::compress(algo, 0, batch, &mut out_buf)?;
        sink.write_all(&out_buf[..n])?;
        written += n as u64;
    }
    if full_len < data.len() {
        let mut unit = vec![0u8; src_rep];
        unit[..data.len() - full_len].copy_from_slice(&data[full_len..]);
        let n = codecs::compress(algo, 0, &unit, &mut out_buf)?;
        sink.write_all(&out_buf[..n])?;
        written += n as u64;
    }

    let payload_end = header_pos + COL_HEADER_SIZE + written;
    let annotation = write_annotation(sink, payload_end, annotation)?;
    let total_bytes = end_of(payload_end, annotation) - header_pos;

    debug!(
        "wrote fixed-ratio ({}) column: {} source bytes -> {} payload bytes",
        algo.name(),
        data.len(),
        written
    );
    Ok(WrittenColumn { total_bytes, payload_end, annotation })
}

fn write_blocked<W: Write + Seek>(
    sink: &mut W,
    data: &[u8],
    element_size: usize,
    compressor: &dyn BlockCompressor,
    block_elems: usize,
    annotation: Option<&str>,
) -> anyhow::Result<WrittenColumn> {
    if block_elems == 0 || u32::try_from(block_elems).is_err() {
        anyhow::bail!("usage: invalid block size {} elements", block_elems);
    }

    let n_elems = (data.len() / element_size) as u64;
    let blocks = nr_of_blocks(n_elems, block_elems as u64);
    let index_bytes = (blocks + 1) * BLOCK_INDEX_ENTRY_SIZE;

    let header_pos = sink.stream_position()?;
    sink.write_all(&ColumnHeader::variable_ratio(block_elems as u32).to_bytes())?;

    // Reserve the index; payload sizes are only known after compression.
    let index_pos = header_pos + COL_HEADER_SIZE;
    sink.write_all(&vec![0u8; index_bytes as usize])?;

    let block_bytes = block_elems * element_size;
    let mut comp_buf = vec![0u8; codecs::compress_bound(block_bytes)];
    let mut entries = Vec::with_capacity(blocks as usize + 1);

    // Mirror of the sink cursor, advanced per payload.
    let mut offset = index_pos + index_bytes;
    let mut compressed_blocks = 0u64;

    for k in 0..blocks as usize {
        let start = k * block_bytes;
        let end = (start + block_bytes).min(data.len());
        let src = &data[start..end];

        let (len, algo_id) = compressor.compress_block(k, src, &mut comp_buf)?;
        if algo_id == ALGO_UNCOMPRESSED {
            sink.write_all(src)?;
            entries.push(BlockIndexEntry { offset, algo_id });
            offset += src.len() as u64;
        } else {
            sink.write_all(&comp_buf[..len])?;
            entries.push(BlockIndexEntry { offset, algo_id });
            offset += len as u64;
            compressed_blocks += 1;
        }
    }

    let payload_end = offset;
    entries.push(BlockIndexEntry { offset: payload_end, algo_id: ALGO_UNCOMPRESSED });

    let annotation = write_annotation(sink, payload_end, annotation)?;
    let end = end_of(payload_end, annotation);

    // Back-patch the reserved index, then restore the cursor.
    sink.seek(SeekFrom::Start(index_pos))?;
    for entry in &entries {
        sink.write_all(&entry.to_bytes())?;
    }
    sink.seek(SeekFrom::Start(end))?;

    debug!(
        "wrote blocked column: {} elements in {} blocks ({} compressed), {} payload bytes",
        n_elems,
        blocks,
        compressed_blocks,
        payload_end - index_pos - index_bytes
    );
    Ok(WrittenColumn { total_bytes: end - header_pos, payload_end, annotation })
}

fn write_annotation<W: Write + Seek>(
    sink: &mut W,
    payload_end: u64,
    annotation: Option<&str>,
) -> anyhow::Result<Option<(u64, u32)>> {
    match annotation {
        Some(text) if !text.is_empty() => {
            sink.write_all(text.as_bytes())?;
            Ok(Some((payload_end, text.len() as u32)))
        }
        _ => Ok(None),
    }
}

fn end_of(payload_end: u64, annotation: Option<(u64, u32)>) -> u64 {
    match annotation {
        Some((offset, len)) => offset + len as u64,
        None => payload_end,
    }
}
