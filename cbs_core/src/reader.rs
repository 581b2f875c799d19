//! Block decoder: resolves a `[start_row, start_row + length)` window to the
//! minimum set of payload bytes, decompresses only those, and splices
//! partial boundary blocks into the caller's output buffer.
//!
//! The reader is fully driven by the on-disk column header and block index;
//! it never consults the write-side strategy. Scratch buffers are allocated
//! once per request and reused across blocks.
//!
//! Failure is fail-fast: corruption (inconsistent header, non-monotonic
//! index offsets, unknown algorithm ids, decoded-size mismatches) and I/O
//! errors abort the whole request with no partial result contract — the
//! output buffer's contents are unspecified after an error.

use std::io::{Read, Seek, SeekFrom};

use cbs_codecs::{self as codecs, CompAlgo, ALGO_UNCOMPRESSED};
use log::trace;

use crate::format::{
    block_elem_count, nr_of_blocks, BlockIndexEntry, ColumnHeader, ColumnKind,
    BLOCK_INDEX_ENTRY_SIZE, COL_HEADER_SIZE, PREF_BLOCK_SIZE,
};

/// Read `length` elements starting at `start_row` from the column whose
/// header sits at `block_pos`.
///
/// `total_rows` is the column's element count (kept by the enclosing
/// container) and `out` must be exactly `length × element_size` bytes. A
/// zero-length read returns immediately without touching the source.
pub fn read_column<R: Read + Seek>(
    source: &mut R,
    block_pos: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
    element_size: usize,
    out: &mut [u8],
) -> anyhow::Result<()> {
    if length == 0 {
        return Ok(());
    }
    if element_size == 0 {
        anyhow::bail!("usage: zero element size");
    }
    if start_row + length > total_rows {
        anyhow::bail!(
            "usage: row range {}..{} exceeds column length {}",
            start_row,
            start_row + length,
            total_rows
        );
    }
    if out.len() as u64 != length * element_size as u64 {
        anyhow::bail!(
            "usage: output buffer holds {} bytes, range needs {}",
            out.len(),
            length * element_size as u64
        );
    }

    source.seek(SeekFrom::Start(block_pos))?;
    let mut header_buf = [0u8; COL_HEADER_SIZE as usize];
    source.read_exact(&mut header_buf)?;
    let header = ColumnHeader::from_bytes(&header_buf);

    match header.kind()? {
        ColumnKind::Uncompressed => {
            let data_pos = block_pos + COL_HEADER_SIZE + start_row * element_size as u64;
            source.seek(SeekFrom::Start(data_pos))?;
            source.read_exact(out)?;
            Ok(())
        }
        ColumnKind::FixedRatio(algo) => {
            read_fixed_ratio(source, block_pos, algo, start_row, length, element_size, out)
        }
        ColumnKind::VariableRatio { block_elems } => read_variable_ratio(
            source,
            block_pos,
            block_elems as u64,
            start_row,
            length,
            total_rows,
            element_size,
            out,
        ),
    }
}

/// Read back an annotation placed after a column's payloads, given the
/// `(offset, len)` the writer reported.
pub fn read_annotation<R: Read + Seek>(
    source: &mut R,
    offset: u64,
    len: u32,
) -> anyhow::Result<String> {
    source.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    source.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| anyhow::anyhow!("corrupt column: annotation is not valid UTF-8"))
}

// ── Fixed-ratio path ───────────────────────────────────────────────────────

/// Random access into a fixed-ratio unit stream: boundary units are
/// decompressed into a scratch unit and spliced; interior units are
/// decompressed in `PREF_BLOCK_SIZE`-sized batches straight into the output.
fn read_fixed_ratio<R: Read + Seek>(
    source: &mut R,
    block_pos: u64,
    algo: CompAlgo,
    start_row: u64,
    length: u64,
    element_size: usize,
    out: &mut [u8],
) -> anyhow::Result<()> {
    let src_rep = codecs::source_rep_size(algo);
    let tgt_rep = codecs::target_rep_size(algo);
    if src_rep % element_size != 0 {
        anyhow::bail!(
            "corrupt column: {} unit size {} is not a multiple of element size {}",
            algo.name(),
            src_rep,
            element_size
        );
    }
    let rep_elems = (src_rep / element_size) as u64;

    let mut start_rep = start_row / rep_elems;
    let end_rep = (start_row + length - 1) / rep_elems;
    let offset_in_rep = (start_row - start_rep * rep_elems) as usize;

    source.seek(SeekFrom::Start(
        block_pos + COL_HEADER_SIZE + start_rep * tgt_rep as u64,
    ))?;

    let mut unit_comp = vec![0u8; tgt_rep];
    let mut rep_buf = vec![0u8; src_rep];
    let mut out_off = 0usize;

    // Partial leading unit: decompress into scratch, splice the tail.
    if offset_in_rep > 0 {
        source.read_exact(&mut unit_comp)?;
        codecs::decompress(algo, &unit_comp, &mut rep_buf)?;

        let skip = offset_in_rep * element_size;
        if start_rep == end_rep {
            out.copy_from_slice(&rep_buf[skip..skip + out.len()]);
            return Ok(());
        }
        let take = src_rep - skip;
        out[..take].copy_from_slice(&rep_buf[skip..]);
        out_off = take;
        start_rep += 1;
    }

    // Interior units batched straight into the output; the final unit goes
    // through scratch so it can be clipped to the requested tail.
    let full_reps = (end_rep - start_rep) as usize;
    let reps_per_batch = (PREF_BLOCK_SIZE / src_rep).max(1);
    let mut comp_batch = vec![0u8; reps_per_batch * tgt_rep];

    let mut remaining = full_reps;
    while remaining > 0 {
        let batch = remaining.min(reps_per_batch);
        source.read_exact(&mut comp_batch[..batch * tgt_rep])?;
        codecs::decompress(
            algo,
            &comp_batch[..batch * tgt_rep],
            &mut out[out_off..out_off + batch * src_rep],
        )?;
        out_off += batch * src_rep;
        remaining -= batch;
    }

    let tail_bytes = ((start_row + length - end_rep * rep_elems) as usize) * element_size;
    source.read_exact(&mut unit_comp)?;
    codecs::decompress(algo, &unit_comp, &mut rep_buf)?;
    out[out_off..].copy_from_slice(&rep_buf[..tail_bytes]);
    Ok(())
}

// ── Variable-ratio path ────────────────────────────────────────────────────

/// Random access into a blocked stream: load only the index entries for the
/// covered span (start block through the sentinel past the end block), then
/// decompress exactly the covered blocks, splicing partial boundary blocks
/// through one scratch pair shared by the whole request.
#[allow(clippy::too_many_arguments)]
fn read_variable_ratio<R: Read + Seek>(
    source: &mut R,
    block_pos: u64,
    block_elems: u64,
    start_row: u64,
    length: u64,
    total_rows: u64,
    element_size: usize,
    out: &mut [u8],
) -> anyhow::Result<()> {
    let es = element_size as u64;
    let start_block = start_row / block_elems;
    let end_block = (start_row + length - 1) / block_elems;

    // Index slice covering [start_block, end_block + 1].
    let span = (end_block - start_block + 2) as usize;
    source.seek(SeekFrom::Start(
        block_pos + COL_HEADER_SIZE + start_block * BLOCK_INDEX_ENTRY_SIZE,
    ))?;
    let mut raw_index = vec![0u8; span * BLOCK_INDEX_ENTRY_SIZE as usize];
    source.read_exact(&mut raw_index)?;
    let entries: Vec<BlockIndexEntry> = raw_index
        .chunks_exact(BLOCK_INDEX_ENTRY_SIZE as usize)
        .map(|chunk| BlockIndexEntry::from_bytes(chunk.try_into().unwrap()))
        .collect();

    trace!(
        "range {}..{} resolves to blocks {}..={} of {}",
        start_row,
        start_row + length,
        start_block,
        end_block,
        nr_of_blocks(total_rows, block_elems)
    );

    let block_bytes = (block_elems * es) as usize;
    let mut comp_buf = vec![0u8; codecs::compress_bound(block_bytes)];
    let mut raw_buf = vec![0u8; block_bytes];
    let mut out_off = 0usize;

    for k in start_block..=end_block {
        let i = (k - start_block) as usize;
        let entry = entries[i];
        let next = entries[i + 1];
        if next.offset <= entry.offset {
            anyhow::bail!(
                "corrupt column: block index offsets not monotonic at block {} ({} -> {})",
                k,
                entry.offset,
                next.offset
            );
        }
        let comp_len = (next.offset - entry.offset) as usize;
        let elems_in_block = block_elem_count(k, total_rows, block_elems);

        // Element slice of this block that lands in the output.
        let slice_start = if k == start_block { start_row - k * block_elems } else { 0 };
        let slice_end = if k == end_block {
            start_row + length - k * block_elems
        } else {
            elems_in_block
        };
        let slice_bytes = ((slice_end - slice_start) * es) as usize;
        let out_slice = &mut out[out_off..out_off + slice_bytes];

        if entry.algo_id == ALGO_UNCOMPRESSED {
            if comp_len as u64 != elems_in_block * es {
                anyhow::bail!(
                    "corrupt column: verbatim block {} holds {} bytes, expected {}",
                    k,
                    comp_len,
                    elems_in_block * es
                );
            }
            source.seek(SeekFrom::Start(entry.offset + slice_start * es))?;
            source.read_exact(out_slice)?;
        } else {
            let algo = CompAlgo::from_id(entry.algo_id).ok_or_else(|| {
                anyhow::anyhow!(
                    "corrupt column: unknown algorithm id {} in block {}",
                    entry.algo_id,
                    k
                )
            })?;
            if comp_len > comp_buf.len() {
                anyhow::bail!(
                    "corrupt column: block {} compressed size {} exceeds bound {}",
                    k,
                    comp_len,
                    comp_buf.len()
                );
            }
            source.seek(SeekFrom::Start(entry.offset))?;
            source.read_exact(&mut comp_buf[..comp_len])?;

            let raw_len = (elems_in_block * es) as usize;
            if slice_bytes == raw_len {
                // Full block lands in the output: decompress in place.
                codecs::decompress(algo, &comp_buf[..comp_len], out_slice)?;
            } else {
                codecs::decompress(algo, &comp_buf[..comp_len], &mut raw_buf[..raw_len])?;
                let skip = (slice_start * es) as usize;
                out_slice.copy_from_slice(&raw_buf[skip..skip + slice_bytes]);
            }
        }
        out_off += slice_bytes;
    }
    Ok(())
}
