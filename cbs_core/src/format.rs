//! On-disk layout of a single column stream.
//!
//! ```text
//! [ header : 8 B ]                              ← two little-endian u32s
//! [ block index : (nrOfBlocks + 1) × 10 B ]     ← variable-ratio columns only
//! [ payload 0 ] [ payload 1 ] ... [ payload N-1 ]
//! [ annotation ]                                ← optional, length tracked by caller
//! ```
//!
//! Header semantics:
//! - `(0, 0)` — uncompressed: payload is the raw little-endian elements.
//! - `(0, algo)` — fixed-ratio: payload is a stream of fixed target units;
//!   `algo` is the fixed-ratio algorithm id.
//! - `(version, blockElems)` with `version != 0` — variable-ratio: a block
//!   index follows, then independently compressed block payloads.
//!
//! Every multi-byte integer in the header and index is little-endian. Block
//! index offsets are absolute file positions; the final (sentinel) entry
//! holds the end of the last payload, so block `k`'s compressed size is
//! `index[k+1].offset - index[k].offset`.

use cbs_codecs::CompAlgo;

/// Fixed size of the column header in bytes.
pub const COL_HEADER_SIZE: u64 = 8;

/// Size of each block index entry: `u64` offset + `u16` algorithm id.
pub const BLOCK_INDEX_ENTRY_SIZE: u64 = 10;

/// Value written to `header[0]` for variable-ratio columns. Readers accept
/// any non-zero value there; the constant doubles as a format-version tag.
pub const VARIABLE_FORMAT_VERSION: u32 = 1;

/// Elements per block for 4-byte integer columns (16 KiB raw per block).
pub const BLOCK_ELEMS_I32: usize = 4096;
/// Elements per block for 8-byte integer columns (16 KiB raw per block).
pub const BLOCK_ELEMS_I64: usize = 2048;
/// Elements per block for double columns (16 KiB raw per block).
pub const BLOCK_ELEMS_F64: usize = 2048;

/// Batch granularity, in source bytes, for fixed-ratio reads. Target units
/// are read and decompressed `PREF_BLOCK_SIZE / sourceRepSize` at a time to
/// amortize I/O.
pub const PREF_BLOCK_SIZE: usize = 16384;

// ── Column header ──────────────────────────────────────────────────────────

/// Decoded representation of the 8-byte column header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnHeader {
    pub flag: u32,
    pub value: u32,
}

/// The three storage paths a column header can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Raw little-endian elements, directly addressable.
    Uncompressed,
    /// Fixed-ratio unit stream, addressable by arithmetic.
    FixedRatio(CompAlgo),
    /// Block-compressed stream with a block index.
    VariableRatio { block_elems: u32 },
}

impl ColumnHeader {
    pub fn uncompressed() -> Self {
        Self { flag: 0, value: 0 }
    }

    pub fn fixed_ratio(algo: CompAlgo) -> Self {
        Self { flag: 0, value: algo.id() as u32 }
    }

    pub fn variable_ratio(block_elems: u32) -> Self {
        Self { flag: VARIABLE_FORMAT_VERSION, value: block_elems }
    }

    /// Serialize to exactly `COL_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; COL_HEADER_SIZE as usize] {
        let mut buf = [0u8; COL_HEADER_SIZE as usize];
        buf[..4].copy_from_slice(&self.flag.to_le_bytes());
        buf[4..].copy_from_slice(&self.value.to_le_bytes());
        buf
    }

    /// Deserialize from `COL_HEADER_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; COL_HEADER_SIZE as usize]) -> Self {
        Self {
            flag: u32::from_le_bytes(buf[..4].try_into().unwrap()),
            value: u32::from_le_bytes(buf[4..].try_into().unwrap()),
        }
    }

    /// Classify the storage path, rejecting inconsistent field combinations.
    pub fn kind(&self) -> anyhow::Result<ColumnKind> {
        if self.flag != 0 {
            if self.value == 0 {
                anyhow::bail!("corrupt column: variable-ratio header with zero block size");
            }
            return Ok(ColumnKind::VariableRatio { block_elems: self.value });
        }
        if self.value == 0 {
            return Ok(ColumnKind::Uncompressed);
        }
        let algo = u16::try_from(self.value)
            .ok()
            .and_then(CompAlgo::from_id)
            .filter(|a| a.is_fixed_ratio());
        match algo {
            Some(algo) => Ok(ColumnKind::FixedRatio(algo)),
            None => anyhow::bail!(
                "corrupt column: header names unknown fixed-ratio algorithm {}",
                self.value
            ),
        }
    }
}

// ── Block index entry ──────────────────────────────────────────────────────

/// One entry of the block index: where a block's payload starts and which
/// algorithm produced it (`0` = stored verbatim). The sentinel final entry
/// carries the end of the last payload; its algorithm id is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockIndexEntry {
    /// Absolute file offset of the start of the block payload.
    pub offset: u64,
    /// Algorithm id for this block, `0` when stored verbatim.
    pub algo_id: u16,
}

impl BlockIndexEntry {
    /// Serialize to exactly `BLOCK_INDEX_ENTRY_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; BLOCK_INDEX_ENTRY_SIZE as usize] {
        let mut buf = [0u8; BLOCK_INDEX_ENTRY_SIZE as usize];
        buf[..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..].copy_from_slice(&self.algo_id.to_le_bytes());
        buf
    }

    /// Deserialize from `BLOCK_INDEX_ENTRY_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; BLOCK_INDEX_ENTRY_SIZE as usize]) -> Self {
        Self {
            offset: u64::from_le_bytes(buf[..8].try_into().unwrap()),
            algo_id: u16::from_le_bytes(buf[8..].try_into().unwrap()),
        }
    }
}

/// Number of blocks for a column of `n_elems` elements at `block_elems`
/// elements per block. Zero for an empty column.
pub fn nr_of_blocks(n_elems: u64, block_elems: u64) -> u64 {
    n_elems.div_ceil(block_elems)
}

/// Element count of block `k`: full blocks everywhere except the final one,
/// which holds `1 + ((n_elems - 1) % block_elems)` elements.
pub fn block_elem_count(k: u64, n_elems: u64, block_elems: u64) -> u64 {
    if k + 1 < nr_of_blocks(n_elems, block_elems) {
        block_elems
    } else {
        1 + (n_elems - 1) % block_elems
    }
}
