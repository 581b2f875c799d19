//! Compression algorithm registry for the CBS column block stream.
//!
//! The registry is a closed enumeration: algorithm ids are stored on disk
//! (in block-index entries and fixed-ratio column headers) and are frozen.
//! Two families:
//!
//! - *Variable-ratio* codecs ([`CompAlgo::Zstd`], [`CompAlgo::Lz4`]) —
//!   general byte compressors whose output size depends on content. Blocks
//!   compressed with these need a block index for random access.
//! - *Fixed-ratio* codecs ([`CompAlgo::Logic8`]) — deterministic transforms
//!   that reduce a fixed source unit to a fixed target unit, so any row maps
//!   to a file offset by arithmetic alone.
//!
//! All operations are buffer-to-buffer and fail fast: an unknown id, an
//! undersized destination, or a decoded-size mismatch indicates file
//! corruption or a programmer error, never a user-recoverable condition.

mod logic8;
mod lz4_codec;
mod zstd_codec;

/// Algorithm id `0` on disk: the block is stored verbatim. Never dispatched
/// through the registry — callers copy the source bytes themselves.
pub const ALGO_UNCOMPRESSED: u16 = 0;

/// A compression algorithm known to the registry.
///
/// The discriminants are the on-disk algorithm ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CompAlgo {
    /// Zstandard. Higher ratio, slower than LZ4.
    Zstd = 1,
    /// LZ4 block mode. Fastest decode of the bundled codecs.
    Lz4 = 2,
    /// Fixed-ratio bit-pack: 8 source bytes (logical values) → 1 target byte.
    Logic8 = 3,
}

impl CompAlgo {
    /// On-disk algorithm id.
    #[inline]
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Resolve an algorithm from its on-disk id.
    ///
    /// Returns `None` for id `0` (stored verbatim, not an algorithm) and for
    /// ids the registry does not know — the caller decides whether that is
    /// corruption or a verbatim block.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            1 => Some(CompAlgo::Zstd),
            2 => Some(CompAlgo::Lz4),
            3 => Some(CompAlgo::Logic8),
            _ => None,
        }
    }

    /// Human-readable name for tool output.
    pub fn name(self) -> &'static str {
        match self {
            CompAlgo::Zstd => "zstd",
            CompAlgo::Lz4 => "lz4",
            CompAlgo::Logic8 => "logic8",
        }
    }

    /// Whether this algorithm reduces fixed source units to fixed target
    /// units, permitting index-free random access.
    pub fn is_fixed_ratio(self) -> bool {
        matches!(self, CompAlgo::Logic8)
    }
}

/// Source unit size in bytes for a fixed-ratio algorithm.
///
/// Always an integer multiple of every supported element width (1, 4, 8).
pub fn source_rep_size(algo: CompAlgo) -> usize {
    match algo {
        CompAlgo::Logic8 => logic8::SOURCE_REP_SIZE,
        _ => 0,
    }
}

/// Target unit size in bytes for a fixed-ratio algorithm.
pub fn target_rep_size(algo: CompAlgo) -> usize {
    match algo {
        CompAlgo::Logic8 => logic8::TARGET_REP_SIZE,
        _ => 0,
    }
}

/// Worst-case compressed size for `src_len` source bytes across all
/// variable-ratio codecs. Scratch buffers sized with this bound are safe to
/// hand to [`compress`] for any algorithm.
pub fn compress_bound(src_len: usize) -> usize {
    lz4_codec::compress_bound(src_len).max(zstd_codec::compress_bound(src_len))
}

/// Compress `src` into `dst`, returning the number of bytes written.
///
/// `level` is the strategy-level 0–100 knob; each codec maps it onto its
/// native scale (LZ4 has a single mode and ignores it). `dst` must hold at
/// least [`compress_bound`] bytes for variable-ratio algorithms, or the
/// exact target size for fixed-ratio ones.
pub fn compress(algo: CompAlgo, level: u8, src: &[u8], dst: &mut [u8]) -> anyhow::Result<usize> {
    match algo {
        CompAlgo::Zstd => zstd_codec::compress(src, dst, level),
        CompAlgo::Lz4 => lz4_codec::compress(src, dst),
        CompAlgo::Logic8 => logic8::pack(src, dst),
    }
}

/// Decompress `src` into `dst`, which must be sized to the exact expected
/// raw length. A decoded size different from `dst.len()` is corruption and
/// fails the call.
pub fn decompress(algo: CompAlgo, src: &[u8], dst: &mut [u8]) -> anyhow::Result<usize> {
    let n = match algo {
        CompAlgo::Zstd => zstd_codec::decompress(src, dst)?,
        CompAlgo::Lz4 => lz4_codec::decompress(src, dst)?,
        CompAlgo::Logic8 => logic8::unpack(src, dst)?,
    };
    if n != dst.len() {
        anyhow::bail!(
            "corrupt column: {} block decoded to {} bytes, expected {}",
            algo.name(),
            n,
            dst.len()
        );
    }
    Ok(n)
}
