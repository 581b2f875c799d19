//! Per-block compression policy.
//!
//! A strategy decides, for each block of a column, which algorithm (if any)
//! to apply. The decision is a pure function of the block index, so two
//! writes of the same data produce byte-identical files and the reader never
//! needs the strategy — it is driven entirely by the per-block algorithm ids
//! recorded in the block index.

use cbs_codecs::{self as codecs, CompAlgo, ALGO_UNCOMPRESSED};

/// A block-level compression policy.
pub trait BlockCompressor {
    /// Compress the `block_index`-th block of a column into `dst`.
    ///
    /// Returns the payload length and the algorithm id to record in the
    /// block index. An id of [`ALGO_UNCOMPRESSED`] means the caller must
    /// write the source bytes verbatim — `dst` contents are unspecified and
    /// the returned length is `src.len()`.
    ///
    /// `dst` must hold at least [`cbs_codecs::compress_bound`]`(src.len())`
    /// bytes.
    fn compress_block(
        &self,
        block_index: usize,
        src: &[u8],
        dst: &mut [u8],
    ) -> anyhow::Result<(usize, u16)>;
}

/// Deterministic mix selector: whether block `block_index` is selected at a
/// given `mix` percentage.
///
/// Chosen rule: `(k * mix) % 100 + mix >= 100`. Over any window of 100
/// consecutive blocks exactly `mix` are selected, and the result depends
/// only on `k`, keeping files reproducible.
pub fn mix_selects(mix: u8, block_index: usize) -> bool {
    let mix = mix as usize;
    (block_index * mix) % 100 + mix >= 100
}

// ── Single ─────────────────────────────────────────────────────────────────

/// Always applies one algorithm at a fixed level.
///
/// Falls back to verbatim storage when compression does not shrink the
/// block, so a bad-fit codec can never grow the file materially.
pub struct SingleCompressor {
    algo: CompAlgo,
    level: u8,
}

impl SingleCompressor {
    pub fn new(algo: CompAlgo, level: u8) -> Self {
        Self { algo, level }
    }
}

impl BlockCompressor for SingleCompressor {
    fn compress_block(
        &self,
        _block_index: usize,
        src: &[u8],
        dst: &mut [u8],
    ) -> anyhow::Result<(usize, u16)> {
        let n = codecs::compress(self.algo, self.level, src, dst)?;
        if n >= src.len() {
            return Ok((src.len(), ALGO_UNCOMPRESSED));
        }
        Ok((n, self.algo.id()))
    }
}

// ── Linear mix ─────────────────────────────────────────────────────────────

/// Interpolates between "store everything verbatim" and "compress every
/// block": the selector routes `mix`% of blocks through the inner
/// compressor and leaves the rest uncompressed.
pub struct LinearCompressor {
    inner: SingleCompressor,
    mix: u8,
}

impl LinearCompressor {
    pub fn new(algo: CompAlgo, level: u8, mix: u8) -> Self {
        Self { inner: SingleCompressor::new(algo, level), mix }
    }
}

impl BlockCompressor for LinearCompressor {
    fn compress_block(
        &self,
        block_index: usize,
        src: &[u8],
        dst: &mut [u8],
    ) -> anyhow::Result<(usize, u16)> {
        if !mix_selects(self.mix, block_index) {
            return Ok((src.len(), ALGO_UNCOMPRESSED));
        }
        self.inner.compress_block(block_index, src, dst)
    }
}

// ── Composite mix ──────────────────────────────────────────────────────────

/// Interpolates between two algorithms: the selector routes `mix`% of blocks
/// through `second` and the rest through `first`.
pub struct CompositeCompressor {
    first: SingleCompressor,
    second: SingleCompressor,
    mix: u8,
}

impl CompositeCompressor {
    pub fn new(first: SingleCompressor, second: SingleCompressor, mix: u8) -> Self {
        Self { first, second, mix }
    }
}

impl BlockCompressor for CompositeCompressor {
    fn compress_block(
        &self,
        block_index: usize,
        src: &[u8],
        dst: &mut [u8],
    ) -> anyhow::Result<(usize, u16)> {
        if mix_selects(self.mix, block_index) {
            self.second.compress_block(block_index, src, dst)
        } else {
            self.first.compress_block(block_index, src, dst)
        }
    }
}
