use lz4_flex::block::{self, get_maximum_output_size};

/// LZ4 block codec.
///
/// Fastest decompression of the bundled codecs — the default choice for the
/// low end of the compression-level range, where decode speed matters more
/// than size reduction. `lz4_flex` exposes a single fast block mode, so the
/// strategy-level knob does not alter LZ4 output.
///
/// Raw block format: the block index pins the compressed size and the block
/// element count pins the raw size, so no size prefix is stored.
pub fn compress(src: &[u8], dst: &mut [u8]) -> anyhow::Result<usize> {
    block::compress_into(src, dst).map_err(|e| anyhow::anyhow!("lz4 compress error: {}", e))
}

pub fn decompress(src: &[u8], dst: &mut [u8]) -> anyhow::Result<usize> {
    block::decompress_into(src, dst).map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))
}

/// Worst-case compressed size for `src_len` input bytes.
pub fn compress_bound(src_len: usize) -> usize {
    get_maximum_output_size(src_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_within_bound() {
        let raw: Vec<u8> = (0..10_000u32).flat_map(|i| (i / 7).to_le_bytes()).collect();
        let mut comp = vec![0u8; compress_bound(raw.len())];
        let n = compress(&raw, &mut comp).unwrap();
        assert!(n <= comp.len());

        let mut out = vec![0u8; raw.len()];
        let m = decompress(&comp[..n], &mut out).unwrap();
        assert_eq!(m, raw.len());
        assert_eq!(out, raw);
    }
}
