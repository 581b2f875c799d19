use zstd::zstd_safe;

/// Zstandard block codec.
///
/// The higher-ratio half of the variable-ratio pair. Each block is an
/// independent zstd frame compressed with the one-shot `bulk` API, so any
/// block can be decoded without touching its neighbours.
///
/// The strategy-level 0–100 knob maps linearly onto native levels 1–19;
/// level 20+ (the "ultra" range) trades too much write speed for a column
/// store and is not reachable.
fn native_level(level: u8) -> i32 {
    ((level as i32 * 19) / 100).max(1)
}

pub fn compress(src: &[u8], dst: &mut [u8], level: u8) -> anyhow::Result<usize> {
    zstd::bulk::compress_to_buffer(src, dst, native_level(level))
        .map_err(|e| anyhow::anyhow!("zstd compress error: {}", e))
}

pub fn decompress(src: &[u8], dst: &mut [u8]) -> anyhow::Result<usize> {
    zstd::bulk::decompress_to_buffer(src, dst)
        .map_err(|e| anyhow::anyhow!("zstd decompress error: {}", e))
}

/// Worst-case compressed size for `src_len` input bytes.
pub fn compress_bound(src_len: usize) -> usize {
    zstd_safe::compress_bound(src_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_within_bound() {
        let raw: Vec<u8> = (0..4096u32).flat_map(|i| i.to_le_bytes()).collect();
        let mut comp = vec![0u8; compress_bound(raw.len())];
        let n = compress(&raw, &mut comp, 20).unwrap();
        assert!(n < raw.len(), "sequential ints should compress");

        let mut out = vec![0u8; raw.len()];
        let m = decompress(&comp[..n], &mut out).unwrap();
        assert_eq!(m, raw.len());
        assert_eq!(out, raw);
    }

    #[test]
    fn level_mapping_spans_native_range() {
        assert_eq!(native_level(0), 1);
        assert_eq!(native_level(20), 3);
        assert_eq!(native_level(100), 19);
    }
}
