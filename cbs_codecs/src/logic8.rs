/// Fixed-ratio bit-pack for logical (0/1 byte) values.
///
/// Every source unit of [`SOURCE_REP_SIZE`] bytes becomes exactly
/// [`TARGET_REP_SIZE`] bytes: the low bit of each source byte, packed LSB
/// first. Because the ratio is deterministic, a reader can map any row to a
/// file offset by arithmetic alone — no block index is needed.
///
/// Unpacking expands each bit back to a `0x00`/`0x01` byte, so the transform
/// is lossless for canonical logical columns.

/// Bytes consumed per unit.
pub const SOURCE_REP_SIZE: usize = 8;
/// Bytes produced per unit.
pub const TARGET_REP_SIZE: usize = 1;

/// Pack `src` (length a multiple of 8) into `dst`, one bit per source byte.
pub fn pack(src: &[u8], dst: &mut [u8]) -> anyhow::Result<usize> {
    if src.len() % SOURCE_REP_SIZE != 0 {
        anyhow::bail!(
            "usage: logic8 source length {} is not a multiple of {}",
            src.len(),
            SOURCE_REP_SIZE
        );
    }
    let units = src.len() / SOURCE_REP_SIZE;
    if dst.len() < units {
        anyhow::bail!("usage: logic8 destination too small: {} < {}", dst.len(), units);
    }

    for (unit, chunk) in src.chunks_exact(SOURCE_REP_SIZE).enumerate() {
        let mut packed = 0u8;
        for (bit, &value) in chunk.iter().enumerate() {
            packed |= (value & 1) << bit;
        }
        dst[unit] = packed;
    }
    Ok(units)
}

/// Unpack `src` into `dst`, which must be exactly `src.len() * 8` bytes.
pub fn unpack(src: &[u8], dst: &mut [u8]) -> anyhow::Result<usize> {
    let expanded = src.len() * SOURCE_REP_SIZE;
    if dst.len() != expanded {
        anyhow::bail!(
            "corrupt column: logic8 unit count {} does not match output length {}",
            src.len(),
            dst.len()
        );
    }

    for (unit, &packed) in src.iter().enumerate() {
        let out = &mut dst[unit * SOURCE_REP_SIZE..(unit + 1) * SOURCE_REP_SIZE];
        for (bit, slot) in out.iter_mut().enumerate() {
            *slot = (packed >> bit) & 1;
        }
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_alternating() {
        let raw: Vec<u8> = (0..64).map(|i| (i % 3 == 0) as u8).collect();
        let mut packed = vec![0u8; raw.len() / 8];
        assert_eq!(pack(&raw, &mut packed).unwrap(), 8);

        let mut out = vec![0u8; raw.len()];
        unpack(&packed, &mut out).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn packs_lsb_first() {
        let raw = [1, 0, 0, 0, 0, 0, 0, 1];
        let mut packed = [0u8; 1];
        pack(&raw, &mut packed).unwrap();
        assert_eq!(packed[0], 0b1000_0001);
    }

    #[test]
    fn nonzero_bytes_fold_to_low_bit() {
        let raw = [0xff, 2, 1, 0, 0, 0, 0, 0];
        let mut packed = [0u8; 1];
        pack(&raw, &mut packed).unwrap();
        // only the low bit of each byte survives
        assert_eq!(packed[0], 0b0000_0101);
    }

    #[test]
    fn unaligned_source_rejected() {
        let raw = [1u8; 7];
        let mut packed = [0u8; 1];
        assert!(pack(&raw, &mut packed).is_err());
    }
}
