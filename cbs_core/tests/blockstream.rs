//! Write/read properties of the column block stream:
//!
//! 1. Round-trip over the size × level grid (empty, single-element, and
//!    block-boundary-straddling columns at every strategy range).
//! 2. Sub-range reads equal the same slice of a full read, at every
//!    boundary shape a range can take.
//! 3. Layout invariants: monotonic index offsets, sentinel position, exact
//!    uncompressed size.
//! 4. Determinism: same input + level → byte-identical output.
//! 5. Fixed-ratio unit splicing at unaligned boundaries.

use std::io::Cursor;

use cbs_core::column::{
    read_f64_column, read_i32_column, read_i64_column, read_logical_column, write_f64_column,
    write_i32_column, write_i64_column, write_logical_column,
};
use cbs_core::format::{BLOCK_ELEMS_F64, BLOCK_ELEMS_I32, BLOCK_INDEX_ENTRY_SIZE, COL_HEADER_SIZE};
use cbs_core::{read_annotation, BlockIndexEntry, ColumnHeader, CompAlgo, WrittenColumn};

const LEVELS: &[u8] = &[0, 1, 25, 50, 51, 75, 100];

/// Mildly compressible deterministic doubles.
fn sample_f64(n: usize) -> Vec<f64> {
    (0..n).map(|i| ((i / 7) as f64) * 0.5 - 3.0).collect()
}

/// Runs of 16 identical values — compressible for both codecs.
fn sample_i32(n: usize) -> Vec<i32> {
    (0..n).map(|i| (i / 16) as i32).collect()
}

fn write_f64(values: &[f64], level: u8) -> (Vec<u8>, WrittenColumn) {
    let mut sink = Cursor::new(Vec::new());
    let info = write_f64_column(&mut sink, values, level, None).unwrap();
    (sink.into_inner(), info)
}

fn write_i32(values: &[i32], level: u8) -> (Vec<u8>, WrittenColumn) {
    let mut sink = Cursor::new(Vec::new());
    let info = write_i32_column(&mut sink, values, level, None).unwrap();
    (sink.into_inner(), info)
}

// ── Round-trip grid ────────────────────────────────────────────────────────

#[test]
fn roundtrip_f64_sizes_and_levels() {
    let b = BLOCK_ELEMS_F64;
    for n in [0, 1, b - 1, b, b + 1, 7 * b + 3] {
        let values = sample_f64(n);
        for &level in LEVELS {
            let (bytes, _) = write_f64(&values, level);
            let got =
                read_f64_column(&mut Cursor::new(&bytes), 0, 0, n as u64, n as u64).unwrap();
            assert_eq!(got, values, "n={} level={}", n, level);
        }
    }
}

#[test]
fn roundtrip_i32_sizes_and_levels() {
    let b = BLOCK_ELEMS_I32;
    for n in [0, 1, b - 1, b, b + 1, 7 * b + 3] {
        let values = sample_i32(n);
        for &level in LEVELS {
            let (bytes, _) = write_i32(&values, level);
            let got =
                read_i32_column(&mut Cursor::new(&bytes), 0, 0, n as u64, n as u64).unwrap();
            assert_eq!(got, values, "n={} level={}", n, level);
        }
    }
}

#[test]
fn roundtrip_i64() {
    let values: Vec<i64> = (0..5000).map(|i| (i as i64) << 17).collect();
    for &level in LEVELS {
        let mut sink = Cursor::new(Vec::new());
        write_i64_column(&mut sink, &values, level, None).unwrap();
        let bytes = sink.into_inner();
        let got = read_i64_column(
            &mut Cursor::new(&bytes),
            0,
            0,
            values.len() as u64,
            values.len() as u64,
        )
        .unwrap();
        assert_eq!(got, values, "level={}", level);
    }
}

#[test]
fn roundtrip_logical() {
    for n in [0usize, 1, 7, 8, 9, 17, 1000] {
        let values: Vec<u8> = (0..n).map(|i| (i % 3 == 1) as u8).collect();
        for level in [0u8, 50] {
            let mut sink = Cursor::new(Vec::new());
            write_logical_column(&mut sink, &values, level, None).unwrap();
            let bytes = sink.into_inner();
            let got =
                read_logical_column(&mut Cursor::new(&bytes), 0, 0, n as u64, n as u64).unwrap();
            assert_eq!(got, values, "n={} level={}", n, level);
        }
    }
}

// ── Sub-range reads ────────────────────────────────────────────────────────

#[test]
fn subrange_reads_match_full_read() {
    let b = BLOCK_ELEMS_F64 as u64;
    let n = 7 * b + 3;
    let values = sample_f64(n as usize);

    for &level in &[0u8, 25, 75] {
        let (bytes, _) = write_f64(&values, level);
        let mut source = Cursor::new(&bytes);

        let cases: &[(u64, u64)] = &[
            (0, n),              // full column
            (0, 10),             // prefix
            (n - 10, 10),        // suffix
            (b + 5, 100),        // inside a single block
            (b - 50, 100),       // spans two blocks
            (b - 50, 3 * b),     // spans four blocks
            (2 * b, b),          // exactly one full block
            (3 * b - 100, 100),  // ends exactly on a block boundary
            (b - 1, 1),          // single element at a block edge
            (123, 0),            // empty range
        ];
        for &(start, len) in cases {
            let got = read_f64_column(&mut source, 0, start, len, n).unwrap();
            assert_eq!(
                got,
                values[start as usize..(start + len) as usize],
                "level={} start={} len={}",
                level,
                start,
                len
            );
        }
    }
}

#[test]
fn out_of_range_read_is_rejected() {
    let values = sample_i32(100);
    let (bytes, _) = write_i32(&values, 25);
    assert!(read_i32_column(&mut Cursor::new(&bytes), 0, 64, 64, 100).is_err());
}

// ── Layout invariants ──────────────────────────────────────────────────────

fn parse_index(bytes: &[u8], blocks: usize) -> Vec<BlockIndexEntry> {
    let start = COL_HEADER_SIZE as usize;
    let entry = BLOCK_INDEX_ENTRY_SIZE as usize;
    (0..blocks + 1)
        .map(|i| {
            let at = start + i * entry;
            BlockIndexEntry::from_bytes(bytes[at..at + entry].try_into().unwrap())
        })
        .collect()
}

#[test]
fn block_index_offsets_are_monotonic_and_sentinel_marks_payload_end() {
    let n = 100_000;
    let values = sample_i32(n);
    let (bytes, info) = write_i32(&values, 25);

    let header = ColumnHeader::from_bytes(bytes[..8].try_into().unwrap());
    assert_ne!(header.flag, 0);
    assert_eq!(header.value, BLOCK_ELEMS_I32 as u32);

    let blocks = n.div_ceil(BLOCK_ELEMS_I32);
    assert_eq!(blocks, 25);
    let entries = parse_index(&bytes, blocks);
    assert_eq!(entries.len(), 26);

    let payload_start = COL_HEADER_SIZE + 26 * BLOCK_INDEX_ENTRY_SIZE;
    assert_eq!(entries[0].offset, payload_start);
    for pair in entries.windows(2) {
        assert!(pair[0].offset < pair[1].offset, "offsets must be strictly monotonic");
    }
    assert_eq!(entries[25].offset, info.payload_end);
    assert_eq!(entries[25].offset, bytes.len() as u64, "sentinel marks end of payloads");
}

#[test]
fn linear_mix_emits_both_verbatim_and_compressed_blocks() {
    // level 25 → mix 50: half the blocks verbatim, half LZ4
    let values = sample_i32(100_000);
    let (bytes, _) = write_i32(&values, 25);
    let entries = parse_index(&bytes, 25);

    let verbatim = entries[..25].iter().filter(|e| e.algo_id == 0).count();
    let lz4 = entries[..25]
        .iter()
        .filter(|e| e.algo_id == CompAlgo::Lz4.id())
        .count();
    assert_eq!(verbatim + lz4, 25);
    assert!(verbatim > 0 && lz4 > 0, "verbatim={} lz4={}", verbatim, lz4);
}

#[test]
fn uncompressed_column_size_is_exact() {
    let values = sample_f64(999);
    let (bytes, info) = write_f64(&values, 0);
    assert_eq!(bytes.len() as u64, COL_HEADER_SIZE + 999 * 8);
    assert_eq!(info.total_bytes, bytes.len() as u64);
    assert_eq!(bytes[..8], [0u8; 8]);
}

#[test]
fn output_size_does_not_increase_with_level() {
    let values = sample_i32(200_000);
    let uncompressed = write_i32(&values, 0).0.len();
    let mut previous = uncompressed;
    for &level in &[1u8, 25, 50, 75, 100] {
        let size = write_i32(&values, level).0.len();
        assert!(
            size as f64 <= previous as f64 * 1.05,
            "level {} grew output: {} -> {}",
            level,
            previous,
            size
        );
        previous = size;
    }
    assert!(previous < uncompressed, "level 100 must beat level 0 on compressible data");
}

#[test]
fn writes_are_deterministic() {
    let values = sample_f64(10_000);
    for &level in LEVELS {
        let first = write_f64(&values, level).0;
        let second = write_f64(&values, level).0;
        assert_eq!(first, second, "level={}", level);
    }
}

// ── Fixed-ratio splicing ───────────────────────────────────────────────────

#[test]
fn fixed_ratio_unaligned_windows() {
    let n = 64u64;
    let values: Vec<u8> = (0..n).map(|i| (i % 5 == 0) as u8).collect();
    let mut sink = Cursor::new(Vec::new());
    write_logical_column(&mut sink, &values, 50, None).unwrap();
    let bytes = sink.into_inner();
    let mut source = Cursor::new(&bytes);

    let cases: &[(u64, u64)] = &[
        (3, 33),  // both ends unaligned
        (5, 10),  // crosses one unit boundary
        (8, 16),  // both ends unit-aligned
        (8, 8),   // exactly one unit
        (9, 3),   // inside a single unit
        (63, 1),  // final element
        (0, 64),  // whole column
    ];
    for &(start, len) in cases {
        let got = read_logical_column(&mut source, 0, start, len, n).unwrap();
        assert_eq!(
            got,
            values[start as usize..(start + len) as usize],
            "start={} len={}",
            start,
            len
        );
    }
}

#[test]
fn fixed_ratio_payload_size_is_deterministic() {
    // 17 logicals → 3 packed units of 1 byte each
    let values: Vec<u8> = (0..17).map(|i| (i % 2) as u8).collect();
    let mut sink = Cursor::new(Vec::new());
    let info = write_logical_column(&mut sink, &values, 100, None).unwrap();
    assert_eq!(info.total_bytes, COL_HEADER_SIZE + 3);
}

// ── Annotation ─────────────────────────────────────────────────────────────

#[test]
fn annotation_roundtrip() {
    let values = sample_f64(5000);
    let mut sink = Cursor::new(Vec::new());
    let info = write_f64_column(&mut sink, &values, 75, Some("speed in m/s")).unwrap();
    let bytes = sink.into_inner();

    let (offset, len) = info.annotation.expect("annotation was written");
    assert_eq!(offset, info.payload_end);
    let text = read_annotation(&mut Cursor::new(&bytes), offset, len).unwrap();
    assert_eq!(text, "speed in m/s");

    // annotation must not disturb the data
    let got = read_f64_column(&mut Cursor::new(&bytes), 0, 4000, 1000, 5000).unwrap();
    assert_eq!(got, values[4000..]);
}
