use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use xxhash_rust::xxh3::xxh3_64;

use cbs_core::column::{
    read_f64_column, read_i32_column, read_i64_column, read_logical_column, write_f64_column,
    write_i32_column, write_i64_column, write_logical_column,
};
use cbs_core::format::{BLOCK_INDEX_ENTRY_SIZE, COL_HEADER_SIZE};
use cbs_core::{read_annotation, BlockIndexEntry, ColumnHeader, ColumnKind, CompAlgo};

mod container;

use container::{ElemType, FileHeader, FILE_HEADER_SIZE};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "cbs",
    about = "Column Block Stream — write, read, and inspect block-compressed column files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GenPattern {
    /// Values equal to their row index
    Seq,
    /// Deterministic pseudo-random values
    Rand,
    /// A single repeated value
    Const,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a single-column file from generated or text input
    Write {
        /// Destination column file
        output: PathBuf,
        /// Element type of the column
        #[arg(short = 't', long, value_enum, default_value = "f64")]
        r#type: ElemType,
        /// Compression level 0–100
        #[arg(short, long, default_value_t = 50)]
        level: u8,
        /// Number of rows to generate (ignored with --input)
        #[arg(short, long, default_value_t = 100_000)]
        count: u64,
        /// Generated data pattern
        #[arg(short, long, value_enum, default_value = "seq")]
        gen: GenPattern,
        /// Seed for the rand pattern
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Read values from a text file, one per line, instead of generating
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Optional column annotation stored after the payloads
        #[arg(short, long)]
        annotation: Option<String>,
    },
    /// Print a row range of a column file
    Read {
        /// Column file
        file: PathBuf,
        /// First row to read
        #[arg(short, long, default_value_t = 0)]
        start: u64,
        /// Number of rows to read (defaults to the rest of the column)
        #[arg(short, long)]
        len: Option<u64>,
    },
    /// Print header metadata, block index statistics, and a payload digest
    Inspect {
        /// Column file
        file: PathBuf,
        /// Print the per-block index table
        #[arg(long)]
        blocks: bool,
    },
    /// Benchmark random row-range reads
    Bench {
        /// Column file
        file: PathBuf,
        /// Number of random reads
        #[arg(short, long, default_value_t = 1000)]
        count: u64,
        /// Rows per read
        #[arg(short, long, default_value_t = 1024)]
        window: u64,
        /// Fixed random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

/// Deterministic 64-bit LCG, the same constants as the test generators.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }
}

fn open_column(path: &PathBuf) -> anyhow::Result<(File, FileHeader)> {
    let mut file =
        File::open(path).with_context(|| format!("opening column file {:?}", path))?;
    let mut buf = [0u8; FILE_HEADER_SIZE as usize];
    file.read_exact(&mut buf)?;
    let header = FileHeader::from_bytes(&buf)?;
    Ok((file, header))
}

// ── write ──────────────────────────────────────────────────────────────────

fn parse_lines<T: std::str::FromStr>(path: &PathBuf) -> anyhow::Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("opening input file {:?}", path))?,
    );
    let mut values = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        values.push(
            trimmed
                .parse::<T>()
                .with_context(|| format!("{:?}:{}: invalid value {:?}", path, lineno + 1, trimmed))?,
        );
    }
    Ok(values)
}

#[allow(clippy::too_many_arguments)]
fn run_write(
    output: PathBuf,
    elem_type: ElemType,
    level: u8,
    count: u64,
    gen: GenPattern,
    seed: u64,
    input: Option<PathBuf>,
    annotation: Option<String>,
) -> anyhow::Result<()> {
    let mut file = File::create(&output)
        .with_context(|| format!("creating output file {:?}", output))?;

    // Placeholder preamble; patched once the annotation length is known.
    file.write_all(&[0u8; FILE_HEADER_SIZE as usize])?;

    let annotation_ref = annotation.as_deref();
    let mut rng = Lcg(seed);
    let t0 = Instant::now();

    let (total_rows, info) = match elem_type {
        ElemType::I32 => {
            let values: Vec<i32> = match &input {
                Some(path) => parse_lines(path)?,
                None => (0..count)
                    .map(|i| match gen {
                        GenPattern::Seq => i as i32,
                        GenPattern::Rand => (rng.next() >> 33) as i32,
                        GenPattern::Const => 7,
                    })
                    .collect(),
            };
            (values.len() as u64, write_i32_column(&mut file, &values, level, annotation_ref)?)
        }
        ElemType::I64 => {
            let values: Vec<i64> = match &input {
                Some(path) => parse_lines(path)?,
                None => (0..count)
                    .map(|i| match gen {
                        GenPattern::Seq => i as i64,
                        GenPattern::Rand => rng.next() as i64,
                        GenPattern::Const => 7,
                    })
                    .collect(),
            };
            (values.len() as u64, write_i64_column(&mut file, &values, level, annotation_ref)?)
        }
        ElemType::F64 => {
            let values: Vec<f64> = match &input {
                Some(path) => parse_lines(path)?,
                None => (0..count)
                    .map(|i| match gen {
                        GenPattern::Seq => i as f64,
                        GenPattern::Rand => (rng.next() >> 11) as f64 / (1u64 << 53) as f64,
                        GenPattern::Const => 7.0,
                    })
                    .collect(),
            };
            (values.len() as u64, write_f64_column(&mut file, &values, level, annotation_ref)?)
        }
        ElemType::Logical => {
            let values: Vec<u8> = match &input {
                Some(path) => parse_lines::<u8>(path)?
                    .into_iter()
                    .map(|v| (v != 0) as u8)
                    .collect(),
                None => (0..count)
                    .map(|i| match gen {
                        GenPattern::Seq => (i % 2) as u8,
                        GenPattern::Rand => (rng.next() >> 63) as u8,
                        GenPattern::Const => 1,
                    })
                    .collect(),
            };
            (values.len() as u64, write_logical_column(&mut file, &values, level, annotation_ref)?)
        }
    };
    let elapsed = t0.elapsed();

    let header = FileHeader {
        elem_type,
        total_rows,
        annotation_len: info.annotation.map(|(_, len)| len).unwrap_or(0),
    };
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&header.to_bytes())?;
    file.flush()?;

    let raw = total_rows * elem_type.element_size() as u64;
    eprintln!("  type        : {}", elem_type.name());
    eprintln!("  rows        : {}", total_rows);
    eprintln!("  level       : {}", level);
    eprintln!("  raw size    : {}", human_bytes(raw));
    eprintln!("  column size : {}", human_bytes(info.total_bytes));
    if info.total_bytes > 0 {
        eprintln!("  ratio       : {:.2}x", raw as f64 / info.total_bytes as f64);
    }
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

// ── read ───────────────────────────────────────────────────────────────────

fn print_values<T: std::fmt::Display>(values: &[T]) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for value in values {
        let _ = writeln!(out, "{}", value);
    }
}

fn run_read(path: PathBuf, start: u64, len: Option<u64>) -> anyhow::Result<()> {
    let (mut file, header) = open_column(&path)?;
    let len = len.unwrap_or_else(|| header.total_rows.saturating_sub(start));
    let rows = header.total_rows;

    match header.elem_type {
        ElemType::I32 => {
            print_values(&read_i32_column(&mut file, FILE_HEADER_SIZE, start, len, rows)?)
        }
        ElemType::I64 => {
            print_values(&read_i64_column(&mut file, FILE_HEADER_SIZE, start, len, rows)?)
        }
        ElemType::F64 => {
            print_values(&read_f64_column(&mut file, FILE_HEADER_SIZE, start, len, rows)?)
        }
        ElemType::Logical => {
            print_values(&read_logical_column(&mut file, FILE_HEADER_SIZE, start, len, rows)?)
        }
    }
    Ok(())
}

// ── inspect ────────────────────────────────────────────────────────────────

fn run_inspect(path: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let (mut file, header) = open_column(&path)?;
    let file_size = file.metadata()?.len();
    let element_size = header.elem_type.element_size() as u64;
    let raw_size = header.total_rows * element_size;

    let mut header_buf = [0u8; COL_HEADER_SIZE as usize];
    file.seek(SeekFrom::Start(FILE_HEADER_SIZE))?;
    file.read_exact(&mut header_buf)?;
    let col_header = ColumnHeader::from_bytes(&header_buf);

    println!("=== CBS column file: {:?} ===", path);
    println!();
    println!("  type          : {}", header.elem_type.name());
    println!("  rows          : {}", header.total_rows);
    println!("  raw size      : {}", human_bytes(raw_size));
    println!("  file on disk  : {}", human_bytes(file_size));

    match col_header.kind()? {
        ColumnKind::Uncompressed => {
            println!("  path          : uncompressed");
            let payload_start = FILE_HEADER_SIZE + COL_HEADER_SIZE;
            println!("  payload       : {}", human_bytes(raw_size));
            println!("  digest        : {:016x}", digest_region(&mut file, payload_start, raw_size)?);
        }
        ColumnKind::FixedRatio(algo) => {
            let units = raw_size.div_ceil(cbs_codecs::source_rep_size(algo) as u64);
            let payload = units * cbs_codecs::target_rep_size(algo) as u64;
            println!("  path          : fixed-ratio ({})", algo.name());
            println!("  units         : {}", units);
            println!("  payload       : {}", human_bytes(payload));
            if payload > 0 {
                println!("  ratio         : {:.2}x", raw_size as f64 / payload as f64);
            }
            let payload_start = FILE_HEADER_SIZE + COL_HEADER_SIZE;
            println!("  digest        : {:016x}", digest_region(&mut file, payload_start, payload)?);
        }
        ColumnKind::VariableRatio { block_elems } => {
            let blocks = header.total_rows.div_ceil(block_elems as u64);
            let mut raw_index = vec![0u8; ((blocks + 1) * BLOCK_INDEX_ENTRY_SIZE) as usize];
            file.read_exact(&mut raw_index)?;
            let entries: Vec<BlockIndexEntry> = raw_index
                .chunks_exact(BLOCK_INDEX_ENTRY_SIZE as usize)
                .map(|chunk| BlockIndexEntry::from_bytes(chunk.try_into().unwrap()))
                .collect();

            let payload_start = entries.first().map(|e| e.offset).unwrap_or(0);
            let payload_end = entries.last().map(|e| e.offset).unwrap_or(0);
            let payload = payload_end - payload_start;
            let verbatim = entries[..blocks as usize].iter().filter(|e| e.algo_id == 0).count();

            println!("  path          : variable-ratio");
            println!("  block size    : {} elements", block_elems);
            println!("  blocks        : {} ({} verbatim)", blocks, verbatim);
            println!("  payload       : {}", human_bytes(payload));
            if payload > 0 {
                println!("  ratio         : {:.2}x", raw_size as f64 / payload as f64);
            }
            println!("  digest        : {:016x}", digest_region(&mut file, payload_start, payload)?);

            if show_blocks {
                println!();
                println!("  {:>6}  {:>14}  {:>12}  {:>8}", "block", "offset", "size", "algo");
                println!("  {}", "-".repeat(48));
                for (i, pair) in entries.windows(2).enumerate() {
                    let algo = match CompAlgo::from_id(pair[0].algo_id) {
                        Some(a) => a.name(),
                        None if pair[0].algo_id == 0 => "verbatim",
                        None => "?",
                    };
                    println!(
                        "  {:>6}  {:>14}  {:>12}  {:>8}",
                        i,
                        pair[0].offset,
                        human_bytes(pair[1].offset - pair[0].offset),
                        algo
                    );
                }
            }
        }
    }

    if header.annotation_len > 0 {
        let annotation_offset = file_size - header.annotation_len as u64;
        let text = read_annotation(&mut file, annotation_offset, header.annotation_len)?;
        println!("  annotation    : {:?}", text);
    }
    Ok(())
}

fn digest_region<R: Read + Seek>(source: &mut R, offset: u64, len: u64) -> anyhow::Result<u64> {
    source.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    source.read_exact(&mut buf)?;
    Ok(xxh3_64(&buf))
}

// ── bench ──────────────────────────────────────────────────────────────────

fn bench_ranges<T: PartialEq>(
    full: &[T],
    mut read_range: impl FnMut(u64, u64) -> anyhow::Result<Vec<T>>,
    count: u64,
    window: u64,
    seed: u64,
) -> anyhow::Result<(Vec<u64>, u64)> {
    let rows = full.len() as u64;
    let window = window.min(rows);
    let mut rng = Lcg(seed);
    let mut latencies_us = Vec::with_capacity(count as usize);
    let mut rows_read = 0u64;

    for _ in 0..count {
        let start = if rows == window { 0 } else { (rng.next() >> 24) % (rows - window) };
        let t = Instant::now();
        let values = read_range(start, window)?;
        latencies_us.push(t.elapsed().as_micros() as u64);

        if values != full[start as usize..(start + window) as usize] {
            anyhow::bail!("range ({}, {}) disagrees with the full read", start, window);
        }
        rows_read += window;
    }
    latencies_us.sort_unstable();
    Ok((latencies_us, rows_read))
}

fn run_bench(path: PathBuf, count: u64, window: u64, seed: u64) -> anyhow::Result<()> {
    let (mut file, header) = open_column(&path)?;
    let rows = header.total_rows;
    if rows == 0 {
        anyhow::bail!("column is empty");
    }

    eprintln!(
        "benchmarking {} random reads of {} rows across {} total rows...",
        count, window, rows
    );

    let element_size = header.elem_type.element_size() as u64;
    let t0 = Instant::now();
    let (latencies_us, rows_read) = match header.elem_type {
        ElemType::I32 => {
            let full = read_i32_column(&mut file, FILE_HEADER_SIZE, 0, rows, rows)?;
            bench_ranges(
                &full,
                |s, l| read_i32_column(&mut file, FILE_HEADER_SIZE, s, l, rows),
                count,
                window,
                seed,
            )?
        }
        ElemType::I64 => {
            let full = read_i64_column(&mut file, FILE_HEADER_SIZE, 0, rows, rows)?;
            bench_ranges(
                &full,
                |s, l| read_i64_column(&mut file, FILE_HEADER_SIZE, s, l, rows),
                count,
                window,
                seed,
            )?
        }
        ElemType::F64 => {
            let full = read_f64_column(&mut file, FILE_HEADER_SIZE, 0, rows, rows)?;
            bench_ranges(
                &full,
                |s, l| read_f64_column(&mut file, FILE_HEADER_SIZE, s, l, rows),
                count,
                window,
                seed,
            )?
        }
        ElemType::Logical => {
            let full = read_logical_column(&mut file, FILE_HEADER_SIZE, 0, rows, rows)?;
            bench_ranges(
                &full,
                |s, l| read_logical_column(&mut file, FILE_HEADER_SIZE, s, l, rows),
                count,
                window,
                seed,
            )?
        }
    };
    let elapsed = t0.elapsed();

    let p50 = latencies_us[latencies_us.len() / 2];
    let p95 = latencies_us[(latencies_us.len() as f64 * 0.95) as usize];
    let p99 = latencies_us[(latencies_us.len() as f64 * 0.99) as usize];

    println!();
    println!("=== Random Range Read Benchmark ===");
    println!("  reads       : {}", count);
    println!("  rows read   : {}", rows_read);
    println!("  verified    : all ranges match the full read");
    println!(
        "  throughput  : {}/s",
        human_bytes(((rows_read * element_size) as f64 / elapsed.as_secs_f64()) as u64)
    );
    println!("  latency:");
    println!("    min  : {} µs", latencies_us[0]);
    println!("    p50  : {} µs", p50);
    println!("    p95  : {} µs", p95);
    println!("    p99  : {} µs", p99);
    println!("    max  : {} µs", latencies_us[latencies_us.len() - 1]);
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Write {
            output,
            r#type,
            level,
            count,
            gen,
            seed,
            input,
            annotation,
        } => run_write(output, r#type, level, count, gen, seed, input, annotation),
        Commands::Read { file, start, len } => run_read(file, start, len),
        Commands::Inspect { file, blocks } => run_inspect(file, blocks),
        Commands::Bench { file, count, window, seed } => run_bench(file, count, window, seed),
    }
}
