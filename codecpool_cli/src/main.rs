use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use codecpool_codecs::{
    family_by_name, DeflateCompressor, Family, GzipCompressor, PoolRegistry, ZstdCompressor,
};
use codecpool_core::{Compressor, Decompressor, PoolStats, ReaderPool, WriterPool};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "codecpool",
    about = "Compress and decompress streams through pooled, recycled codec instances",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file or stdin
    Compress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes stdout)
        output: PathBuf,
        /// Codec to use: gzip | deflate | zstd
        #[arg(short, long, default_value = "gzip")]
        codec: String,
        /// Compression level (default: the codec's best level)
        #[arg(short, long)]
        level: Option<i32>,
    },
    /// Decompress a gzip or zstd stream
    Decompress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes stdout)
        output: PathBuf,
        /// Codec the input was written with: gzip | zstd
        #[arg(short, long, default_value = "gzip")]
        codec: String,
    },
    /// Run concurrent acquire/write/release cycles and report pool reuse
    Bench {
        /// Codec to exercise: gzip | deflate | zstd
        #[arg(short, long, default_value = "gzip")]
        codec: String,
        /// Concurrent worker threads
        #[arg(short, long, default_value_t = 8)]
        threads: usize,
        /// Cycles per thread
        #[arg(short, long, default_value_t = 1000)]
        iterations: usize,
        /// Payload bytes per cycle
        #[arg(long, default_value_t = 4096)]
        payload: usize,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Writer pool for a single `compress` run; only the requested family is built.
fn writer_pool<C: Compressor>(level: Option<C::Level>) -> anyhow::Result<WriterPool<C>> {
    match level {
        Some(level) => Ok(WriterPool::new(level)?),
        None => Ok(WriterPool::best()),
    }
}

fn flate_level(level: i32) -> anyhow::Result<u32> {
    u32::try_from(level).map_err(|_| anyhow::anyhow!("level must be 0-9 for deflate and gzip, got {level}"))
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if path.to_str() == Some("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("opening input file {:?}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: &Path) -> anyhow::Result<Box<dyn Write>> {
    if path.to_str() == Some("-") {
        return Ok(Box::new(io::stdout().lock()));
    }
    let file = File::create(path).with_context(|| format!("creating output file {:?}", path))?;
    Ok(Box::new(BufWriter::new(file)))
}

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

/// Counts bytes passing through to the inner writer.
struct Counted<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for Counted<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(data)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn compress_stream<C: Compressor>(
    pool: &WriterPool<C>,
    mut src: impl Read,
    dst: impl Write,
) -> anyhow::Result<(u64, u64)> {
    let mut writer = pool.acquire_writer(Counted { inner: dst, count: 0 })?;
    let raw = io::copy(&mut src, &mut writer).context("compressing input")?;
    let sink = pool.release_writer(writer).context("finalizing compressed stream")?;
    Ok((raw, sink.count))
}

fn decompress_stream<D: Decompressor>(
    pool: &ReaderPool<D>,
    src: impl Read,
    mut dst: impl Write,
) -> anyhow::Result<u64> {
    let mut reader = pool.acquire_reader(src).context("reading stream header")?;
    let raw = io::copy(&mut reader, &mut dst).context("decompressing input")?;
    pool.release_reader(reader);
    dst.flush()?;
    Ok(raw)
}

fn print_stats(label: &str, stats: PoolStats) {
    eprintln!(
        "  {:<11} : constructed {}, reused {}, released {}, discarded {}, idle {}",
        label, stats.constructed, stats.reused, stats.released, stats.discarded, stats.idle
    );
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(input: PathBuf, output: PathBuf, codec: &str, level: Option<i32>) -> anyhow::Result<()> {
    let family = family_by_name(codec)?;
    let src = open_input(&input)?;
    let dst = open_output(&output)?;

    let t0 = Instant::now();
    let (raw, compressed) = match family {
        Family::Deflate => {
            let pool = writer_pool::<DeflateCompressor>(level.map(flate_level).transpose()?)?;
            compress_stream(&pool, src, dst)?
        }
        Family::Gzip => {
            let pool = writer_pool::<GzipCompressor>(level.map(flate_level).transpose()?)?;
            compress_stream(&pool, src, dst)?
        }
        Family::Zstd => compress_stream(&writer_pool::<ZstdCompressor>(level)?, src, dst)?,
    };
    let elapsed = t0.elapsed();
    info!(codec = family.name(), raw, compressed, "compressed stream");

    let ratio = if compressed == 0 { 1.0 } else { raw as f64 / compressed as f64 };
    eprintln!("  codec       : {}", family.name());
    eprintln!("  raw size    : {}", human_bytes(raw));
    eprintln!("  compressed  : {}", human_bytes(compressed));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf, codec: &str) -> anyhow::Result<()> {
    let family = family_by_name(codec)?;
    let registry = PoolRegistry::global();
    let src = open_input(&input)?;
    let dst = open_output(&output)?;

    let t0 = Instant::now();
    let raw = match family {
        Family::Gzip => decompress_stream(registry.gzip_readers(), src, dst)?,
        Family::Zstd => decompress_stream(registry.zstd_readers(), src, dst)?,
        Family::Deflate => anyhow::bail!("raw deflate has no pooled reader; use gzip or zstd"),
    };
    let elapsed = t0.elapsed();
    info!(codec = family.name(), raw, "decompressed stream");

    eprintln!("  raw size    : {}", human_bytes(raw));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((raw as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

/// One worker: compress a thread-specific payload `iterations` times and
/// check every sink decodes back to it.
fn bench_worker(
    registry: &PoolRegistry,
    family: Family,
    worker: usize,
    iterations: usize,
    payload_len: usize,
) -> anyhow::Result<u64> {
    let tag = format!("worker {worker:04}: ");
    let payload: Vec<u8> = tag.bytes().cycle().take(payload_len.max(tag.len())).collect();
    let mut compressed_total = 0u64;

    for _ in 0..iterations {
        let sink = match family {
            Family::Deflate => compress_once(registry.deflate_writers(), &payload)?,
            Family::Gzip => compress_once(registry.gzip_writers(), &payload)?,
            Family::Zstd => compress_once(registry.zstd_writers(), &payload)?,
        };
        compressed_total += sink.len() as u64;

        let decoded = match family {
            Family::Deflate => {
                let mut out = Vec::with_capacity(payload.len());
                flate2::read::DeflateDecoder::new(&sink[..]).read_to_end(&mut out)?;
                out
            }
            Family::Gzip => decompress_once(registry.gzip_readers(), &sink)?,
            Family::Zstd => decompress_once(registry.zstd_readers(), &sink)?,
        };
        if decoded != payload {
            anyhow::bail!("worker {worker}: sink decoded to the wrong payload");
        }
    }
    Ok(compressed_total)
}

fn compress_once<C: Compressor>(pool: &WriterPool<C>, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut writer = pool.acquire_writer(Vec::new())?;
    writer.write_all(payload)?;
    Ok(pool.release_writer(writer)?)
}

fn decompress_once<D: Decompressor>(pool: &ReaderPool<D>, compressed: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut reader = pool.acquire_reader(compressed)?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    pool.release_reader(reader);
    Ok(out)
}

fn run_bench(codec: &str, threads: usize, iterations: usize, payload: usize) -> anyhow::Result<()> {
    let family = family_by_name(codec)?;
    let registry = Arc::new(PoolRegistry::new());

    eprintln!(
        "running {} × {} {} cycles ({} payload each)...",
        threads,
        iterations,
        family.name(),
        human_bytes(payload as u64)
    );

    let t0 = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || bench_worker(&registry, family, worker, iterations, payload))
        })
        .collect();

    let mut compressed_total = 0u64;
    for handle in handles {
        compressed_total += handle
            .join()
            .map_err(|_| anyhow::anyhow!("bench worker panicked"))??;
    }
    let elapsed = t0.elapsed();
    let cycles = (threads * iterations) as f64;
    debug!(cycles, elapsed_ms = elapsed.as_millis() as u64, "bench finished");

    println!();
    println!("=== Pooled {} Benchmark ===", family.name());
    println!("  cycles      : {}", threads * iterations);
    println!("  compressed  : {}", human_bytes(compressed_total));
    println!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    println!("  rate        : {:.0} cycles/s", cycles / elapsed.as_secs_f64());
    println!("  pools:");
    let writers = match family {
        Family::Deflate => registry.deflate_writers().stats(),
        Family::Gzip => registry.gzip_writers().stats(),
        Family::Zstd => registry.zstd_writers().stats(),
    };
    print_stats("writers", writers);
    match family {
        Family::Gzip => print_stats("readers", registry.gzip_readers().stats()),
        Family::Zstd => print_stats("readers", registry.zstd_readers().stats()),
        Family::Deflate => {}
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compress {
            input,
            output,
            codec,
            level,
        } => run_compress(input, output, &codec, level),
        Commands::Decompress {
            input,
            output,
            codec,
        } => run_decompress(input, output, &codec),
        Commands::Bench {
            codec,
            threads,
            iterations,
            payload,
        } => run_bench(&codec, threads, iterations, payload),
    }
}
