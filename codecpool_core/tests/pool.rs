/// Pool protocol tests against small in-memory codecs whose every instance
/// carries a unique id, so reuse and aliasing are directly observable.
use std::collections::HashSet;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use codecpool_core::{Compressor, Decompressor, Pool, PoolError, ReaderPool, Resettable, WriterPool};

// ── test codecs ─────────────────────────────────────────────────────────────

const FRAME_MAGIC: u8 = 0xC0;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Writes `[MAGIC, level]`, the payload verbatim, then the payload length as
/// a u32 LE trailer.
struct Framer {
    id: u64,
    level: u8,
    started: bool,
    written: u32,
    needs_reset: bool,
}

struct FramerWriter<W> {
    state: Framer,
    sink: W,
}

impl FramerWriter<Vec<u8>> {
    fn id(&self) -> u64 {
        self.state.id
    }
}

impl<W: Write> FramerWriter<W> {
    fn start(&mut self) -> io::Result<()> {
        if !self.state.started {
            self.sink.write_all(&[FRAME_MAGIC, self.state.level])?;
            self.state.started = true;
        }
        Ok(())
    }
}

impl<W: Write> Write for FramerWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.start()?;
        self.sink.write_all(data)?;
        self.state.written += data.len() as u32;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl Resettable for Framer {
    fn reset(&mut self) -> io::Result<()> {
        self.started = false;
        self.written = 0;
        self.needs_reset = false;
        Ok(())
    }
}

impl Compressor for Framer {
    type Level = u8;
    type Writer<W: Write> = FramerWriter<W>;

    fn name() -> &'static str {
        "framer"
    }

    fn best_level() -> u8 {
        9
    }

    fn validate_level(level: u8) -> Result<(), PoolError> {
        if level > 9 {
            return Err(PoolError::Configuration(format!("framer level {level} out of range 0..=9")));
        }
        Ok(())
    }

    fn new(level: u8) -> io::Result<Self> {
        Ok(Self {
            id: next_id(),
            level,
            started: false,
            written: 0,
            needs_reset: false,
        })
    }

    fn bind<W: Write>(self, sink: W) -> FramerWriter<W> {
        assert!(!self.needs_reset, "instance {} bound without a reset", self.id);
        FramerWriter { state: self, sink }
    }

    fn finish<W: Write>(mut writer: FramerWriter<W>) -> io::Result<(Self, W)> {
        writer.start()?;
        writer.sink.write_all(&writer.state.written.to_le_bytes())?;
        writer.sink.flush()?;
        writer.state.needs_reset = true;
        Ok((writer.state, writer.sink))
    }
}

/// A compressor whose reset always fails.
struct Brittle;

impl Resettable for Brittle {
    fn reset(&mut self) -> io::Result<()> {
        Err(io::Error::other("cannot reset"))
    }
}

impl Compressor for Brittle {
    type Level = ();
    type Writer<W: Write> = W;

    fn name() -> &'static str {
        "brittle"
    }

    fn best_level() {}

    fn validate_level(_level: ()) -> Result<(), PoolError> {
        Ok(())
    }

    fn new(_level: ()) -> io::Result<Self> {
        Ok(Brittle)
    }

    fn bind<W: Write>(self, sink: W) -> W {
        sink
    }

    fn finish<W: Write>(writer: W) -> io::Result<(Self, W)> {
        Ok((Brittle, writer))
    }
}

/// Sink that refuses every write.
#[derive(Debug)]
struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reads `Framer` output back, validating the two-byte header at bind.
#[derive(Debug)]
struct Unframer {
    id: u64,
}

#[derive(Debug)]
struct UnframerReader<R> {
    state: Unframer,
    source: R,
}

impl<R: Read> Read for UnframerReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.source.read(out)
    }
}

impl Resettable for Unframer {
    fn reset(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Decompressor for Unframer {
    type Reader<R: Read> = UnframerReader<R>;

    fn name() -> &'static str {
        "unframer"
    }

    fn new() -> io::Result<Self> {
        Ok(Self { id: next_id() })
    }

    fn bind<R: Read>(self, mut source: R) -> io::Result<UnframerReader<R>> {
        let mut header = [0u8; 2];
        source.read_exact(&mut header)?;
        if header[0] != FRAME_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad frame magic"));
        }
        Ok(UnframerReader { state: self, source })
    }

    fn finish<R: Read>(reader: UnframerReader<R>) -> (Self, R) {
        (reader.state, reader.source)
    }
}

fn framed(level: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![FRAME_MAGIC, level];
    out.extend_from_slice(payload);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out
}

// ── Pool<T> ─────────────────────────────────────────────────────────────────

#[test]
fn test_pool_get_put_clear() {
    let pool = Pool::new();
    assert_eq!(pool.get(), None::<u32>);

    pool.put(1);
    pool.put(2);
    assert_eq!(pool.idle(), 2);

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    assert_ne!(a, b);
    assert_eq!(pool.get(), None);

    pool.put(3);
    pool.put(4);
    assert_eq!(pool.clear(), 2);
    assert_eq!(pool.idle(), 0);
}

// ── WriterPool ──────────────────────────────────────────────────────────────

#[test]
fn test_invalid_level_is_configuration_error() {
    let err = WriterPool::<Framer>::new(12).unwrap_err();
    assert!(matches!(err, PoolError::Configuration(_)), "got {err:?}");
}

#[test]
fn test_new_primes_one_instance() {
    let pool = WriterPool::<Framer>::new(3).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.constructed, 1);
    assert_eq!(stats.idle, 1);

    let w = pool.acquire_writer(Vec::new()).unwrap();
    let stats = pool.stats();
    assert_eq!(stats.constructed, 1);
    assert_eq!(stats.reused, 1);
    drop(w);
}

#[test]
fn test_best_builds_lazily_at_best_level() {
    let pool = WriterPool::<Framer>::best();
    assert_eq!(pool.level(), 9);
    assert_eq!(pool.stats().constructed, 0);

    let mut w = pool.acquire_writer(Vec::new()).unwrap();
    w.write_all(b"x").unwrap();
    let sink = pool.release_writer(w).unwrap();
    assert_eq!(sink, framed(9, b"x"));
}

#[test]
fn test_release_finalizes_and_recycles_instance() {
    let pool = WriterPool::<Framer>::best();

    let mut w1 = pool.acquire_writer(Vec::new()).unwrap();
    let first_id = w1.id();
    w1.write_all(b"hello").unwrap();
    let s1 = pool.release_writer(w1).unwrap();
    assert_eq!(s1, framed(9, b"hello"));

    let mut w2 = pool.acquire_writer(Vec::new()).unwrap();
    assert_eq!(w2.id(), first_id, "idle instance should be reused");
    w2.write_all(b"world").unwrap();
    let s2 = pool.release_writer(w2).unwrap();
    assert_eq!(s2, framed(9, b"world"), "second session must not carry state from the first");

    let stats = pool.stats();
    assert_eq!(stats.constructed, 1);
    assert_eq!(stats.reused, 1);
    assert_eq!(stats.released, 2);
    assert_eq!(stats.idle, 1);
}

#[test]
fn test_release_with_borrowed_sink() {
    let pool = WriterPool::<Framer>::best();
    let mut out = Vec::new();

    let mut w = pool.acquire_writer(&mut out).unwrap();
    w.write_all(b"abc").unwrap();
    pool.release_writer(w).unwrap();

    assert_eq!(out, framed(9, b"abc"));
}

#[test]
fn test_failed_finalize_drops_instance() {
    let pool = WriterPool::<Framer>::best();
    let w = pool.acquire_writer(BrokenSink).unwrap();

    let err = pool.release_writer(w).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

    let stats = pool.stats();
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.idle, 0);
}

#[test]
fn test_failed_reset_falls_back_to_construction() {
    let pool = WriterPool::<Brittle>::new(()).unwrap();

    let w = pool.acquire_writer(Vec::new()).unwrap();
    pool.release_writer(w).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.constructed, 2, "primed instance failed reset, so a new one was built");
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.reused, 0);
    assert_eq!(stats.idle, 1);
}

#[test]
fn test_clear_drops_idle_only() {
    let pool = WriterPool::<Framer>::best();
    let a = pool.acquire_writer(Vec::new()).unwrap();
    let b = pool.acquire_writer(Vec::new()).unwrap();
    pool.release_writer(a).unwrap();

    assert_eq!(pool.clear(), 1);

    let sink = pool.release_writer(b).unwrap();
    assert_eq!(sink, framed(9, b""));
    assert_eq!(pool.stats().idle, 1);
}

#[test]
fn test_concurrent_acquire_never_aliases() {
    const THREADS: usize = 16;
    const CYCLES: usize = 500;

    let pool = Arc::new(WriterPool::<Framer>::best());
    let live: Arc<Mutex<HashSet<u64>>> = Arc::default();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let live = Arc::clone(&live);
            thread::spawn(move || {
                for i in 0..CYCLES {
                    let payload = format!("thread {t} cycle {i}");
                    let mut w = pool.acquire_writer(Vec::new()).unwrap();
                    let id = w.id();
                    assert!(live.lock().unwrap().insert(id), "instance {id} handed out twice");

                    w.write_all(payload.as_bytes()).unwrap();

                    assert!(live.lock().unwrap().remove(&id));
                    let sink = pool.release_writer(w).unwrap();
                    assert_eq!(sink, framed(9, payload.as_bytes()));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let stats = pool.stats();
    assert!(stats.constructed <= THREADS as u64);
    assert_eq!(stats.constructed + stats.reused, (THREADS * CYCLES) as u64);
    assert_eq!(stats.released, (THREADS * CYCLES) as u64);
}

// ── ReaderPool ──────────────────────────────────────────────────────────────

#[test]
fn test_reader_roundtrip_and_reuse() {
    let pool = ReaderPool::<Unframer>::new();

    let mut r = pool.acquire_reader(Cursor::new(framed(1, b"payload"))).unwrap();
    let first_id = r.state.id;
    let mut body = Vec::new();
    r.read_to_end(&mut body).unwrap();
    assert_eq!(&body[..7], b"payload");
    let source = pool.release_reader(r);
    assert_eq!(source.position(), 13);

    let r = pool.acquire_reader(Cursor::new(framed(1, b"again"))).unwrap();
    assert_eq!(r.state.id, first_id);
    pool.release_reader(r);

    let stats = pool.stats();
    assert_eq!(stats.constructed, 1);
    assert_eq!(stats.reused, 1);
}

#[test]
fn test_reader_bad_header_is_initialization_error() {
    let pool = ReaderPool::<Unframer>::new();

    let a = pool.acquire_reader(Cursor::new(framed(1, b"a"))).unwrap();
    let b = pool.acquire_reader(Cursor::new(framed(1, b"b"))).unwrap();
    pool.release_reader(a);
    pool.release_reader(b);
    assert_eq!(pool.stats().idle, 2);

    let err = pool.acquire_reader(Cursor::new(b"not a frame".to_vec())).unwrap_err();
    assert!(matches!(err, PoolError::Initialization(_)), "got {err:?}");

    let stats = pool.stats();
    assert_eq!(stats.idle, 1, "only the instance that tried to bind is dropped");
    assert_eq!(stats.discarded, 1);

    let err = pool.acquire_reader(Cursor::new(Vec::new())).unwrap_err();
    assert!(matches!(err, PoolError::Initialization(_)), "empty source, got {err:?}");
}
