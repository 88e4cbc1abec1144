//! I/O instrumentation: descriptor and byte counters, phase timers.
//!
//! All file handles the engine opens go through [`TrackedFile`], so a
//! single [`Metrics`] registry always reflects the open-descriptor
//! high-water-mark and the total bytes moved. The registry is injected
//! (shared via [`Arc`]) rather than ambient, counting is observability
//! only and never affects the merge result.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log;

/// Process-wide I/O counters for one sorting pipeline invocation.
#[derive(Debug, Default)]
pub struct Metrics {
    open_files: AtomicUsize,
    max_open_files: AtomicUsize,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl Metrics {
    fn file_opened(&self) {
        let open = self.open_files.fetch_add(1, Ordering::Relaxed) + 1;
        self.max_open_files.fetch_max(open, Ordering::Relaxed);
    }

    fn file_closed(&self) {
        self.open_files.fetch_sub(1, Ordering::Relaxed);
    }

    fn add_bytes_read(&self, n: u64) {
        self.bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    fn add_bytes_written(&self, n: u64) {
        self.bytes_written.fetch_add(n, Ordering::Relaxed);
    }

    /// Number of tracked files currently open.
    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::Relaxed)
    }

    /// Highest number of tracked files ever open at once.
    pub fn max_open_files(&self) -> usize {
        self.max_open_files.load(Ordering::Relaxed)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Resets the counters. The high-water-mark restarts from the number
    /// of files still open.
    pub fn reset(&self) {
        self.max_open_files.store(self.open_files(), Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
    }

    /// Logs the collected counters.
    pub fn report(&self) {
        log::info!("peak open files: {}", self.max_open_files());
        log::info!(
            "bytes read: {}, bytes written: {}",
            self.bytes_read(),
            self.bytes_written()
        );
    }
}

/// A file handle whose open/close lifecycle and byte traffic update the
/// registry. Closing happens on drop, each handle is counted exactly once.
pub struct TrackedFile {
    file: fs::File,
    metrics: Arc<Metrics>,
}

impl TrackedFile {
    /// Opens an existing file for sequential reading.
    pub fn open(path: &Path, metrics: &Arc<Metrics>) -> io::Result<TrackedFile> {
        let file = fs::File::open(path)?;
        metrics.file_opened();
        Ok(TrackedFile {
            file,
            metrics: metrics.clone(),
        })
    }

    /// Creates (truncating) a file for sequential writing.
    pub fn create(path: &Path, metrics: &Arc<Metrics>) -> io::Result<TrackedFile> {
        let file = fs::File::create(path)?;
        metrics.file_opened();
        Ok(TrackedFile {
            file,
            metrics: metrics.clone(),
        })
    }
}

impl Read for TrackedFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.read(buf)?;
        self.metrics.add_bytes_read(n as u64);
        Ok(n)
    }
}

impl Write for TrackedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.metrics.add_bytes_written(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for TrackedFile {
    fn drop(&mut self) {
        self.metrics.file_closed();
    }
}

/// Pipeline phases bracketed by [`PhaseTimer`] markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Generation,
    Merge,
    Rebuild,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Generation => write!(f, "run generation"),
            Phase::Merge => write!(f, "merge"),
            Phase::Rebuild => write!(f, "reconstruction"),
        }
    }
}

/// Monotonic timer bracketing one pipeline phase.
pub struct PhaseTimer {
    phase: Phase,
    start: Instant,
}

impl PhaseTimer {
    pub fn start(phase: Phase) -> PhaseTimer {
        log::debug!("{} phase started", phase);
        PhaseTimer {
            phase,
            start: Instant::now(),
        }
    }

    pub fn stop(self) {
        log::info!(
            "{} phase finished in {:.4}s",
            self.phase,
            self.start.elapsed().as_secs_f64()
        );
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};
    use std::sync::Arc;

    use rstest::*;

    use super::{Metrics, TrackedFile};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_tracked_file_descriptor_accounting(tmp_dir: tempfile::TempDir) {
        let metrics = Arc::new(Metrics::default());

        let first = TrackedFile::create(&tmp_dir.path().join("a"), &metrics).unwrap();
        let second = TrackedFile::create(&tmp_dir.path().join("b"), &metrics).unwrap();
        assert_eq!(metrics.open_files(), 2);
        assert_eq!(metrics.max_open_files(), 2);

        drop(first);
        assert_eq!(metrics.open_files(), 1);
        drop(second);
        assert_eq!(metrics.open_files(), 0);
        // high-water-mark survives the closes
        assert_eq!(metrics.max_open_files(), 2);
    }

    #[rstest]
    fn test_tracked_file_byte_accounting(tmp_dir: tempfile::TempDir) {
        let metrics = Arc::new(Metrics::default());
        let path = tmp_dir.path().join("data");

        let mut writer = TrackedFile::create(&path, &metrics).unwrap();
        writer.write_all(b"0123456789").unwrap();
        drop(writer);
        assert_eq!(metrics.bytes_written(), 10);

        let mut reader = TrackedFile::open(&path, &metrics).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"0123456789");
        assert_eq!(metrics.bytes_read(), 10);
    }

    #[rstest]
    fn test_reset_keeps_live_descriptors(tmp_dir: tempfile::TempDir) {
        let metrics = Arc::new(Metrics::default());

        let mut writer = TrackedFile::create(&tmp_dir.path().join("a"), &metrics).unwrap();
        writer.write_all(b"abc").unwrap();
        metrics.reset();

        assert_eq!(metrics.bytes_written(), 0);
        // the still-open handle restarts the high-water-mark at one
        assert_eq!(metrics.max_open_files(), 1);
    }
}
