//! Sorted run files: sequential writer, lookahead-one reader, temp naming.
//!
//! A run is an immutable, internally sorted sequence of fixed-size records
//! stored as a flat binary file with no header or footer. A run is written
//! once, read end-to-end at most once and deleted by the scheduler after
//! it has been merged away.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytemuck::Zeroable;
use log;
use tempfile;

use crate::metrics::{Metrics, TrackedFile};
use crate::record::Record;

const RUN_BUF_SIZE: usize = 1 << 20;

/// Temporary directory holding the run files of one sorting invocation.
/// Dropping it sweeps whatever runs are left behind, including the
/// leftovers of an aborted merge.
pub struct RunDir {
    dir: tempfile::TempDir,
    next_index: usize,
    metrics: Arc<Metrics>,
}

impl RunDir {
    pub fn new(tmp_path: Option<&Path>, metrics: Arc<Metrics>) -> io::Result<RunDir> {
        let dir = match tmp_path {
            Some(tmp_path) => tempfile::tempdir_in(tmp_path),
            None => tempfile::tempdir(),
        }?;

        log::info!("using {} as a temporary run directory", dir.path().display());

        Ok(RunDir {
            dir,
            next_index: 0,
            metrics,
        })
    }

    /// Allocates the next run path. Names are fixed-width and zero-padded
    /// so lexicographic order always equals creation order.
    pub fn next_path(&mut self) -> PathBuf {
        let path = self.dir.path().join(format!("run_{:05}.bin", self.next_index));
        self.next_index += 1;
        path
    }

    /// Opens a writer for a freshly named run.
    pub fn create_run(&mut self) -> io::Result<RunWriter> {
        let path = self.next_path();
        RunWriter::create(path, self.metrics.clone())
    }
}

/// Sequential record writer for one run file. A short write is fatal and
/// surfaces as the underlying I/O error.
pub struct RunWriter {
    path: PathBuf,
    writer: BufWriter<TrackedFile>,
    count: usize,
}

impl RunWriter {
    pub fn create(path: PathBuf, metrics: Arc<Metrics>) -> io::Result<RunWriter> {
        let file = TrackedFile::create(&path, &metrics)?;
        Ok(RunWriter {
            path,
            writer: BufWriter::with_capacity(RUN_BUF_SIZE, file),
            count: 0,
        })
    }

    pub fn push(&mut self, record: &Record) -> io::Result<()> {
        self.writer.write_all(bytemuck::bytes_of(record))?;
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Flushes and closes the run, handing back its path.
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

/// Lookahead-one cursor over a single run file: always holds the next
/// unconsumed record together with an explicit "more data" flag.
pub struct RunReader {
    reader: Option<BufReader<TrackedFile>>,
    record: Record,
    has_record: bool,
}

impl RunReader {
    /// Opens a run and eagerly loads its first record.
    ///
    /// A path that cannot be opened, or that holds no complete record,
    /// yields a reader that starts exhausted. That is not an error for the
    /// caller: an empty run simply contributes nothing to a merge.
    pub fn open(path: &Path, metrics: &Arc<Metrics>) -> RunReader {
        match RunReader::try_open(path, metrics) {
            Ok(run_reader) => run_reader,
            Err(err) => {
                log::warn!("run {} not readable, treating as empty: {}", path.display(), err);
                RunReader {
                    reader: None,
                    record: Record::zeroed(),
                    has_record: false,
                }
            }
        }
    }

    /// Like [`open`], but an open failure propagates instead of being
    /// treated as an empty run. A file that opens but holds no complete
    /// record still yields an exhausted reader.
    ///
    /// [`open`]: RunReader::open
    pub fn try_open(path: &Path, metrics: &Arc<Metrics>) -> io::Result<RunReader> {
        let file = TrackedFile::open(path, metrics)?;
        let mut run_reader = RunReader {
            reader: Some(BufReader::with_capacity(RUN_BUF_SIZE, file)),
            record: Record::zeroed(),
            has_record: false,
        };
        run_reader.advance();
        Ok(run_reader)
    }

    /// Loads the next record. Any short read, including clean end of file,
    /// transitions to the exhausted state and releases the handle exactly
    /// once; further calls are no-ops.
    pub fn advance(&mut self) {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return,
        };

        match reader.read_exact(bytemuck::bytes_of_mut(&mut self.record)) {
            Ok(()) => self.has_record = true,
            Err(err) => {
                if err.kind() != io::ErrorKind::UnexpectedEof {
                    log::warn!("run read failed, treating as end of run: {}", err);
                }
                self.has_record = false;
                self.reader = None;
            }
        }
    }

    pub fn has_record(&self) -> bool {
        self.has_record
    }

    /// The current record. Only meaningful while [`has_record`] is true.
    ///
    /// [`has_record`]: RunReader::has_record
    pub fn record(&self) -> &Record {
        &self.record
    }
}
