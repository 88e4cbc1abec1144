//! `runsort` is an external merge sort engine for fixed-size binary records.
//!
//! External sorting orders datasets far larger than available memory by
//! splitting the input into disk-resident sorted runs and repeatedly
//! merging them. `runsort` works on a fixed 264-byte record (8-byte key,
//! 4-byte valid-payload length, 250 payload bytes, 2 bytes of padding) and
//! guarantees two bounds throughout: memory never exceeds one in-memory
//! batch of records, and no merge call ever holds more run files open than
//! the configured descriptor budget. When the initial run count exceeds
//! that budget, the scheduler folds runs together over multiple passes
//! until a single merge produces the fully sorted output.
//!
//! The merge itself is not stable: records with equal keys come out in
//! unspecified order.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io;
//! use std::path::Path;
//!
//! use runsort::{rebuild, ExternalSorterBuilder};
//!
//! fn main() -> runsort::Result<()> {
//!     let input = io::BufReader::new(fs::File::open("records.bin")?);
//!
//!     let sorter = ExternalSorterBuilder::new(100_000)
//!         .with_max_open_runs(500)
//!         .build()?;
//!
//!     let summary = sorter.sort(input, Path::new("sorted.bin"))?;
//!     println!("sorted {} records", summary.records);
//!
//!     rebuild::rebuild_archive(
//!         Path::new("sorted.bin"),
//!         Path::new("rebuilt.tar"),
//!         sorter.metrics(),
//!     )?;
//!     sorter.metrics().report();
//!     Ok(())
//! }
//! ```

use std::io;

use thiserror::Error;

pub mod heap;
pub mod merger;
pub mod metrics;
pub mod quicksort;
pub mod rebuild;
pub mod record;
pub mod run;
pub mod sorter;

pub use merger::merge_runs;
pub use metrics::{Metrics, Phase, PhaseTimer};
pub use record::{Record, PAYLOAD_CAPACITY, RECORD_SIZE};
pub use run::{RunDir, RunReader, RunWriter};
pub use sorter::{ExternalSorter, ExternalSorterBuilder, SortSummary, DEFAULT_MAX_OPEN_RUNS};

/// Sorting error.
#[derive(Debug, Error)]
pub enum SortError {
    /// Temporary run directory creation error.
    #[error("temporary run directory not created: {0}")]
    TempDir(#[source] io::Error),
    /// Batch size of zero records.
    #[error("batch size must be a positive number of records")]
    InvalidBatchSize,
    /// Descriptor budget too small for the merge to make progress.
    #[error("descriptor budget must allow at least two open runs")]
    InvalidRunBudget,
    /// The input held no complete record; no output is produced.
    #[error("input contained no records")]
    EmptyInput,
    /// A merge was invoked with zero input runs.
    #[error("no input runs to merge")]
    NoInputRuns,
    /// A merge group failed; the whole scheduling operation aborts.
    #[error("merge failed at pass {pass}, group {group}: {source}")]
    MergeFailed {
        pass: usize,
        group: usize,
        #[source]
        source: io::Error,
    },
    /// Common I/O error.
    #[error("I/O operation failed: {0}")]
    Io(#[from] io::Error),
}

impl SortError {
    /// Tags a merge-call failure with the pass and group it occurred in.
    pub(crate) fn in_group(self, pass: usize, group: usize) -> SortError {
        match self {
            SortError::Io(source) => SortError::MergeFailed { pass, group, source },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SortError>;
