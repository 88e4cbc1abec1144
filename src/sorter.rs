//! External sorter: run generation and multi-pass merge scheduling.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log;

use crate::merger::merge_runs;
use crate::metrics::{Metrics, Phase, PhaseTimer};
use crate::quicksort::sort_records;
use crate::record::Record;
use crate::run::RunDir;
use crate::{Result, SortError};

/// Default limit on run files opened by a single merge call.
pub const DEFAULT_MAX_OPEN_RUNS: usize = 500;

/// External sorter builder. Provides methods for [`ExternalSorter`]
/// initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder {
    /// Records per in-memory batch during run generation.
    batch_size: usize,
    /// Descriptor budget: run files a single merge call may hold open.
    max_open_runs: usize,
    /// Directory to be used to store temporary run files.
    tmp_dir: Option<Box<Path>>,
}

impl ExternalSorterBuilder {
    /// Creates a builder for a sorter with the given batch size.
    pub fn new(batch_size: usize) -> ExternalSorterBuilder {
        ExternalSorterBuilder {
            batch_size,
            max_open_runs: DEFAULT_MAX_OPEN_RUNS,
            tmp_dir: None,
        }
    }

    /// Sets the descriptor budget for merge calls.
    pub fn with_max_open_runs(mut self, max_open_runs: usize) -> ExternalSorterBuilder {
        self.max_open_runs = max_open_runs;
        return self;
    }

    /// Sets directory to be used to store temporary run files.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter> {
        if self.batch_size == 0 {
            return Err(SortError::InvalidBatchSize);
        }
        // groups of one run would never shrink the generation
        if self.max_open_runs < 2 {
            return Err(SortError::InvalidRunBudget);
        }

        return Ok(ExternalSorter {
            batch_size: self.batch_size,
            max_open_runs: self.max_open_runs,
            tmp_dir: self.tmp_dir,
            metrics: Arc::new(Metrics::default()),
        });
    }
}

/// Summary of a completed sort, exposed for callers and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSummary {
    /// Total records read from the input.
    pub records: u64,
    /// Runs produced by the generation phase.
    pub initial_runs: usize,
    /// Reducing passes performed before the final merge.
    pub merge_passes: usize,
}

/// External merge sorter for fixed-size binary records.
///
/// Sorting runs in two phases. Generation reads the input in batches of at
/// most `batch_size` records, sorts each batch in memory and writes it out
/// as a run. Scheduling then folds the runs together: while more runs
/// exist than the descriptor budget allows in one merge call, consecutive
/// groups of at most `max_open_runs` runs are merged into intermediate
/// runs (consumed runs are deleted immediately), and the final pass merges
/// everything that remains into the output file.
///
/// Memory never exceeds one batch of records during generation and one
/// record per open run during a merge; open descriptors never exceed the
/// budget plus the single output writer.
pub struct ExternalSorter {
    batch_size: usize,
    max_open_runs: usize,
    tmp_dir: Option<Box<Path>>,
    metrics: Arc<Metrics>,
}

impl ExternalSorter {
    /// The instrumentation registry this sorter reports into.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Sorts every record of `input` into a single run file at `output`.
    ///
    /// The whole pipeline is fatal-on-error: any I/O failure aborts the
    /// invocation and surviving temporary runs are swept away with the
    /// temp directory. An input without a single complete record is
    /// reported as [`SortError::EmptyInput`] rather than producing an
    /// empty output.
    pub fn sort(&self, input: impl Read, output: &Path) -> Result<SortSummary> {
        let mut run_dir =
            RunDir::new(self.tmp_dir.as_deref(), self.metrics.clone()).map_err(SortError::TempDir)?;

        let timer = PhaseTimer::start(Phase::Generation);
        let (runs, records) = self.generate_runs(input, &mut run_dir)?;
        timer.stop();

        if runs.is_empty() {
            return Err(SortError::EmptyInput);
        }
        let initial_runs = runs.len();
        log::info!("generated {} initial runs ({} records)", initial_runs, records);

        let timer = PhaseTimer::start(Phase::Merge);
        let merge_passes = self.schedule_merges(runs, &mut run_dir, output)?;
        timer.stop();
        log::info!("sorted output written to {}", output.display());

        Ok(SortSummary {
            records,
            initial_runs,
            merge_passes,
        })
    }

    /// Generation phase: splits the input into sorted runs of at most
    /// `batch_size` records each.
    fn generate_runs(&self, mut input: impl Read, run_dir: &mut RunDir) -> Result<(Vec<PathBuf>, u64)> {
        let mut batch: Vec<Record> = Vec::with_capacity(self.batch_size);
        let mut runs = Vec::new();
        let mut records: u64 = 0;

        loop {
            batch.clear();
            fill_batch(&mut input, &mut batch, self.batch_size)?;
            if batch.is_empty() {
                break;
            }

            records += batch.len() as u64;
            sort_records(&mut batch);

            let mut writer = run_dir.create_run()?;
            for record in &batch {
                writer.push(record)?;
            }
            let path = writer.finish()?;
            log::debug!("wrote run {} ({} records)", path.display(), batch.len());
            runs.push(path);
        }

        Ok((runs, records))
    }

    /// Scheduling phase: reduces the current generation of runs until one
    /// merge call fits the descriptor budget, then merges into `output`.
    /// Returns the number of reducing passes.
    fn schedule_merges(&self, mut runs: Vec<PathBuf>, run_dir: &mut RunDir, output: &Path) -> Result<usize> {
        let mut pass = 0;

        while runs.len() > self.max_open_runs {
            let group_count = (runs.len() + self.max_open_runs - 1) / self.max_open_runs;
            let mut next_generation = Vec::with_capacity(group_count);

            for (group, chunk) in runs.chunks(self.max_open_runs).enumerate() {
                let merged = run_dir.next_path();
                merge_runs(chunk, &merged, &self.metrics).map_err(|err| err.in_group(pass, group))?;
                remove_runs(chunk);
                next_generation.push(merged);
            }

            runs = next_generation;
            pass += 1;
            log::info!("pass {} complete: {} intermediate runs remain", pass, runs.len());
        }

        merge_runs(&runs, output, &self.metrics).map_err(|err| err.in_group(pass, 0))?;
        remove_runs(&runs);

        Ok(pass)
    }
}

/// Reads records until the batch is full or the input ends. A trailing
/// partial record is dropped, matching the fixed-size framing of the
/// on-disk format.
fn fill_batch(input: &mut impl Read, batch: &mut Vec<Record>, limit: usize) -> Result<()> {
    use bytemuck::Zeroable;

    while batch.len() < limit {
        let mut record = Record::zeroed();
        match input.read_exact(bytemuck::bytes_of_mut(&mut record)) {
            Ok(()) => batch.push(record),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(SortError::Io(err)),
        }
    }
    Ok(())
}

/// Deletes runs consumed by a successful merge. Removal is best-effort,
/// leftovers are swept with the temp directory.
fn remove_runs(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = fs::remove_file(path) {
            log::warn!("failed to remove consumed run {}: {}", path.display(), err);
        }
    }
}
