//! K-way merge of sorted run files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::heap::{HeapNode, MergeHeap};
use crate::metrics::Metrics;
use crate::run::{RunReader, RunWriter};
use crate::{Result, SortError};

/// Merges `1..=k` sorted run files into a single sorted output run.
///
/// One [`RunReader`] is opened per input, so the caller bounds `inputs` by
/// its descriptor budget. Runs that open empty contribute nothing and are
/// not an error; zero inputs are rejected before the output file is
/// created. Total memory is one record per live run plus the writer
/// buffer, independent of run sizes.
///
/// Output keys are ascending end to end; ordering among equal keys is
/// unspecified.
pub fn merge_runs(inputs: &[PathBuf], output: &Path, metrics: &Arc<Metrics>) -> Result<()> {
    if inputs.is_empty() {
        return Err(SortError::NoInputRuns);
    }

    let mut readers: Vec<RunReader> = inputs
        .iter()
        .map(|path| RunReader::open(path, metrics))
        .collect();

    let mut heap = MergeHeap::with_capacity(readers.len());
    for (run_id, reader) in readers.iter().enumerate() {
        if reader.has_record() {
            heap.push(HeapNode {
                record: *reader.record(),
                run_id,
            });
        }
    }

    let mut writer = RunWriter::create(output.to_path_buf(), metrics.clone())?;

    // Every record enters the heap exactly once and each pop advances the
    // reader it came from, so the loop consumes each input run end to end.
    while let Some(min) = heap.pop() {
        writer.push(&min.record)?;

        let reader = &mut readers[min.run_id];
        reader.advance();
        if reader.has_record() {
            heap.push(HeapNode {
                record: *reader.record(),
                run_id: min.run_id,
            });
        }
    }

    writer.finish()?;
    Ok(())
}
