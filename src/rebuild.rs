//! Reconstruction of the padded archive stream from the sorted run.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use log;

use crate::metrics::{Metrics, TrackedFile};
use crate::record::PAYLOAD_CAPACITY;
use crate::run::RunReader;
use crate::Result;

/// Block granularity of the reconstructed archive stream.
pub const BLOCK_SIZE: usize = 512;

/// Unpacks the sorted run at `sorted` into an archive stream at `output`.
///
/// Each record contributes only its valid payload prefix; over-length
/// length fields are clamped to capacity, never trusted. The stream is
/// zero-padded to a [`BLOCK_SIZE`] boundary and terminated with two
/// all-zero blocks. Returns the number of payload bytes written before
/// padding.
///
/// A missing or unreadable sorted run is fatal, and no output file is
/// created in that case.
pub fn rebuild_archive(sorted: &Path, output: &Path, metrics: &Arc<Metrics>) -> Result<u64> {
    let mut reader = RunReader::try_open(sorted, metrics)?;

    let file = TrackedFile::create(output, metrics)?;
    let mut writer = BufWriter::with_capacity(1 << 20, file);
    let mut payload_bytes: u64 = 0;
    let mut clamped: u64 = 0;

    while reader.has_record() {
        let record = reader.record();
        if record.len as usize > PAYLOAD_CAPACITY {
            clamped += 1;
        }
        let payload = record.valid_payload();
        writer.write_all(payload)?;
        payload_bytes += payload.len() as u64;
        reader.advance();
    }

    if clamped > 0 {
        log::warn!(
            "{} records carried over-length length fields, payloads clamped to {} bytes",
            clamped,
            PAYLOAD_CAPACITY
        );
    }

    let zeros = [0u8; BLOCK_SIZE];
    let partial = (payload_bytes % BLOCK_SIZE as u64) as usize;
    if partial != 0 {
        writer.write_all(&zeros[..BLOCK_SIZE - partial])?;
    }
    // two all-zero blocks mark the end of the archive
    writer.write_all(&zeros)?;
    writer.write_all(&zeros)?;
    writer.flush()?;

    log::info!(
        "reconstructed {} payload bytes into {}",
        payload_bytes,
        output.display()
    );

    Ok(payload_bytes)
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::Arc;

    use rstest::*;

    use super::{rebuild_archive, BLOCK_SIZE};
    use crate::metrics::Metrics;
    use crate::record::{Record, PAYLOAD_CAPACITY};
    use crate::run::RunWriter;

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_rebuild_pads_to_block_boundary(tmp_dir: tempfile::TempDir) {
        let metrics = Arc::new(Metrics::default());
        let sorted = tmp_dir.path().join("sorted.bin");

        let mut writer = RunWriter::create(sorted.clone(), metrics.clone()).unwrap();
        writer.push(&Record::new(1, &[0x11; 100])).unwrap();
        writer.push(&Record::new(2, &[0x22; 150])).unwrap();
        writer.finish().unwrap();

        let output = tmp_dir.path().join("rebuilt.bin");
        let payload_bytes = rebuild_archive(&sorted, &output, &metrics).unwrap();
        assert_eq!(payload_bytes, 250);

        let bytes = fs::read(&output).unwrap();
        // 250 payload bytes padded to one block, plus two terminator blocks
        assert_eq!(bytes.len(), BLOCK_SIZE + 2 * BLOCK_SIZE);
        assert_eq!(&bytes[..100], &[0x11; 100][..]);
        assert_eq!(&bytes[100..250], &[0x22; 150][..]);
        assert!(bytes[250..].iter().all(|&b| b == 0));
    }

    #[rstest]
    fn test_rebuild_without_padding_remainder(tmp_dir: tempfile::TempDir) {
        let metrics = Arc::new(Metrics::default());
        let sorted = tmp_dir.path().join("sorted.bin");

        let mut writer = RunWriter::create(sorted.clone(), metrics.clone()).unwrap();
        for key in 0..4u64 {
            writer.push(&Record::new(key, &[key as u8; 128])).unwrap();
        }
        writer.finish().unwrap();

        let output = tmp_dir.path().join("rebuilt.bin");
        let payload_bytes = rebuild_archive(&sorted, &output, &metrics).unwrap();
        assert_eq!(payload_bytes, 512);

        // already block-aligned: only the two terminator blocks follow
        let bytes = fs::read(&output).unwrap();
        assert_eq!(bytes.len(), 512 + 2 * BLOCK_SIZE);
    }

    #[rstest]
    fn test_rebuild_clamps_over_length_records(tmp_dir: tempfile::TempDir) {
        let metrics = Arc::new(Metrics::default());
        let sorted = tmp_dir.path().join("sorted.bin");

        let mut record = Record::new(1, &[0xEE; PAYLOAD_CAPACITY]);
        record.len = 300;
        let mut writer = RunWriter::create(sorted.clone(), metrics.clone()).unwrap();
        writer.push(&record).unwrap();
        writer.finish().unwrap();

        let output = tmp_dir.path().join("rebuilt.bin");
        let payload_bytes = rebuild_archive(&sorted, &output, &metrics).unwrap();

        // length 300 is treated as 250, never an out-of-bounds copy
        assert_eq!(payload_bytes, PAYLOAD_CAPACITY as u64);
    }

    #[rstest]
    fn test_missing_sorted_input_is_fatal(tmp_dir: tempfile::TempDir) {
        let metrics = Arc::new(Metrics::default());
        let sorted = tmp_dir.path().join("no-such-sorted.bin");
        let output = tmp_dir.path().join("rebuilt.bin");

        let result = rebuild_archive(&sorted, &output, &metrics);
        assert!(result.is_err());
        // the error surfaces before the archive is even created
        assert!(!output.exists());
    }
}
