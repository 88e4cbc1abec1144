//! Fixed-layout disk record.

use std::fmt;
use std::mem;

use bytemuck::{Pod, Zeroable};

/// Number of payload bytes a record can carry.
pub const PAYLOAD_CAPACITY: usize = 250;

/// On-disk width of one record. Run files are plain concatenations of
/// records, so a run's length is always `file size / RECORD_SIZE`.
pub const RECORD_SIZE: usize = mem::size_of::<Record>();

/// A single 264-byte record: 8-byte sort key, 4-byte valid-payload length,
/// 250 payload bytes and 2 bytes of padding. The layout is bit-exact with
/// the on-disk format, records are read and written straight through
/// [`bytemuck::bytes_of`] with no further framing.
///
/// Records are plain values, they are copied between buffers, heap nodes
/// and files and carry no identity beyond their key. Duplicate keys are
/// legal, ordering among equal keys is unspecified.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Record {
    /// Sort key, the sole ordering criterion.
    pub key: u64,
    /// Number of valid bytes in `payload`. Not trusted as-is: consumers
    /// clamp it to [`PAYLOAD_CAPACITY`] before using it as a copy length.
    pub len: u32,
    /// Payload bytes. Bytes past `len` are filler, not zero-guaranteed.
    pub payload: [u8; PAYLOAD_CAPACITY],
    pad: [u8; 2],
}

impl Record {
    /// Builds a record from a payload slice, truncating to capacity.
    pub fn new(key: u64, payload: &[u8]) -> Record {
        let mut record = Record::zeroed();
        record.key = key;
        let len = payload.len().min(PAYLOAD_CAPACITY);
        record.len = len as u32;
        record.payload[..len].copy_from_slice(&payload[..len]);
        record
    }

    /// Length field clamped to the payload capacity.
    pub fn clamped_len(&self) -> usize {
        (self.len as usize).min(PAYLOAD_CAPACITY)
    }

    /// The valid payload prefix. An over-length `len` field is clamped
    /// rather than trusted, so the returned slice never exceeds capacity.
    pub fn valid_payload(&self) -> &[u8] {
        &self.payload[..self.clamped_len()]
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("key", &self.key)
            .field("len", &self.len)
            .finish()
    }
}
