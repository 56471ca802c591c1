//! Output staging buffer.
//!
//! Writers reserve an upper bound before appending, so a logical unit (a cell,
//! a row tag) is either appended whole or not at all. Flushing hands the
//! staged bytes to the open archive entry and is the only place the write path
//! awaits.

use crate::common::error::Result;
use crate::ooxml::opc::ArchiveWriter;
use tokio::io::AsyncWrite;
use tracing::{debug, trace};

/// Capacity used when none is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 65_536;

/// Smallest accepted capacity.
pub const MIN_BUFFER_SIZE: usize = 512;

/// Result of one attempt to append a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome {
    /// The unit is in the buffer.
    Written,
    /// Nothing was appended. The unit needs at most `required` free bytes.
    InsufficientSpace { required: usize },
}

impl WriteOutcome {
    #[inline]
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Append-only byte buffer with a soft capacity.
#[derive(Debug)]
pub struct SpreadsheetBuffer {
    buf: Vec<u8>,
    capacity: usize,
    flushes: u64,
    growths: u64,
}

impl SpreadsheetBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_BUFFER_SIZE);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            flushes: 0,
            growths: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// The staged bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of flushes performed so far.
    #[inline]
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// Number of times the capacity was raised.
    #[inline]
    pub fn growth_count(&self) -> u64 {
        self.growths
    }

    /// Append `bytes` whole, or leave the buffer untouched.
    pub fn try_append(&mut self, bytes: &[u8]) -> WriteOutcome {
        if bytes.len() > self.remaining() {
            return WriteOutcome::InsufficientSpace {
                required: bytes.len(),
            };
        }
        self.buf.extend_from_slice(bytes);
        WriteOutcome::Written
    }

    /// Reserve `bound` bytes and let `write` fill at most that many.
    ///
    /// `write` runs only when the bound fits, so it can never leave a
    /// partial unit behind.
    #[inline]
    pub fn try_write_with(
        &mut self,
        bound: usize,
        write: impl FnOnce(&mut Vec<u8>),
    ) -> WriteOutcome {
        if bound > self.remaining() {
            return WriteOutcome::InsufficientSpace { required: bound };
        }

        let start = self.buf.len();
        write(&mut self.buf);
        debug_assert!(self.buf.len() - start <= bound, "write exceeded its bound");
        WriteOutcome::Written
    }

    /// Raise the capacity so that a unit of `required` bytes fits in an
    /// empty buffer.
    pub fn grow(&mut self, required: usize) {
        if required <= self.capacity {
            return;
        }

        let new_capacity = required.next_power_of_two();
        debug!(
            from = self.capacity,
            to = new_capacity,
            "growing output buffer for an oversized unit"
        );
        self.buf.reserve(new_capacity - self.buf.len());
        self.capacity = new_capacity;
        self.growths += 1;
    }

    /// Send the staged bytes to the open archive entry and reset the length.
    pub async fn flush<W>(&mut self, archive: &mut ArchiveWriter<W>) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if self.buf.is_empty() {
            return Ok(());
        }

        trace!(bytes = self.buf.len(), "flushing output buffer");
        archive.write_entry_data(&self.buf).await?;
        self.buf.clear();
        self.flushes += 1;
        Ok(())
    }
}

impl Default for SpreadsheetBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}
