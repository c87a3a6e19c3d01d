//! Newline framing over a source read in fixed-size chunks.
//!
//! [`LineFramer`] owns a chunk buffer and a carry buffer. Bytes following the
//! last newline of a chunk are carried forward and prepended to the next
//! chunk, so records spanning a chunk boundary (or longer than a chunk) are
//! reassembled intact. Empty lines advance the line counter but are never
//! yielded.

use std::borrow::Cow;
use std::io::{self, Read};
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

const FRAMER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::framer");

/// A single non-empty command line taken from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    line_number: usize,
    bytes: Vec<u8>,
}

impl CommandRecord {
    /// Builds a record for the given 1-based line number.
    #[must_use]
    pub fn new(line_number: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            line_number,
            bytes: bytes.into(),
        }
    }

    /// 1-based position of the line in the source, blank lines included.
    #[must_use]
    pub const fn line_number(&self) -> usize {
        self.line_number
    }

    /// Raw bytes of the line without its terminator.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lossy UTF-8 view used for progress output.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Errors raised while framing the source.
#[derive(Debug, Clone, Error)]
pub enum FramerError {
    /// A zero-byte chunk would never make progress.
    #[error("chunk capacity must be at least one byte")]
    ZeroCapacity,
    /// Reading the next chunk failed.
    #[error("failed to read command source after line {line_number}: {source}")]
    Read {
        /// Last line number completed before the failure.
        line_number: usize,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Frames newline-terminated records from a chunked byte source.
#[derive(Debug)]
pub struct LineFramer<R> {
    source: R,
    chunk: Box<[u8]>,
    carry: Vec<u8>,
    line_number: usize,
    finished: bool,
}

impl<R: Read> LineFramer<R> {
    /// Creates a framer reading at most `capacity` bytes per chunk.
    pub fn new(source: R, capacity: usize) -> Result<Self, FramerError> {
        if capacity == 0 {
            return Err(FramerError::ZeroCapacity);
        }
        Ok(Self {
            source,
            chunk: vec![0; capacity].into_boxed_slice(),
            carry: Vec::new(),
            line_number: 0,
            finished: false,
        })
    }

    /// Number of lines terminated so far, blank lines included.
    #[must_use]
    pub const fn line_number(&self) -> usize {
        self.line_number
    }

    /// Bytes currently held back waiting for a terminator.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    /// Reads one chunk and returns the records it completes.
    ///
    /// Returns `Ok(None)` once the source is exhausted and the carry has been
    /// flushed. A chunk without a newline yields an empty batch; the bytes are
    /// kept in the carry until a later chunk terminates them.
    pub fn next_batch(&mut self) -> Result<Option<Vec<CommandRecord>>, FramerError> {
        if self.finished {
            return Ok(None);
        }

        let count = match self.read_chunk() {
            Ok(count) => count,
            Err(source) => {
                self.finished = true;
                return Err(FramerError::Read {
                    line_number: self.line_number,
                    source: Arc::new(source),
                });
            }
        };

        if count == 0 {
            self.finished = true;
            return Ok(self.flush_tail());
        }

        let filled = self.chunk.get(..count).unwrap_or_default();
        let mut batch = Vec::new();
        let mut segments = filled.split(|&byte| byte == b'\n').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                // Unterminated remainder; completed by a later chunk or EOF.
                self.carry.extend_from_slice(segment);
                break;
            }
            let mut line = std::mem::take(&mut self.carry);
            line.extend_from_slice(segment);
            self.line_number += 1;
            if !line.is_empty() {
                batch.push(CommandRecord::new(self.line_number, line));
            }
        }

        trace!(
            target: FRAMER_TARGET,
            bytes = count,
            records = batch.len(),
            carried = self.carry.len(),
            "framed chunk"
        );
        Ok(Some(batch))
    }

    /// Flattens the batches into a lazy record iterator.
    #[must_use]
    pub fn records(self) -> Records<R> {
        Records {
            framer: self,
            pending: Vec::new().into_iter(),
        }
    }

    fn read_chunk(&mut self) -> io::Result<usize> {
        loop {
            match self.source.read(&mut self.chunk) {
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                other => return other,
            }
        }
    }

    fn flush_tail(&mut self) -> Option<Vec<CommandRecord>> {
        if self.carry.is_empty() {
            return None;
        }
        self.line_number += 1;
        let tail = std::mem::take(&mut self.carry);
        Some(vec![CommandRecord::new(self.line_number, tail)])
    }
}

/// Iterator over every record of a [`LineFramer`].
#[derive(Debug)]
pub struct Records<R> {
    framer: LineFramer<R>,
    pending: std::vec::IntoIter<CommandRecord>,
}

impl<R: Read> Iterator for Records<R> {
    type Item = Result<CommandRecord, FramerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                return Some(Ok(record));
            }
            match self.framer.next_batch() {
                Ok(Some(batch)) => self.pending = batch.into_iter(),
                Ok(None) => return None,
                Err(error) => return Some(Err(error)),
            }
        }
    }
}
