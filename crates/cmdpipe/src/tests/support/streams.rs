//! Readers and sinks with scripted failure modes.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Observes what a [`RecordingSink`] received after the pump consumed it.
#[derive(Debug, Clone, Default)]
pub struct SinkProbe {
    bytes: Arc<Mutex<Vec<u8>>>,
    drops: Arc<AtomicUsize>,
}

impl SinkProbe {
    pub fn text(&self) -> String {
        String::from_utf8(self.bytes.lock().expect("sink mutex poisoned").clone())
            .expect("sink utf8")
    }

    /// Number of times the sink was dropped, i.e. the write end closed.
    pub fn closes(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// In-memory write end that reports its bytes and its closure to a probe.
#[derive(Debug)]
pub struct RecordingSink {
    probe: SinkProbe,
}

impl RecordingSink {
    pub fn new() -> (Self, SinkProbe) {
        let probe = SinkProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl Write for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.probe
            .bytes
            .lock()
            .expect("sink mutex poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink accepting `limit` complete lines, then failing every write.
#[derive(Debug)]
pub struct RejectingSink {
    accepted: Vec<u8>,
    limit: usize,
    kind: io::ErrorKind,
}

impl RejectingSink {
    pub fn new(limit: usize, kind: io::ErrorKind) -> Self {
        Self {
            accepted: Vec::new(),
            limit,
            kind,
        }
    }
}

impl Write for RejectingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let lines = self.accepted.iter().filter(|byte| **byte == b'\n').count();
        if lines >= self.limit {
            return Err(io::Error::from(self.kind));
        }
        self.accepted.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reader that fails with `EINTR` before every successful read.
#[derive(Debug)]
pub struct EintrReader<R> {
    inner: R,
    interrupt_next: bool,
}

impl<R> EintrReader<R> {
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            interrupt_next: true,
        }
    }
}

impl<R: Read> Read for EintrReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.interrupt_next {
            self.interrupt_next = false;
            return Err(io::Error::from(io::ErrorKind::Interrupted));
        }
        self.interrupt_next = true;
        self.inner.read(buf)
    }
}

/// Reader yielding `prefix` and then a hard error.
#[derive(Debug)]
pub struct FailingReader {
    prefix: io::Cursor<Vec<u8>>,
}

impl FailingReader {
    pub fn new(prefix: &[u8]) -> Self {
        Self {
            prefix: io::Cursor::new(prefix.to_vec()),
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.prefix.read(buf)? {
            0 => Err(io::Error::other("disk went away")),
            count => Ok(count),
        }
    }
}
