//! The process's standard streams as an explicit capability.
//!
//! [`StdStreams`] owns the real stdout and stderr sinks. Executors write
//! through it, and a [`crate::tee::Tee`] temporarily installs taps on it so
//! every write is also copied into a shared capture buffer.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use crate::tee::encoding::{Encoding, ErrorPolicy, decode};

/// Identifies one of the two standard output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl StreamId {
    /// Lowercase stream name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a real stream consumes bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkKind {
    /// Bytes pass through untouched.
    #[default]
    Binary,
    /// Bytes are decoded first and written as UTF-8 text.
    Text {
        /// Encoding of incoming bytes.
        encoding: Encoding,
        /// Handling of undecodable bytes.
        errors: ErrorPolicy,
    },
}

/// A real output sink.
pub struct RealStream {
    writer: Box<dyn Write + Send>,
    kind: SinkKind,
}

impl fmt::Debug for RealStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealStream")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl RealStream {
    /// Creates a sink of the given kind.
    pub fn new(writer: impl Write + Send + 'static, kind: SinkKind) -> Self {
        Self {
            writer: Box::new(writer),
            kind,
        }
    }

    /// Creates a binary sink.
    pub fn binary(writer: impl Write + Send + 'static) -> Self {
        Self::new(writer, SinkKind::Binary)
    }

    /// The sink kind.
    #[must_use]
    pub const fn kind(&self) -> SinkKind {
        self.kind
    }

    fn write_payload(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.kind {
            SinkKind::Binary => self.writer.write_all(bytes),
            SinkKind::Text { encoding, errors } => {
                let text = decode(bytes, encoding, errors)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                self.writer.write_all(text.as_bytes())
            }
        }
    }

    fn write_decorated(&mut self, decoration: &Decoration, bytes: &[u8]) -> io::Result<()> {
        if decoration.is_empty() || bytes.is_empty() {
            return self.write_payload(bytes);
        }
        self.writer.write_all(decoration.prefix.as_bytes())?;
        self.write_payload(bytes)?;
        self.writer.write_all(decoration.postfix.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Prefix and postfix wrapped around each write to a real stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoration {
    /// Written before the payload.
    pub prefix: String,
    /// Written after the payload.
    pub postfix: String,
}

impl Decoration {
    /// Creates a decoration.
    pub fn new(prefix: impl Into<String>, postfix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            postfix: postfix.into(),
        }
    }

    /// Returns `true` if neither side adds anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.postfix.is_empty()
    }
}

/// Cloneable in-memory byte sink.
///
/// All clones append to the same buffer, so two writers sharing one
/// `SharedBuffer` produce a single chronologically ordered byte sequence.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Contents as text, invalid UTF-8 replaced.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Tap {
    capture: SharedBuffer,
    decoration: Decoration,
}

#[derive(Debug)]
struct Slot {
    real: RealStream,
    tap: Option<Tap>,
}

impl Slot {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &mut self.tap {
            Some(tap) => {
                tap.capture.write_all(bytes)?;
                self.real.write_decorated(&tap.decoration, bytes)
            }
            None => self.real.write_payload(bytes),
        }
    }
}

/// The real standard streams plus any installed tee taps.
#[derive(Debug)]
pub struct StdStreams {
    stdout: Slot,
    stderr: Slot,
    tees_opened: usize,
    tees_closed: usize,
}

impl StdStreams {
    /// Wraps the given real sinks.
    #[must_use]
    pub const fn new(stdout: RealStream, stderr: RealStream) -> Self {
        Self {
            stdout: Slot {
                real: stdout,
                tap: None,
            },
            stderr: Slot {
                real: stderr,
                tap: None,
            },
            tees_opened: 0,
            tees_closed: 0,
        }
    }

    /// The process's own stdout and stderr.
    #[must_use]
    pub fn process(kind: SinkKind) -> Self {
        Self::new(
            RealStream::new(io::stdout(), kind),
            RealStream::new(io::stderr(), kind),
        )
    }

    /// Binary streams writing into two in-memory buffers; returns the
    /// buffers for inspection.
    #[must_use]
    pub fn buffered() -> (Self, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let streams = Self::new(
            RealStream::binary(out.clone()),
            RealStream::binary(err.clone()),
        );
        (streams, out, err)
    }

    const fn slot(&mut self, id: StreamId) -> &mut Slot {
        match id {
            StreamId::Stdout => &mut self.stdout,
            StreamId::Stderr => &mut self.stderr,
        }
    }

    /// Writes `bytes` to the stream `id`, through its tap if one is
    /// installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the real sink or the capture fails.
    pub fn write(&mut self, id: StreamId, bytes: &[u8]) -> io::Result<()> {
        self.slot(id).write(bytes)
    }

    /// `io::Write` handle for stdout.
    pub const fn stdout(&mut self) -> StreamWriter<'_> {
        StreamWriter {
            streams: self,
            id: StreamId::Stdout,
        }
    }

    /// `io::Write` handle for stderr.
    pub const fn stderr(&mut self) -> StreamWriter<'_> {
        StreamWriter {
            streams: self,
            id: StreamId::Stderr,
        }
    }

    /// Flushes both real sinks.
    ///
    /// # Errors
    ///
    /// Returns the first flush failure.
    pub fn flush(&mut self) -> io::Result<()> {
        self.stdout.real.flush()?;
        self.stderr.real.flush()
    }

    /// Returns `true` while a tee is installed.
    #[must_use]
    pub const fn is_teed(&self) -> bool {
        self.stdout.tap.is_some() || self.stderr.tap.is_some()
    }

    /// How many tees have been opened on these streams.
    #[must_use]
    pub const fn tees_opened(&self) -> usize {
        self.tees_opened
    }

    /// How many tees have been closed on these streams.
    #[must_use]
    pub const fn tees_closed(&self) -> usize {
        self.tees_closed
    }

    pub(crate) fn install_taps(
        &mut self,
        capture: &SharedBuffer,
        stdout: Decoration,
        stderr: Decoration,
    ) {
        self.stdout.tap = Some(Tap {
            capture: capture.clone(),
            decoration: stdout,
        });
        self.stderr.tap = Some(Tap {
            capture: capture.clone(),
            decoration: stderr,
        });
        self.tees_opened += 1;
    }

    pub(crate) fn remove_taps(&mut self) {
        self.stdout.tap = None;
        self.stderr.tap = None;
        self.tees_closed += 1;
    }
}

/// `io::Write` adapter for one stream of a [`StdStreams`].
#[derive(Debug)]
pub struct StreamWriter<'a> {
    streams: &'a mut StdStreams,
    id: StreamId,
}

impl Write for StreamWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.streams.write(self.id, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.streams.slot(self.id).real.flush()
    }
}
