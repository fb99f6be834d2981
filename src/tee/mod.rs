//! Dual-stream output capture.
//!
//! A [`Tee`] borrows the [`StdStreams`] for the duration of one execution.
//! While open, everything written to stdout or stderr still reaches the
//! real streams (decorated with that stream's prefix and postfix) and is
//! also appended, undecorated and in write order, to one shared capture.
//! Closing, explicitly or on drop, restores the plain streams.

pub mod encoding;
pub mod stream;

pub use encoding::{Encoding, ErrorPolicy, decode};
pub use stream::{
    Decoration, RealStream, SharedBuffer, SinkKind, StdStreams, StreamId, StreamWriter,
};

use crate::error::TeeError;

/// Settings for one tee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeeConfig {
    /// Encoding used to decode the capture.
    pub encoding: Encoding,
    /// Policy for undecodable captured bytes.
    pub errors: ErrorPolicy,
    /// Decoration applied to real stdout writes.
    pub stdout: Decoration,
    /// Decoration applied to real stderr writes.
    pub stderr: Decoration,
}

/// An open tee over a borrowed [`StdStreams`].
///
/// # Examples
///
/// ```
/// use incsh::tee::{StdStreams, StreamId, Tee, TeeConfig};
///
/// let (mut streams, real_out, _real_err) = StdStreams::buffered();
/// let mut tee = Tee::open(&mut streams, TeeConfig::default()).unwrap();
/// tee.write(StreamId::Stdout, b"hello").unwrap();
/// assert_eq!(tee.captured_text(), "hello");
/// tee.close();
/// assert_eq!(real_out.to_string_lossy(), "hello");
/// ```
#[derive(Debug)]
pub struct Tee<'a> {
    streams: &'a mut StdStreams,
    capture: SharedBuffer,
    encoding: Encoding,
    errors: ErrorPolicy,
    closed: bool,
}

impl<'a> Tee<'a> {
    /// Installs a tee on `streams`.
    ///
    /// # Errors
    ///
    /// Returns [`TeeError::AlreadyOpen`] if the streams are already teed.
    pub fn open(streams: &'a mut StdStreams, config: TeeConfig) -> Result<Self, TeeError> {
        if streams.is_teed() {
            return Err(TeeError::AlreadyOpen);
        }
        let capture = SharedBuffer::new();
        streams.install_taps(&capture, config.stdout, config.stderr);
        tracing::debug!(opened = streams.tees_opened(), "tee opened");
        Ok(Self {
            streams,
            capture,
            encoding: config.encoding,
            errors: config.errors,
            closed: false,
        })
    }

    /// Writes `bytes` to stream `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the real stream rejects the write.
    pub fn write(&mut self, id: StreamId, bytes: &[u8]) -> Result<(), TeeError> {
        self.streams
            .write(id, bytes)
            .map_err(|e| TeeError::Write(e.to_string()))
    }

    /// The underlying streams, for executors to write through.
    pub const fn streams(&mut self) -> &mut StdStreams {
        self.streams
    }

    /// Raw captured bytes.
    #[must_use]
    pub fn captured_bytes(&self) -> Vec<u8> {
        self.capture.contents()
    }

    /// Everything captured so far, decoded with the configured encoding.
    ///
    /// Under the `strict` policy an undecodable capture falls back to
    /// replacement characters rather than losing the text.
    #[must_use]
    pub fn captured_text(&self) -> String {
        let bytes = self.capture.contents();
        decode(&bytes, self.encoding, self.errors).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "captured output not decodable, replacing");
            decode(&bytes, self.encoding, ErrorPolicy::Replace).unwrap_or_default()
        })
    }

    /// Returns `true` once closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Removes the taps and flushes the real streams. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.streams.remove_taps();
        if let Err(e) = self.streams.flush() {
            tracing::warn!(error = %e, "flushing streams on tee close failed");
        }
        tracing::debug!(closed = self.streams.tees_closed(), "tee closed");
    }
}

impl Drop for Tee<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decorated() -> TeeConfig {
        TeeConfig {
            stderr: Decoration::new("\x1b[31m", "\x1b[0m"),
            ..TeeConfig::default()
        }
    }

    #[test]
    fn test_interleaved_capture() {
        let (mut streams, out, err) = StdStreams::buffered();
        {
            let mut tee = Tee::open(&mut streams, decorated()).unwrap();
            tee.write(StreamId::Stdout, b"A").unwrap();
            tee.write(StreamId::Stderr, b"B").unwrap();
            tee.write(StreamId::Stdout, b"C").unwrap();
            assert_eq!(tee.captured_text(), "ABC");
        }
        assert_eq!(out.to_string_lossy(), "AC");
        assert_eq!(err.to_string_lossy(), "\x1b[31mB\x1b[0m");
    }

    #[test]
    fn test_writes_after_close_bypass_capture() {
        let (mut streams, out, _err) = StdStreams::buffered();
        let mut tee = Tee::open(&mut streams, TeeConfig::default()).unwrap();
        tee.write(StreamId::Stdout, b"in").unwrap();
        tee.close();
        tee.close();
        tee.write(StreamId::Stdout, b"out").unwrap();

        assert_eq!(tee.captured_text(), "in");
        assert!(tee.is_closed());
        drop(tee);
        assert_eq!(out.to_string_lossy(), "inout");
        assert_eq!((streams.tees_opened(), streams.tees_closed()), (1, 1));
        assert!(!streams.is_teed());
    }

    #[test]
    fn test_drop_restores_streams() {
        let (mut streams, _out, _err) = StdStreams::buffered();
        {
            let _tee = Tee::open(&mut streams, TeeConfig::default()).unwrap();
        }
        assert!(!streams.is_teed());
        assert_eq!(streams.tees_closed(), 1);
    }

    #[test]
    fn test_refuses_nested_open() {
        let (mut streams, _out, _err) = StdStreams::buffered();
        let capture = SharedBuffer::new();
        streams.install_taps(&capture, Decoration::default(), Decoration::default());
        assert!(matches!(
            Tee::open(&mut streams, TeeConfig::default()),
            Err(TeeError::AlreadyOpen)
        ));
    }

    #[test]
    fn test_strict_capture_falls_back() {
        let (mut streams, _out, _err) = StdStreams::buffered();
        let config = TeeConfig {
            errors: ErrorPolicy::Strict,
            ..TeeConfig::default()
        };
        let mut tee = Tee::open(&mut streams, config).unwrap();
        tee.write(StreamId::Stdout, b"ok\xff").unwrap();
        assert_eq!(tee.captured_text(), "ok\u{fffd}");
    }

    #[test]
    fn test_executor_writes_via_streams_are_captured() {
        use std::io::Write;

        let (mut streams, _out, _err) = StdStreams::buffered();
        let mut tee = Tee::open(&mut streams, TeeConfig::default()).unwrap();
        writeln!(tee.streams().stdout(), "line").unwrap();
        assert_eq!(tee.captured_bytes(), b"line\n");
    }
}
