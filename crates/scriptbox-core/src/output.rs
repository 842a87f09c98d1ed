//! Captured-output buffer for the sandbox print family.
//!
//! The session redirects the interpreter's print routines into this buffer
//! instead of host stdio. The buffer is truncated to zero at the start of
//! every eval, so each result carries exactly the output of its own run.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

/// Default cap on captured output per eval.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Marker appended once when the output cap is reached.
pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// Shared handle to a session's output buffer. The print-family closures
/// installed in the interpreter hold clones of this handle.
pub type OutputHandle = Rc<RefCell<OutputBuffer>>;

/// Growable byte buffer with reset semantics and a hard cap.
#[derive(Debug)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
    max_bytes: usize,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            bytes: Vec::new(),
            max_bytes,
            truncated: false,
        }
    }

    pub fn handle(max_bytes: usize) -> OutputHandle {
        Rc::new(RefCell::new(Self::new(max_bytes)))
    }

    /// Append bytes, honouring the cap. Once the cap is hit the marker is
    /// appended and all further writes in this eval are dropped.
    pub fn write(&mut self, bytes: &[u8]) {
        if self.truncated || bytes.is_empty() {
            return;
        }
        let remaining = self.max_bytes.saturating_sub(self.bytes.len());
        if bytes.len() > remaining {
            self.bytes.extend_from_slice(&bytes[..remaining]);
            self.bytes.extend_from_slice(TRUNCATION_MARKER.as_bytes());
            self.truncated = true;
            debug!("captured output truncated at {} bytes", self.max_bytes);
        } else {
            self.bytes.extend_from_slice(bytes);
        }
    }

    /// Append bytes and make sure they end in a newline.
    pub fn write_line(&mut self, bytes: &[u8]) {
        self.write(bytes);
        if bytes.last() != Some(&b'\n') {
            self.write(b"\n");
        }
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.truncated = false;
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Current contents as text. Invalid UTF-8 is replaced, not rejected.
    pub fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_snapshot() {
        let mut buf = OutputBuffer::new(DEFAULT_MAX_OUTPUT_BYTES);
        buf.write(b"hello ");
        buf.write(b"world");
        assert_eq!(buf.snapshot(), "hello world");
        assert_eq!(buf.len(), 11);
        assert!(!buf.is_truncated());
    }

    #[test]
    fn test_clear() {
        let mut buf = OutputBuffer::new(DEFAULT_MAX_OUTPUT_BYTES);
        buf.write(b"data");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.snapshot(), "");
    }

    #[test]
    fn test_write_line_adds_missing_newline() {
        let mut buf = OutputBuffer::new(DEFAULT_MAX_OUTPUT_BYTES);
        buf.write_line(b"no newline");
        buf.write_line(b"has one\n");
        buf.write_line(b"");
        assert_eq!(buf.snapshot(), "no newline\nhas one\n\n");
    }

    #[test]
    fn test_truncation_marker() {
        let mut buf = OutputBuffer::new(8);
        buf.write(b"0123456789");
        assert!(buf.is_truncated());
        assert_eq!(buf.snapshot(), format!("01234567{TRUNCATION_MARKER}"));

        // Further writes are dropped.
        let len = buf.len();
        buf.write(b"more");
        assert_eq!(buf.len(), len);
    }

    #[test]
    fn test_clear_resets_truncation() {
        let mut buf = OutputBuffer::new(4);
        buf.write(b"123456");
        assert!(buf.is_truncated());
        buf.clear();
        assert!(!buf.is_truncated());
        buf.write(b"ok");
        assert_eq!(buf.snapshot(), "ok");
    }

    #[test]
    fn test_lossy_snapshot() {
        let mut buf = OutputBuffer::new(DEFAULT_MAX_OUTPUT_BYTES);
        buf.write(&[0xff, b'x']);
        assert_eq!(buf.snapshot(), "\u{fffd}x");
    }
}
