//! Line framing for the serial wire protocol.
//!
//! The device speaks newline-terminated lines, optionally with a carriage
//! return before the newline. Bytes are accumulated one at a time; a completed
//! line is stripped of at most one trailing `\r`, and empty lines are dropped
//! silently. A completed line that is not valid UTF-8 is handed back raw so
//! the caller can hex-dump it before dropping it.

/// A completed line whose bytes were not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLine(pub Vec<u8>);

/// Incremental byte accumulator that yields completed lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte. Returns a completed, non-empty line when `byte` is the
    /// terminator, `None` otherwise. The internal buffer is cleared on every
    /// terminator, including for dropped empty lines.
    pub fn push(&mut self, byte: u8) -> Option<Result<String, BinaryLine>> {
        if byte != b'\n' {
            self.buffer.push(byte);
            return None;
        }

        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
        }
        if self.buffer.is_empty() {
            return None;
        }

        let bytes = std::mem::take(&mut self.buffer);
        Some(String::from_utf8(bytes).map_err(|e| BinaryLine(e.into_bytes())))
    }

    /// Feed a read chunk, collecting every line it completes.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Result<String, BinaryLine>> {
        chunk.iter().filter_map(|&b| self.push(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_line_byte_by_byte() {
        let mut framer = LineFramer::new();
        for &b in b"OK" {
            assert_eq!(framer.push(b), None);
        }
        assert_eq!(framer.push(b'\n'), Some(Ok("OK".to_string())));
    }

    #[test]
    fn strips_one_trailing_carriage_return() {
        let mut framer = LineFramer::new();
        let lines = framer.push_chunk(b"value\r\n");
        assert_eq!(lines, vec![Ok("value".to_string())]);
    }

    #[test]
    fn keeps_interior_carriage_returns() {
        let mut framer = LineFramer::new();
        let lines = framer.push_chunk(b"a\rb\r\r\n");
        assert_eq!(lines, vec![Ok("a\rb\r".to_string())]);
    }

    #[test]
    fn drops_empty_lines() {
        let mut framer = LineFramer::new();
        assert!(framer.push_chunk(b"\n\r\n\n").is_empty());
    }

    #[test]
    fn buffer_resets_between_lines() {
        let mut framer = LineFramer::new();
        let lines = framer.push_chunk(b"first\nsecond\r\n");
        assert_eq!(
            lines,
            vec![Ok("first".to_string()), Ok("second".to_string())]
        );
    }

    #[test]
    fn partial_line_survives_chunk_boundaries() {
        let mut framer = LineFramer::new();
        assert!(framer.push_chunk(b"2023-01-01\t5\tKit").is_empty());
        let lines = framer.push_chunk(b"chen\t23.4\r\n");
        assert_eq!(lines, vec![Ok("2023-01-01\t5\tKitchen\t23.4".to_string())]);
    }

    #[test]
    fn non_utf8_line_comes_back_raw_not_substituted() {
        let mut framer = LineFramer::new();
        let lines = framer.push_chunk(b"\xfftemp\xfe\r\n");
        assert_eq!(lines, vec![Err(BinaryLine(b"\xfftemp\xfe".to_vec()))]);

        // The framer recovers for the next line.
        let lines = framer.push_chunk(b"OK\r\n");
        assert_eq!(lines, vec![Ok("OK".to_string())]);
    }
}
