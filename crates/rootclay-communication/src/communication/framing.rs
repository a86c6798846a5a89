//! Newline framing of the inbound byte stream

/// Longest partial line kept before it is flushed as a line of its own
pub const DEFAULT_MAX_LINE: usize = 4096;

/// Accumulates raw bytes and yields complete response lines
///
/// Lines are split on `\n`; a `\r` before the newline is dropped. Bytes that
/// are not valid UTF-8 are replaced rather than rejected.
#[derive(Debug, Clone)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line: usize,
}

impl LineFramer {
    /// Create a framer with the default line limit
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }

    /// Create a framer with a custom line limit
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line: max_line.max(1),
        }
    }

    /// Feed bytes, returning every line they complete
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let frame: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(decode(&frame[..frame.len() - 1]));
        }

        if self.buffer.len() > self.max_line {
            tracing::warn!(
                "Response exceeded {} bytes without a newline, flushing",
                self.max_line
            );
            let frame: Vec<u8> = self.buffer.drain(..).collect();
            lines.push(decode(&frame));
        }

        lines
    }

    /// Bytes received since the last newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(frame: &[u8]) -> String {
    let frame = frame.strip_suffix(b"\r").unwrap_or(frame);
    String::from_utf8_lossy(frame).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_reads() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"o").is_empty());
        assert_eq!(framer.push(b"k\nok T:21"), vec!["ok"]);
        assert_eq!(framer.pending(), 7);
        assert_eq!(framer.push(b".3\n"), vec!["ok T:21.3"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_crlf_and_empty_lines() {
        let mut framer = LineFramer::new();
        assert_eq!(
            framer.push(b"start\r\n\r\necho:busy\n"),
            vec!["start", "", "echo:busy"]
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"ok \xff\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
    }

    #[test]
    fn test_overlong_line_is_flushed() {
        let mut framer = LineFramer::with_max_line(4);
        assert_eq!(framer.push(b"abcdef"), vec!["abcdef"]);
        assert_eq!(framer.pending(), 0);
    }
}
