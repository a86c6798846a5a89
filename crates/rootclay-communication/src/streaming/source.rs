//! Command sources
//!
//! A [`CommandSource`] yields raw lines from inline text or a G-code file,
//! front to back, exactly once. The total line count is known up front so
//! progress can be reported as a percentage.

use rootclay_core::{Result, StreamError};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// Where a source's lines come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// In-memory text
    Text(String),
    /// A file on disk
    File(PathBuf),
}

impl SourceOrigin {
    /// Short description used in log lines and errors
    pub fn describe(&self) -> String {
        match self {
            SourceOrigin::Text(_) => "inline text".to_string(),
            SourceOrigin::File(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<PathBuf> for SourceOrigin {
    fn from(path: PathBuf) -> Self {
        SourceOrigin::File(path)
    }
}

enum LineReader {
    Text(std::vec::IntoIter<String>),
    File(Lines<BufReader<File>>),
    Closed,
}

/// Single-pass reader over a source's raw lines
pub struct CommandSource {
    origin: SourceOrigin,
    total_lines: usize,
    lines: LineReader,
}

impl CommandSource {
    /// Open an origin and count its lines
    ///
    /// Files are read twice: once to count, then again for streaming.
    pub fn open(origin: SourceOrigin) -> Result<Self> {
        match origin {
            SourceOrigin::Text(text) => Ok(Self::from_text(text)),
            SourceOrigin::File(path) => Self::open_file(path),
        }
    }

    /// Source over in-memory text
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        Self {
            total_lines: lines.len(),
            origin: SourceOrigin::Text(text),
            lines: LineReader::Text(lines.into_iter()),
        }
    }

    fn open_file(path: PathBuf) -> Result<Self> {
        let total_lines = {
            let mut count = 0usize;
            for line in open_lines(&path)? {
                line.map_err(|e| read_error(&path, e))?;
                count += 1;
            }
            count
        };
        tracing::debug!("{} has {} lines", path.display(), total_lines);

        let lines = open_lines(&path)?;
        Ok(Self {
            origin: SourceOrigin::File(path),
            total_lines,
            lines: LineReader::File(lines),
        })
    }

    /// Where the lines come from
    pub fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    /// Number of raw lines, including blanks and comments
    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    /// The next raw line, or `None` at the end or after [`close`](Self::close)
    pub fn next_line(&mut self) -> Result<Option<String>> {
        match &mut self.lines {
            LineReader::Text(lines) => Ok(lines.next()),
            LineReader::File(lines) => match lines.next() {
                Some(Ok(line)) => Ok(Some(line)),
                Some(Err(e)) => {
                    let err = match &self.origin {
                        SourceOrigin::File(path) => read_error(path, e),
                        SourceOrigin::Text(_) => e.into(),
                    };
                    self.close();
                    Err(err)
                }
                None => Ok(None),
            },
            LineReader::Closed => Ok(None),
        }
    }

    /// Release the underlying handle; safe to call repeatedly
    pub fn close(&mut self) {
        if !self.is_closed() {
            tracing::trace!("Closing source {}", self.origin);
            self.lines = LineReader::Closed;
        }
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        matches!(self.lines, LineReader::Closed)
    }
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSource")
            .field("origin", &self.origin.describe())
            .field("total_lines", &self.total_lines)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn open_lines(path: &Path) -> Result<Lines<BufReader<File>>> {
    let file = File::open(path).map_err(|e| read_error(path, e))?;
    Ok(BufReader::new(file).lines())
}

fn read_error(path: &Path, e: std::io::Error) -> rootclay_core::Error {
    StreamError::SourceRead {
        origin: path.display().to_string(),
        reason: e.to_string(),
    }
    .into()
}
