//! File buffer I/O with line-ending and trailing-newline preservation.
//!
//! The locator and applicator work purely in terms of `Vec<String>` lines;
//! this module is the only place that knows how those lines map back onto
//! bytes on disk.

use std::fs;
use std::path::Path;

use crate::error::EngineError;

/// Line-ending style detected in a file's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Both `\n` and `\r\n` appear in the same file. Written back as `Lf`,
    /// per the open question in §9 (no principled way to recover the
    /// original mix line-by-line once the content has been rewritten).
    Mixed,
}

/// An in-memory view of a file: its lines (no terminators), plus enough
/// metadata to write an equivalent file back out.
#[derive(Debug, Clone)]
pub struct FileBuffer {
    pub lines: Vec<String>,
    pub line_ending: LineEnding,
    pub trailing_newline: bool,
}

impl FileBuffer {
    /// An empty buffer, as used for new-file creation.
    pub fn empty() -> Self {
        Self {
            lines: Vec::new(),
            line_ending: LineEnding::Lf,
            trailing_newline: true,
        }
    }

    pub fn read(path: &Path) -> Result<Self, EngineError> {
        let bytes = fs::read(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Self::from_text(&text))
    }

    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::empty();
        }

        let has_crlf = text.contains("\r\n");
        let has_lone_lf = text.replace("\r\n", "").contains('\n');
        let line_ending = match (has_crlf, has_lone_lf) {
            (true, true) => LineEnding::Mixed,
            (true, false) => LineEnding::CrLf,
            _ => LineEnding::Lf,
        };

        let trailing_newline = text.ends_with('\n');
        let normalized = text.replace("\r\n", "\n");
        let mut lines: Vec<String> = normalized.lines().map(str::to_string).collect();
        if !trailing_newline && normalized.is_empty() {
            lines.clear();
        }

        Self {
            lines,
            line_ending,
            trailing_newline,
        }
    }

    /// Render the buffer back into a single string, reapplying the
    /// detected (or default) line ending and trailing newline.
    pub fn to_text(&self) -> String {
        let sep = match self.line_ending {
            LineEnding::CrLf => "\r\n",
            LineEnding::Lf | LineEnding::Mixed => "\n",
        };
        let mut out = self.lines.join(sep);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(sep);
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        fs::write(path, self.to_text()).map_err(|source| EngineError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_lf() {
        let buf = FileBuffer::from_text("a\nb\nc\n");
        assert_eq!(buf.line_ending, LineEnding::Lf);
        assert!(buf.trailing_newline);
        assert_eq!(buf.lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn detects_crlf() {
        let buf = FileBuffer::from_text("a\r\nb\r\n");
        assert_eq!(buf.line_ending, LineEnding::CrLf);
        assert_eq!(buf.lines, vec!["a", "b"]);
    }

    #[test]
    fn detects_mixed() {
        let buf = FileBuffer::from_text("a\r\nb\nc\r\n");
        assert_eq!(buf.line_ending, LineEnding::Mixed);
    }

    #[test]
    fn preserves_missing_trailing_newline() {
        let buf = FileBuffer::from_text("a\nb");
        assert!(!buf.trailing_newline);
        assert_eq!(buf.to_text(), "a\nb");
    }

    #[test]
    fn roundtrips_crlf() {
        let original = "one\r\ntwo\r\nthree\r\n";
        let buf = FileBuffer::from_text(original);
        assert_eq!(buf.to_text(), original);
    }
}
