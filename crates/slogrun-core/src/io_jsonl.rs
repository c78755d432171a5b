//! Line-by-line slog reading.
//!
//! Slogs are routinely tens of gigabytes, so input is consumed one line at a
//! time through an owning iterator. Each line is read into a fresh buffer that
//! is handed to the caller as is, without a copy. Decoding is left to the
//! tracker; the reader only splits lines and strips terminators.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Owning iterator over the lines of a slog.
///
/// Yields each line without its `\n` / `\r\n` terminator. Blank lines are
/// surfaced as errors carrying their line number.
pub struct SlogLines<R> {
    rdr: R,
    buf: String,
    line_no: u64,
}

impl<R: BufRead> SlogLines<R> {
    /// Wrap a buffered reader.
    pub fn new(rdr: R) -> Self {
        Self {
            rdr,
            buf: String::new(),
            line_no: 0,
        }
    }

    /// Number of lines yielded so far.
    #[must_use]
    pub const fn line_no(&self) -> u64 {
        self.line_no
    }
}

impl<R: BufRead> Iterator for SlogLines<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.rdr.read_line(&mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_no += 1;
                if self.buf.ends_with('\n') {
                    self.buf.pop();
                    if self.buf.ends_with('\r') {
                        self.buf.pop();
                    }
                }
                if self.buf.is_empty() {
                    return Some(Err(anyhow!("slog line {}: empty line", self.line_no)));
                }
                Some(Ok(std::mem::take(&mut self.buf)))
            }
            Err(e) => Some(Err(e).with_context(|| format!("read slog line {}", self.line_no + 1))),
        }
    }
}

/// Open a slog file, or stdin when `path` is `None` or `-`.
pub fn open_slog(path: Option<&Path>) -> Result<SlogLines<Box<dyn BufRead>>> {
    let rdr: Box<dyn BufRead> = match path {
        None => Box::new(io::stdin().lock()),
        Some(p) if p.as_os_str() == "-" => Box::new(io::stdin().lock()),
        Some(p) => {
            let f = File::open(p).with_context(|| format!("open {}", p.display()))?;
            Box::new(BufReader::with_capacity(1 << 20, f))
        }
    };
    Ok(SlogLines::new(rdr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn splits_and_strips_terminators() {
        let src = "{\"a\":1}\r\n{\"b\":2}\n{\"c\":3}";
        let lines: Vec<String> = SlogLines::new(Cursor::new(src))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"]);
    }

    #[test]
    fn yielded_lines_do_not_share_the_read_buffer() {
        let long = format!("{{\"pad\":\"{}\"}}", "x".repeat(10_000));
        let src = format!("{long}\n{{}}\n");
        let mut it = SlogLines::new(Cursor::new(src));
        let first = it.next().unwrap().unwrap();
        let second = it.next().unwrap().unwrap();
        assert_eq!(first, long);
        assert_eq!(second, "{}");
        assert!(it.next().is_none());
        assert_eq!(it.line_no(), 2);
    }

    #[test]
    fn blank_line_is_an_error() {
        let mut it = SlogLines::new(Cursor::new("{}\n\n{}\n"));
        assert!(it.next().unwrap().is_ok());
        let err = it.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(it.line_no(), 2);
    }
}
