//! Extraction sinks.
//!
//! When a finished run's category is selected for extraction, the tracker
//! hands its buffered raw lines to an [`ExtractSink`] under the name
//! `b<block>-r<run>-<category>`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

/// Destination for extracted runs.
pub trait ExtractSink {
    /// Persist `lines` (without trailing newlines) under `name`.
    fn write_run(&mut self, name: &str, lines: &[String]) -> io::Result<()>;
}

impl<S: ExtractSink + ?Sized> ExtractSink for &mut S {
    fn write_run(&mut self, name: &str, lines: &[String]) -> io::Result<()> {
        (**self).write_run(name, lines)
    }
}

/// Writes one file per run into a directory.
///
/// Files are created with create-new semantics; an existing file is an
/// error unless `overwrite` is set. Names must be a single plain file name:
/// a passthrough category carries input text and may not escape `dir`.
#[derive(Clone, Debug)]
pub struct DirSink {
    dir: PathBuf,
    overwrite: bool,
}

impl DirSink {
    /// Sink rooted at `dir` (created on first write if missing).
    #[must_use]
    pub fn new<P: Into<PathBuf>>(dir: P, overwrite: bool) -> Self {
        Self {
            dir: dir.into(),
            overwrite,
        }
    }

    fn open(&self, path: &Path) -> io::Result<File> {
        let mut opts = OpenOptions::new();
        opts.write(true);
        if self.overwrite {
            opts.create(true).truncate(true);
        } else {
            opts.create_new(true);
        }
        opts.open(path)
    }
}

impl ExtractSink for DirSink {
    fn write_run(&mut self, name: &str, lines: &[String]) -> io::Result<()> {
        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir)?;
        }
        let path = self.dir.join(plain_file_name(name)?);
        let mut w = BufWriter::new(self.open(&path)?);
        for line in lines {
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
        }
        w.flush()
    }
}

fn plain_file_name(name: &str) -> io::Result<&str> {
    let mut parts = Path::new(name).components();
    match (parts.next(), parts.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(name),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("extraction name {name:?} is not a plain file name"),
        )),
    }
}

/// Keeps extracted runs in memory, in extraction order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemorySink {
    /// `(name, lines)` per extracted run.
    pub runs: Vec<(String, Vec<String>)>,
}

impl ExtractSink for MemorySink {
    fn write_run(&mut self, name: &str, lines: &[String]) -> io::Result<()> {
        self.runs.push((name.to_owned(), lines.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("slogrun_sink_{tag}_{nanos}"))
    }

    #[test]
    fn dir_sink_writes_lines_and_refuses_overwrite() {
        let dir = scratch_dir("create_new");
        let mut sink = DirSink::new(&dir, false);
        let lines = vec!["{\"a\":1}".to_owned(), "{\"b\":2}".to_owned()];
        sink.write_run("b1-r1-timer", &lines).unwrap();

        let text = fs::read_to_string(dir.join("b1-r1-timer")).unwrap();
        assert_eq!(text, "{\"a\":1}\n{\"b\":2}\n");

        let err = sink.write_run("b1-r1-timer", &lines).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let mut sink = DirSink::new(&dir, true);
        sink.write_run("b1-r1-timer", &lines[..1]).unwrap();
        let text = fs::read_to_string(dir.join("b1-r1-timer")).unwrap();
        assert_eq!(text, "{\"a\":1}\n");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn dir_sink_rejects_names_leaving_the_directory() {
        let dir = scratch_dir("escape");
        let mut sink = DirSink::new(&dir, true);
        let lines = vec!["{}".to_owned()];
        for name in ["b1-r1-../../evil", "b1-r1-a/b", "..", "/tmp/b1-r1-x", "b1-r1-a\\b", ""] {
            let err = sink.write_run(name, &lines).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{name}");
        }
        sink.write_run("b1-r1-odd..name", &lines).unwrap();
        assert!(dir.join("b1-r1-odd..name").is_file());

        let _ = fs::remove_dir_all(dir);
    }
}
