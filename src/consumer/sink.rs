//! Destinations for persisted event lines.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Receives every successfully decoded event as a formatted line.
pub trait EventSink: Send {
    fn name(&self) -> &str;

    /// Write one newline-terminated line.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Flush and release the sink. Later writes fail.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes lines to standard output.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(line.as_bytes())?;
        out.flush()
    }
}

/// Append-only event log file.
///
/// The file is created if missing and never truncated. It is flushed and
/// synced exactly once, on `close` or on drop, whichever comes first.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    name: String,
    file: Option<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), "Opened event log");
        Ok(Self {
            name: format!("file:{}", path.display()),
            path,
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(line.as_bytes()),
            None => Err(io::Error::other("event log already closed")),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all()?;
            debug!(path = %self.path.display(), "Closed event log");
        }
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "Failed to close event log");
        }
    }
}
