//! CSV output sink.
//!
//! The header is written and flushed as soon as the sink is created, and every
//! row is flushed right after it is written, so the file on disk is always a
//! complete, parseable CSV even if the process is killed mid-run.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::row::{HEADER, Row};

/// Row-at-a-time CSV writer.
pub struct CsvSink {
    path: Option<PathBuf>,
    writer: csv::Writer<Box<dyn Write + Send>>,
    rows: u64,
}

impl CsvSink {
    /// Create (or truncate) the file at `path`, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let mut sink = Self::from_writer(file)?;
        sink.path = Some(path.to_path_buf());
        Ok(sink)
    }

    /// Write to an arbitrary stream.
    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Result<Self> {
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        let mut writer = csv::Writer::from_writer(boxed);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self {
            path: None,
            writer,
            rows: 0,
        })
    }

    /// Append one row and flush it.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        self.writer.write_record(row.to_record())?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written after the header.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Final flush; the underlying stream is closed when `self` drops.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for CsvSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish()
    }
}
