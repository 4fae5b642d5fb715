//! CSV session file.
//!
//! One file per session, named `<tag>_<YYYY-MM-DD_HH-MM-SS>.csv` after the
//! session's start time.  Rows are variable width, so both the writer and
//! the reader run in flexible mode.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::debug;

use crate::activity::LogRow;
use crate::app::ports::{PersistError, SessionReceipt, SessionSink};

const FILE_STAMP: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Clone)]
pub struct CsvSessionStore {
    path: PathBuf,
}

impl CsvSessionStore {
    /// Store in `dir`, named from `tag` and the session start time.
    pub fn new(dir: impl AsRef<Path>, tag: &str, started_at: NaiveDateTime) -> Self {
        Self {
            path: dir.as_ref().join(file_name(tag, started_at)),
        }
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every persisted row, header included, in file order.
    pub fn read_back(&self) -> Result<Vec<LogRow>, PersistError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_owned).collect());
        }
        Ok(rows)
    }
}

/// `<tag>_<YYYY-MM-DD_HH-MM-SS>.csv`
pub fn file_name(tag: &str, started_at: NaiveDateTime) -> String {
    format!("{tag}_{}.csv", started_at.format(FILE_STAMP))
}

impl SessionSink for CsvSessionStore {
    fn write_session(&mut self, rows: &[LogRow]) -> Result<SessionReceipt, PersistError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        debug!("wrote {} rows to {}", rows.len(), self.path.display());

        Ok(SessionReceipt {
            location: Some(self.path.clone()),
            rows_written: rows.len(),
        })
    }
}
