//! Port traits: the boundary between the trial engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TrialEngine (domain)
//! ```
//!
//! Digital output lines use `embedded_hal::digital::OutputPin` directly.
//! The ADC, the clock and session persistence have no HAL trait, so they
//! are defined here.  The engine consumes all of them via generics and
//! never touches hardware or the filesystem itself.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::activity::LogRow;
use crate::error::SensorError;

// ───────────────────────────────────────────────────────────────
// Voltage port (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the analog front end.
pub trait VoltagePort {
    /// One blocking conversion on `channel`, in volts.
    fn read_voltage(&mut self, channel: u8) -> Result<f64, SensorError>;

    /// Give up any exclusively held bus handle.  Must be idempotent.
    fn release(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source for phase timing and log timestamps.
pub trait ClockPort {
    /// Monotonic seconds since an arbitrary origin.
    fn monotonic_secs(&self) -> f64;

    /// Local wall-clock time for log rows and file names.
    fn wall_clock(&self) -> NaiveDateTime;

    /// Block the worker for `secs`.  Zero returns immediately.
    fn idle(&self, secs: f64);
}

// ───────────────────────────────────────────────────────────────
// Session sink (driven adapter: domain → file / memory)
// ───────────────────────────────────────────────────────────────

/// What a sink reports after persisting a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReceipt {
    /// File the rows went to, if the sink is file-backed.
    pub location: Option<PathBuf>,
    /// Rows written, header included.
    pub rows_written: usize,
}

/// Persistence collaborator for the finalised activity log.
pub trait SessionSink {
    /// Write every row (header first) as one session.
    fn write_session(&mut self, rows: &[LogRow]) -> Result<SessionReceipt, PersistError>;
}

/// Errors from [`SessionSink`] operations.
#[derive(Debug)]
pub enum PersistError {
    /// Filesystem error.
    Io(std::io::Error),
    /// Row encoding / decoding error.
    Csv(csv::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "session I/O error: {e}"),
            Self::Csv(e) => write!(f, "session CSV error: {e}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for PersistError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

// ───────────────────────────────────────────────────────────────
// In-memory sink
// ───────────────────────────────────────────────────────────────

/// Keeps the rows in memory.  Used when no file is wanted.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rows: Vec<LogRow>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionSink for MemorySink {
    fn write_session(&mut self, rows: &[LogRow]) -> Result<SessionReceipt, PersistError> {
        self.rows = rows.to_vec();
        Ok(SessionReceipt {
            location: None,
            rows_written: rows.len(),
        })
    }
}
