//! Session activity log.
//!
//! Append-only, single-writer record of everything the engine did during a
//! run, in causal order.  It is the sole record used to verify a physical
//! run after the fact, so every sensor read and every actuator edge lands
//! here.
//!
//! ```text
//!  Actuator ─┐
//!  Sensor   ─┼──▶ ActivityLog ──finalize──▶ SessionSink (CSV file, memory)
//!  Engine   ─┘       (Vec)
//! ```
//!
//! Rows are variable-width tuples of text: the first four columns follow
//! the header, any extra columns carry entry-specific details.

use chrono::NaiveDateTime;

use crate::app::ports::{PersistError, SessionReceipt, SessionSink};
use crate::control::regulator::Direction;
use crate::error::Error;
use crate::fsm::{Outcome, Phase};

/// Header row written first to every session file.
pub const HEADER: [&str; 4] = ["Time", "Object", "Activity", "Details"];

/// One exported row.
pub type LogRow = Vec<String>;

const TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// Entry or exit of a phase / regulator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

impl Edge {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::End => "End",
        }
    }
}

/// Everything that can be recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// One operator-supplied setting, echoed at run start.
    ConfigEcho { field: &'static str, value: String },
    /// A phase of a trial began or ended.
    PhaseMarker {
        phase: Phase,
        trial_index: u32,
        edge: Edge,
    },
    /// An actuator line changed commanded state.
    ActuatorTransition {
        name: &'static str,
        pin: u8,
        energized: bool,
    },
    /// One sensor read.
    Sample { pressure: f64, voltage: f64 },
    /// The regulator started or finished tracking a ramp step.
    RegulatorMarker {
        direction: Direction,
        target: f64,
        edge: Edge,
    },
    /// Measured wall time of a finished phase.
    DurationReport { phase: Phase, actual_secs: f64 },
    /// The run reached a terminal state.
    Outcome(Outcome),
    /// The safety shutoff protocol ran.
    ShutoffEvent,
    /// A fault was caught.
    FaultEvent { reason: Error },
}

impl LogEntry {
    /// Object + activity + detail columns (everything after the timestamp).
    fn columns(&self) -> Vec<String> {
        match self {
            Self::ConfigEcho { field, value } => {
                vec!["config".into(), (*field).into(), value.clone()]
            }
            Self::PhaseMarker {
                phase,
                trial_index,
                edge,
            } => vec![
                "engine".into(),
                format!("{} {}", phase.label(), edge.label()),
                format!("trial {}", trial_index + 1),
            ],
            Self::ActuatorTransition {
                name,
                pin,
                energized,
            } => vec![
                (*name).into(),
                if *energized { "Turn on" } else { "Turn off" }.into(),
                format!("gpio {pin}"),
            ],
            Self::Sample { pressure, voltage } => vec![
                crate::pins::PRESSURE_SENSOR_NAME.into(),
                "Sample".into(),
                format!("{pressure:.3}"),
                format!("{voltage:.6}"),
            ],
            Self::RegulatorMarker {
                direction,
                target,
                edge,
            } => vec![
                "regulator".into(),
                format!("{} Pressure {}", direction.label(), edge.label()),
                format!("{target:.3}"),
            ],
            Self::DurationReport { phase, actual_secs } => vec![
                "engine".into(),
                format!("Actual {} time", phase.label().to_lowercase()),
                format!("{actual_secs:.4}"),
            ],
            Self::Outcome(outcome) => {
                let mut cols = vec!["engine".into(), outcome.summary().into()];
                if let Outcome::Errored(reason) = outcome {
                    cols.push(reason.to_string());
                }
                cols
            }
            Self::ShutoffEvent => vec!["safety".into(), "Emergency Shutoff".into()],
            Self::FaultEvent { reason } => {
                vec!["engine".into(), "Fault".into(), reason.to_string()]
            }
        }
    }
}

/// A timestamped entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub at: NaiveDateTime,
    pub entry: LogEntry,
}

impl LogRecord {
    pub fn new(at: NaiveDateTime, entry: LogEntry) -> Self {
        Self { at, entry }
    }

    pub fn to_row(&self) -> LogRow {
        let mut row = Vec::with_capacity(5);
        row.push(self.at.format(TIME_FORMAT).to_string());
        row.extend(self.entry.columns());
        row
    }
}

/// Ordered, append-only record of a run.
#[derive(Debug, Default)]
pub struct ActivityLog {
    records: Vec<LogRecord>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(1) amortised; never fails.
    pub fn append(&mut self, record: LogRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.records.iter().map(|r| &r.entry)
    }

    /// Number of entries matching `pred`.
    pub fn count(&self, pred: impl Fn(&LogEntry) -> bool) -> usize {
        self.entries().filter(|e| pred(*e)).count()
    }

    /// Header row followed by one row per entry.
    pub fn to_rows(&self) -> Vec<LogRow> {
        let mut rows = Vec::with_capacity(self.records.len() + 1);
        rows.push(HEADER.iter().map(|h| (*h).to_string()).collect());
        rows.extend(self.records.iter().map(LogRecord::to_row));
        rows
    }

    /// Serialise and hand the rows to the persistence collaborator.
    pub fn finalize(&self, sink: &mut impl SessionSink) -> Result<SessionReceipt, PersistError> {
        let rows = self.to_rows();
        log::info!("Finalising activity log: {} entries", self.records.len());
        sink.write_session(&rows)
    }
}
