//! Worker → front-end channels.
//!
//! The front end never touches the engine.  It writes one [`StopFlag`] and
//! reads the latest [`StatusSnapshot`] from a [`StatusBoard`]; the worker
//! is the only writer of the board.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

/// Capacity of the phase label carried in a snapshot.
pub const LABEL_CAPACITY: usize = 32;

/// Run state as shown to the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RunState {
    #[default]
    Ready,
    Running,
    Complete,
    Halted,
    Errored,
}

impl RunState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::Running => "Running Trials...",
            Self::Complete => "COMPLETE",
            Self::Halted => "HALTED",
            Self::Errored => "ERROR",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Halted | Self::Errored)
    }
}

/// Latest progress of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub pressure_mmhg: f64,
    /// Seconds since the run started.
    pub elapsed_secs: f64,
    pub phase_label: heapless::String<LABEL_CAPACITY>,
    /// 1-based trial number.
    pub trial: u32,
    pub state: RunState,
    /// Board update counter at publication.
    pub sequence: u64,
}

impl StatusSnapshot {
    pub fn new(
        pressure_mmhg: f64,
        elapsed_secs: f64,
        label: &str,
        trial: u32,
        state: RunState,
    ) -> Self {
        let mut phase_label = heapless::String::new();
        for ch in label.chars() {
            if phase_label.push(ch).is_err() {
                break;
            }
        }
        Self {
            pressure_mmhg,
            elapsed_secs,
            phase_label,
            trial,
            state,
            sequence: 0,
        }
    }
}

/// Single-writer, many-reader latest-value cell.
#[derive(Debug, Default)]
pub struct StatusBoard {
    latest: Mutex<StatusSnapshot>,
    updates: AtomicU64,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest snapshot and bump the counter.
    pub fn publish(&self, mut snapshot: StatusSnapshot) {
        let mut slot = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot.sequence = self.updates.fetch_add(1, Ordering::AcqRel) + 1;
        *slot = snapshot;
    }

    pub fn latest(&self) -> StatusSnapshot {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Monotonic count of publications.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Acquire)
    }
}

/// Cooperative stop request shared with the worker.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
