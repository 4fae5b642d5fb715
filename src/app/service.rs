//! Session service: runs one engine on one background worker.
//!
//! ```text
//!  front end ──spawn(config)──▶ ┌─────────────────────────┐
//!            ──request_stop──▶  │ worker: TrialEngine::run │──▶ SessionSink
//!            ◀──status()─────── │   then finalize log      │
//!            ◀──join()───────── └─────────────────────────┘
//! ```
//!
//! The config is validated on the caller's thread, so an invalid session
//! is rejected before a worker exists or any line is touched.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};

use crate::activity::ActivityLog;
use crate::config::TrialConfig;
use crate::error::{Error, Result};
use crate::fsm::context::Rig;
use crate::fsm::{EngineState, Outcome, TrialEngine};

use super::events::{StatusBoard, StatusSnapshot, StopFlag};
use super::ports::{ClockPort, PersistError, SessionReceipt, SessionSink, VoltagePort};

const WORKER_NAME: &str = "trial-worker";

/// Everything a finished session hands back.
pub struct SessionReport<P, V, S> {
    pub outcome: Outcome,
    /// Result of writing the log through the sink.
    pub persisted: core::result::Result<SessionReceipt, PersistError>,
    pub sink: S,
    /// Released hardware, ready for another engine.
    pub rig: Rig<P, V>,
    pub log: ActivityLog,
}

/// Starts sessions.
pub struct TrialService;

impl TrialService {
    /// Validate `config`, then run `engine` on a named worker thread.
    pub fn spawn<P, V, C, S>(
        engine: TrialEngine<P, V, C>,
        config: TrialConfig,
        mut sink: S,
    ) -> Result<SessionHandle<P, V, S>>
    where
        P: OutputPin + Send + 'static,
        V: VoltagePort + Send + 'static,
        C: ClockPort + Send + 'static,
        S: SessionSink + Send + 'static,
    {
        if engine.state() != EngineState::Idle {
            return Err(Error::EngineSpent);
        }
        config.validate()?;

        let stop = engine.stop_flag();
        let status = engine.status_board();
        let mut engine = engine;

        let worker = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || -> Result<SessionReport<P, V, S>> {
                // A panic inside the run has already been shut off and
                // logged by the engine; the log is still written.
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| engine.run(config))) {
                    Ok(ran) => ran?,
                    Err(_) => {
                        error!("{WORKER_NAME}: trial run panicked");
                        match engine.state() {
                            EngineState::Errored(reason) => Outcome::Errored(reason),
                            _ => Outcome::Errored(Error::Worker),
                        }
                    }
                };
                let persisted = engine.finalize(&mut sink);
                match &persisted {
                    Ok(receipt) => info!(
                        "Session log written: {} rows{}",
                        receipt.rows_written,
                        receipt
                            .location
                            .as_ref()
                            .map(|p| format!(" to {}", p.display()))
                            .unwrap_or_default()
                    ),
                    Err(e) => error!("Session log could not be written: {e}"),
                }
                let (rig, log) = engine.into_parts();
                Ok(SessionReport {
                    outcome,
                    persisted,
                    sink,
                    rig,
                    log,
                })
            })
            .map_err(|e| {
                error!("Could not start {WORKER_NAME}: {e}");
                Error::Worker
            })?;

        info!(
            "Session started: {} trial(s), {:.1} s planned",
            config.trial_count,
            config.total_time()
        );
        Ok(SessionHandle {
            worker,
            stop,
            status,
        })
    }
}

/// Front-end side of a running session.
pub struct SessionHandle<P, V, S> {
    worker: JoinHandle<Result<SessionReport<P, V, S>>>,
    stop: StopFlag,
    status: Arc<StatusBoard>,
}

impl<P, V, S> SessionHandle<P, V, S> {
    /// Ask the worker to halt at its next check.
    pub fn request_stop(&self) {
        warn!("Stop requested by operator");
        self.stop.request_stop();
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.latest()
    }

    pub fn status_board(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.status)
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the terminal state.  A panic inside the run comes back as
    /// `Outcome::Errored(Error::Worker)` with the log finalized; only a
    /// panic outside the run maps to `Err(Error::Worker)`.
    pub fn join(self) -> Result<SessionReport<P, V, S>> {
        self.worker.join().map_err(|_| {
            error!("{WORKER_NAME} panicked");
            Error::Worker
        })?
    }
}
