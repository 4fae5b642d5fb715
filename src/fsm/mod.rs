//! Trial engine: a function-pointer phase table driven by one worker.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  PhaseTable                                                      │
//! │  ┌─────────┬──────────┬─────────────────┬──────────┬──────────┐  │
//! │  │ Phase   │ on_enter │ on_poll         │ on_exit  │ duration │  │
//! │  ├─────────┼──────────┼─────────────────┼──────────┼──────────┤  │
//! │  │ Inflate │    -     │ ramp + raise_to │ pump off │ inflate  │  │
//! │  │ Hold    │    -     │ sample          │    -     │ hold     │  │
//! │  │ Deflate │    -     │ ramp + lower_to │ pump off │ deflate  │  │
//! │  │ Rest    │    -     │ idle            │    -     │ rest     │  │
//! │  └─────────┴──────────┴─────────────────┴──────────┴──────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every phase runs through the same poll-and-check loop: stop flag first,
//! then the elapsed-time bound, then one `on_poll` step.  Whatever ends a
//! phase (time, stop, fault), its `on_exit` runs and its duration and end
//! marker are logged.
//!
//! A run is bracketed by a drop guard that executes the safety shutoff on
//! every exit path, including a panic inside a handler.

pub mod context;
pub mod states;

use std::sync::Arc;

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};

use crate::activity::{ActivityLog, Edge, LogEntry};
use crate::app::events::{RunState, StatusBoard, StopFlag};
use crate::app::ports::{ClockPort, PersistError, SessionReceipt, SessionSink, VoltagePort};
use crate::config::{EngineSettings, TrialConfig};
use crate::error::{ConfigError, Error, Result};
use crate::safety::SafetyShutoff;

use context::{FsmContext, Rig};

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// The four phases of a trial.  Index order = table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Phase {
    Inflate = 0,
    Hold = 1,
    Deflate = 2,
    Rest = 3,
}

impl Phase {
    pub const COUNT: usize = 4;

    pub const fn label(self) -> &'static str {
        match self {
            Self::Inflate => "Inflate",
            Self::Hold => "Hold",
            Self::Deflate => "Deflate",
            Self::Rest => "Rest",
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    Halted,
    Errored(Error),
}

impl Outcome {
    /// Text of the outcome row in the activity log.
    pub const fn summary(&self) -> &'static str {
        match self {
            Self::Complete => "All trials completed",
            Self::Halted => "Trials halted",
            Self::Errored(_) => "Trials aborted",
        }
    }

    pub const fn run_state(&self) -> RunState {
        match self {
            Self::Complete => RunState::Complete,
            Self::Halted => RunState::Halted,
            Self::Errored(_) => RunState::Errored,
        }
    }
}

/// Engine lifecycle.  Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineState {
    Idle,
    Running {
        trial_index: u32,
        phase: Phase,
        /// Monotonic seconds at phase entry.
        phase_start_secs: f64,
    },
    Complete,
    Halted,
    Errored(Error),
}

impl EngineState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Halted | Self::Errored(_))
    }
}

impl From<Outcome> for EngineState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Complete => Self::Complete,
            Outcome::Halted => Self::Halted,
            Outcome::Errored(reason) => Self::Errored(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Runs once on phase entry or exit.
pub type PhaseActionFn<P, V, C> = fn(&mut FsmContext<P, V, C>) -> Result<()>;

/// One step of a phase; receives the phase-relative elapsed seconds.
pub type PhasePollFn<P, V, C> = fn(&mut FsmContext<P, V, C>, f64) -> Result<()>;

/// Static descriptor for a single phase.
pub struct PhaseDescriptor<P, V, C> {
    pub phase: Phase,
    pub name: &'static str,
    pub on_enter: Option<PhaseActionFn<P, V, C>>,
    pub on_poll: PhasePollFn<P, V, C>,
    pub on_exit: Option<PhaseActionFn<P, V, C>>,
    /// Configured length of the phase.
    pub duration: fn(&TrialConfig) -> f64,
}

pub type PhaseTable<P, V, C> = [PhaseDescriptor<P, V, C>; Phase::COUNT];

// ---------------------------------------------------------------------------
// Trial engine
// ---------------------------------------------------------------------------

/// Runs one session of trials, then stays in its terminal state.
pub struct TrialEngine<P, V, C>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    table: PhaseTable<P, V, C>,
    ctx: FsmContext<P, V, C>,
    state: EngineState,
    shutoff: SafetyShutoff,
}

impl<P, V, C> TrialEngine<P, V, C>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    pub fn new(
        rig: Rig<P, V>,
        clock: C,
        settings: EngineSettings,
    ) -> core::result::Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            table: states::build_phase_table(),
            ctx: FsmContext::new(rig, clock, settings),
            state: EngineState::Idle,
            shutoff: SafetyShutoff::new(),
        })
    }

    /// Share a stop flag and status board with a front end.
    pub fn with_observers(mut self, stop: StopFlag, status: Arc<StatusBoard>) -> Self {
        self.ctx.stop = stop;
        self.ctx.status = status;
        self
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.ctx.stop.clone()
    }

    pub fn status_board(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.ctx.status)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn log(&self) -> &ActivityLog {
        &self.ctx.log
    }

    pub fn rig(&self) -> &Rig<P, V> {
        &self.ctx.rig
    }

    /// Number of times the shutoff protocol has run.
    pub fn shutoff_count(&self) -> u32 {
        self.shutoff.executions()
    }

    /// Run every trial of `config` to a terminal state.
    ///
    /// `Err` only when the run never started (invalid config, spent
    /// engine); faults during the run come back as `Outcome::Errored`.
    pub fn run(&mut self, config: TrialConfig) -> Result<Outcome> {
        if self.state != EngineState::Idle {
            return Err(Error::EngineSpent);
        }
        config.validate()?;

        let Self {
            table,
            ctx,
            state,
            shutoff,
        } = self;

        let mut guard = ShutoffGuard::arm(ctx, shutoff, state);
        let result = match guard.ctx.begin(config) {
            Ok(()) => sequence(table, &mut *guard.ctx, &mut *guard.state),
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(()) => {
                info!("All {} trials completed", config.trial_count);
                Outcome::Complete
            }
            Err(e) if e.is_cancellation() => {
                warn!("Trials halted by stop request");
                Outcome::Halted
            }
            Err(e) => {
                error!("Trial run aborted: {e}");
                guard.ctx.record(LogEntry::FaultEvent { reason: e });
                Outcome::Errored(e)
            }
        };

        guard.finish(outcome);
        Ok(outcome)
    }

    /// Persist the activity log through `sink`.
    pub fn finalize(
        &self,
        sink: &mut impl SessionSink,
    ) -> core::result::Result<SessionReceipt, PersistError> {
        self.ctx.log.finalize(sink)
    }

    /// Hand the hardware and the log back after the run.
    pub fn into_parts(self) -> (Rig<P, V>, ActivityLog) {
        self.ctx.into_parts()
    }
}

/// Trials in order; Rest only between trials.
fn sequence<P, V, C>(
    table: &PhaseTable<P, V, C>,
    ctx: &mut FsmContext<P, V, C>,
    state: &mut EngineState,
) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    let trials = ctx.config.trial_count;
    for trial_index in 0..trials {
        for desc in table.iter() {
            if desc.phase == Phase::Rest && trial_index + 1 >= trials {
                continue;
            }
            ctx.check_stop()?;
            run_phase(desc, ctx, state, trial_index)?;
        }
    }
    Ok(())
}

fn run_phase<P, V, C>(
    desc: &PhaseDescriptor<P, V, C>,
    ctx: &mut FsmContext<P, V, C>,
    state: &mut EngineState,
    trial_index: u32,
) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    let started = ctx.clock.monotonic_secs();
    *state = EngineState::Running {
        trial_index,
        phase: desc.phase,
        phase_start_secs: started,
    };
    info!("Trial {}: {} ({} s)", trial_index + 1, desc.name, (desc.duration)(&ctx.config));
    ctx.trial_index = trial_index;
    ctx.phase = Some(desc.phase);
    ctx.record(LogEntry::PhaseMarker {
        phase: desc.phase,
        trial_index,
        edge: Edge::Start,
    });
    ctx.publish_status(true);

    let entered = match desc.on_enter {
        Some(enter) => enter(ctx),
        None => Ok(()),
    };
    let polled = match entered {
        Ok(()) => poll_until(desc, ctx, started),
        Err(e) => Err(e),
    };
    let exited = match desc.on_exit {
        Some(exit) => exit(ctx),
        None => Ok(()),
    };

    let actual_secs = ctx.clock.monotonic_secs() - started;
    ctx.record(LogEntry::DurationReport {
        phase: desc.phase,
        actual_secs,
    });
    ctx.record(LogEntry::PhaseMarker {
        phase: desc.phase,
        trial_index,
        edge: Edge::End,
    });

    match (polled, exited) {
        (Ok(()), exited) => exited,
        (Err(e), Ok(())) => Err(e),
        // A failed exit outranks a stop request.
        (Err(e), Err(exit_err)) if e.is_cancellation() => Err(exit_err),
        (Err(e), Err(exit_err)) => {
            error!("{} exit failed after fault: {exit_err}", desc.name);
            ctx.record(LogEntry::FaultEvent { reason: exit_err });
            Err(e)
        }
    }
}

/// Shared loop of every phase: stop check, time bound, one step.
fn poll_until<P, V, C>(
    desc: &PhaseDescriptor<P, V, C>,
    ctx: &mut FsmContext<P, V, C>,
    started: f64,
) -> Result<()>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    let limit = (desc.duration)(&ctx.config);
    loop {
        ctx.check_stop()?;
        let elapsed = ctx.clock.monotonic_secs() - started;
        if elapsed >= limit {
            return Ok(());
        }
        (desc.on_poll)(ctx, elapsed)?;
        ctx.publish_status(false);
    }
}

// ---------------------------------------------------------------------------
// Shutoff guard
// ---------------------------------------------------------------------------

/// Executes the shutoff when dropped, unless [`finish`](Self::finish) ran
/// it already.
struct ShutoffGuard<'a, P, V, C>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    ctx: &'a mut FsmContext<P, V, C>,
    shutoff: &'a mut SafetyShutoff,
    state: &'a mut EngineState,
    armed: bool,
}

impl<'a, P, V, C> ShutoffGuard<'a, P, V, C>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    fn arm(
        ctx: &'a mut FsmContext<P, V, C>,
        shutoff: &'a mut SafetyShutoff,
        state: &'a mut EngineState,
    ) -> Self {
        Self {
            ctx,
            shutoff,
            state,
            armed: true,
        }
    }

    /// Outcome marker, shutoff, final status, terminal state.
    fn finish(mut self, outcome: Outcome) {
        self.armed = false;
        self.terminate(outcome);
    }

    fn terminate(&mut self, outcome: Outcome) {
        self.ctx.record(LogEntry::Outcome(outcome));
        self.shutoff.execute(&mut *self.ctx);
        self.ctx.publish_final(outcome.run_state());
        *self.state = outcome.into();
    }
}

impl<P, V, C> Drop for ShutoffGuard<'_, P, V, C>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    fn drop(&mut self) {
        if self.armed {
            // A handler or collaborator panicked mid-run.
            error!("Trial run unwound without a terminal transition");
            let reason = Error::Worker;
            self.ctx.record(LogEntry::FaultEvent { reason });
            self.terminate(Outcome::Errored(reason));
        }
    }
}
