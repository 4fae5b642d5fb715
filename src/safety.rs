//! Safety shutoff.
//!
//! Runs on every terminal transition of a run (complete, halted, errored,
//! or a handler unwinding) and leaves the cuff vented with both pumps off.
//!
//! ## Protocol
//!
//! 1. Log a `ShutoffEvent`.
//! 2. Force the inflation pump low.
//! 3. Force the deflation pump low.
//! 4. Force the valve low (vent open).
//! 5. Release the exclusively held pin and ADC handles.
//!
//! Every write is issued even if the line is already low.  A failed write
//! is logged as a `FaultEvent` and the remaining steps still run; the
//! run's own fault reason is never replaced.  Calling it again repeats the
//! same steps and reaches the same end state.

use embedded_hal::digital::OutputPin;
use log::{error, warn};

use crate::activity::LogEntry;
use crate::app::ports::{ClockPort, VoltagePort};
use crate::drivers::Line;
use crate::fsm::context::FsmContext;

/// Shutoff executor.  Counts its executions for diagnostics.
#[derive(Debug, Default)]
pub struct SafetyShutoff {
    executions: u32,
}

impl SafetyShutoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute<P, V, C>(&mut self, ctx: &mut FsmContext<P, V, C>)
    where
        P: OutputPin,
        V: VoltagePort,
        C: ClockPort,
    {
        self.executions = self.executions.saturating_add(1);
        warn!("Emergency shutoff: de-energizing all actuators");
        ctx.record(LogEntry::ShutoffEvent);

        for line in Line::ALL {
            if let Err(reason) = ctx.force_off(line) {
                error!("Shutoff: {line:?} could not be forced off: {reason}");
                ctx.record(LogEntry::FaultEvent { reason });
            }
        }

        ctx.rig.release_handles();
    }

    pub fn executions(&self) -> u32 {
        self.executions
    }
}
