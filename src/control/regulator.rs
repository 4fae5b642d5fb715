//! Bang-bang pressure regulator.
//!
//! One pump drives the cuff toward the target while the opposing pump is
//! held off.  There is no hysteresis band: the driving pump runs until the
//! first reading at or past the target, then it is forced off.
//!
//! ```text
//!   raise_to(t):  read ── p < t ──▶ deflation off, inflation on ──┐
//!                   ▲                                             │
//!                   └─────────────────────────────────────────────┘
//!                 p ≥ t ──▶ inflation off
//! ```
//!
//! The regulator owns no hardware.  It acts on a [`Plant`], which the
//! trial engine's context implements over the real actuators and sensor.

use log::{debug, warn};

use crate::activity::{Edge, LogEntry};
use crate::error::{RegulationFault, Result};

/// Which way the regulator pushes the pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Raise,
    Lower,
}

impl Direction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Raise => "Raise",
            Self::Lower => "Lower",
        }
    }

    /// Pump that moves pressure this way.
    pub const fn pump(self) -> Pump {
        match self {
            Self::Raise => Pump::Inflation,
            Self::Lower => Pump::Deflation,
        }
    }

    /// True while `pressure` has not yet reached `target`.
    pub fn short_of(self, pressure: f64, target: f64) -> bool {
        match self {
            Self::Raise => pressure < target,
            Self::Lower => pressure > target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    Inflation,
    Deflation,
}

impl Pump {
    pub const fn opposite(self) -> Self {
        match self {
            Self::Inflation => Self::Deflation,
            Self::Deflation => Self::Inflation,
        }
    }
}

/// What the regulator needs from the rig.
pub trait Plant {
    /// One logged sensor read, in mmHg.
    fn read_pressure(&mut self) -> Result<f64>;
    /// Command a pump.  Logs the transition on success.
    fn set_pump(&mut self, pump: Pump, on: bool) -> Result<()>;
    fn pump_energized(&self, pump: Pump) -> bool;
    /// Monotonic seconds.
    fn now_secs(&self) -> f64;
    /// `Err(Cancelled)` once a stop was requested.
    fn poll_stop(&self) -> Result<()>;
    /// Append a regulator entry to the activity log.
    fn note(&mut self, entry: LogEntry);
}

/// Stateless between calls; safe to copy into the engine context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureRegulator {
    timeout_secs: Option<f64>,
}

impl PressureRegulator {
    pub fn new(timeout_secs: Option<f64>) -> Self {
        Self { timeout_secs }
    }

    /// Run the inflation pump until the cuff reads at least `target`.
    pub fn raise_to(&self, plant: &mut impl Plant, target: f64) -> Result<()> {
        self.drive(plant, Direction::Raise, target)
    }

    /// Run the deflation pump until the cuff reads at most `target`.
    pub fn lower_to(&self, plant: &mut impl Plant, target: f64) -> Result<()> {
        self.drive(plant, Direction::Lower, target)
    }

    fn drive(&self, plant: &mut impl Plant, direction: Direction, target: f64) -> Result<()> {
        plant.note(LogEntry::RegulatorMarker {
            direction,
            target,
            edge: Edge::Start,
        });

        let tracked = self.track(plant, direction, target);

        // Always end with the driving pump off.
        let stopped = plant.set_pump(direction.pump(), false);
        plant.note(LogEntry::RegulatorMarker {
            direction,
            target,
            edge: Edge::End,
        });

        match (tracked, stopped) {
            (Ok(()), stopped) => stopped,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(stop_err)) if e.is_cancellation() => Err(stop_err),
            (Err(e), Err(stop_err)) => {
                plant.note(LogEntry::FaultEvent { reason: stop_err });
                Err(e)
            }
        }
    }

    fn track(&self, plant: &mut impl Plant, direction: Direction, target: f64) -> Result<()> {
        let started = plant.now_secs();
        let pump = direction.pump();
        let opposing = pump.opposite();

        loop {
            plant.poll_stop()?;

            let pressure = plant.read_pressure()?;
            if !direction.short_of(pressure, target) {
                debug!(
                    "regulator: {} reached {pressure:.2} (target {target:.2})",
                    direction.label()
                );
                return Ok(());
            }

            if let Some(limit) = self.timeout_secs {
                if plant.now_secs() - started > limit {
                    warn!(
                        "regulator: {} stuck at {pressure:.2} mmHg after {limit} s (target {target:.2})",
                        direction.label()
                    );
                    return Err(RegulationFault::Timeout(direction).into());
                }
            }

            if plant.pump_energized(opposing) {
                plant.set_pump(opposing, false)?;
            }
            if !plant.pump_energized(pump) {
                plant.set_pump(pump, true)?;
            }
        }
    }
}
