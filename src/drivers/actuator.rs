//! Binary on/off actuator over one digital output line.
//!
//! Used for both pumps and the vent valve.  HIGH = energized.
//!
//! ## Ownership
//!
//! The actuator owns its `OutputPin` for the engine's lifetime; nothing
//! else may drive the line.  [`release`](Actuator::release) marks the
//! handle as given up during shutoff, [`into_pin`](Actuator::into_pin)
//! hands it back once the run is over.
//!
//! A failed write is reported, never retried, and leaves the commanded
//! state untouched.

use embedded_hal::digital::{Error as _, OutputPin};
use log::{error, trace};

use crate::activity::LogEntry;
use crate::error::ActuatorError;

/// Externally visible state of an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorState {
    pub id: u8,
    pub name: &'static str,
    pub energized: bool,
}

pub struct Actuator<P> {
    pin: P,
    id: u8,
    name: &'static str,
    energized: bool,
    released: bool,
}

impl<P: OutputPin> Actuator<P> {
    /// Wrap `pin`.  The line is assumed low (de-energized) at hand-over.
    pub fn new(pin: P, id: u8, name: &'static str) -> Self {
        Self {
            pin,
            id,
            name,
            energized: false,
            released: false,
        }
    }

    /// Drive the line and return the transition entry for the log.
    pub fn set_state(&mut self, on: bool) -> Result<LogEntry, ActuatorError> {
        let written = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };

        if let Err(e) = written {
            error!(
                "{}: GPIO {} write {} failed ({:?})",
                self.name,
                self.id,
                if on { "HIGH" } else { "LOW" },
                e.kind()
            );
            return Err(ActuatorError::WriteFailed { pin: self.id });
        }

        trace!("{}: {}", self.name, if on { "on" } else { "off" });
        self.energized = on;
        Ok(LogEntry::ActuatorTransition {
            name: self.name,
            pin: self.id,
            energized: on,
        })
    }

    /// Commanded state.
    pub fn state(&self) -> bool {
        self.energized
    }

    pub fn snapshot(&self) -> ActuatorState {
        ActuatorState {
            id: self.id,
            name: self.name,
            energized: self.energized,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn release(&mut self) {
        self.released = true;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn into_pin(self) -> P {
        self.pin
    }
}
