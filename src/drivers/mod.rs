//! Actuator drivers.

pub mod actuator;

pub use actuator::{Actuator, ActuatorState};

/// The three output lines of the cuff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    InflationPump,
    DeflationPump,
    Valve,
}

impl Line {
    /// Shutoff order: pumps first, then vent.
    pub const ALL: [Line; 3] = [Line::InflationPump, Line::DeflationPump, Line::Valve];
}
