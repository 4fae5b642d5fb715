//! Pressure control: ramp targets and the bang-bang regulator.

pub mod ramp;
pub mod regulator;

pub use ramp::{RampScheduler, deflate_target, inflate_target};
pub use regulator::{Direction, Plant, PressureRegulator, Pump};
