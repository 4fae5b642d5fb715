//! Sensor subsystem.
//!
//! A single calibrated pressure transducer read through an external ADC.

pub mod pressure;

pub use pressure::{PressureSample, PressureSensor};
