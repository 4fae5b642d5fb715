//! GPIO / ADC assignments for the cuff controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Numbers are Broadcom (BCM) GPIO ids; the engine
//! only uses them as labels, the line itself is whatever `OutputPin` the
//! caller hands over.

// ---------------------------------------------------------------------------
// Pumps
// ---------------------------------------------------------------------------

/// Digital output: HIGH = inflation pump running.
pub const INFLATION_PUMP_GPIO: u8 = 13;
/// Digital output: HIGH = deflation pump running.
pub const DEFLATION_PUMP_GPIO: u8 = 12;

// ---------------------------------------------------------------------------
// Valve
// ---------------------------------------------------------------------------

/// Digital output: HIGH = valve energized (closed), LOW = vent open.
pub const VENT_VALVE_GPIO: u8 = 27;

// ---------------------------------------------------------------------------
// Sensor (ADS1115 over I2C)
// ---------------------------------------------------------------------------

/// ADS1115 single-ended input P0.
pub const PRESSURE_ADC_CHANNEL: u8 = 0;

// ---------------------------------------------------------------------------
// Names used in the activity log
// ---------------------------------------------------------------------------

pub const INFLATION_PUMP_NAME: &str = "inflation_pump";
pub const DEFLATION_PUMP_NAME: &str = "deflation_pump";
pub const VENT_VALVE_NAME: &str = "valve";
pub const PRESSURE_SENSOR_NAME: &str = "pressure_sensor";
