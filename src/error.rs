//! Unified error types for the cuff controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! trial engine's fault boundary uniform.  All variants are `Copy` so a
//! fault reason can be stored in the engine state, the activity log and
//! the status feed without allocation.

use core::fmt;

use crate::control::regulator::Direction;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible control operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pressure sensor could not be read.
    Sensor(SensorError),
    /// A digital output line could not be driven.
    Actuator(ActuatorError),
    /// The trial or engine configuration is invalid.
    Config(ConfigError),
    /// The regulator broke one of its invariants.
    Regulation(RegulationFault),
    /// A stop was requested.  Normal terminal signal, not a failure.
    Cancelled,
    /// The engine already ran; a new run needs a fresh engine.
    EngineSpent,
    /// The worker thread could not be started or panicked.
    Worker,
}

impl Error {
    /// True for the cooperative-stop signal.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Regulation(e) => write!(f, "regulation: {e}"),
            Self::Cancelled => write!(f, "stop requested"),
            Self::EngineSpent => write!(f, "engine already ran"),
            Self::Worker => write!(f, "worker thread failed"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed { channel: u8 },
    /// The driver returned NaN or infinity.
    NonFinite { channel: u8 },
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed { channel } => write!(f, "ADC read failed on channel {channel}"),
            Self::NonFinite { channel } => write!(f, "non-finite voltage on channel {channel}"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    WriteFailed { pin: u8 },
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed { pin } => write!(f, "GPIO {pin} write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Which field of the configuration failed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    TrialCount,
    TargetPressure,
    InflateTime,
    HoldTime,
    DeflateTime,
    RestTime,
    /// An [`EngineSettings`](crate::config::EngineSettings) field is out of range.
    Settings(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrialCount => write!(f, "trial count must be at least 1"),
            Self::TargetPressure => write!(f, "target pressure must be a positive number"),
            Self::InflateTime => write!(f, "inflate time must be a positive number"),
            Self::HoldTime => write!(f, "hold time must be a positive number"),
            Self::DeflateTime => write!(f, "deflate time must be a positive number"),
            Self::RestTime => write!(f, "rest time must be zero or positive"),
            Self::Settings(field) => write!(f, "engine setting out of range: {field}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Regulation faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegulationFault {
    /// A single raise/lower call ran past the configured timeout.
    Timeout(Direction),
    /// Both pumps would have been energized at once.
    Interlock,
}

impl fmt::Display for RegulationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(dir) => write!(f, "{} did not reach target in time", dir.label()),
            Self::Interlock => write!(f, "pump interlock violated"),
        }
    }
}

impl From<RegulationFault> for Error {
    fn from(e: RegulationFault) -> Self {
        Self::Regulation(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
