//! Trial and engine configuration.
//!
//! Settings arrive programmatically from the front end, or as a JSON
//! [`SessionPlan`].  Nothing is read from the environment.  A
//! [`TrialConfig`] is immutable once a run starts.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Parameters for one session of trials, as entered by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Number of inflate/hold/deflate cycles.
    pub trial_count: u32,
    /// Peak cuff pressure (mmHg).
    pub target_pressure: f64,
    /// Ramp-up duration (seconds).
    pub inflate_time: f64,
    /// Time spent at the target pressure (seconds).
    pub hold_time: f64,
    /// Ramp-down duration (seconds).
    pub deflate_time: f64,
    /// Pause between consecutive trials (seconds).  Not applied after the last.
    pub rest_time: f64,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            trial_count: 3,
            target_pressure: 250.0,
            inflate_time: 2.0,
            hold_time: 5.0,
            deflate_time: 2.0,
            rest_time: 10.0,
        }
    }
}

impl TrialConfig {
    /// Total session duration (seconds).  Derived, never stored.
    pub fn total_time(&self) -> f64 {
        let trials = f64::from(self.trial_count);
        let rests = f64::from(self.trial_count.saturating_sub(1));
        trials * (self.inflate_time + self.hold_time + self.deflate_time) + self.rest_time * rests
    }

    /// Reject non-positive durations/pressure, a zero trial count, or
    /// non-finite values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(v: f64) -> bool {
            v.is_finite() && v > 0.0
        }

        if self.trial_count < 1 {
            return Err(ConfigError::TrialCount);
        }
        if !positive(self.target_pressure) {
            return Err(ConfigError::TargetPressure);
        }
        if !positive(self.inflate_time) {
            return Err(ConfigError::InflateTime);
        }
        if !positive(self.hold_time) {
            return Err(ConfigError::HoldTime);
        }
        if !positive(self.deflate_time) {
            return Err(ConfigError::DeflateTime);
        }
        if !(self.rest_time.is_finite() && self.rest_time >= 0.0) {
            return Err(ConfigError::RestTime);
        }
        Ok(())
    }

    /// Field/value pairs echoed into the activity log at run start.
    pub fn echo_fields(&self) -> [(&'static str, String); 6] {
        [
            ("Number of Trials", self.trial_count.to_string()),
            ("Target Pressure", self.target_pressure.to_string()),
            ("Desired inflate time", self.inflate_time.to_string()),
            ("Desired hold time", self.hold_time.to_string()),
            ("Desired deflate time", self.deflate_time.to_string()),
            ("Time between Trials", self.rest_time.to_string()),
        ]
    }
}

/// Fixed calibration of the pressure transducer + op-amp chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorCalibration {
    /// Op-amp bias added to the raw reading (volts).
    pub offset_volts: f64,
    /// Conversion factor (mmHg per volt).
    pub scale_mmhg_per_volt: f64,
}

impl Default for SensorCalibration {
    fn default() -> Self {
        // Transducer outputs 0.1067 mV per mmHg → 1 / 0.1067e-3 ≈ 9372 mmHg/V.
        Self {
            offset_volts: 0.0042,
            scale_mmhg_per_volt: 9372.0,
        }
    }
}

impl SensorCalibration {
    /// Build from a datasheet sensitivity in mV/mmHg.
    pub fn from_sensitivity(mv_per_mmhg: f64, offset_volts: f64) -> Self {
        Self {
            offset_volts,
            scale_mmhg_per_volt: 1000.0 / mv_per_mmhg,
        }
    }

    /// Raw ADC voltage → calibrated pressure.
    pub fn to_mmhg(&self, volts: f64) -> f64 {
        (volts + self.offset_volts) * self.scale_mmhg_per_volt
    }

    /// Inverse of [`to_mmhg`](Self::to_mmhg).
    pub fn to_volts(&self, mmhg: f64) -> f64 {
        mmhg / self.scale_mmhg_per_volt - self.offset_volts
    }
}

/// Tunables of the engine itself, independent of any one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Energize (close) the valve at run start so the cuff holds pressure.
    pub seal_valve: bool,
    /// Idle wait inserted per Hold/Rest poll (seconds, 0 = pure busy-poll).
    pub idle_wait_secs: f64,
    /// Minimum spacing between status publications (seconds).
    pub status_interval_secs: f64,
    /// Upper bound on one raise/lower call; `None` disables the check.
    pub regulation_timeout_secs: Option<f64>,
    /// Prefix of the session log file name.
    pub log_source_tag: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seal_valve: true,
            idle_wait_secs: 0.01,
            status_interval_secs: 0.1,
            regulation_timeout_secs: Some(30.0),
            log_source_tag: "Log".into(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.idle_wait_secs.is_finite() && self.idle_wait_secs >= 0.0) {
            return Err(ConfigError::Settings("idle_wait_secs"));
        }
        if !(self.status_interval_secs.is_finite() && self.status_interval_secs >= 0.0) {
            return Err(ConfigError::Settings("status_interval_secs"));
        }
        if let Some(t) = self.regulation_timeout_secs {
            if !(t.is_finite() && t > 0.0) {
                return Err(ConfigError::Settings("regulation_timeout_secs"));
            }
        }
        if self.log_source_tag.is_empty() {
            return Err(ConfigError::Settings("log_source_tag"));
        }
        Ok(())
    }
}

/// A saved session: trial parameters plus engine tunables.
///
/// Missing sections or fields fall back to their defaults, so `{}` is a
/// valid plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPlan {
    pub trial: TrialConfig,
    pub engine: EngineSettings,
}

impl SessionPlan {
    /// Parse a JSON plan.  Ranges are not checked here; the engine and
    /// service validate on use.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Both halves in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.trial.validate()
    }
}
