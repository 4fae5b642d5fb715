//! Cuff pressure transducer behind an external ADC.
//!
//! Converts the raw channel voltage to mmHg with a fixed linear
//! calibration (see [`SensorCalibration`]).  Every read, successful or not,
//! is a synchronous blocking conversion; a successful read is appended to
//! the activity log before it is returned.

use chrono::NaiveDateTime;
use log::{debug, error};

use crate::activity::{ActivityLog, LogEntry, LogRecord};
use crate::app::ports::VoltagePort;
use crate::config::SensorCalibration;
use crate::error::SensorError;

/// One calibrated reading.  Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSample {
    pub timestamp: NaiveDateTime,
    pub raw_voltage: f64,
    pub pressure_mmhg: f64,
}

pub struct PressureSensor<V> {
    adc: V,
    channel: u8,
    calibration: SensorCalibration,
    last: Option<PressureSample>,
}

impl<V: VoltagePort> PressureSensor<V> {
    pub fn new(adc: V, channel: u8, calibration: SensorCalibration) -> Self {
        Self {
            adc,
            channel,
            calibration,
            last: None,
        }
    }

    /// Read once, log the sample, return it.  No retries.
    pub fn read(
        &mut self,
        at: NaiveDateTime,
        log: &mut ActivityLog,
    ) -> Result<PressureSample, SensorError> {
        let raw_voltage = self.adc.read_voltage(self.channel)?;
        if !raw_voltage.is_finite() {
            error!("pressure: channel {} returned {raw_voltage}", self.channel);
            return Err(SensorError::NonFinite {
                channel: self.channel,
            });
        }

        let sample = PressureSample {
            timestamp: at,
            raw_voltage,
            pressure_mmhg: self.calibration.to_mmhg(raw_voltage),
        };
        debug!(
            "pressure: {:.6} V -> {:.2} mmHg",
            sample.raw_voltage, sample.pressure_mmhg
        );

        log.append(LogRecord::new(
            at,
            LogEntry::Sample {
                pressure: sample.pressure_mmhg,
                voltage: sample.raw_voltage,
            },
        ));
        self.last = Some(sample);
        Ok(sample)
    }

    pub fn last_sample(&self) -> Option<PressureSample> {
        self.last
    }

    pub fn calibration(&self) -> SensorCalibration {
        self.calibration
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Hand the ADC handle back to the bus.  Idempotent.
    pub fn release(&mut self) {
        self.adc.release();
    }

    pub fn into_port(self) -> V {
        self.adc
    }
}
