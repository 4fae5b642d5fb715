//! Mock hardware bench for integration tests.
//!
//! Records every pin write so tests can assert on the full command history
//! without a real GPIO header.  Pressure follows the pumps in fixed steps
//! per ADC read; the clock advances a fixed step per query.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use cuffctl::app::events::StopFlag;
use cuffctl::app::ports::{ClockPort, VoltagePort};
use cuffctl::config::SensorCalibration;
use cuffctl::error::SensorError;
use cuffctl::fsm::context::Rig;
use cuffctl::pins;
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

/// mmHg moved per ADC read while a pump runs.
pub const PUMP_STEP: f64 = 5.0;
/// Seconds per clock query.
pub const CLOCK_STEP: f64 = 0.005;

// ── Pin write record ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinWrite {
    pub pin: u8,
    pub high: bool,
}

#[derive(Default)]
struct Bench {
    inflation: bool,
    deflation: bool,
    valve: bool,
    writes: Vec<PinWrite>,
    pressure: f64,
    now: f64,
    reads: u64,
    pumps_stuck: bool,
    fail_pin: Option<u8>,
    fail_reads_after: Option<u64>,
    stop_after_reads: Option<(StopFlag, u64)>,
    adc_releases: u32,
}

// ── MockBench ─────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockBench(Arc<Mutex<Bench>>);

#[allow(dead_code)]
impl MockBench {
    pub fn new() -> Self {
        Self::default()
    }

    fn bench(&self) -> MutexGuard<'_, Bench> {
        self.0.lock().unwrap()
    }

    pub fn rig(&self) -> Rig<MockPin, MockAdc> {
        let pin = |id| MockPin {
            bench: self.clone(),
            pin: id,
        };
        Rig::new(
            pin(pins::INFLATION_PUMP_GPIO),
            pin(pins::DEFLATION_PUMP_GPIO),
            pin(pins::VENT_VALVE_GPIO),
            MockAdc {
                bench: self.clone(),
                calibration: SensorCalibration::default(),
            },
            SensorCalibration::default(),
        )
    }

    pub fn clock(&self) -> MockClock {
        MockClock {
            bench: self.clone(),
        }
    }

    /// Pumps run but pressure never moves.
    pub fn stick_pumps(&self) {
        self.bench().pumps_stuck = true;
    }

    pub fn fail_writes_on(&self, pin: u8) {
        self.bench().fail_pin = Some(pin);
    }

    pub fn fail_reads_after(&self, n: u64) {
        self.bench().fail_reads_after = Some(n);
    }

    pub fn stop_after_reads(&self, flag: StopFlag, n: u64) {
        self.bench().stop_after_reads = Some((flag, n));
    }

    pub fn writes(&self) -> Vec<PinWrite> {
        self.bench().writes.clone()
    }

    pub fn level(&self, pin: u8) -> bool {
        let b = self.bench();
        match pin {
            pins::INFLATION_PUMP_GPIO => b.inflation,
            pins::DEFLATION_PUMP_GPIO => b.deflation,
            pins::VENT_VALVE_GPIO => b.valve,
            _ => false,
        }
    }

    pub fn all_low(&self) -> bool {
        let b = self.bench();
        !(b.inflation || b.deflation || b.valve)
    }

    pub fn pressure(&self) -> f64 {
        self.bench().pressure
    }

    pub fn adc_releases(&self) -> u32 {
        self.bench().adc_releases
    }

    /// Replays the write history and reports whether both pumps were ever
    /// high together.
    pub fn pumps_ever_overlapped(&self) -> bool {
        let (mut inflation, mut deflation) = (false, false);
        for w in self.writes() {
            match w.pin {
                pins::INFLATION_PUMP_GPIO => inflation = w.high,
                pins::DEFLATION_PUMP_GPIO => deflation = w.high,
                _ => {}
            }
            if inflation && deflation {
                return true;
            }
        }
        false
    }
}

// ── MockPin ───────────────────────────────────────────────────

#[derive(Debug)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct MockPin {
    bench: MockBench,
    pin: u8,
}

impl MockPin {
    fn write(&mut self, high: bool) -> Result<(), MockPinError> {
        let mut b = self.bench.bench();
        if b.fail_pin == Some(self.pin) {
            return Err(MockPinError);
        }
        b.writes.push(PinWrite {
            pin: self.pin,
            high,
        });
        match self.pin {
            pins::INFLATION_PUMP_GPIO => b.inflation = high,
            pins::DEFLATION_PUMP_GPIO => b.deflation = high,
            _ => b.valve = high,
        }
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = MockPinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), MockPinError> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), MockPinError> {
        self.write(true)
    }
}

// ── MockAdc ───────────────────────────────────────────────────

pub struct MockAdc {
    bench: MockBench,
    calibration: SensorCalibration,
}

impl VoltagePort for MockAdc {
    fn read_voltage(&mut self, channel: u8) -> Result<f64, SensorError> {
        let mut b = self.bench.bench();
        b.reads += 1;
        let reads = b.reads;
        if let Some((flag, n)) = &b.stop_after_reads {
            if reads >= *n {
                flag.request_stop();
            }
        }
        if b.fail_reads_after.is_some_and(|n| reads > n) {
            return Err(SensorError::AdcReadFailed { channel });
        }
        if !b.pumps_stuck {
            if b.inflation {
                b.pressure += PUMP_STEP;
            }
            if b.deflation {
                b.pressure = (b.pressure - PUMP_STEP).max(0.0);
            }
        }
        Ok(self.calibration.to_volts(b.pressure))
    }

    fn release(&mut self) {
        self.bench.bench().adc_releases += 1;
    }
}

// ── MockClock ─────────────────────────────────────────────────

pub struct MockClock {
    bench: MockBench,
}

impl ClockPort for MockClock {
    fn monotonic_secs(&self) -> f64 {
        let mut b = self.bench.bench();
        b.now += CLOCK_STEP;
        b.now
    }

    fn wall_clock(&self) -> NaiveDateTime {
        let now = self.bench.bench().now;
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + TimeDelta::microseconds((now * 1e6) as i64)
    }

    fn idle(&self, secs: f64) {
        self.bench.bench().now += secs.max(0.0);
    }
}
