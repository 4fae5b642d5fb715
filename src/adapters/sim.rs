//! Simulated cuff for host-side runs.
//!
//! A single shared [`CuffModel`] integrates cuff pressure under the three
//! output lines on a virtual clock.  The handles it hands out implement the
//! same traits as real hardware:
//!
//! | Handle     | Implements                 |
//! |------------|----------------------------|
//! | `SimPin`   | `embedded_hal` `OutputPin` |
//! | `SimAdc`   | `VoltagePort`              |
//! | `SimClock` | `ClockPort`                |
//!
//! Virtual time advances 1 ms per clock query, 2 ms per ADC conversion and
//! by the requested amount per idle wait.  A paced cuff also sleeps for
//! real during idle waits, so a front end can watch and stop it.
//!
//! Failure injection (`fail_reads_after`, `fail_writes_on`) exercises the
//! engine's fault paths.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};

use crate::app::events::StopFlag;
use crate::app::ports::{ClockPort, VoltagePort};
use crate::config::SensorCalibration;
use crate::drivers::Line;
use crate::error::SensorError;
use crate::fsm::context::Rig;
use crate::pins;

const CLOCK_QUERY_SECS: f64 = 0.001;
const CONVERSION_SECS: f64 = 0.002;

/// Physical constants of the simulated cuff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CuffDynamics {
    /// Inflation pump rate (mmHg/s).
    pub inflate_rate: f64,
    /// Deflation pump rate (mmHg/s).
    pub deflate_rate: f64,
    /// Fractional decay per second with the vent open.
    pub vent_decay: f64,
    /// Constant leak with the valve sealed (mmHg/s).
    pub sealed_leak: f64,
}

impl Default for CuffDynamics {
    fn default() -> Self {
        Self {
            inflate_rate: 300.0,
            deflate_rate: 300.0,
            vent_decay: 0.5,
            sealed_leak: 0.5,
        }
    }
}

#[derive(Debug)]
struct CuffModel {
    dynamics: CuffDynamics,
    pressure: f64,
    now: f64,
    lines: [bool; 3],
    writes: u64,
    reads: u64,
    fail_reads_after: Option<u64>,
    failing_pins: Vec<u8>,
    stop_after_reads: Option<(StopFlag, u64)>,
    pumps_overlapped: bool,
    adc_releases: u32,
}

impl CuffModel {
    fn advance(&mut self, dt: f64) {
        let [inflation, deflation, sealed] = self.lines;
        let d = &self.dynamics;
        let mut p = self.pressure;
        if inflation {
            p += d.inflate_rate * dt;
        }
        if deflation {
            p -= d.deflate_rate * dt;
        }
        if sealed {
            p -= d.sealed_leak * dt;
        } else {
            p -= d.vent_decay * p * dt;
        }
        self.pressure = p.max(0.0);
        self.now += dt;
    }
}

fn line_index(line: Line) -> usize {
    match line {
        Line::InflationPump => 0,
        Line::DeflationPump => 1,
        Line::Valve => 2,
    }
}

type Shared = Arc<Mutex<CuffModel>>;

fn lock(model: &Shared) -> MutexGuard<'_, CuffModel> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the model; hands out hardware handles.
#[derive(Clone)]
pub struct SimulatedCuff {
    model: Shared,
    calibration: SensorCalibration,
    origin: NaiveDateTime,
    paced: bool,
}

impl Default for SimulatedCuff {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCuff {
    pub fn new() -> Self {
        Self::with_dynamics(CuffDynamics::default())
    }

    pub fn with_dynamics(dynamics: CuffDynamics) -> Self {
        Self {
            model: Arc::new(Mutex::new(CuffModel {
                dynamics,
                pressure: 0.0,
                now: 0.0,
                lines: [false; 3],
                writes: 0,
                reads: 0,
                fail_reads_after: None,
                failing_pins: Vec::new(),
                stop_after_reads: None,
                pumps_overlapped: false,
                adc_releases: 0,
            })),
            calibration: SensorCalibration::default(),
            origin: chrono::Local::now().naive_local(),
            paced: false,
        }
    }

    /// Idle waits also sleep for real.
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    /// A rig wired to this cuff with the board's pin assignments.
    pub fn rig(&self) -> Rig<SimPin, SimAdc> {
        Rig::new(
            self.pin(Line::InflationPump),
            self.pin(Line::DeflationPump),
            self.pin(Line::Valve),
            SimAdc {
                model: Arc::clone(&self.model),
                calibration: self.calibration,
            },
            self.calibration,
        )
    }

    pub fn clock(&self) -> SimClock {
        SimClock {
            model: Arc::clone(&self.model),
            origin: self.origin,
            paced: self.paced,
        }
    }

    fn pin(&self, line: Line) -> SimPin {
        let id = match line {
            Line::InflationPump => pins::INFLATION_PUMP_GPIO,
            Line::DeflationPump => pins::DEFLATION_PUMP_GPIO,
            Line::Valve => pins::VENT_VALVE_GPIO,
        };
        SimPin {
            model: Arc::clone(&self.model),
            line,
            id,
        }
    }

    // ── Failure injection ─────────────────────────────────────

    /// Every ADC read after the first `n` fails.
    pub fn fail_reads_after(&self, n: u64) {
        lock(&self.model).fail_reads_after = Some(n);
    }

    /// Every write to GPIO `pin` fails from now on.
    pub fn fail_writes_on(&self, pin: u8) {
        lock(&self.model).failing_pins.push(pin);
    }

    /// Raise `flag` on the `n`-th ADC read.
    pub fn request_stop_after_reads(&self, flag: StopFlag, n: u64) {
        lock(&self.model).stop_after_reads = Some((flag, n));
    }

    // ── Observation ───────────────────────────────────────────

    pub fn pressure(&self) -> f64 {
        lock(&self.model).pressure
    }

    pub fn set_pressure(&self, mmhg: f64) {
        lock(&self.model).pressure = mmhg.max(0.0);
    }

    /// Virtual seconds since construction.
    pub fn now(&self) -> f64 {
        lock(&self.model).now
    }

    pub fn line_level(&self, line: Line) -> bool {
        lock(&self.model).lines[line_index(line)]
    }

    pub fn any_energized(&self) -> bool {
        lock(&self.model).lines.iter().any(|&l| l)
    }

    /// Successful and failed pin writes.
    pub fn write_count(&self) -> u64 {
        lock(&self.model).writes
    }

    pub fn read_count(&self) -> u64 {
        lock(&self.model).reads
    }

    /// True if both pump lines were ever high at the same time.
    pub fn pumps_overlapped(&self) -> bool {
        lock(&self.model).pumps_overlapped
    }

    pub fn adc_releases(&self) -> u32 {
        lock(&self.model).adc_releases
    }
}

// ───────────────────────────────────────────────────────────────
// Output pin
// ───────────────────────────────────────────────────────────────

/// Injected write failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPinError;

impl embedded_hal::digital::Error for SimPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

pub struct SimPin {
    model: Shared,
    line: Line,
    id: u8,
}

impl SimPin {
    fn drive(&mut self, level: bool) -> Result<(), SimPinError> {
        let mut m = lock(&self.model);
        m.writes += 1;
        if m.failing_pins.contains(&self.id) {
            return Err(SimPinError);
        }
        m.lines[line_index(self.line)] = level;
        if m.lines[0] && m.lines[1] {
            m.pumps_overlapped = true;
        }
        Ok(())
    }
}

impl ErrorType for SimPin {
    type Error = SimPinError;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), SimPinError> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), SimPinError> {
        self.drive(true)
    }
}

// ───────────────────────────────────────────────────────────────
// ADC
// ───────────────────────────────────────────────────────────────

pub struct SimAdc {
    model: Shared,
    calibration: SensorCalibration,
}

impl VoltagePort for SimAdc {
    fn read_voltage(&mut self, channel: u8) -> Result<f64, SensorError> {
        let mut m = lock(&self.model);
        m.advance(CONVERSION_SECS);
        m.reads += 1;
        let reads = m.reads;

        if let Some((flag, n)) = &m.stop_after_reads {
            if reads >= *n {
                flag.request_stop();
            }
        }
        if m.fail_reads_after.is_some_and(|n| reads > n) {
            return Err(SensorError::AdcReadFailed { channel });
        }
        Ok(self.calibration.to_volts(m.pressure))
    }

    fn release(&mut self) {
        lock(&self.model).adc_releases += 1;
    }
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

pub struct SimClock {
    model: Shared,
    origin: NaiveDateTime,
    paced: bool,
}

impl ClockPort for SimClock {
    fn monotonic_secs(&self) -> f64 {
        let mut m = lock(&self.model);
        m.advance(CLOCK_QUERY_SECS);
        m.now
    }

    fn wall_clock(&self) -> NaiveDateTime {
        let now = lock(&self.model).now;
        self.origin + TimeDelta::microseconds((now * 1e6) as i64)
    }

    fn idle(&self, secs: f64) {
        if !(secs > 0.0 && secs.is_finite()) {
            return;
        }
        lock(&self.model).advance(secs);
        if self.paced {
            std::thread::sleep(Duration::from_secs_f64(secs));
        }
    }
}
