//! Shared mutable context threaded through every phase handler.
//!
//! `FsmContext` is the one struct the handlers read from and write to: the
//! rig (actuators + sensor), the clock, the activity log, the session
//! configuration and the channels to the front end.  Only the worker
//! running the engine ever holds it.

use std::sync::Arc;

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::activity::{ActivityLog, LogEntry, LogRecord};
use crate::app::events::{RunState, StatusBoard, StatusSnapshot, StopFlag};
use crate::app::ports::{ClockPort, VoltagePort};
use crate::config::{EngineSettings, SensorCalibration, TrialConfig};
use crate::control::ramp::RampScheduler;
use crate::control::regulator::{Plant, PressureRegulator, Pump};
use crate::drivers::{Actuator, Line};
use crate::error::{Error, RegulationFault, Result};
use crate::pins;
use crate::sensors::PressureSensor;

use super::Phase;

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

/// All hardware the engine drives, owned exclusively for the run.
pub struct Rig<P, V> {
    pub inflation: Actuator<P>,
    pub deflation: Actuator<P>,
    pub valve: Actuator<P>,
    pub sensor: PressureSensor<V>,
}

impl<P: OutputPin, V: VoltagePort> Rig<P, V> {
    /// Wire the three output lines and the ADC to their board assignments.
    pub fn new(
        inflation: P,
        deflation: P,
        valve: P,
        adc: V,
        calibration: SensorCalibration,
    ) -> Self {
        Self {
            inflation: Actuator::new(
                inflation,
                pins::INFLATION_PUMP_GPIO,
                pins::INFLATION_PUMP_NAME,
            ),
            deflation: Actuator::new(
                deflation,
                pins::DEFLATION_PUMP_GPIO,
                pins::DEFLATION_PUMP_NAME,
            ),
            valve: Actuator::new(valve, pins::VENT_VALVE_GPIO, pins::VENT_VALVE_NAME),
            sensor: PressureSensor::new(adc, pins::PRESSURE_ADC_CHANNEL, calibration),
        }
    }

    pub fn actuator(&self, line: Line) -> &Actuator<P> {
        match line {
            Line::InflationPump => &self.inflation,
            Line::DeflationPump => &self.deflation,
            Line::Valve => &self.valve,
        }
    }

    pub fn actuator_mut(&mut self, line: Line) -> &mut Actuator<P> {
        match line {
            Line::InflationPump => &mut self.inflation,
            Line::DeflationPump => &mut self.deflation,
            Line::Valve => &mut self.valve,
        }
    }

    /// True if any line is commanded on.
    pub fn any_energized(&self) -> bool {
        Line::ALL.iter().any(|&l| self.actuator(l).state())
    }

    /// Give up the exclusively held handles.  Idempotent.
    pub fn release_handles(&mut self) {
        for line in Line::ALL {
            self.actuator_mut(line).release();
        }
        self.sensor.release();
    }

    /// Raw pins (inflation, deflation, valve) and the ADC port.
    pub fn into_parts(self) -> (P, P, P, V) {
        (
            self.inflation.into_pin(),
            self.deflation.into_pin(),
            self.valve.into_pin(),
            self.sensor.into_port(),
        )
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext<P, V, C> {
    // -- Hardware --
    pub rig: Rig<P, V>,
    pub clock: C,

    // -- Record --
    pub log: ActivityLog,

    // -- Front-end channels --
    pub stop: StopFlag,
    pub status: Arc<StatusBoard>,

    // -- Session --
    pub config: TrialConfig,
    pub settings: EngineSettings,
    pub ramp: RampScheduler,
    pub regulator: PressureRegulator,

    // -- Progress --
    /// Monotonic seconds at run start.
    pub run_start: f64,
    pub trial_index: u32,
    pub phase: Option<Phase>,
    pub last_pressure: f64,
    last_publish: Option<f64>,
}

impl<P, V, C> FsmContext<P, V, C>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    pub fn new(rig: Rig<P, V>, clock: C, settings: EngineSettings) -> Self {
        let config = TrialConfig::default();
        Self {
            rig,
            clock,
            log: ActivityLog::new(),
            stop: StopFlag::new(),
            status: Arc::new(StatusBoard::new()),
            config,
            ramp: RampScheduler::new(&config),
            regulator: PressureRegulator::new(settings.regulation_timeout_secs),
            settings,
            run_start: 0.0,
            trial_index: 0,
            phase: None,
            last_pressure: 0.0,
            last_publish: None,
        }
    }

    /// Adopt the session config, echo it, seal the cuff.
    pub fn begin(&mut self, config: TrialConfig) -> Result<()> {
        self.config = config;
        self.ramp = RampScheduler::new(&config);
        self.run_start = self.clock.monotonic_secs();

        info!(
            "Starting {} trial(s) to {} mmHg, {:.1} s total",
            config.trial_count,
            config.target_pressure,
            config.total_time()
        );
        for (field, value) in config.echo_fields() {
            self.record(LogEntry::ConfigEcho { field, value });
        }

        if self.settings.seal_valve {
            self.command(Line::Valve, true)?;
        }
        Ok(())
    }

    /// Timestamp and append.
    pub fn record(&mut self, entry: LogEntry) {
        let at = self.clock.wall_clock();
        self.log.append(LogRecord::new(at, entry));
    }

    /// One logged sensor read.
    pub fn sample(&mut self) -> Result<f64> {
        let at = self.clock.wall_clock();
        let sample = self.rig.sensor.read(at, &mut self.log)?;
        self.last_pressure = sample.pressure_mmhg;
        Ok(sample.pressure_mmhg)
    }

    /// Drive one line, refusing to energize both pumps at once.
    pub fn command(&mut self, line: Line, on: bool) -> Result<()> {
        if on {
            let opposing = match line {
                Line::InflationPump => Some(Line::DeflationPump),
                Line::DeflationPump => Some(Line::InflationPump),
                Line::Valve => None,
            };
            if let Some(other) = opposing {
                if self.rig.actuator(other).state() {
                    return Err(RegulationFault::Interlock.into());
                }
            }
        }
        let entry = self.rig.actuator_mut(line).set_state(on)?;
        self.record(entry);
        Ok(())
    }

    /// Write the line low regardless of its commanded state.
    pub fn force_off(&mut self, line: Line) -> Result<()> {
        self.command(line, false)
    }

    pub fn check_stop(&self) -> Result<()> {
        if self.stop.is_stop_requested() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Block for the configured Hold/Rest idle wait.
    pub fn idle(&self) {
        self.clock.idle(self.settings.idle_wait_secs);
    }

    /// Publish progress, rate-limited unless `force`.
    pub fn publish_status(&mut self, force: bool) {
        let now = self.clock.monotonic_secs();
        if !force {
            if let Some(last) = self.last_publish {
                if now - last < self.settings.status_interval_secs {
                    return;
                }
            }
        }
        self.last_publish = Some(now);
        let label = self.phase.map_or("Ready", Phase::label);
        self.status.publish(StatusSnapshot::new(
            self.last_pressure,
            now - self.run_start,
            label,
            self.trial_index + 1,
            RunState::Running,
        ));
    }

    /// Terminal status, always published.
    pub fn publish_final(&mut self, state: RunState) {
        let now = self.clock.monotonic_secs();
        self.last_publish = Some(now);
        self.status.publish(StatusSnapshot::new(
            self.last_pressure,
            now - self.run_start,
            state.label(),
            self.trial_index + 1,
            state,
        ));
    }

    pub fn into_parts(self) -> (Rig<P, V>, ActivityLog) {
        (self.rig, self.log)
    }
}

fn pump_line(pump: Pump) -> Line {
    match pump {
        Pump::Inflation => Line::InflationPump,
        Pump::Deflation => Line::DeflationPump,
    }
}

impl<P, V, C> Plant for FsmContext<P, V, C>
where
    P: OutputPin,
    V: VoltagePort,
    C: ClockPort,
{
    fn read_pressure(&mut self) -> Result<f64> {
        self.sample()
    }

    fn set_pump(&mut self, pump: Pump, on: bool) -> Result<()> {
        self.command(pump_line(pump), on)
    }

    fn pump_energized(&self, pump: Pump) -> bool {
        self.rig.actuator(pump_line(pump)).state()
    }

    fn now_secs(&self) -> f64 {
        self.clock.monotonic_secs()
    }

    fn poll_stop(&self) -> Result<()> {
        let stopped = self.check_stop();
        if stopped.is_err() {
            warn!("Stop requested while regulating");
        }
        stopped
    }

    fn note(&mut self, entry: LogEntry) {
        self.record(entry);
    }
}
