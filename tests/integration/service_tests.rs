//! Integration tests for the session service on the simulated cuff.
//!
//! The engine runs on its own worker; these tests drive it only through
//! the handle, the way a front end would.

use std::thread;
use std::time::Duration;

use cuffctl::activity::{Edge, LogEntry};
use cuffctl::adapters::{CsvSessionStore, SimulatedCuff};
use cuffctl::app::events::RunState;
use cuffctl::app::ports::{ClockPort, MemorySink, VoltagePort};
use cuffctl::app::service::TrialService;
use cuffctl::config::{EngineSettings, SensorCalibration, TrialConfig};
use cuffctl::error::{ConfigError, Error, SensorError};
use cuffctl::fsm::context::Rig;
use cuffctl::fsm::{Outcome, Phase, TrialEngine};

fn quick() -> TrialConfig {
    TrialConfig {
        trial_count: 2,
        target_pressure: 150.0,
        inflate_time: 1.0,
        hold_time: 0.5,
        deflate_time: 1.0,
        rest_time: 0.5,
    }
}

#[test]
fn completed_session_round_trips_through_csv() {
    let dir = std::env::temp_dir().join(format!("cuffctl-svc-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let cuff = SimulatedCuff::new();
    let clock = cuff.clock();
    let store = CsvSessionStore::new(&dir, "Log", clock.wall_clock());
    let path = store.path().to_path_buf();
    let engine = TrialEngine::new(cuff.rig(), clock, EngineSettings::default()).unwrap();

    let report = TrialService::spawn(engine, quick(), store)
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(report.outcome, Outcome::Complete);
    let receipt = report.persisted.unwrap();
    assert_eq!(receipt.location.as_deref(), Some(path.as_path()));
    assert!(
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("Log_") && n.ends_with(".csv"))
    );

    let rows = report.sink.read_back().unwrap();
    assert_eq!(rows, report.log.to_rows());
    assert_eq!(rows.len(), receipt.rows_written);
    assert_eq!(rows[0], vec!["Time", "Object", "Activity", "Details"]);

    assert!(!cuff.any_energized());
    assert!(!cuff.pumps_overlapped());
    assert_eq!(cuff.adc_releases(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn operator_stop_halts_during_hold() {
    let cuff = SimulatedCuff::new().paced();
    let config = TrialConfig {
        hold_time: 3600.0,
        ..quick()
    };
    let engine = TrialEngine::new(cuff.rig(), cuff.clock(), EngineSettings::default()).unwrap();
    let handle = TrialService::spawn(engine, config, MemorySink::new()).unwrap();

    let mut in_hold = false;
    for _ in 0..2000 {
        if handle.status().phase_label.as_str() == "Hold" {
            in_hold = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(in_hold, "worker never reached Hold");
    assert!(!handle.is_finished());

    handle.request_stop();
    let board = handle.status_board();
    let report = handle.join().unwrap();

    assert_eq!(report.outcome, Outcome::Halted);
    assert_eq!(board.latest().state, RunState::Halted);
    assert!(!report.log.entries().any(|e| matches!(
        e,
        LogEntry::PhaseMarker {
            phase: Phase::Deflate,
            edge: Edge::Start,
            ..
        }
    )));
    assert_eq!(report.log.count(|e| matches!(e, LogEntry::ShutoffEvent)), 1);
    assert_eq!(report.sink.rows.len(), report.log.len() + 1);
    assert!(!cuff.any_energized());
}

#[test]
fn invalid_session_is_rejected_before_spawn() {
    let cuff = SimulatedCuff::new();
    let engine = TrialEngine::new(cuff.rig(), cuff.clock(), EngineSettings::default()).unwrap();
    let bad = TrialConfig {
        target_pressure: -5.0,
        ..quick()
    };
    let spawned = TrialService::spawn(engine, bad, MemorySink::new());
    assert!(matches!(
        spawned,
        Err(Error::Config(ConfigError::TargetPressure))
    ));
    assert_eq!(cuff.write_count(), 0);
}

#[test]
fn sensor_fault_reaches_front_end_as_error() {
    let cuff = SimulatedCuff::new();
    cuff.fail_reads_after(20);
    let engine = TrialEngine::new(cuff.rig(), cuff.clock(), EngineSettings::default()).unwrap();
    let handle = TrialService::spawn(engine, quick(), MemorySink::new()).unwrap();
    let board = handle.status_board();
    let report = handle.join().unwrap();

    assert!(matches!(report.outcome, Outcome::Errored(Error::Sensor(_))));
    assert_eq!(board.latest().state, RunState::Errored);
    assert_eq!(board.latest().phase_label.as_str(), "ERROR");
    // The log is still handed over.
    assert!(report.persisted.is_ok());
    assert!(!report.sink.rows.is_empty());
    assert!(!cuff.any_energized());
}

/// ADC driver that crashes after a few conversions.
struct CrashingAdc {
    reads: u32,
}

impl VoltagePort for CrashingAdc {
    fn read_voltage(&mut self, _channel: u8) -> Result<f64, SensorError> {
        self.reads += 1;
        if self.reads > 8 {
            panic!("ADC driver crashed");
        }
        Ok(0.0)
    }
}

#[test]
fn driver_panic_still_finalizes_log() {
    let cuff = SimulatedCuff::new();
    let (inflation, deflation, valve, _) = cuff.rig().into_parts();
    let rig = Rig::new(
        inflation,
        deflation,
        valve,
        CrashingAdc { reads: 0 },
        SensorCalibration::default(),
    );
    let engine = TrialEngine::new(rig, cuff.clock(), EngineSettings::default()).unwrap();
    let handle = TrialService::spawn(engine, quick(), MemorySink::new()).unwrap();
    let board = handle.status_board();
    let report = handle.join().unwrap();

    assert_eq!(report.outcome, Outcome::Errored(Error::Worker));
    assert_eq!(board.latest().state, RunState::Errored);
    assert!(report.persisted.is_ok());
    assert_eq!(report.sink.rows.len(), report.log.len() + 1);
    assert_eq!(report.log.count(|e| matches!(e, LogEntry::ShutoffEvent)), 1);
    assert_eq!(
        report.log.count(|e| *e == LogEntry::FaultEvent {
            reason: Error::Worker
        }),
        1
    );
    assert!(!cuff.any_energized());
}
