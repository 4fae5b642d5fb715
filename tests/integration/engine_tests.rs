//! Integration tests for the trial engine against the mock bench.
//!
//! Cover the full run sequence, cancellation, fault handling and the
//! shutoff guarantees as seen from the pins.

use std::sync::Arc;

use cuffctl::activity::{ActivityLog, Edge, LogEntry};
use cuffctl::app::events::{RunState, StatusBoard, StopFlag};
use cuffctl::config::{EngineSettings, TrialConfig};
use cuffctl::control::Direction;
use cuffctl::error::{ActuatorError, ConfigError, Error, RegulationFault, SensorError};
use cuffctl::fsm::{EngineState, Outcome, Phase, TrialEngine};
use cuffctl::pins;

use super::mock_hw::{MockAdc, MockBench, MockClock, MockPin, PinWrite};

type Engine = TrialEngine<MockPin, MockAdc, MockClock>;

fn config(trials: u32) -> TrialConfig {
    TrialConfig {
        trial_count: trials,
        target_pressure: 100.0,
        inflate_time: 0.5,
        hold_time: 0.2,
        deflate_time: 0.5,
        rest_time: 0.3,
    }
}

fn engine(bench: &MockBench) -> Engine {
    TrialEngine::new(bench.rig(), bench.clock(), EngineSettings::default()).unwrap()
}

/// Phase edges, duration reports, outcome and shutoff, in log order.
fn skeleton(log: &ActivityLog) -> Vec<String> {
    log.entries()
        .filter_map(|e| match e {
            LogEntry::ConfigEcho { .. } => Some("config".to_string()),
            LogEntry::PhaseMarker { phase, edge, .. } => {
                Some(format!("{} {}", phase.label(), edge.label()))
            }
            LogEntry::DurationReport { phase, .. } => Some(format!("duration {}", phase.label())),
            LogEntry::Outcome(o) => Some(o.summary().to_string()),
            LogEntry::ShutoffEvent => Some("shutoff".to_string()),
            LogEntry::FaultEvent { .. } => Some("fault".to_string()),
            _ => None,
        })
        .collect()
}

fn count(log: &ActivityLog, pred: impl Fn(&LogEntry) -> bool) -> usize {
    log.count(pred)
}

fn entered(log: &ActivityLog, wanted: Phase) -> bool {
    log.entries().any(|e| {
        matches!(
            e,
            LogEntry::PhaseMarker { phase, edge: Edge::Start, .. } if *phase == wanted
        )
    })
}

// ── Completed run ─────────────────────────────────────────────

#[test]
fn single_trial_log_follows_phase_order() {
    let bench = MockBench::new();
    let mut engine = engine(&bench);

    assert_eq!(engine.run(config(1)).unwrap(), Outcome::Complete);
    assert_eq!(engine.state(), EngineState::Complete);

    let mut expected = vec!["config".to_string(); 6];
    expected.extend(
        [
            "Inflate Start",
            "duration Inflate",
            "Inflate End",
            "Hold Start",
            "duration Hold",
            "Hold End",
            "Deflate Start",
            "duration Deflate",
            "Deflate End",
            "All trials completed",
            "shutoff",
        ]
        .map(String::from),
    );
    assert_eq!(skeleton(engine.log()), expected);
}

#[test]
fn completed_run_ends_vented_and_released() {
    let bench = MockBench::new();
    let mut engine = engine(&bench);
    engine.run(config(2)).unwrap();

    assert!(bench.all_low());
    assert!(!bench.pumps_ever_overlapped());
    assert!(engine.rig().valve.is_released());
    assert!(engine.rig().inflation.is_released());
    assert_eq!(bench.adc_releases(), 1);

    // The last three writes are the shutoff, in protocol order.
    let writes = bench.writes();
    assert_eq!(
        writes[writes.len() - 3..],
        [
            PinWrite {
                pin: pins::INFLATION_PUMP_GPIO,
                high: false
            },
            PinWrite {
                pin: pins::DEFLATION_PUMP_GPIO,
                high: false
            },
            PinWrite {
                pin: pins::VENT_VALVE_GPIO,
                high: false
            },
        ]
    );
}

#[test]
fn valve_is_sealed_before_first_phase() {
    let bench = MockBench::new();
    let mut engine = engine(&bench);
    engine.run(config(1)).unwrap();
    assert_eq!(
        bench.writes()[0],
        PinWrite {
            pin: pins::VENT_VALVE_GPIO,
            high: true
        }
    );
}

#[test]
fn unsealed_run_never_closes_valve() {
    let bench = MockBench::new();
    let settings = EngineSettings {
        seal_valve: false,
        ..EngineSettings::default()
    };
    let mut engine = TrialEngine::new(bench.rig(), bench.clock(), settings).unwrap();
    engine.run(config(1)).unwrap();
    assert!(
        !bench
            .writes()
            .iter()
            .any(|w| w.pin == pins::VENT_VALVE_GPIO && w.high)
    );
}

#[test]
fn inflate_reaches_target_pressure() {
    let bench = MockBench::new();
    let mut engine = engine(&bench);
    engine.run(config(1)).unwrap();

    let peak = engine
        .log()
        .entries()
        .filter_map(|e| match e {
            LogEntry::Sample { pressure, .. } => Some(*pressure),
            _ => None,
        })
        .fold(0.0_f64, f64::max);
    assert!(peak >= 90.0, "peak {peak}");
}

#[test]
fn regulator_markers_pair_up() {
    let bench = MockBench::new();
    let mut engine = engine(&bench);
    engine.run(config(1)).unwrap();

    let starts = count(engine.log(), |e| {
        matches!(e, LogEntry::RegulatorMarker { edge: Edge::Start, .. })
    });
    let ends = count(engine.log(), |e| {
        matches!(e, LogEntry::RegulatorMarker { edge: Edge::End, .. })
    });
    assert!(starts > 0);
    assert_eq!(starts, ends);
}

#[test]
fn status_board_ends_complete() {
    let bench = MockBench::new();
    let board = Arc::new(StatusBoard::new());
    let mut engine = engine(&bench).with_observers(StopFlag::new(), Arc::clone(&board));
    engine.run(config(1)).unwrap();

    let last = board.latest();
    assert_eq!(last.state, RunState::Complete);
    assert_eq!(last.phase_label.as_str(), "COMPLETE");
    assert!(board.update_count() >= 4);
}

// ── Cancellation ──────────────────────────────────────────────

#[test]
fn cancel_mid_inflate_halts_before_hold() {
    let bench = MockBench::new();
    let stop = StopFlag::new();
    bench.stop_after_reads(stop.clone(), 5);
    let board = Arc::new(StatusBoard::new());
    let mut engine = engine(&bench).with_observers(stop, Arc::clone(&board));

    let long_inflate = TrialConfig {
        inflate_time: 10.0,
        ..config(3)
    };
    assert_eq!(engine.run(long_inflate).unwrap(), Outcome::Halted);
    assert_eq!(engine.state(), EngineState::Halted);

    let log = engine.log();
    assert!(entered(log, Phase::Inflate));
    assert!(!entered(log, Phase::Hold));
    assert_eq!(count(log, |e| matches!(e, LogEntry::ShutoffEvent)), 1);
    assert_eq!(count(log, |e| matches!(e, LogEntry::FaultEvent { .. })), 0);
    assert!(count(log, |e| *e == LogEntry::Outcome(Outcome::Halted)) == 1);
    assert!(bench.all_low());
    assert_eq!(board.latest().state, RunState::Halted);
}

#[test]
fn cancelled_inflate_still_reports_duration() {
    let bench = MockBench::new();
    let stop = StopFlag::new();
    bench.stop_after_reads(stop.clone(), 3);
    let mut engine = engine(&bench).with_observers(stop, Arc::new(StatusBoard::new()));
    engine.run(config(1)).unwrap();

    let tail: Vec<_> = skeleton(engine.log()).into_iter().skip(6).collect();
    assert_eq!(
        tail,
        vec![
            "Inflate Start",
            "duration Inflate",
            "Inflate End",
            "Trials halted",
            "shutoff"
        ]
    );
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn sensor_fault_errors_with_single_shutoff() {
    let bench = MockBench::new();
    bench.fail_reads_after(10);
    let mut engine = engine(&bench);

    let reason = Error::Sensor(SensorError::AdcReadFailed {
        channel: pins::PRESSURE_ADC_CHANNEL,
    });
    assert_eq!(engine.run(config(2)).unwrap(), Outcome::Errored(reason));
    assert_eq!(engine.state(), EngineState::Errored(reason));

    let tail: Vec<_> = skeleton(engine.log()).into_iter().rev().take(3).collect();
    assert_eq!(tail, vec!["shutoff", "Trials aborted", "fault"]);
    assert_eq!(count(engine.log(), |e| matches!(e, LogEntry::ShutoffEvent)), 1);
    assert!(bench.all_low());
}

#[test]
fn deflation_write_fault_keeps_first_reason() {
    let bench = MockBench::new();
    bench.fail_writes_on(pins::DEFLATION_PUMP_GPIO);
    let mut engine = engine(&bench);

    let reason = Error::Actuator(ActuatorError::WriteFailed {
        pin: pins::DEFLATION_PUMP_GPIO,
    });
    assert_eq!(engine.run(config(1)).unwrap(), Outcome::Errored(reason));

    // At least the run's own fault and the shutoff's failed write.
    assert!(count(engine.log(), |e| *e == LogEntry::FaultEvent { reason }) >= 2);
    assert!(entered(engine.log(), Phase::Deflate));
    assert!(!bench.level(pins::INFLATION_PUMP_GPIO));
    assert!(!bench.level(pins::VENT_VALVE_GPIO));
}

#[test]
fn stuck_pump_times_out() {
    let bench = MockBench::new();
    bench.stick_pumps();
    let settings = EngineSettings {
        regulation_timeout_secs: Some(0.25),
        ..EngineSettings::default()
    };
    let mut engine = TrialEngine::new(bench.rig(), bench.clock(), settings).unwrap();

    let outcome = engine.run(config(1)).unwrap();
    assert_eq!(
        outcome,
        Outcome::Errored(Error::Regulation(RegulationFault::Timeout(
            Direction::Raise
        )))
    );
    assert!(bench.all_low());
}

// ── Rejection ─────────────────────────────────────────────────

#[test]
fn invalid_config_touches_nothing() {
    let bench = MockBench::new();
    let mut engine = engine(&bench);
    let bad = TrialConfig {
        trial_count: 0,
        ..config(1)
    };
    assert_eq!(engine.run(bad), Err(Error::Config(ConfigError::TrialCount)));
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(bench.writes().is_empty());
    assert!(engine.log().is_empty());

    // Still usable with a valid config.
    assert_eq!(engine.run(config(1)).unwrap(), Outcome::Complete);
}

#[test]
fn invalid_settings_are_rejected_at_construction() {
    let bench = MockBench::new();
    let settings = EngineSettings {
        idle_wait_secs: -1.0,
        ..EngineSettings::default()
    };
    assert!(matches!(
        TrialEngine::new(bench.rig(), bench.clock(), settings),
        Err(ConfigError::Settings("idle_wait_secs"))
    ));
}

#[test]
fn hardware_is_handed_back() {
    let bench = MockBench::new();
    let mut engine = engine(&bench);
    engine.run(config(1)).unwrap();
    let (rig, log) = engine.into_parts();
    assert!(!log.is_empty());
    assert!(!rig.any_energized());
    let (_inflation, _deflation, _valve, _adc) = rig.into_parts();
}
