//! Fuzz target: session configuration from the front end
//!
//! Decodes arbitrary bytes as a JSON `TrialConfig`, validates it, and runs
//! short valid sessions on the simulated cuff.  Checks that:
//! - Decoding and validation never panic
//! - A rejected config never touches an output line
//! - Every accepted run ends with all lines low, pumps never overlapping,
//!   and exactly one shutoff
//!
//! cargo fuzz run fuzz_session_config

#![no_main]

use cuffctl::activity::LogEntry;
use cuffctl::adapters::SimulatedCuff;
use cuffctl::config::{EngineSettings, TrialConfig};
use cuffctl::fsm::TrialEngine;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = serde_json::from_slice::<TrialConfig>(data) else {
        return;
    };

    let cuff = SimulatedCuff::new();
    let settings = EngineSettings {
        regulation_timeout_secs: Some(5.0),
        ..EngineSettings::default()
    };
    let Ok(mut engine) = TrialEngine::new(cuff.rig(), cuff.clock(), settings) else {
        return;
    };

    if config.validate().is_err() {
        assert!(engine.run(config).is_err());
        assert_eq!(cuff.write_count(), 0);
        return;
    }

    // Keep each input to a few simulated seconds.
    if config.trial_count > 4 || config.total_time() > 5.0 || config.target_pressure > 400.0 {
        return;
    }

    let outcome = engine.run(config);
    assert!(outcome.is_ok(), "valid config rejected: {outcome:?}");
    assert!(!cuff.any_energized());
    assert!(!cuff.pumps_overlapped());
    assert_eq!(
        engine.log().count(|e| matches!(e, LogEntry::ShutoffEvent)),
        1
    );
});
