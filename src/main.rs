//! Simulated cuff session.
//!
//! Runs one session of trials against the simulated cuff and writes the
//! session log as CSV to the current directory.
//!
//! ```text
//! cuffctl-sim [plan.json]
//! ```
//!
//! Without a plan file the default session and engine settings are used.
//!
//! ```text
//!  SimulatedCuff ──▶ Rig ──▶ TrialEngine ──▶ TrialService worker
//!                                               │
//!                 status every 250 ms ◀─────────┤
//!                                               ▼
//!                                     Log_<start>.csv
//! ```
//!
//! Set `RUST_LOG` to change verbosity (default `info`).

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::info;

use cuffctl::adapters::{CsvSessionStore, SimulatedCuff};
use cuffctl::app::ports::ClockPort;
use cuffctl::app::service::TrialService;
use cuffctl::config::SessionPlan;
use cuffctl::fsm::{Outcome, TrialEngine};

const STATUS_PERIOD: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let plan = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading session plan {path}"))?;
            SessionPlan::from_json(&text).with_context(|| format!("parsing session plan {path}"))?
        }
        None => SessionPlan::default(),
    };
    plan.validate()
        .map_err(cuffctl::Error::from)
        .context("session plan rejected")?;
    let SessionPlan {
        trial: config,
        engine: settings,
    } = plan;

    let cuff = SimulatedCuff::new().paced();
    let clock = cuff.clock();
    let sink = CsvSessionStore::new(".", &settings.log_source_tag, clock.wall_clock());

    let engine = TrialEngine::new(cuff.rig(), clock, settings)
        .map_err(cuffctl::Error::from)
        .context("engine settings rejected")?;
    info!(
        "Session plan: {} trial(s) to {} mmHg",
        config.trial_count, config.target_pressure
    );
    let handle = TrialService::spawn(engine, config, sink).context("session did not start")?;

    while !handle.is_finished() {
        let s = handle.status();
        info!(
            "[{}] trial {} {:<8} {:>7.1} mmHg  t={:.1}s",
            s.state.label(),
            s.trial,
            s.phase_label.as_str(),
            s.pressure_mmhg,
            s.elapsed_secs
        );
        thread::sleep(STATUS_PERIOD);
    }

    let report = handle.join().context("trial worker failed")?;
    let receipt = report.persisted.context("session log not written")?;
    info!(
        "{}: {} rows in {}",
        report.outcome.run_state().label(),
        receipt.rows_written,
        receipt
            .location
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    );

    match report.outcome {
        Outcome::Errored(reason) => bail!("session aborted: {reason}"),
        Outcome::Complete | Outcome::Halted => Ok(()),
    }
}
