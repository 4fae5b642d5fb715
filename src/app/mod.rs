//! Application layer around the trial engine.
//!
//! Port traits for the outside world live in [`ports`]; the channels the
//! front end uses to watch and stop a run are in [`events`]; [`service`]
//! runs an engine on its background worker.

pub mod events;
pub mod ports;
pub mod service;
