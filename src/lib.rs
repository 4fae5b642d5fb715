//! Occlusion-cuff trial controller.
//!
//! Drives a pneumatic cuff through timed inflate / hold / deflate cycles
//! with closed-loop pressure feedback, records every sample and actuator
//! edge to a session log, and leaves the cuff vented on every exit path.
//!
//! Hardware enters through `embedded_hal` output pins and the port traits
//! in [`app::ports`]; [`adapters::sim`] provides a host-side cuff.

#![deny(unused_must_use)]

pub mod activity;
pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod safety;
pub mod sensors;

pub use error::{Error, Result};
