//! Host clock adapter.
//!
//! Monotonic time from `std::time::Instant`, wall-clock time from the
//! local timezone via `chrono`, idle waits via `thread::sleep`.

use std::time::{Duration, Instant};

use chrono::NaiveDateTime;

use crate::app::ports::ClockPort;

pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl ClockPort for SystemClock {
    fn monotonic_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn wall_clock(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn idle(&self, secs: f64) {
        if secs > 0.0 && secs.is_finite() {
            std::thread::sleep(Duration::from_secs_f64(secs));
        }
    }
}
