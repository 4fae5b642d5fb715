//! Linear pressure ramps for the inflate and deflate phases.
//!
//! The slope is the floor of the exact quotient `peak / duration` in mmHg per
//! second, so the ramp is a staircase in the slope, not in time.  A peak
//! smaller than the duration yields a zero slope: the inflate target stays
//! at 0 and the deflate target stays at the peak.
//!
//! Both functions take the phase-relative elapsed time; neither samples a
//! clock.

use crate::config::TrialConfig;

/// Integer-quotient slope in mmHg/s.
///
/// Floors the exact quotient, not the rounded one: `10 / 0.2` rounds to
/// 50.0 but the exact value is just under 50, so the slope is 49.
pub fn ramp_slope(peak: f64, duration: f64) -> f64 {
    floor_div(peak, duration)
}

/// Float floor division that stays consistent with `%`.
fn floor_div(x: f64, y: f64) -> f64 {
    let rem = x % y;
    let mut div = (x - rem) / y;
    if rem != 0.0 && (y < 0.0) != (rem < 0.0) {
        div -= 1.0;
    }
    if div == 0.0 {
        return 0.0_f64.copysign(x / y);
    }
    let mut q = div.floor();
    if div - q > 0.5 {
        q += 1.0;
    }
    q
}

/// Target pressure `elapsed` seconds into an inflate phase of `duration`.
pub fn inflate_target(peak: f64, elapsed: f64, duration: f64) -> f64 {
    ramp_slope(peak, duration) * elapsed
}

/// Target pressure `elapsed` seconds into a deflate phase of `duration`.
pub fn deflate_target(peak: f64, elapsed: f64, duration: f64) -> f64 {
    peak - ramp_slope(peak, duration) * elapsed
}

/// Ramp parameters of one session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampScheduler {
    peak: f64,
    inflate_time: f64,
    deflate_time: f64,
}

impl RampScheduler {
    pub fn new(config: &TrialConfig) -> Self {
        Self {
            peak: config.target_pressure,
            inflate_time: config.inflate_time,
            deflate_time: config.deflate_time,
        }
    }

    pub fn inflate_at(&self, elapsed: f64) -> f64 {
        inflate_target(self.peak, elapsed, self.inflate_time)
    }

    pub fn deflate_at(&self, elapsed: f64) -> f64 {
        deflate_target(self.peak, elapsed, self.deflate_time)
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }
}
