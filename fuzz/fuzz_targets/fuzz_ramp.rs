//! Fuzz target: pressure ramps
//!
//! Feeds arbitrary peak/duration/elapsed triples through the ramp
//! functions.  For finite, positive inputs within the phase:
//! - The inflate target never exceeds the peak
//! - The deflate target never drops below zero
//!
//! cargo fuzz run fuzz_ramp

#![no_main]

use cuffctl::control::{deflate_target, inflate_target};
use libfuzzer_sys::fuzz_target;

fn f64_at(data: &[u8], offset: usize) -> Option<f64> {
    data.get(offset..offset + 8)
        .and_then(|s| s.try_into().ok())
        .map(f64::from_le_bytes)
}

fuzz_target!(|data: &[u8]| {
    let (Some(peak), Some(duration), Some(elapsed)) =
        (f64_at(data, 0), f64_at(data, 8), f64_at(data, 16))
    else {
        return;
    };

    // Never panics, whatever the input.
    let up = inflate_target(peak, elapsed, duration);
    let down = deflate_target(peak, elapsed, duration);

    let sane = |v: f64| v.is_finite() && v > 0.0 && v < 1e9;
    if !(sane(peak) && sane(duration) && elapsed.is_finite() && (0.0..=duration).contains(&elapsed)) {
        return;
    }

    // Relative slack for floating-point rounding in slope * elapsed.
    let slack = peak * 1e-9;
    assert!(up >= 0.0 && up <= peak + slack, "inflate {up} outside [0, {peak}]");
    assert!(down >= -slack && down <= peak, "deflate {down} outside [0, {peak}]");
});
