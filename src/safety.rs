//! Unconditional output scrubbing.
//!
//! Runs on every sample of every block after the wet/dry mix, whichever
//! synthesis path produced it: non-finite values become silence, amplitude
//! is hard-clamped, and denormal-range values are flushed to exact zero so
//! they cannot stall the FPU on long silent tails.

use crate::core::types::{DENORMAL_THRESHOLD, OUTPUT_AMPLITUDE_LIMIT};

/// Scrubs one sample: non-finite to 0, clamp to the safe amplitude range,
/// flush denormal-range values to exact zero.
#[inline]
pub fn scrub(sample: f32) -> f32 {
    if !sample.is_finite() {
        return 0.0;
    }
    let clamped = sample.clamp(-OUTPUT_AMPLITUDE_LIMIT, OUTPUT_AMPLITUDE_LIMIT);
    if clamped.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        clamped
    }
}

/// Scrubs a block in place.
#[inline]
pub fn scrub_block(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        *sample = scrub(*sample);
    }
}
