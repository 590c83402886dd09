//! Allocation-free fractional-read interpolators.
//!
//! The real-time paths never resample whole buffers; they read single taps at
//! fractional positions (formant-scaled grain extraction, spectral-envelope
//! shifting). These helpers keep those reads out of the hot modules.

/// 4-point Hermite interpolation between `s1` and `s2`.
///
/// `frac` is the position inside the `s1..s2` interval, in `[0, 1)`.
#[inline]
pub fn hermite(s0: f32, s1: f32, s2: f32, s3: f32, frac: f32) -> f32 {
    let c0 = s1;
    let c1 = 0.5 * (s2 - s0);
    let c2 = s0 - 2.5 * s1 + 2.0 * s2 - 0.5 * s3;
    let c3 = 0.5 * (s3 - s0) + 1.5 * (s1 - s2);
    ((c3 * frac + c2) * frac + c1) * frac + c0
}

/// Linearly interpolated read at a fractional index, clamped to the slice.
#[inline]
pub fn read_linear(data: &[f32], pos: f32) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let last = data.len() - 1;
    if pos <= 0.0 {
        return data[0];
    }
    let idx = pos as usize;
    if idx >= last {
        return data[last];
    }
    let frac = pos - idx as f32;
    data[idx] + frac * (data[idx + 1] - data[idx])
}
