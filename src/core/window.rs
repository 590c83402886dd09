//! Window functions for spectral analysis and grain extraction.
//!
//! All windows use the periodic Hann form, so copies overlapped at an integer
//! fraction of the window length sum to an exact constant (the COLA condition
//! both synthesis paths rely on).

use std::f64::consts::PI;

/// Generates a periodic Hann window of the given size.
pub fn hann_window(size: usize) -> Vec<f32> {
    match size {
        0 => return vec![],
        1 => return vec![1.0],
        _ => {}
    }
    let n = size as f64;
    (0..size)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / n).cos()) as f32)
        .collect()
}

/// Per-sample weight contributed by squared-window overlap-add at the given
/// hop. Dividing the overlap-added signal by this restores unity gain when
/// the same window is applied at both analysis and synthesis.
pub fn cola_weight(window: &[f32], hop: usize) -> f32 {
    if hop == 0 {
        return 1.0;
    }
    let sum: f32 = window.iter().map(|&w| w * w).sum();
    (sum / hop as f32).max(f32::MIN_POSITIVE)
}
