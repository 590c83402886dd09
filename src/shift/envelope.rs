//! Spectral envelope extraction and formant re-colouring via real cepstrum.
//!
//! Bin shifting drags the spectral envelope along with the harmonics, which
//! reads as the familiar chipmunk or giant timbre. The formant control
//! instead places the envelope at its own ratio: the analysis envelope is
//! estimated by liftering the real cepstrum, and the shifted magnitudes are
//! re-coloured from it. All transforms run on preplanned FFT handles with
//! caller-provided scratch, so nothing here allocates after construction.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft};

use crate::core::resample::read_linear;

/// Magnitude floor guarding the log in cepstral analysis.
const LOG_FLOOR: f32 = 1e-10;

/// Bound on the per-bin gain applied while re-colouring. Steep envelope
/// slopes otherwise request extreme gains from near-silent bins.
const CORRECTION_LIMIT: f32 = 4.0;

/// Cepstral order for an FFT size: enough coefficients to follow formant
/// structure without tracking individual harmonics.
pub fn cepstral_order(fft_size: usize) -> usize {
    (fft_size / 64).clamp(10, fft_size / 4)
}

/// Estimates the spectral envelope of a magnitude spectrum.
///
/// Liftering in brief: log the magnitudes, inverse-transform to the
/// cepstrum, zero everything above `order` quefrency bins (keeping the
/// conjugate mirror), transform back and exponentiate. `cepstrum` must hold
/// the full FFT size and `envelope` one slot per bin; both are overwritten.
pub fn extract_envelope(
    magnitudes: &[f32],
    order: usize,
    fft_forward: &Arc<dyn Fft<f32>>,
    fft_inverse: &Arc<dyn Fft<f32>>,
    fft_scratch: &mut [Complex<f32>],
    cepstrum: &mut [Complex<f32>],
    envelope: &mut [f32],
) {
    let num_bins = magnitudes.len();
    let fft_size = (num_bins - 1) * 2;
    debug_assert_eq!(cepstrum.len(), fft_size);
    debug_assert_eq!(envelope.len(), num_bins);

    for (slot, &mag) in cepstrum.iter_mut().zip(magnitudes.iter()) {
        *slot = Complex::new(mag.max(LOG_FLOOR).ln(), 0.0);
    }
    for bin in 1..num_bins - 1 {
        cepstrum[fft_size - bin] = cepstrum[bin];
    }

    fft_inverse.process_with_scratch(cepstrum, fft_scratch);

    // Lifter: keep low quefrencies at both ends, folding in the inverse
    // transform's 1/N normalization as we go.
    let norm = 1.0 / fft_size as f32;
    let order = order.min(fft_size / 2);
    for (i, slot) in cepstrum.iter_mut().enumerate() {
        if i > order && i < fft_size - order {
            *slot = Complex::new(0.0, 0.0);
        } else {
            *slot *= norm;
        }
    }

    fft_forward.process_with_scratch(cepstrum, fft_scratch);

    for (slot, c) in envelope.iter_mut().zip(cepstrum.iter()) {
        *slot = c.re.exp();
    }
}

/// Re-colours bin-shifted magnitudes so the envelope lands at
/// `formant_ratio` times its original frequency position instead of
/// following the pitch ratio.
///
/// Bin `j` of the shifted spectrum carries the envelope value from source
/// position `j / pitch_ratio`; dividing that out and multiplying in the
/// value at `j / formant_ratio` moves the envelope without touching the
/// harmonic positions underneath it.
pub fn apply_formant_shift(
    magnitudes: &mut [f32],
    envelope: &[f32],
    pitch_ratio: f32,
    formant_ratio: f32,
) {
    for (j, mag) in magnitudes.iter_mut().enumerate() {
        let carried = read_linear(envelope, j as f32 / pitch_ratio).max(LOG_FLOOR);
        let target = read_linear(envelope, j as f32 / formant_ratio).max(LOG_FLOOR);
        let correction = (target / carried).clamp(1.0 / CORRECTION_LIMIT, CORRECTION_LIMIT);
        *mag *= correction;
    }
}
