//! Streaming phase-vocoder pitch shifting with identity phase locking.
//!
//! The spectral path consumes one sample per tick and runs a full
//! analysis/synthesis hop every `hop_size` samples: the newest `fft_size`
//! samples of input history are windowed and transformed, each bin's true
//! frequency is recovered from the phase increment, bins are relocated by
//! the pitch ratio, and the frame is resynthesized into a wrapping
//! overlap-add accumulator that the per-sample side drains. Squared-Hann
//! overlap at the mode's hop makes the round trip unity gain, so the path
//! delays the signal by exactly `fft_size` samples at a ratio of 1.
//!
//! Everything is sized at construction; ticks and hops never allocate.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;

use crate::core::history::HistoryBuffer;
use crate::core::types::QualityMode;
use crate::core::window::{cola_weight, hann_window};
use crate::shift::envelope::{apply_formant_shift, cepstral_order, extract_envelope};

const TWO_PI: f32 = 2.0 * PI;

/// A bin must exceed both neighbours by this magnitude ratio to anchor
/// phase locking as a spectral peak.
const PEAK_NEIGHBOR_RATIO: f32 = 1.1;

/// Sentinel for bins with no peak on the scanned side.
const NO_PEAK: usize = usize::MAX;

/// Per-bin phase state, reset as one unit when the path restarts.
struct PhaseState {
    /// Analysis phase of the previous frame.
    last: Vec<f32>,
    /// Accumulated synthesis phase, wrapped to [-PI, PI] each hop.
    accum: Vec<f32>,
}

impl PhaseState {
    fn new(num_bins: usize) -> Self {
        Self {
            last: vec![0.0; num_bins],
            accum: vec![0.0; num_bins],
        }
    }

    fn clear(&mut self) {
        self.last.fill(0.0);
        self.accum.fill(0.0);
    }
}

/// Phase-vocoder pitch shifter over a shared input history.
pub struct SpectralShifter {
    fft_size: usize,
    hop_size: usize,
    num_bins: usize,
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
    /// Folds the inverse-FFT 1/N and the squared-window overlap weight.
    output_scale: f32,
    cepstral_order: usize,
    phase: PhaseState,
    hop_counter: usize,
    /// Windowed analysis frame, reused as the in-place FFT buffer.
    spectrum: Vec<Complex<f32>>,
    frame: Vec<f32>,
    analysis_mag: Vec<f32>,
    analysis_phase: Vec<f32>,
    /// True bin frequencies in radians per hop.
    analysis_freq: Vec<f32>,
    shifted_mag: Vec<f32>,
    shifted_phase: Vec<f32>,
    envelope: Vec<f32>,
    cepstrum: Vec<Complex<f32>>,
    is_peak: Vec<bool>,
    peak_bin: Vec<usize>,
    output_accum: Vec<f32>,
    output_read: usize,
    output_write: usize,
}

impl SpectralShifter {
    /// Builds a shifter for one quality mode. All FFT planning and buffer
    /// allocation happens here.
    pub fn new(mode: QualityMode) -> Self {
        let fft_size = mode.fft_size();
        let hop_size = mode.hop_size();
        let num_bins = fft_size / 2 + 1;

        let mut planner = FftPlanner::new();
        let fft_forward = planner.plan_fft_forward(fft_size);
        let fft_inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = fft_forward
            .get_inplace_scratch_len()
            .max(fft_inverse.get_inplace_scratch_len());

        let window = hann_window(fft_size);
        let output_scale = 1.0 / (fft_size as f32 * cola_weight(&window, hop_size));

        Self {
            fft_size,
            hop_size,
            num_bins,
            fft_forward,
            fft_inverse,
            fft_scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            window,
            output_scale,
            cepstral_order: cepstral_order(fft_size),
            phase: PhaseState::new(num_bins),
            hop_counter: 0,
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            frame: vec![0.0; fft_size],
            analysis_mag: vec![0.0; num_bins],
            analysis_phase: vec![0.0; num_bins],
            analysis_freq: vec![0.0; num_bins],
            shifted_mag: vec![0.0; num_bins],
            shifted_phase: vec![0.0; num_bins],
            envelope: vec![1.0; num_bins],
            cepstrum: vec![Complex::new(0.0, 0.0); fft_size],
            is_peak: vec![false; num_bins],
            peak_bin: vec![0; num_bins],
            output_accum: vec![0.0; fft_size * 2],
            output_read: 0,
            output_write: hop_size,
        }
    }

    /// Returns the FFT size.
    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Returns the hop size.
    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Delay the path imposes on its input, in samples.
    #[inline]
    pub fn latency_samples(&self) -> usize {
        self.fft_size
    }

    /// Clears all phase and overlap-add state so the next tick starts from
    /// silence, without touching any allocation.
    pub fn reset(&mut self) {
        self.phase.clear();
        self.hop_counter = 0;
        self.output_accum.fill(0.0);
        self.output_read = 0;
        self.output_write = self.hop_size;
    }

    /// Advances the path by one sample. `history` must already contain the
    /// current input sample; the returned value trails it by
    /// [`latency_samples`](Self::latency_samples).
    pub fn tick(
        &mut self,
        history: &HistoryBuffer,
        pitch_ratio: f32,
        formant_ratio: f32,
    ) -> f32 {
        self.hop_counter += 1;
        if self.hop_counter >= self.hop_size {
            self.hop_counter = 0;
            self.process_hop(history, pitch_ratio, formant_ratio);
        }

        let out = self.output_accum[self.output_read];
        self.output_accum[self.output_read] = 0.0;
        self.output_read = (self.output_read + 1) % self.output_accum.len();
        out
    }

    fn process_hop(&mut self, history: &HistoryBuffer, pitch_ratio: f32, formant_ratio: f32) {
        debug_assert!(pitch_ratio > 0.0 && formant_ratio > 0.0);
        let expected_step = TWO_PI * self.hop_size as f32 / self.fft_size as f32;

        // Analysis: newest fft_size samples, windowed, in-place FFT.
        history.copy_latest(&mut self.frame);
        for ((slot, &sample), &win) in self
            .spectrum
            .iter_mut()
            .zip(self.frame.iter())
            .zip(self.window.iter())
        {
            *slot = Complex::new(sample * win, 0.0);
        }
        self.fft_forward
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

        for bin in 0..self.num_bins {
            let c = self.spectrum[bin];
            let phase = c.im.atan2(c.re);
            let deviation = wrap_phase(phase - self.phase.last[bin] - bin as f32 * expected_step);
            self.phase.last[bin] = phase;

            self.analysis_mag[bin] = c.norm();
            self.analysis_phase[bin] = phase;
            self.analysis_freq[bin] = bin as f32 * expected_step + deviation;
        }

        let shift_formants = (formant_ratio - 1.0).abs() > 1e-3;
        if shift_formants {
            extract_envelope(
                &self.analysis_mag,
                self.cepstral_order,
                &self.fft_forward,
                &self.fft_inverse,
                &mut self.fft_scratch,
                &mut self.cepstrum,
                &mut self.envelope,
            );
        }

        // Relocate bins by the pitch ratio, interpolating between source
        // bins and advancing each target bin's phase by its shifted
        // frequency.
        self.shifted_mag.fill(0.0);
        self.shifted_phase.fill(0.0);
        for target in 0..self.num_bins {
            let source = target as f32 / pitch_ratio;
            let src = source as usize;
            if src + 1 >= self.num_bins {
                continue;
            }
            let frac = source - src as f32;

            let mag = self.analysis_mag[src]
                + (self.analysis_mag[src + 1] - self.analysis_mag[src]) * frac;
            let freq = (self.analysis_freq[src]
                + (self.analysis_freq[src + 1] - self.analysis_freq[src]) * frac)
                * pitch_ratio;

            self.phase.accum[target] = wrap_phase(self.phase.accum[target] + freq);
            self.shifted_mag[target] = mag;
            self.shifted_phase[target] = self.phase.accum[target];
        }

        // Relocation drops energy at the spectrum edges and smears it across
        // interpolated bins; rescale so the frame keeps its input energy.
        let input_energy: f64 = self.analysis_mag.iter().map(|&m| (m * m) as f64).sum();
        let output_energy: f64 = self.shifted_mag.iter().map(|&m| (m * m) as f64).sum();
        if output_energy > 1e-20 {
            let gain = (input_energy / output_energy).sqrt() as f32;
            for mag in &mut self.shifted_mag {
                *mag *= gain;
            }
        }

        if shift_formants {
            apply_formant_shift(
                &mut self.shifted_mag,
                &self.envelope,
                pitch_ratio,
                formant_ratio,
            );
        }

        self.lock_phases_to_peaks(pitch_ratio);

        // Rebuild the spectrum: positive bins from polar form, real DC and
        // Nyquist, conjugate mirror for the negative half.
        for bin in 0..self.num_bins {
            self.spectrum[bin] =
                Complex::from_polar(self.shifted_mag[bin], self.shifted_phase[bin]);
        }
        self.spectrum[0].im = 0.0;
        self.spectrum[self.num_bins - 1].im = 0.0;
        for bin in 1..self.num_bins - 1 {
            self.spectrum[self.fft_size - bin] = self.spectrum[bin].conj();
        }

        self.fft_inverse
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

        let accum_len = self.output_accum.len();
        for i in 0..self.fft_size {
            let pos = (self.output_write + i) % accum_len;
            self.output_accum[pos] += self.spectrum[i].re * self.window[i] * self.output_scale;
        }
        self.output_write = (self.output_write + self.hop_size) % accum_len;
    }

    /// Identity phase locking: non-peak bins take their nearest peak's
    /// synthesis phase plus the phase offset they had from that peak in the
    /// analysis frame. This keeps each partial's sidelobes coherent and
    /// removes the diffuse quality of a plain per-bin vocoder.
    fn lock_phases_to_peaks(&mut self, pitch_ratio: f32) {
        let num_bins = self.num_bins;
        if num_bins < 3 {
            return;
        }

        // A bin only counts as a peak when it exceeds both neighbours by a
        // fixed magnitude ratio; near-flat regions (noise floors, sidelobe
        // plateaus) then carry no peaks and keep their own phase evolution
        // instead of being dragged onto an arbitrary ripple maximum.
        self.is_peak[0] = self.shifted_mag[0] > self.shifted_mag[1] * PEAK_NEIGHBOR_RATIO;
        self.is_peak[num_bins - 1] =
            self.shifted_mag[num_bins - 1] > self.shifted_mag[num_bins - 2] * PEAK_NEIGHBOR_RATIO;
        for bin in 1..num_bins - 1 {
            self.is_peak[bin] = self.shifted_mag[bin]
                > self.shifted_mag[bin - 1] * PEAK_NEIGHBOR_RATIO
                && self.shifted_mag[bin] > self.shifted_mag[bin + 1] * PEAK_NEIGHBOR_RATIO;
        }

        // Two sweeps give every bin its nearest peak without a search.
        let mut last_peak = NO_PEAK;
        for bin in 0..num_bins {
            if self.is_peak[bin] {
                last_peak = bin;
            }
            self.peak_bin[bin] = last_peak;
        }
        last_peak = NO_PEAK;
        for bin in (0..num_bins).rev() {
            if self.is_peak[bin] {
                last_peak = bin;
            }
            if last_peak != NO_PEAK {
                let left = self.peak_bin[bin];
                if left == NO_PEAK || last_peak - bin < bin - left {
                    self.peak_bin[bin] = last_peak;
                }
            }
        }

        for bin in 0..num_bins {
            let peak = self.peak_bin[bin];
            if peak == NO_PEAK || peak == bin {
                continue;
            }
            let src_bin = ((bin as f32 / pitch_ratio) as usize).min(num_bins - 1);
            let src_peak = ((peak as f32 / pitch_ratio) as usize).min(num_bins - 1);
            let offset = self.analysis_phase[src_bin] - self.analysis_phase[src_peak];
            self.shifted_phase[bin] = self.shifted_phase[peak] + offset;
        }
    }
}

/// Wraps a phase value to [-PI, PI].
#[inline]
fn wrap_phase(phase: f32) -> f32 {
    let p = phase + PI;
    p - (p / TWO_PI).floor() * TWO_PI - PI
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (TWO_PI * freq * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    /// Streams `input` through the shifter one sample at a time.
    fn run(shifter: &mut SpectralShifter, input: &[f32], ratio: f32, formant: f32) -> Vec<f32> {
        let mut history = HistoryBuffer::with_capacity(shifter.fft_size() * 2);
        input
            .iter()
            .map(|&x| {
                history.push(x);
                shifter.tick(&history, ratio, formant)
            })
            .collect()
    }

    fn rms(signal: &[f32]) -> f32 {
        (signal.iter().map(|&x| x * x).sum::<f32>() / signal.len() as f32).sqrt()
    }

    /// Dominant frequency from positive-going zero crossings.
    fn measured_freq(signal: &[f32]) -> f32 {
        let mut crossings = 0;
        for pair in signal.windows(2) {
            if pair[0] <= 0.0 && pair[1] > 0.0 {
                crossings += 1;
            }
        }
        crossings as f32 * SAMPLE_RATE / signal.len() as f32
    }

    #[test]
    fn test_wrap_phase() {
        assert!((wrap_phase(0.0)).abs() < 1e-6);
        assert!((wrap_phase(PI + 0.1) - (-PI + 0.1)).abs() < 1e-5);
        assert!((wrap_phase(-PI - 0.1) - (PI - 0.1)).abs() < 1e-5);
        assert!((wrap_phase(10.0 * PI + 0.5) - wrap_phase(0.5)).abs() < 1e-4);
    }

    #[test]
    fn test_unity_ratio_preserves_tone() {
        let mut shifter = SpectralShifter::new(QualityMode::Standard);
        let input = sine(440.0, shifter.fft_size() * 8);
        let output = run(&mut shifter, &input, 1.0, 1.0);

        // Skip the priming delay plus one frame of overlap build-up.
        let tail = &output[shifter.fft_size() * 3..];
        let freq = measured_freq(tail);
        assert!(
            (freq - 440.0).abs() < 440.0 * 0.03,
            "expected ~440 Hz, measured {} Hz",
            freq
        );
        let input_rms = rms(&input);
        let output_rms = rms(tail);
        assert!(
            (output_rms - input_rms).abs() < input_rms * 0.25,
            "RMS drifted: input {} output {}",
            input_rms,
            output_rms
        );
    }

    #[test]
    fn test_upshift_moves_frequency() {
        let mut shifter = SpectralShifter::new(QualityMode::Standard);
        let input = sine(440.0, shifter.fft_size() * 8);
        let output = run(&mut shifter, &input, 1.5, 1.0);

        let tail = &output[shifter.fft_size() * 3..];
        let freq = measured_freq(tail);
        assert!(
            (freq - 660.0).abs() < 660.0 * 0.05,
            "expected ~660 Hz, measured {} Hz",
            freq
        );
    }

    #[test]
    fn test_downshift_moves_frequency() {
        let mut shifter = SpectralShifter::new(QualityMode::Standard);
        let input = sine(440.0, shifter.fft_size() * 8);
        let output = run(&mut shifter, &input, 0.5, 1.0);

        let tail = &output[shifter.fft_size() * 3..];
        let freq = measured_freq(tail);
        assert!(
            (freq - 220.0).abs() < 220.0 * 0.05,
            "expected ~220 Hz, measured {} Hz",
            freq
        );
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut shifter = SpectralShifter::new(QualityMode::Live);
        let input = vec![0.0f32; shifter.fft_size() * 4];
        let output = run(&mut shifter, &input, 1.3, 1.0);
        assert!(
            output.iter().all(|&y| y == 0.0),
            "silence produced non-zero output"
        );
    }

    #[test]
    fn test_formant_shift_keeps_signal_bounded() {
        let mut shifter = SpectralShifter::new(QualityMode::Standard);
        let len = shifter.fft_size() * 8;
        let input: Vec<f32> = sine(220.0, len)
            .iter()
            .zip(sine(660.0, len).iter())
            .map(|(&a, &b)| 0.5 * a + 0.25 * b)
            .collect();
        let output = run(&mut shifter, &input, 1.0, 1.5);

        let tail = &output[shifter.fft_size() * 3..];
        assert!(tail.iter().all(|y| y.is_finite()));
        let input_rms = rms(&input);
        let output_rms = rms(tail);
        assert!(
            output_rms > input_rms * 0.2 && output_rms < input_rms * 4.0,
            "formant shift changed level implausibly: input {} output {}",
            input_rms,
            output_rms
        );
    }

    #[test]
    fn test_reset_restores_determinism() {
        let mut shifter = SpectralShifter::new(QualityMode::Live);
        let input = sine(330.0, shifter.fft_size() * 4);

        let first = run(&mut shifter, &input, 1.2, 1.0);
        shifter.reset();
        let second = run(&mut shifter, &input, 1.2, 1.0);

        assert_eq!(
            first, second,
            "identical input after reset must reproduce identical output"
        );
    }

    #[test]
    fn test_phase_locking_ignores_flat_spectra() {
        let mut shifter = SpectralShifter::new(QualityMode::Live);
        let bins = shifter.num_bins;
        // A flat magnitude floor has no bin clearing the neighbour ratio,
        // so every bin keeps its own phase.
        shifter.shifted_mag[..bins].fill(0.5);
        for (bin, phase) in shifter.shifted_phase[..bins].iter_mut().enumerate() {
            *phase = bin as f32 * 0.01;
        }
        let before = shifter.shifted_phase.clone();
        shifter.lock_phases_to_peaks(1.0);
        assert_eq!(shifter.shifted_phase, before);
    }

    #[test]
    fn test_phase_locking_requires_clear_peak() {
        let mut shifter = SpectralShifter::new(QualityMode::Live);
        let bins = shifter.num_bins;
        shifter.shifted_mag[..bins].fill(0.1);
        // A bump barely above its neighbours stays below the ratio and must
        // not anchor anything.
        shifter.shifted_mag[50] = 0.105;
        // A genuine partial towers over its neighbours.
        shifter.shifted_mag[200] = 5.0;
        for (bin, phase) in shifter.shifted_phase[..bins].iter_mut().enumerate() {
            *phase = bin as f32 * 0.01;
        }
        shifter.analysis_phase[..bins].fill(0.0);

        shifter.lock_phases_to_peaks(1.0);

        assert!(!shifter.is_peak[50], "sub-threshold bump treated as a peak");
        assert!(shifter.is_peak[200]);
        let locked = shifter.shifted_phase[200];
        for bin in [198, 199, 201, 202] {
            assert_eq!(
                shifter.shifted_phase[bin], locked,
                "bin {} should follow the peak at 200",
                bin
            );
        }
    }

    #[test]
    fn test_path_latency_reports_fft_size() {
        for mode in QualityMode::ALL {
            let shifter = SpectralShifter::new(mode);
            assert_eq!(shifter.latency_samples(), mode.fft_size());
        }
    }
}
