//! Fundamental-period estimation for the epoch timeline.
//!
//! Difference-function method over the most recent analysis frame: squared
//! difference per lag via prefix energies plus direct autocorrelation, then
//! cumulative mean normalization, first-minimum-below-threshold acceptance
//! (the rule that avoids octave errors), and parabolic refinement for
//! sub-sample period accuracy. Lag search is strictly bounded by the 50-1000 Hz
//! range, and silence or noise deterministically comes back unvoiced.

use crate::core::types::{
    max_period_samples, min_period_samples, PITCH_WINDOW_SECS, VOICING_THRESHOLD,
};

/// Frame energy below this (scaled by window length) is treated as silence.
const SILENCE_ENERGY_PER_SAMPLE: f64 = 1.0e-14;

/// Normalized-difference ceiling for the global-minimum fallback when no lag
/// clears the primary threshold.
const FALLBACK_THRESHOLD: f32 = 0.5;

/// One period measurement over the latest analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Fundamental period in samples. Only meaningful when `voiced` is true.
    pub period: f32,
    /// Periodicity strength in [0, 1].
    pub confidence: f32,
    /// False when no reliable fundamental was found (silence, noise).
    pub voiced: bool,
}

impl PitchEstimate {
    /// The estimate produced for silence, noise, or too-short frames.
    #[inline]
    pub fn unvoiced() -> Self {
        Self {
            period: 0.0,
            confidence: 0.0,
            voiced: false,
        }
    }
}

/// Bounded-lag fundamental-period estimator.
///
/// All work buffers are allocated at construction; `estimate()` never
/// allocates and its lag search is bounded by the prepared range.
#[derive(Debug)]
pub struct PitchEstimator {
    min_lag: usize,
    max_lag: usize,
    /// Comparison window length; frames carry `window + max_lag` samples.
    window: usize,
    difference: Vec<f32>,
    normalized: Vec<f32>,
    prefix_energy: Vec<f64>,
}

impl PitchEstimator {
    /// Creates an estimator for the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        let min_lag = min_period_samples(sample_rate);
        let max_lag = max_period_samples(sample_rate).max(min_lag + 2);
        let window = ((PITCH_WINDOW_SECS * sample_rate) as usize)
            .saturating_sub(max_lag)
            .max(max_lag);
        let frame_len = window + max_lag;
        Self {
            min_lag,
            max_lag,
            window,
            difference: vec![0.0; max_lag + 1],
            normalized: vec![0.0; max_lag + 1],
            prefix_energy: vec![0.0; frame_len + 1],
        }
    }

    /// Number of history samples one estimate consumes.
    #[inline]
    pub fn frame_len(&self) -> usize {
        self.window + self.max_lag
    }

    /// Estimates the fundamental period of `frame` (the most recent
    /// `frame_len()` samples, oldest first).
    ///
    /// Frames shorter than `frame_len()` come back unvoiced.
    pub fn estimate(&mut self, frame: &[f32]) -> PitchEstimate {
        if frame.len() < self.frame_len() {
            return PitchEstimate::unvoiced();
        }
        let frame = &frame[frame.len() - self.frame_len()..];

        self.prefix_energy[0] = 0.0;
        for (i, &x) in frame.iter().enumerate() {
            self.prefix_energy[i + 1] = self.prefix_energy[i] + (x as f64) * (x as f64);
        }
        let window_energy = self.prefix_energy[self.window];
        if window_energy < SILENCE_ENERGY_PER_SAMPLE * self.window as f64 {
            return PitchEstimate::unvoiced();
        }

        self.compute_difference(frame, window_energy);
        self.normalize();

        let (lag, depth) = match self.pick_lag() {
            Some(found) => found,
            None => return PitchEstimate::unvoiced(),
        };
        let period = self.refine(lag);

        PitchEstimate {
            period,
            confidence: (1.0 - depth).clamp(0.0, 1.0),
            voiced: true,
        }
    }

    /// d(tau) = e(0) + e(tau) - 2 * r(tau) over the comparison window.
    fn compute_difference(&mut self, frame: &[f32], window_energy: f64) {
        self.difference[0] = 0.0;
        for tau in 1..=self.max_lag {
            let mut corr = 0.0f64;
            for j in 0..self.window {
                corr += (frame[j] as f64) * (frame[j + tau] as f64);
            }
            let shifted_energy = self.prefix_energy[tau + self.window] - self.prefix_energy[tau];
            let d = window_energy + shifted_energy - 2.0 * corr;
            self.difference[tau] = d.max(0.0) as f32;
        }
    }

    /// Cumulative mean normalized difference; 1.0 where the running mean
    /// vanishes so degenerate frames can never look periodic.
    fn normalize(&mut self) {
        self.normalized[0] = 1.0;
        let mut running_sum = 0.0f32;
        for tau in 1..=self.max_lag {
            running_sum += self.difference[tau];
            self.normalized[tau] = if running_sum > 1e-12 {
                self.difference[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }
    }

    /// First lag below the voicing threshold, walked down to its local
    /// minimum; falls back to the global minimum when it is still clearly
    /// periodic. Returns the lag and its normalized-difference depth.
    fn pick_lag(&self) -> Option<(usize, f32)> {
        let mut tau = self.min_lag;
        while tau < self.max_lag {
            if self.normalized[tau] < VOICING_THRESHOLD {
                while tau + 1 < self.max_lag && self.normalized[tau + 1] < self.normalized[tau] {
                    tau += 1;
                }
                return Some((tau, self.normalized[tau]));
            }
            tau += 1;
        }

        let mut best_tau = self.min_lag;
        let mut best_val = self.normalized[self.min_lag];
        for tau in self.min_lag + 1..=self.max_lag {
            if self.normalized[tau] < best_val {
                best_val = self.normalized[tau];
                best_tau = tau;
            }
        }
        if best_val < FALLBACK_THRESHOLD {
            Some((best_tau, best_val))
        } else {
            None
        }
    }

    /// Parabolic vertex through the minimum and its neighbors.
    fn refine(&self, lag: usize) -> f32 {
        if lag < 1 || lag >= self.max_lag {
            return lag as f32;
        }
        let s0 = self.normalized[lag - 1] as f64;
        let s1 = self.normalized[lag] as f64;
        let s2 = self.normalized[lag + 1] as f64;
        let denom = 2.0 * (2.0 * s1 - s2 - s0);
        if denom.abs() > 1e-12 {
            (lag as f64 + (s2 - s0) / denom) as f32
        } else {
            lag as f32
        }
    }
}
