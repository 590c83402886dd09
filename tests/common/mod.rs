#![allow(dead_code)]

use std::f32::consts::PI;

use pitchshift::PitchShifter;

pub fn gen_sine(freq_hz: f32, sr: f32, n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (2.0 * PI * freq_hz * i as f32 / sr).sin())
        .collect()
}

pub fn gen_sine_amp<F>(freq_hz: f32, sr: f32, n: usize, amp_fn: F) -> Vec<f32>
where
    F: Fn(usize) -> f32,
{
    (0..n)
        .map(|i| amp_fn(i) * (2.0 * PI * freq_hz * i as f32 / sr).sin())
        .collect()
}

/// Deterministic broadband noise in [-1, 1] (xorshift32).
pub fn gen_noise(seed: u32, n: usize) -> Vec<f32> {
    let mut state = seed.max(1);
    (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32) * 2.0 - 1.0
        })
        .collect()
}

pub fn rms(signal: &[f32]) -> f64 {
    windowed_rms(signal, 0, signal.len())
}

pub fn windowed_rms(signal: &[f32], start: usize, len: usize) -> f64 {
    let start = start.min(signal.len());
    let end = (start + len).min(signal.len());
    if end <= start {
        return 0.0;
    }
    let sum_sq: f64 = signal[start..end]
        .iter()
        .map(|&s| {
            let v = s as f64;
            v * v
        })
        .sum();
    (sum_sq / (end - start) as f64).sqrt()
}

/// Single-frequency signal energy (Goertzel-style projection).
pub fn energy_at_freq(signal: &[f32], sr: f64, freq_hz: f64) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let mut re = 0.0f64;
    let mut im = 0.0f64;
    let step = 2.0 * std::f64::consts::PI * freq_hz / sr;
    for (i, &s) in signal.iter().enumerate() {
        let angle = step * i as f64;
        let sv = s as f64;
        re += sv * angle.cos();
        im -= sv * angle.sin();
    }
    (re * re + im * im).sqrt() / signal.len() as f64
}

/// Locates the strongest component near `expected_hz` by scanning energy on
/// a cent grid of `±search_cents` in `step_cents` steps. The scan resolves
/// well below its step because the main lobe is symmetric around the peak.
pub fn measure_peak_freq(
    signal: &[f32],
    sr: f64,
    expected_hz: f64,
    search_cents: f64,
    step_cents: f64,
) -> f64 {
    let mut best_freq = expected_hz;
    let mut best_energy = -1.0f64;
    let steps = (2.0 * search_cents / step_cents).round() as i64;
    for k in 0..=steps {
        let cents = -search_cents + k as f64 * step_cents;
        let freq = expected_hz * (cents / 1200.0).exp2();
        let energy = energy_at_freq(signal, sr, freq);
        if energy > best_energy {
            best_energy = energy;
            best_freq = freq;
        }
    }
    best_freq
}

/// Ratio of signal energy at `freq_hz` to the energy at `other_hz`.
///
/// A peak scan around an expected frequency is blind to what the rest of
/// the spectrum is doing; this is the companion check that the component a
/// test found actually outweighs a residual somewhere else (typically the
/// unshifted input frequency).
pub fn energy_ratio(signal: &[f32], sr: f64, freq_hz: f64, other_hz: f64) -> f64 {
    let at = energy_at_freq(signal, sr, freq_hz);
    let other = energy_at_freq(signal, sr, other_hz).max(1e-12);
    at / other
}

/// Signed interval from `reference_hz` to `measured_hz` in cents.
pub fn cents_between(measured_hz: f64, reference_hz: f64) -> f64 {
    1200.0 * (measured_hz / reference_hz).log2()
}

/// Streams `input` through the engine in fixed-size blocks.
pub fn run_blocks(engine: &mut PitchShifter, input: &[f32], block_len: usize) -> Vec<f32> {
    let mut output = vec![0.0f32; input.len()];
    for (i, o) in input.chunks(block_len).zip(output.chunks_mut(block_len)) {
        engine.process(i, o);
    }
    output
}

/// Streams `input` through the engine in pseudo-random block sizes of
/// 1..=`max_block` samples, deterministic per `seed`.
pub fn run_random_blocks(
    engine: &mut PitchShifter,
    input: &[f32],
    seed: u32,
    max_block: usize,
) -> Vec<f32> {
    let mut output = vec![0.0f32; input.len()];
    let mut state = seed.max(1);
    let mut pos = 0;
    while pos < input.len() {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let len = 1 + (state as usize % max_block.max(1));
        let end = (pos + len).min(input.len());
        engine.process(&input[pos..end], &mut output[pos..end]);
        pos = end;
    }
    output
}
