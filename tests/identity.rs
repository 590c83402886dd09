//! Zero-shift behavior. With pitch and formant centered the whole engine
//! must collapse to a fixed delay, for tones, noise, and silence alike.

mod common;

use common::{gen_noise, gen_sine, gen_sine_amp, run_blocks};
use pitchshift::{PitchShifter, QualityMode};

const SR: f32 = 44_100.0;
const BLOCK: usize = 512;

/// Largest deviation between `output[n]` and `input[n - latency]`.
fn max_delay_error(input: &[f32], output: &[f32], latency: usize) -> f32 {
    (latency..input.len())
        .map(|n| (output[n] - input[n - latency]).abs())
        .fold(0.0f32, f32::max)
}

#[test]
fn test_identity_tone_is_pure_delay() {
    let mut engine = PitchShifter::new();
    engine.prepare(SR, BLOCK).unwrap();
    let latency = engine.latency_samples();

    let input = gen_sine(440.0, SR, 2 * SR as usize);
    let output = run_blocks(&mut engine, &input, BLOCK);

    let err = max_delay_error(&input, &output, latency);
    assert!(err < 1e-4, "tone identity error {} exceeds tolerance", err);

    let leading = output[..latency]
        .iter()
        .fold(0.0f32, |peak, &y| peak.max(y.abs()));
    assert!(
        leading < 1e-4,
        "output before one latency should be silent, peak {}",
        leading
    );
}

#[test]
fn test_identity_broadband_noise_is_pure_delay() {
    let mut engine = PitchShifter::new();
    engine.prepare(SR, BLOCK).unwrap();
    let latency = engine.latency_samples();

    // Noise keeps the pitch tracker unvoiced, so this covers the fallback
    // epoch grid rather than the snapped one.
    let input = gen_noise(0x00C0_FFEE, 2 * SR as usize);
    let output = run_blocks(&mut engine, &input, BLOCK);

    let err = max_delay_error(&input, &output, latency);
    assert!(err < 1e-4, "noise identity error {} exceeds tolerance", err);
}

#[test]
fn test_identity_tracks_amplitude_modulation() {
    let mut engine = PitchShifter::new();
    engine.prepare(SR, BLOCK).unwrap();
    let latency = engine.latency_samples();

    // 3 Hz tremolo on a 220 Hz carrier; grain scheduling must not smear it.
    let input = gen_sine_amp(220.0, SR, 2 * SR as usize, |i| {
        let t = i as f32 / SR;
        0.4 + 0.35 * (2.0 * std::f32::consts::PI * 3.0 * t).sin()
    });
    let output = run_blocks(&mut engine, &input, BLOCK);

    let err = max_delay_error(&input, &output, latency);
    assert!(
        err < 1e-4,
        "modulated identity error {} exceeds tolerance",
        err
    );
}

#[test]
fn test_identity_across_quality_modes() {
    let input = gen_sine(440.0, SR, SR as usize);

    for &mode in &QualityMode::ALL {
        let mut engine = PitchShifter::new();
        engine.handle().set_quality(mode);
        engine.prepare(SR, BLOCK).unwrap();

        let latency = engine.latency_samples();
        assert_eq!(
            latency,
            mode.fft_size(),
            "{}: at 44.1 kHz the FFT dominates the latency",
            mode.label()
        );

        let output = run_blocks(&mut engine, &input, BLOCK);
        let err = max_delay_error(&input, &output, latency);
        assert!(
            err < 1e-4,
            "{}: identity error {} exceeds tolerance",
            mode.label(),
            err
        );
    }
}

#[test]
fn test_identity_silence_is_exact_zero() {
    let mut engine = PitchShifter::new();
    engine.prepare(SR, BLOCK).unwrap();

    let input = vec![0.0f32; SR as usize];
    let output = run_blocks(&mut engine, &input, BLOCK);

    assert!(
        output.iter().all(|&y| y == 0.0),
        "silence must pass through untouched"
    );
}
