#![forbid(unsafe_code)]
//! Real-time pitch shifting for voice and monophonic instruments.
//!
//! `pitchshift` changes the pitch of audio without changing its duration.
//! Per ratio it chooses between pitch-synchronous grain synthesis over a
//! tracked epoch timeline (clean for simple intervals like octaves and
//! fifths) and a phase-locked spectral shifter (robust for irrational and
//! near-irrational ratios), with cepstral formant preservation, click-free
//! parameter smoothing, and an unconditional output safety stage. After
//! [`PitchShifter::prepare`], [`PitchShifter::process`] is allocation-free
//! and lock-free, built for the audio callback.
//!
//! # Quick Start
//!
//! One-shot processing of a whole buffer:
//!
//! ```
//! // A quarter second of 440 Hz sine at 44.1 kHz
//! let input: Vec<f32> = (0..11025)
//!     .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!     .collect();
//!
//! // Shift up one octave; duration is preserved.
//! let output = pitchshift::shift_pitch_buffer(&input, 44100.0, 12.0).unwrap();
//! assert_eq!(output.len(), input.len());
//! ```
//!
//! # Streaming
//!
//! For real-time use, drive [`PitchShifter`] block by block and talk to it
//! from the control thread through its [`ParamHandle`]:
//!
//! ```
//! use pitchshift::PitchShifter;
//!
//! let mut engine = PitchShifter::new();
//! engine.prepare(48_000.0, 512).unwrap();
//!
//! let handle = engine.handle();
//! handle.set_pitch_semitones(7.0); // a fifth up
//!
//! let input = vec![0.0f32; 512];
//! let mut output = vec![0.0f32; 512];
//! engine.process(&input, &mut output); // once per audio callback
//! ```

pub mod analysis;
pub mod core;
pub mod engine;
pub mod error;
pub mod params;
pub mod safety;
pub mod shift;

pub use core::types::{QualityMode, Sample};
pub use engine::PitchShifter;
pub use error::EngineError;
pub use params::{ParamHandle, ParamId, ParamSnapshot};
pub use shift::selector::{classify, path_for_ratio, spectral_preferred, PathKind, RatioClass};

/// Block size used by the buffer-level convenience entry point.
const BUFFER_CHUNK: usize = 512;

/// Shifts the pitch of a whole buffer by `semitones`, preserving length.
///
/// Convenience wrapper for tests, offline rendering, and non-real-time
/// hosts: prepares an engine, streams the buffer through it, flushes the
/// engine's fixed latency with silence, and trims the output so sample `n`
/// of the result corresponds to sample `n` of the input.
///
/// # Errors
///
/// Returns [`EngineError::InvalidSampleRate`] for a non-positive or
/// non-finite sample rate and [`EngineError::InvalidParameterValue`] for a
/// non-finite semitone amount.
///
/// # Example
///
/// ```
/// let input: Vec<f32> = (0..11025)
///     .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 44100.0).sin())
///     .collect();
///
/// let down_a_fifth = pitchshift::shift_pitch_buffer(&input, 44100.0, -7.0).unwrap();
/// assert_eq!(down_a_fifth.len(), input.len());
/// ```
pub fn shift_pitch_buffer(
    input: &[f32],
    sample_rate: f32,
    semitones: f32,
) -> Result<Vec<f32>, EngineError> {
    if !semitones.is_finite() {
        return Err(EngineError::InvalidParameterValue {
            index: ParamId::Pitch.index(),
            value: semitones,
        });
    }

    let mut engine = PitchShifter::new();
    engine.handle().set_pitch_semitones(semitones);
    engine.prepare(sample_rate, BUFFER_CHUNK)?;

    let latency = engine.latency_samples();
    let mut shifted = Vec::with_capacity(input.len() + latency);
    let mut block = [0.0f32; BUFFER_CHUNK];

    for chunk in input.chunks(BUFFER_CHUNK) {
        engine.process(chunk, &mut block[..chunk.len()]);
        shifted.extend_from_slice(&block[..chunk.len()]);
    }

    // Push silence through until the delayed tail has fully emerged.
    let zeros = [0.0f32; BUFFER_CHUNK];
    let mut flushed = 0;
    while flushed < latency {
        let n = BUFFER_CHUNK.min(latency - flushed);
        engine.process(&zeros[..n], &mut block[..n]);
        shifted.extend_from_slice(&block[..n]);
        flushed += n;
    }

    Ok(shifted.split_off(latency))
}
