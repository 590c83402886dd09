//! Shared sample type, quality modes, and engine-wide tuning constants.

use serde::{Deserialize, Serialize};

/// A single audio sample (32-bit float, nominal range -1.0 to 1.0).
pub type Sample = f32;

/// Lowest fundamental frequency the pitch estimator searches for, in Hz.
pub const MIN_PITCH_HZ: f32 = 50.0;

/// Highest fundamental frequency the pitch estimator searches for, in Hz.
pub const MAX_PITCH_HZ: f32 = 1000.0;

/// Length of the analysis window handed to the pitch estimator, in seconds.
pub const PITCH_WINDOW_SECS: f32 = 0.040;

/// Normalized-difference threshold below which a lag counts as periodic.
pub const VOICING_THRESHOLD: f32 = 0.3;

/// Pseudo fundamental used to advance the epoch timeline through unvoiced
/// audio, in Hz. Unvoiced grains span two of these fallback periods, about
/// 20 ms.
pub const FALLBACK_PITCH_HZ: f32 = 100.0;

/// Epochs snap to the strongest local energy peak within this fraction of the
/// current period on either side of the predicted position.
pub const EPOCH_SNAP_FRACTION: f32 = 0.1;

/// Time constant for parameter smoothing, in milliseconds.
pub const SMOOTHING_TIME_MS: f32 = 5.0;

/// Duration of the equal-power crossfade used when the synthesis path or
/// quality mode changes mid-stream, in seconds.
pub const PATH_CROSSFADE_SECS: f32 = 0.005;

/// Hard amplitude bound applied by the output safety stage.
pub const OUTPUT_AMPLITUDE_LIMIT: f32 = 2.0;

/// Magnitudes below this are flushed to exact zero by the safety stage.
pub const DENORMAL_THRESHOLD: f32 = 1.0e-20;

/// Spectral-resolution / latency trade-off for the engine.
///
/// Each mode fixes the FFT size and overlap factor of the spectral path, and
/// through them the engine latency. All modes are allocated at `prepare()`
/// time, so switching at run time never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityMode {
    /// Lowest latency. 1024-point FFT, 4x overlap.
    Live,
    /// Balanced default. 2048-point FFT, 8x overlap.
    Standard,
    /// Densest analysis for critical material. 4096-point FFT, 8x overlap.
    High,
}

impl Default for QualityMode {
    fn default() -> Self {
        QualityMode::Standard
    }
}

impl QualityMode {
    /// All modes, ordered from lowest to highest latency.
    pub const ALL: [QualityMode; 3] = [QualityMode::Live, QualityMode::Standard, QualityMode::High];

    /// FFT size of the spectral path for this mode.
    #[inline]
    pub fn fft_size(self) -> usize {
        match self {
            QualityMode::Live => 1024,
            QualityMode::Standard => 2048,
            QualityMode::High => 4096,
        }
    }

    /// Overlap factor of the spectral path; hop = fft_size / overlap.
    #[inline]
    pub fn overlap(self) -> usize {
        match self {
            QualityMode::Live => 4,
            QualityMode::Standard => 8,
            QualityMode::High => 8,
        }
    }

    /// Analysis/synthesis hop of the spectral path in samples.
    #[inline]
    pub fn hop_size(self) -> usize {
        self.fft_size() / self.overlap()
    }

    /// Human-readable mode name.
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            QualityMode::Live => "Live",
            QualityMode::Standard => "Standard",
            QualityMode::High => "High",
        }
    }
}

/// Longest pitch period the engine is sized for at the given sample rate.
#[inline]
pub fn max_period_samples(sample_rate: f32) -> usize {
    (sample_rate / MIN_PITCH_HZ).ceil() as usize
}

/// Shortest pitch period the estimator will report at the given sample rate.
#[inline]
pub fn min_period_samples(sample_rate: f32) -> usize {
    ((sample_rate / MAX_PITCH_HZ).floor() as usize).max(2)
}
