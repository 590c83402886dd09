//! User-facing parameters: ids, normalized-value mappings, display strings,
//! and the lock-free targets shared between the control and audio threads.
//!
//! Every parameter travels as a normalized float in `[0, 1]`. The mapping
//! functions here are the single source of truth for turning a normalized
//! value into engine units, and they are total: non-finite input falls back
//! to the neutral center rather than poisoning downstream math.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic_float::AtomicF32;
use serde::{Deserialize, Serialize};

use crate::core::types::QualityMode;

/// Full pitch range in semitones; normalized 0..1 maps to ±24.
pub const PITCH_SPAN_SEMITONES: f32 = 48.0;

/// Full formant range in semitones; normalized 0..1 maps to ±12.
pub const FORMANT_SPAN_SEMITONES: f32 = 24.0;

/// Normalized distance from 0.5 inside which pitch and formant snap to an
/// exact ratio of 1.0, so a centered knob is bit-transparent.
pub const CENTER_DEADZONE: f32 = 1.0e-3;

/// Identifier for one engine parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamId {
    /// Pitch shift, ±24 semitones around center.
    Pitch,
    /// Formant shift, ±12 semitones around center.
    Formant,
    /// Dry/wet blend, 0 = dry only, 1 = wet only.
    Mix,
    /// Quality mode selector (latency/fidelity trade-off).
    Quality,
}

impl ParamId {
    /// Number of parameters the engine exposes.
    pub const COUNT: usize = 4;

    /// All parameters in host index order.
    pub const ALL: [ParamId; ParamId::COUNT] =
        [ParamId::Pitch, ParamId::Formant, ParamId::Mix, ParamId::Quality];

    /// Maps a host parameter index to its id.
    #[inline]
    pub fn from_index(index: usize) -> Option<ParamId> {
        ParamId::ALL.get(index).copied()
    }

    /// The host index of this parameter.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable parameter name.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            ParamId::Pitch => "Pitch",
            ParamId::Formant => "Formant",
            ParamId::Mix => "Mix",
            ParamId::Quality => "Quality",
        }
    }
}

/// Clamps a normalized value into `[0, 1]`; non-finite input becomes the
/// neutral center.
#[inline]
fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Pitch shift in semitones for a normalized value: `(v - 0.5) * 48`, with
/// the center deadzone snapping to exactly zero.
#[inline]
pub fn pitch_semitones(value: f32) -> f32 {
    let v = sanitize(value);
    if (v - 0.5).abs() < CENTER_DEADZONE {
        0.0
    } else {
        (v - 0.5) * PITCH_SPAN_SEMITONES
    }
}

/// Pitch ratio for a normalized value: `2^(semitones / 12)`. A centered
/// value yields exactly 1.0.
#[inline]
pub fn pitch_ratio(value: f32) -> f32 {
    ratio_from_semitones(pitch_semitones(value))
}

/// Formant shift in semitones for a normalized value: `(v - 0.5) * 24`,
/// with the same center deadzone as pitch.
#[inline]
pub fn formant_semitones(value: f32) -> f32 {
    let v = sanitize(value);
    if (v - 0.5).abs() < CENTER_DEADZONE {
        0.0
    } else {
        (v - 0.5) * FORMANT_SPAN_SEMITONES
    }
}

/// Formant ratio for a normalized value.
#[inline]
pub fn formant_ratio(value: f32) -> f32 {
    ratio_from_semitones(formant_semitones(value))
}

/// Dry/wet blend for a normalized value; the mapping is the identity.
#[inline]
pub fn mix_amount(value: f32) -> f32 {
    sanitize(value)
}

/// Quality mode for a normalized value, split into thirds.
#[inline]
pub fn quality_mode(value: f32) -> QualityMode {
    let v = sanitize(value);
    if v < 1.0 / 3.0 {
        QualityMode::Live
    } else if v < 2.0 / 3.0 {
        QualityMode::Standard
    } else {
        QualityMode::High
    }
}

/// Normalized value at the center of a quality mode's third, the inverse of
/// [`quality_mode`].
#[inline]
pub fn quality_value(mode: QualityMode) -> f32 {
    match mode {
        QualityMode::Live => 1.0 / 6.0,
        QualityMode::Standard => 0.5,
        QualityMode::High => 5.0 / 6.0,
    }
}

/// Frequency ratio for a shift in semitones.
#[inline]
pub fn ratio_from_semitones(semitones: f32) -> f32 {
    if semitones == 0.0 {
        1.0
    } else {
        (semitones / 12.0).exp2()
    }
}

/// Display string for a parameter at a normalized value, e.g. `"+7.0 st"`,
/// `"63 %"`, `"Standard"`. Intended for the UI thread; allocates.
pub fn parameter_display(id: ParamId, value: f32) -> String {
    match id {
        ParamId::Pitch => format!("{:+.1} st", pitch_semitones(value)),
        ParamId::Formant => format!("{:+.1} st", formant_semitones(value)),
        ParamId::Mix => format!("{:.0} %", mix_amount(value) * 100.0),
        ParamId::Quality => quality_mode(value).label().to_string(),
    }
}

/// Normalized parameter targets shared between threads.
///
/// Single-writer/single-reader discipline: the control thread stores through
/// a [`ParamHandle`], the audio thread only loads. Relaxed ordering is
/// enough because each value is independent and self-contained.
#[derive(Debug)]
pub struct ParamTargets {
    pitch: AtomicF32,
    formant: AtomicF32,
    mix: AtomicF32,
    quality: AtomicF32,
}

impl Default for ParamTargets {
    fn default() -> Self {
        Self {
            pitch: AtomicF32::new(0.5),
            formant: AtomicF32::new(0.5),
            mix: AtomicF32::new(1.0),
            quality: AtomicF32::new(quality_value(QualityMode::default())),
        }
    }
}

impl ParamTargets {
    /// Stores a normalized target. Non-finite values are dropped so a
    /// misbehaving host cannot poison the audio thread.
    pub fn set(&self, id: ParamId, value: f32) {
        if !value.is_finite() {
            return;
        }
        let v = value.clamp(0.0, 1.0);
        self.slot(id).store(v, Ordering::Relaxed);
    }

    /// Loads the current normalized target.
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.slot(id).load(Ordering::Relaxed)
    }

    /// Captures all targets as a plain snapshot.
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            pitch: self.get(ParamId::Pitch),
            formant: self.get(ParamId::Formant),
            mix: self.get(ParamId::Mix),
            quality: self.get(ParamId::Quality),
        }
    }

    /// Restores all targets from a snapshot.
    pub fn restore(&self, snapshot: &ParamSnapshot) {
        self.set(ParamId::Pitch, snapshot.pitch);
        self.set(ParamId::Formant, snapshot.formant);
        self.set(ParamId::Mix, snapshot.mix);
        self.set(ParamId::Quality, snapshot.quality);
    }

    #[inline]
    fn slot(&self, id: ParamId) -> &AtomicF32 {
        match id {
            ParamId::Pitch => &self.pitch,
            ParamId::Formant => &self.formant,
            ParamId::Mix => &self.mix,
            ParamId::Quality => &self.quality,
        }
    }
}

/// Cloneable control-thread handle writing parameter targets.
#[derive(Debug, Clone)]
pub struct ParamHandle {
    targets: Arc<ParamTargets>,
}

impl ParamHandle {
    /// Wraps shared targets in a handle.
    pub fn new(targets: Arc<ParamTargets>) -> Self {
        Self { targets }
    }

    /// Stores a normalized target value.
    #[inline]
    pub fn set(&self, id: ParamId, value: f32) {
        self.targets.set(id, value);
    }

    /// Loads a normalized target value.
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.targets.get(id)
    }

    /// Sets the pitch shift in semitones (clamped to ±24).
    pub fn set_pitch_semitones(&self, semitones: f32) {
        let span = PITCH_SPAN_SEMITONES;
        self.set(ParamId::Pitch, semitones.clamp(-span / 2.0, span / 2.0) / span + 0.5);
    }

    /// Sets the formant shift in semitones (clamped to ±12).
    pub fn set_formant_semitones(&self, semitones: f32) {
        let span = FORMANT_SPAN_SEMITONES;
        self.set(ParamId::Formant, semitones.clamp(-span / 2.0, span / 2.0) / span + 0.5);
    }

    /// Sets the dry/wet blend directly.
    pub fn set_mix(&self, mix: f32) {
        self.set(ParamId::Mix, mix);
    }

    /// Sets the quality mode.
    pub fn set_quality(&self, mode: QualityMode) {
        self.set(ParamId::Quality, quality_value(mode));
    }

    /// Captures all targets as a plain snapshot.
    pub fn snapshot(&self) -> ParamSnapshot {
        self.targets.snapshot()
    }
}

/// Plain copy of all normalized targets, serializable for host state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    pub pitch: f32,
    pub formant: f32,
    pub mix: f32,
    pub quality: f32,
}

impl Default for ParamSnapshot {
    fn default() -> Self {
        ParamTargets::default().snapshot()
    }
}
