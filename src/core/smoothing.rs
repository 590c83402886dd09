//! One-pole exponential smoothing for click-free parameter trajectories.

/// Exponentially smoothed scalar with a fixed time constant.
///
/// The audio thread calls [`next`](SmoothedParam::next) once per sample; the
/// value glides toward the most recent target and snaps once the remaining
/// distance is inaudible. Targets may be retuned at any time.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
}

/// Remaining distance below which the smoother snaps exactly to its target.
const SNAP_THRESHOLD: f32 = 1.0e-6;

impl SmoothedParam {
    /// Creates a smoother at `initial` with the given time constant.
    pub fn new(initial: f32, time_ms: f32, sample_rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: coeff_for(time_ms, sample_rate),
        }
    }

    /// Sets a new target for the glide.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Advances one sample and returns the smoothed value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let delta = self.target - self.current;
        if delta.abs() <= SNAP_THRESHOLD {
            self.current = self.target;
        } else {
            self.current += self.coeff * delta;
        }
        self.current
    }

    /// The most recently produced value, without advancing.
    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// The value the smoother is gliding toward.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Jumps current and target to `value`, abandoning any glide in flight.
    #[inline]
    pub fn jump_to(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// True once the glide has fully settled on the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}

/// Per-sample coefficient for a one-pole reaching ~63% of a step after
/// `time_ms` milliseconds.
fn coeff_for(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = (time_ms * 0.001 * sample_rate).max(1.0);
    1.0 - (-1.0 / samples).exp()
}
