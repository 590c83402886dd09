//! Epoch timeline: pitch marks anchoring pitch-synchronous grain extraction.
//!
//! The tracker lays one epoch per estimated period, snapping each voiced mark
//! to the strongest waveform peak near its predicted position so grain centers
//! line up with glottal pulses. Epochs are held in a fixed ring addressed by a
//! monotonically increasing ordinal; the ring overwrites its oldest entry when
//! full, so memory stays O(1) no matter how far the stream runs.

use crate::core::history::HistoryBuffer;
use crate::core::types::EPOCH_SNAP_FRACTION;

use super::pitch::PitchEstimate;

/// One pitch mark on the input timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Epoch {
    /// Absolute sample position of the mark (grain center).
    pub position: i64,
    /// Local fundamental period in samples; always > 0.
    pub period: f32,
    /// Confidence of the estimate this mark was laid from, in [0, 1].
    pub confidence: f32,
    /// False when the mark was laid through unvoiced audio at the fallback
    /// period.
    pub voiced: bool,
}

/// Bounded queue of epochs in non-decreasing position order.
#[derive(Debug)]
pub struct EpochTracker {
    ring: Vec<Epoch>,
    mask: usize,
    /// Ordinal of the next epoch to be laid; the ring retains ordinals
    /// `next_ordinal - len .. next_ordinal`.
    next_ordinal: u64,
    len: usize,
    /// Predicted center of the next epoch.
    next_position: i64,
    fallback_period: f32,
}

impl EpochTracker {
    /// Creates a tracker retaining at least `min_capacity` epochs, advancing
    /// through unvoiced audio at `fallback_period` samples.
    pub fn new(min_capacity: usize, fallback_period: f32) -> Self {
        let capacity = min_capacity.max(4).next_power_of_two();
        let placeholder = Epoch {
            position: 0,
            period: fallback_period,
            confidence: 0.0,
            voiced: false,
        };
        Self {
            ring: vec![placeholder; capacity],
            mask: capacity - 1,
            next_ordinal: 0,
            len: 0,
            next_position: 0,
            fallback_period,
        }
    }

    /// Number of epochs currently retained.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no epochs have been laid since the last reset.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ordinal of the oldest retained epoch.
    #[inline]
    pub fn first_ordinal(&self) -> u64 {
        self.next_ordinal - self.len as u64
    }

    /// Ordinal the next laid epoch will receive.
    #[inline]
    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    /// Predicted center of the next epoch to be laid.
    #[inline]
    pub fn next_position(&self) -> i64 {
        self.next_position
    }

    /// Half-width of the peak-snap search for the next epoch, in samples.
    #[inline]
    pub fn snap_radius(&self, estimate: &PitchEstimate) -> i64 {
        if estimate.voiced {
            (EPOCH_SNAP_FRACTION * estimate.period).ceil() as i64
        } else {
            0
        }
    }

    /// The most recently laid epoch.
    #[inline]
    pub fn newest(&self) -> Option<&Epoch> {
        if self.len == 0 {
            None
        } else {
            Some(&self.ring[((self.next_ordinal - 1) as usize) & self.mask])
        }
    }

    /// Rounds a fractional ordinal to the nearest retained epoch's ordinal.
    ///
    /// A cursor that has run past the newest mark keeps reading it (grains
    /// hold the last epoch rather than reaching into unwritten history).
    pub fn clamp_ordinal(&self, ordinal: f64) -> Option<u64> {
        if self.len == 0 {
            return None;
        }
        let rounded = ordinal.round().max(0.0) as u64;
        Some(rounded.max(self.first_ordinal()).min(self.next_ordinal - 1))
    }

    /// Retained epoch by ordinal.
    pub fn get(&self, ordinal: u64) -> Option<&Epoch> {
        if self.len == 0 || ordinal < self.first_ordinal() || ordinal >= self.next_ordinal {
            return None;
        }
        Some(&self.ring[(ordinal as usize) & self.mask])
    }

    /// Epoch nearest a fractional ordinal, clamped into the retained range.
    pub fn nearest(&self, ordinal: f64) -> Option<&Epoch> {
        self.clamp_ordinal(ordinal).and_then(|o| self.get(o))
    }

    /// Measured spacing from the epoch at `ordinal` to its successor, when
    /// both are retained. More trustworthy than the stored period estimate
    /// because it reflects where the marks actually landed after snapping.
    pub fn spacing_after(&self, ordinal: u64) -> Option<f32> {
        let a = self.get(ordinal)?;
        let b = self.get(ordinal + 1)?;
        Some((b.position - a.position) as f32)
    }

    /// Lays the next epoch using the latest period estimate, snapping voiced
    /// marks to the strongest waveform peak within the snap radius.
    ///
    /// The caller guarantees `next_position() + snap_radius()` has been
    /// written to `history`.
    pub fn lay_epoch(&mut self, history: &HistoryBuffer, estimate: &PitchEstimate) {
        let (period, confidence, voiced) = if estimate.voiced && estimate.period > 0.0 {
            (estimate.period, estimate.confidence, true)
        } else {
            (self.fallback_period, 0.0, false)
        };

        let predicted = self.next_position;
        let position = if voiced {
            let radius = self.snap_radius(estimate);
            let mut best = predicted;
            let mut best_value = history.get(predicted).abs();
            let mut i = predicted - radius;
            while i <= predicted + radius {
                let value = history.get(i).abs();
                if value > best_value {
                    best_value = value;
                    best = i;
                }
                i += 1;
            }
            best
        } else {
            predicted
        };

        self.ring[(self.next_ordinal as usize) & self.mask] = Epoch {
            position,
            period,
            confidence,
            voiced,
        };
        self.next_ordinal += 1;
        if self.len < self.ring.len() {
            self.len += 1;
        }
        self.next_position = position + period.max(1.0).round() as i64;
    }

    /// Drops retained epochs with ordinals below `min_ordinal`.
    pub fn drop_before(&mut self, min_ordinal: u64) {
        let first = self.first_ordinal();
        if min_ordinal > first {
            let to_drop = (min_ordinal - first).min(self.len as u64) as usize;
            self.len -= to_drop;
        }
    }

    /// Clears the timeline and restarts at position zero.
    pub fn reset(&mut self) {
        self.next_ordinal = 0;
        self.len = 0;
        self.next_position = 0;
    }
}
