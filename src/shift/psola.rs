//! Pitch-synchronous grain synthesis over the epoch timeline.
//!
//! Classic time-domain PSOLA: every synthesis step selects the epoch
//! nearest a fractional analysis cursor, extracts a raised-cosine grain of
//! roughly two local periods of history around that mark, and overlap-adds
//! it at a center spacing of `period / ratio` while the cursor advances by
//! `1 / ratio` epochs. Upward shifts pack the grains denser than their
//! length (gain-compensated so the overlap stays unity), downward shifts
//! spread them apart, and in both cases the grain repetition rate, not the
//! grain content, sets the output fundamental while the content carries
//! the formants verbatim.
//!
//! The window halves span the measured gaps to the neighbouring marks
//! rather than a nominal period: at a ratio of exactly 1 each falling half
//! is the complement of the next grain's rising half, the overlap-add
//! collapses to unity gain, and the path reproduces its input
//! sample-for-sample at the configured latency, through snap jitter and
//! estimate changes alike.
//!
//! Grain spacing uses the measured distance between the marks the cursor
//! crossed; a small bounded servo keeps the synthesis clock one latency
//! behind the marks it reads when estimates drift during sweeps.

use std::f64::consts::PI;

use crate::analysis::epoch::EpochTracker;
use crate::core::history::HistoryBuffer;
use crate::core::resample::hermite;

/// Servo gain pulling the synthesis clock toward its ideal offset.
const SYNC_GAIN: f64 = 0.05;

/// Largest fraction of one grain step the servo may add or remove.
const MAX_SYNC_FRACTION: f64 = 0.1;

/// Most grains that can overlap one output sample. Sized for the extreme
/// of the pitch range (two octaves up packs about eight grains deep) with
/// headroom; the ratio itself is bounded well below this by the parameter
/// mapping.
const MAX_ACTIVE_GRAINS: usize = 24;

/// One scheduled grain: where its window peaks on the output clock, which
/// history position it reads at that peak, and the half-lengths its
/// raised-cosine window spans on each side.
#[derive(Debug, Clone, Copy)]
struct Grain {
    /// Output time where the window peaks.
    center: f64,
    /// History position read at the peak.
    source: f64,
    /// Rising half-length: the measured gap closing at this grain's mark.
    left: f64,
    /// Falling half-length. Seeded from the period estimate and replaced
    /// by the measured gap once the successor mark exists.
    right: f64,
    /// Gain compensating window overlap at dense synthesis spacings.
    amp: f32,
    /// Mark this grain reads around.
    ordinal: u64,
    right_measured: bool,
}

const IDLE_GRAIN: Grain = Grain {
    center: 0.0,
    source: 0.0,
    left: 1.0,
    right: 1.0,
    amp: 0.0,
    ordinal: 0,
    right_measured: true,
};

/// Time-domain pitch shifter reading grains around epochs.
pub struct GrainSynthesizer {
    latency: usize,
    fallback_period: f32,
    /// Fractional ordinal into the epoch timeline.
    cursor: f64,
    /// Most recently scheduled grain; the next one is created as soon as
    /// this one's window start has been reached.
    newest: Grain,
    active: [Grain; MAX_ACTIVE_GRAINS],
    active_len: usize,
    primed: bool,
}

impl GrainSynthesizer {
    /// Creates a synthesizer delaying its output by `latency` samples and
    /// free-running at `fallback_period` when no epochs exist yet.
    pub fn new(latency: usize, fallback_period: f32) -> Self {
        Self {
            latency,
            fallback_period: fallback_period.max(1.0),
            cursor: 0.0,
            newest: IDLE_GRAIN,
            active: [IDLE_GRAIN; MAX_ACTIVE_GRAINS],
            active_len: 0,
            primed: false,
        }
    }

    /// Delay the path imposes on its input, in samples.
    #[inline]
    pub fn latency_samples(&self) -> usize {
        self.latency
    }

    /// Oldest epoch ordinal the synthesizer may still read; the tracker can
    /// drop everything before it.
    pub fn min_needed_ordinal(&self) -> u64 {
        let mut min = (self.cursor.max(0.0) as u64).saturating_sub(1);
        for grain in &self.active[..self.active_len] {
            min = min.min(grain.ordinal.saturating_sub(1));
        }
        min
    }

    /// Forgets all grain scheduling; the next tick re-anchors on whatever
    /// the epoch timeline then holds.
    pub fn reset(&mut self) {
        self.cursor = 0.0;
        self.newest = IDLE_GRAIN;
        self.active_len = 0;
        self.primed = false;
    }

    /// Produces the output sample for absolute input index `clock`.
    /// `history` must already contain that sample and `epochs` must be laid
    /// up to roughly the same point.
    pub fn tick(
        &mut self,
        clock: i64,
        history: &HistoryBuffer,
        epochs: &EpochTracker,
        pitch_ratio: f32,
        formant_ratio: f32,
    ) -> f32 {
        debug_assert!(pitch_ratio > 0.0 && formant_ratio > 0.0);
        if !self.primed && !self.prime(clock, epochs) {
            return 0.0;
        }

        let now = clock as f64;
        // Keep one grain scheduled beyond the newest window start so every
        // rising edge is covered from its first sample.
        while self.newest.center - self.newest.left <= now {
            let next = self.next_grain(epochs, pitch_ratio);
            self.newest = next;
            self.push_active(next);
        }

        let scale = formant_ratio as f64;
        let mut out = 0.0f32;
        let mut i = 0;
        while i < self.active_len {
            let offset = now - self.active[i].center;
            if offset > self.active[i].right {
                self.active_len -= 1;
                self.active[i] = self.active[self.active_len];
                continue;
            }
            if offset >= 0.0 && !self.active[i].right_measured {
                // The successor mark is laid by the time the falling half
                // begins; its measured gap replaces the seeded estimate.
                self.active[i].right_measured = true;
                if let Some(gap) = epochs.spacing_after(self.active[i].ordinal) {
                    self.active[i].right = (gap as f64).max(1.0);
                }
            }
            let grain = self.active[i];
            let window = grain_window(offset, grain.left, grain.right);
            if window > 0.0 {
                out += grain.amp * window * read_scaled(history, grain.source, offset, scale);
            }
            i += 1;
        }
        out
    }

    /// Anchors scheduling on the most recent mark whose grain is already
    /// due, so a path switch mid-stream catches up within a few grains and
    /// a fresh stream ramps in exactly as the delayed input does.
    fn prime(&mut self, clock: i64, epochs: &EpochTracker) -> bool {
        if epochs.is_empty() {
            return false;
        }
        let mut ordinal = epochs.next_ordinal() - 1;
        while ordinal > epochs.first_ordinal() {
            match epochs.get(ordinal) {
                Some(epoch) if epoch.position + self.latency as i64 <= clock => break,
                _ => ordinal -= 1,
            }
        }
        let anchor = match epochs.get(ordinal) {
            Some(epoch) => *epoch,
            None => return false,
        };
        let period = anchor.period.max(1.0) as f64;
        let grain = Grain {
            center: anchor.position as f64 + self.latency as f64,
            source: anchor.position as f64,
            left: period,
            right: period,
            amp: 1.0,
            ordinal,
            right_measured: false,
        };
        self.cursor = ordinal as f64;
        self.newest = grain;
        self.active_len = 0;
        self.push_active(grain);
        self.primed = true;
        true
    }

    /// Schedules the grain after `newest`: advance the analysis cursor by
    /// `1/ratio` epochs and the synthesis clock by one local period over
    /// `ratio`.
    fn next_grain(&mut self, epochs: &EpochTracker, pitch_ratio: f32) -> Grain {
        let ratio = pitch_ratio as f64;
        let prev = self.newest;
        self.cursor += 1.0 / ratio;

        let found = epochs
            .clamp_ordinal(self.cursor)
            .and_then(|ordinal| epochs.get(ordinal).map(|epoch| (ordinal, *epoch)));
        let (ordinal, epoch) = match found {
            Some(pair) => pair,
            None => {
                // Timeline emptied underneath us; free-run at the fallback
                // spacing so output continues (as silence or a held tail).
                let half = self.fallback_period as f64;
                let step = (half / ratio).max(1.0);
                return Grain {
                    center: prev.center + step,
                    source: prev.source + step,
                    left: half,
                    right: half,
                    amp: (step / half).min(1.0) as f32,
                    ordinal: prev.ordinal,
                    right_measured: true,
                };
            }
        };

        // Local period from where marks actually landed when the cursor
        // moved on; the stored estimate covers grain reuse and the
        // hold-last-epoch edge.
        let advanced = ordinal.saturating_sub(prev.ordinal);
        let moved = epoch.position as f64 - prev.source;
        let local_period = if advanced > 0 && moved >= 1.0 {
            moved / advanced as f64
        } else {
            epoch.period.max(1.0) as f64
        };

        let mut step = local_period / ratio;
        // Servo toward reading one latency behind the synthesis clock. On a
        // steady timeline at ratio 1 the error is zero and identity stays
        // exact.
        let err = (epoch.position as f64 + self.latency as f64) - (prev.center + step);
        step += (err * SYNC_GAIN).clamp(-step * MAX_SYNC_FRACTION, step * MAX_SYNC_FRACTION);
        let step = step.max(1.0);

        let left = match ordinal.checked_sub(1).and_then(|o| epochs.spacing_after(o)) {
            Some(gap) => (gap as f64).max(1.0),
            None => local_period,
        };

        Grain {
            center: prev.center + step,
            source: epoch.position as f64,
            left,
            right: epoch.period.max(1.0) as f64,
            amp: (step / left).min(1.0) as f32,
            ordinal,
            right_measured: false,
        }
    }

    fn push_active(&mut self, grain: Grain) {
        if self.active_len == MAX_ACTIVE_GRAINS {
            // Saturated only under pathological scheduling; replace the
            // grain closest to expiry.
            let mut oldest = 0;
            for i in 1..self.active_len {
                if self.active[i].center + self.active[i].right
                    < self.active[oldest].center + self.active[oldest].right
                {
                    oldest = i;
                }
            }
            self.active[oldest] = grain;
            return;
        }
        self.active[self.active_len] = grain;
        self.active_len += 1;
    }
}

/// Raised-cosine window value at `offset` samples from the grain center,
/// rising over `left` samples and falling over `right`.
#[inline]
fn grain_window(offset: f64, left: f64, right: f64) -> f32 {
    let half = if offset < 0.0 { left } else { right };
    let phase = offset / half;
    if phase <= -1.0 || phase >= 1.0 {
        0.0
    } else {
        (0.5 + 0.5 * (PI * phase).cos()) as f32
    }
}

/// Reads one grain tap: the sample `offset` away from the grain center on
/// the output clock, with the source offset scaled by the formant ratio.
/// Integer positions return the raw sample so unscaled reads stay exact.
#[inline]
fn read_scaled(history: &HistoryBuffer, source: f64, offset: f64, scale: f64) -> f32 {
    let position = source + offset * scale;
    let base = position.floor();
    let frac = (position - base) as f32;
    let index = base as i64;
    if frac == 0.0 {
        return history.get(index);
    }
    hermite(
        history.get(index - 1),
        history.get(index),
        history.get(index + 1),
        history.get(index + 2),
        frac,
    )
}
