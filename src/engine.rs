//! Real-time pitch-shifting engine.
//!
//! [`PitchShifter`] owns every buffer and cursor the audio thread touches.
//! `prepare()` allocates, `process()` runs allocation-free and lock-free,
//! and the control thread talks to a running engine only through the atomic
//! parameter targets behind [`ParamHandle`].
//!
//! Internally the engine keeps one analysis front end (shared input history,
//! pitch estimator, epoch timeline) and one synthesis bank per quality mode,
//! each bank holding a spectral shifter and a grain synthesizer scheduled to
//! the same fixed latency. Exactly one path renders at a time; path and
//! quality changes warm the incoming path up, then cross the outputs over an
//! equal-power fade so the swap never clicks.

use std::sync::Arc;

use crate::analysis::epoch::EpochTracker;
use crate::analysis::pitch::{PitchEstimate, PitchEstimator};
use crate::core::history::HistoryBuffer;
use crate::core::smoothing::SmoothedParam;
use crate::core::types::{
    max_period_samples, min_period_samples, QualityMode, FALLBACK_PITCH_HZ, PATH_CROSSFADE_SECS,
    SMOOTHING_TIME_MS,
};
use crate::error::EngineError;
use crate::params::{self, ParamHandle, ParamId, ParamTargets};
use crate::safety;
use crate::shift::psola::GrainSynthesizer;
use crate::shift::selector::{self, PathKind};
use crate::shift::SpectralShifter;

/// Seconds between pitch-estimate refreshes. Epochs are laid continuously;
/// only the estimate they follow updates at this cadence.
const PITCH_REFRESH_SECS: f32 = 0.010;

/// One quality mode's synthesis state. Both paths are scheduled to the same
/// `latency`, so the engine can blend or swap them without realigning.
struct PathBank {
    spectral: SpectralShifter,
    grain: GrainSynthesizer,
    /// Extra delay bringing the spectral path up to the bank latency when
    /// the grain path's period reach exceeds the FFT size.
    align: AlignDelay,
    latency: usize,
}

impl PathBank {
    fn new(mode: QualityMode, sample_rate: f32) -> Self {
        let spectral = SpectralShifter::new(mode);
        let latency = spectral.latency_samples().max(max_period_samples(sample_rate));
        let fallback_period = sample_rate / FALLBACK_PITCH_HZ;
        Self {
            grain: GrainSynthesizer::new(latency, fallback_period),
            align: AlignDelay::new(latency - spectral.latency_samples()),
            spectral,
            latency,
        }
    }

    fn reset(&mut self) {
        self.spectral.reset();
        self.grain.reset();
        self.align.reset();
    }
}

/// Fixed-length sample delay; a zero-length line passes through.
struct AlignDelay {
    line: Vec<f32>,
    pos: usize,
}

impl AlignDelay {
    fn new(len: usize) -> Self {
        Self {
            line: vec![0.0; len],
            pos: 0,
        }
    }

    #[inline]
    fn tick(&mut self, sample: f32) -> f32 {
        if self.line.is_empty() {
            return sample;
        }
        let delayed = self.line[self.pos];
        self.line[self.pos] = sample;
        self.pos += 1;
        if self.pos == self.line.len() {
            self.pos = 0;
        }
        delayed
    }

    fn reset(&mut self) {
        self.line.fill(0.0);
        self.pos = 0;
    }
}

/// In-flight switch to a new quality mode and/or synthesis path.
#[derive(Debug, Clone, Copy)]
struct Transition {
    mode: QualityMode,
    path: PathKind,
    /// Samples the incoming path still needs before it carries signal.
    warmup_left: usize,
    fade_len: usize,
    fade_done: usize,
}

/// Streaming pitch-shifting engine for one audio channel.
pub struct PitchShifter {
    sample_rate: f32,
    max_block_size: usize,
    prepared: bool,
    targets: Arc<ParamTargets>,

    history: HistoryBuffer,
    estimator: PitchEstimator,
    estimate_frame: Vec<f32>,
    latest_estimate: PitchEstimate,
    refresh_interval: usize,
    refresh_countdown: usize,
    tracker: EpochTracker,

    banks: Vec<PathBank>,
    active_mode: QualityMode,
    active_path: PathKind,
    transition: Option<Transition>,

    /// Smoothed linear pitch ratio the synthesis paths consume.
    pitch: SmoothedParam,
    formant: SmoothedParam,
    mix: SmoothedParam,
}

#[inline]
fn bank_index(mode: QualityMode) -> usize {
    match mode {
        QualityMode::Live => 0,
        QualityMode::Standard => 1,
        QualityMode::High => 2,
    }
}

/// Renders one sample from the requested path of one bank.
#[inline]
fn tick_path(
    bank: &mut PathBank,
    path: PathKind,
    clock: i64,
    history: &HistoryBuffer,
    tracker: &EpochTracker,
    pitch_ratio: f32,
    formant_ratio: f32,
) -> f32 {
    match path {
        PathKind::Spectral => {
            let raw = bank.spectral.tick(history, pitch_ratio, formant_ratio);
            bank.align.tick(raw)
        }
        PathKind::TimeDomain => bank.grain.tick(clock, history, tracker, pitch_ratio, formant_ratio),
    }
}

impl PitchShifter {
    /// Creates an engine in the not-prepared state. Call
    /// [`prepare`](PitchShifter::prepare) before processing.
    pub fn new() -> Self {
        Self {
            sample_rate: 0.0,
            max_block_size: 0,
            prepared: false,
            targets: Arc::new(ParamTargets::default()),
            history: HistoryBuffer::with_capacity(8),
            estimator: PitchEstimator::new(44_100.0),
            estimate_frame: Vec::new(),
            latest_estimate: PitchEstimate::unvoiced(),
            refresh_interval: 1,
            refresh_countdown: 1,
            tracker: EpochTracker::new(4, 441.0),
            banks: Vec::new(),
            active_mode: QualityMode::default(),
            active_path: PathKind::TimeDomain,
            transition: None,
            pitch: SmoothedParam::new(1.0, SMOOTHING_TIME_MS, 44_100.0),
            formant: SmoothedParam::new(1.0, SMOOTHING_TIME_MS, 44_100.0),
            mix: SmoothedParam::new(1.0, SMOOTHING_TIME_MS, 44_100.0),
        }
    }

    /// Allocates every internal buffer for the given stream configuration.
    ///
    /// Must be called before [`process`](PitchShifter::process); may be
    /// called again to reconfigure. Rejects non-positive or non-finite
    /// sample rates and a zero block size without touching existing state.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) -> Result<(), EngineError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            return Err(EngineError::InvalidBlockSize(max_block_size));
        }
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;

        self.banks = QualityMode::ALL
            .iter()
            .map(|&mode| PathBank::new(mode, sample_rate))
            .collect();
        let max_latency = self
            .banks
            .iter()
            .map(|bank| bank.latency)
            .max()
            .unwrap_or(0);

        // History must cover the deepest read any path can make: one full
        // latency back, plus grain reach below that, plus an analysis frame.
        let max_period = max_period_samples(sample_rate);
        let history_len = max_latency + 4 * max_period + QualityMode::High.fft_size();
        self.history = HistoryBuffer::with_capacity(history_len);

        self.estimator = PitchEstimator::new(sample_rate);
        self.estimate_frame = vec![0.0; self.estimator.frame_len()];
        self.latest_estimate = PitchEstimate::unvoiced();
        self.refresh_interval = ((PITCH_REFRESH_SECS * sample_rate) as usize).max(1);
        self.refresh_countdown = self.refresh_interval;

        let epoch_capacity = (history_len / min_period_samples(sample_rate).max(1)).max(16);
        self.tracker = EpochTracker::new(epoch_capacity, sample_rate / FALLBACK_PITCH_HZ);

        self.pitch = SmoothedParam::new(1.0, SMOOTHING_TIME_MS, sample_rate);
        self.formant = SmoothedParam::new(1.0, SMOOTHING_TIME_MS, sample_rate);
        self.mix = SmoothedParam::new(1.0, SMOOTHING_TIME_MS, sample_rate);
        self.snap_to_targets();

        self.prepared = true;
        log::info!(
            "prepared: {} Hz, max block {}, quality {}, latency {} samples",
            sample_rate,
            max_block_size,
            self.active_mode.label(),
            self.latency_samples()
        );
        Ok(())
    }

    /// Returns the engine to a silent initial state without reallocating.
    ///
    /// Parameters keep their current targets; history, epochs, phase
    /// accumulators, and grain cursors are cleared. Idempotent.
    pub fn reset(&mut self) {
        if !self.prepared {
            return;
        }
        self.history.clear();
        self.tracker.reset();
        self.latest_estimate = PitchEstimate::unvoiced();
        self.refresh_countdown = self.refresh_interval;
        for bank in &mut self.banks {
            bank.reset();
        }
        self.snap_to_targets();
        log::debug!("reset to silent state");
    }

    /// Jumps smoothers and the path/quality selection directly onto the
    /// current parameter targets, with no glide or crossfade.
    fn snap_to_targets(&mut self) {
        let target_ratio = params::pitch_ratio(self.targets.get(ParamId::Pitch));
        self.pitch.jump_to(target_ratio);
        self.formant
            .jump_to(params::formant_ratio(self.targets.get(ParamId::Formant)));
        self.mix
            .jump_to(params::mix_amount(self.targets.get(ParamId::Mix)));
        self.active_mode = params::quality_mode(self.targets.get(ParamId::Quality));
        self.active_path = selector::path_for_ratio(target_ratio as f64);
        self.transition = None;
    }

    /// Fixed delay between input and output, in samples.
    ///
    /// Depends on sample rate and quality mode only; hosts should re-query
    /// after changing quality.
    pub fn latency_samples(&self) -> usize {
        if !self.prepared {
            return 0;
        }
        // While the incoming path is still warming up, the outgoing bank is
        // the only one on the air; its latency stays the honest answer until
        // the crossfade begins.
        let mode = match &self.transition {
            Some(t) if t.warmup_left == 0 => t.mode,
            _ => self.active_mode,
        };
        self.banks[bank_index(mode)].latency
    }

    /// The synthesis path currently rendering (the incoming one while a
    /// switch is in flight).
    #[inline]
    pub fn active_path(&self) -> PathKind {
        match &self.transition {
            Some(t) => t.path,
            None => self.active_path,
        }
    }

    /// The quality mode currently rendering (the incoming one while a
    /// switch is in flight).
    #[inline]
    pub fn active_quality(&self) -> QualityMode {
        match &self.transition {
            Some(t) => t.mode,
            None => self.active_mode,
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    #[inline]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Cloneable control-thread handle to the parameter targets.
    pub fn handle(&self) -> ParamHandle {
        ParamHandle::new(Arc::clone(&self.targets))
    }

    /// Stores one normalized parameter target. Rejects non-finite values.
    pub fn set_parameter(&mut self, id: ParamId, value: f32) -> Result<(), EngineError> {
        if !value.is_finite() {
            return Err(EngineError::InvalidParameterValue {
                index: id.index(),
                value,
            });
        }
        self.targets.set(id, value);
        Ok(())
    }

    /// Stores a batch of normalized parameter targets, validating each.
    /// On the first invalid value nothing further is applied.
    pub fn update_parameters(&mut self, values: &[(ParamId, f32)]) -> Result<(), EngineError> {
        for &(id, value) in values {
            self.set_parameter(id, value)?;
        }
        Ok(())
    }

    /// Transforms one block; `output` must be the same length as `input`.
    ///
    /// Never blocks, allocates, or errors: an unprepared engine or a length
    /// mismatch writes silence. Parameter targets are picked up once per
    /// call, then smoothed per sample.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        if !self.prepared || input.len() != output.len() {
            output.fill(0.0);
            return;
        }
        self.apply_control_targets();
        for (&x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.tick_sample(x);
        }
        self.trim_epochs();
    }

    /// Reads the atomic targets and re-evaluates path and quality choices.
    /// Runs at control rate (once per block), never per sample.
    fn apply_control_targets(&mut self) {
        let target_ratio = params::pitch_ratio(self.targets.get(ParamId::Pitch));
        self.pitch.set_target(target_ratio);
        self.formant
            .set_target(params::formant_ratio(self.targets.get(ParamId::Formant)));
        self.mix
            .set_target(params::mix_amount(self.targets.get(ParamId::Mix)));

        // Selection uses the target ratio, not the mid-glide value, so one
        // parameter change makes at most one decision.
        let desired_mode = params::quality_mode(self.targets.get(ParamId::Quality));
        let desired_path = selector::path_for_ratio(target_ratio as f64);
        let in_flight = self.transition.is_some();
        if !in_flight && (desired_mode != self.active_mode || desired_path != self.active_path) {
            self.begin_transition(desired_mode, desired_path);
        }
    }

    /// Starts a switch to `(mode, path)`: resets the incoming path's
    /// transient state and schedules its warm-up and the crossfade.
    fn begin_transition(&mut self, mode: QualityMode, path: PathKind) {
        let bank = &mut self.banks[bank_index(mode)];
        let warmup_left = match path {
            PathKind::Spectral => {
                bank.spectral.reset();
                bank.align.reset();
                // The overlap-add accumulator carries full signal once a
                // window's worth of hops has landed in it.
                bank.spectral.fft_size() + bank.spectral.hop_size()
            }
            PathKind::TimeDomain => {
                bank.grain.reset();
                0
            }
        };
        let fade_len = ((PATH_CROSSFADE_SECS * self.sample_rate) as usize).max(1);
        self.transition = Some(Transition {
            mode,
            path,
            warmup_left,
            fade_len,
            fade_done: 0,
        });
        log::debug!("switching to {} / {}", mode.label(), path.label());
    }

    fn tick_sample(&mut self, x: f32) -> f32 {
        self.history.push(x);
        let clock = self.history.head() - 1;

        self.refresh_countdown -= 1;
        if self.refresh_countdown == 0 {
            self.refresh_countdown = self.refresh_interval;
            self.history.copy_latest(&mut self.estimate_frame);
            self.latest_estimate = self.estimator.estimate(&self.estimate_frame);
        }

        let radius = self.tracker.snap_radius(&self.latest_estimate);
        while self.tracker.next_position() + radius <= clock {
            self.tracker.lay_epoch(&self.history, &self.latest_estimate);
        }

        let pitch_ratio = self.pitch.next();
        let formant_ratio = self.formant.next();
        let mix = self.mix.next();

        let (wet, dry) = self.render_paths(clock, pitch_ratio, formant_ratio);
        safety::scrub(mix * wet + (1.0 - mix) * dry)
    }

    /// Produces the wet sample and its latency-matched dry partner,
    /// advancing any in-flight transition by one sample.
    fn render_paths(&mut self, clock: i64, pitch_ratio: f32, formant_ratio: f32) -> (f32, f32) {
        let mut t = match self.transition.take() {
            None => {
                let bank = &mut self.banks[bank_index(self.active_mode)];
                let wet = tick_path(
                    bank,
                    self.active_path,
                    clock,
                    &self.history,
                    &self.tracker,
                    pitch_ratio,
                    formant_ratio,
                );
                let dry = self.history.get(clock - bank.latency as i64);
                return (wet, dry);
            }
            Some(t) => t,
        };

        let out_idx = bank_index(self.active_mode);
        let in_idx = bank_index(t.mode);
        let (outgoing, incoming, out_latency, in_latency) = if out_idx == in_idx {
            let bank = &mut self.banks[out_idx];
            let a = tick_path(
                bank,
                self.active_path,
                clock,
                &self.history,
                &self.tracker,
                pitch_ratio,
                formant_ratio,
            );
            let b = tick_path(
                bank,
                t.path,
                clock,
                &self.history,
                &self.tracker,
                pitch_ratio,
                formant_ratio,
            );
            (a, b, bank.latency, bank.latency)
        } else {
            let (out_bank, in_bank) = if out_idx < in_idx {
                let (lo, hi) = self.banks.split_at_mut(in_idx);
                (&mut lo[out_idx], &mut hi[0])
            } else {
                let (lo, hi) = self.banks.split_at_mut(out_idx);
                (&mut hi[0], &mut lo[in_idx])
            };
            let a = tick_path(
                out_bank,
                self.active_path,
                clock,
                &self.history,
                &self.tracker,
                pitch_ratio,
                formant_ratio,
            );
            let b = tick_path(
                in_bank,
                t.path,
                clock,
                &self.history,
                &self.tracker,
                pitch_ratio,
                formant_ratio,
            );
            (a, b, out_bank.latency, in_bank.latency)
        };

        if t.warmup_left > 0 {
            // Incoming path is filling its pipeline; keep the outgoing one
            // on the air untouched.
            t.warmup_left -= 1;
            let dry = self.history.get(clock - out_latency as i64);
            self.transition = Some(t);
            return (outgoing, dry);
        }

        t.fade_done += 1;
        let phase = t.fade_done as f32 / t.fade_len as f32;
        let angle = phase * std::f32::consts::FRAC_PI_2;
        let gain_out = angle.cos();
        let gain_in = angle.sin();
        let wet = gain_out * outgoing + gain_in * incoming;
        let dry = gain_out * self.history.get(clock - out_latency as i64)
            + gain_in * self.history.get(clock - in_latency as i64);

        if t.fade_done >= t.fade_len {
            self.active_mode = t.mode;
            self.active_path = t.path;
        } else {
            self.transition = Some(t);
        }
        (wet, dry)
    }

    /// Releases epochs no grain synthesizer can still read. The ring also
    /// self-trims under capacity pressure; this keeps the window tight.
    fn trim_epochs(&mut self) {
        let mut keep = u64::MAX;
        if self.active_path == PathKind::TimeDomain {
            let bank = &self.banks[bank_index(self.active_mode)];
            keep = keep.min(bank.grain.min_needed_ordinal());
        }
        if let Some(t) = &self.transition {
            if t.path == PathKind::TimeDomain {
                let bank = &self.banks[bank_index(t.mode)];
                keep = keep.min(bank.grain.min_needed_ordinal());
            }
        }
        if keep != u64::MAX {
            self.tracker.drop_before(keep);
        }
    }
}

impl Default for PitchShifter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44_100.0;
    const BLOCK: usize = 512;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    fn run_blocks(engine: &mut PitchShifter, input: &[f32]) -> Vec<f32> {
        let mut output = vec![0.0; input.len()];
        for (i, o) in input.chunks(BLOCK).zip(output.chunks_mut(BLOCK)) {
            engine.process(i, o);
        }
        output
    }

    #[test]
    fn test_prepare_rejects_bad_arguments() {
        let mut engine = PitchShifter::new();
        assert_eq!(
            engine.prepare(0.0, 512),
            Err(EngineError::InvalidSampleRate(0.0))
        );
        assert!(matches!(
            engine.prepare(f32::NAN, 512),
            Err(EngineError::InvalidSampleRate(_))
        ));
        assert_eq!(
            engine.prepare(44_100.0, 0),
            Err(EngineError::InvalidBlockSize(0))
        );
        assert!(!engine.is_prepared());

        assert_eq!(engine.prepare(44_100.0, 512), Ok(()));
        assert!(engine.is_prepared());
        assert!(engine.latency_samples() > 0);
    }

    #[test]
    fn test_unprepared_process_writes_silence() {
        let mut engine = PitchShifter::new();
        let input = [0.5_f32; 64];
        let mut output = [1.0_f32; 64];
        engine.process(&input, &mut output);
        assert!(output.iter().all(|&y| y == 0.0));
    }

    #[test]
    fn test_mismatched_lengths_write_silence() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        let input = [0.5_f32; 64];
        let mut output = [1.0_f32; 32];
        engine.process(&input, &mut output);
        assert!(output.iter().all(|&y| y == 0.0));
    }

    #[test]
    fn test_identity_passes_tone_delayed() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        let latency = engine.latency_samples();
        let input = sine(440.0, 44_100);
        let output = run_blocks(&mut engine, &input);

        for n in latency..input.len() {
            let expected = input[n - latency];
            assert!(
                (output[n] - expected).abs() < 1e-4,
                "sample {}: got {}, expected {}",
                n,
                output[n],
                expected
            );
        }
    }

    #[test]
    fn test_mix_zero_outputs_dry_delayed() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        engine.set_parameter(ParamId::Mix, 0.0).unwrap();
        engine.set_parameter(ParamId::Pitch, 0.75).unwrap();
        let latency = engine.latency_samples();
        let input = sine(330.0, 22_050);
        let output = run_blocks(&mut engine, &input);

        // Give the mix smoother a few blocks, then expect pure dry signal
        // even though pitch is shifted an octave up.
        for n in (latency + 4 * BLOCK)..input.len() {
            let expected = input[n - latency];
            assert!(
                (output[n] - expected).abs() < 1e-4,
                "sample {}: got {}, expected {}",
                n,
                output[n],
                expected
            );
        }
    }

    #[test]
    fn test_selector_switches_paths_with_crossfade() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        assert_eq!(engine.active_path(), PathKind::TimeDomain);

        // A tritone lands on the known-irrational list.
        engine.set_parameter(ParamId::Pitch, 0.625).unwrap();
        let input = sine(440.0, 16_384);
        run_blocks(&mut engine, &input);
        assert_eq!(engine.active_path(), PathKind::Spectral);

        // An octave is as simple as ratios get.
        engine.set_parameter(ParamId::Pitch, 0.75).unwrap();
        run_blocks(&mut engine, &input);
        assert_eq!(engine.active_path(), PathKind::TimeDomain);
    }

    #[test]
    fn test_quality_switch_changes_latency() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        let standard = engine.latency_samples();
        assert_eq!(standard, QualityMode::Standard.fft_size());

        engine.set_parameter(ParamId::Quality, 1.0).unwrap();
        let input = sine(440.0, 16_384);
        run_blocks(&mut engine, &input);
        assert_eq!(engine.active_quality(), QualityMode::High);
        assert_eq!(engine.latency_samples(), QualityMode::High.fft_size());
    }

    #[test]
    fn test_latency_reports_outgoing_bank_through_warmup() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        assert_eq!(engine.latency_samples(), QualityMode::Standard.fft_size());

        // Tritone forces the spectral path, High quality a different bank;
        // the incoming spectral shifter needs fft + hop samples of warmup.
        engine.set_parameter(ParamId::Quality, 1.0).unwrap();
        engine.set_parameter(ParamId::Pitch, 0.625).unwrap();
        let input = sine(440.0, BLOCK);
        let mut out = vec![0.0; BLOCK];
        engine.process(&input, &mut out);

        // One block is nowhere near that warmup: the outgoing bank is still
        // the only one audible and its latency must keep being reported.
        assert_eq!(engine.latency_samples(), QualityMode::Standard.fft_size());

        let long = sine(440.0, 16_384);
        run_blocks(&mut engine, &long);
        assert_eq!(engine.latency_samples(), QualityMode::High.fft_size());
    }

    #[test]
    fn test_parameter_validation() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        let err = engine.set_parameter(ParamId::Pitch, f32::NAN);
        assert!(matches!(
            err,
            Err(EngineError::InvalidParameterValue { index: 0, .. })
        ));
        assert!(engine
            .update_parameters(&[(ParamId::Mix, 0.5), (ParamId::Formant, f32::INFINITY)])
            .is_err());
        assert!(engine
            .update_parameters(&[(ParamId::Mix, 0.5), (ParamId::Formant, 0.6)])
            .is_ok());
    }

    #[test]
    fn test_reset_silences_and_is_idempotent() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        let input = sine(220.0, 8_192);
        run_blocks(&mut engine, &input);

        engine.reset();
        engine.reset();

        let zeros = vec![0.0_f32; 4_096];
        let output = run_blocks(&mut engine, &zeros);
        assert!(
            output.iter().all(|&y| y == 0.0),
            "silence in must be silence out after reset"
        );
    }

    #[test]
    fn test_handle_reaches_running_engine() {
        let mut engine = PitchShifter::new();
        engine.prepare(SAMPLE_RATE, BLOCK).unwrap();
        let handle = engine.handle();
        handle.set_pitch_semitones(12.0);

        let input = sine(440.0, 8_192);
        run_blocks(&mut engine, &input);
        // The engine saw the handle's value at the next block boundary.
        assert_eq!(engine.handle().get(ParamId::Pitch), 0.75);
    }
}
