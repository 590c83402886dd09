//! Synthesis-path selection from numerical properties of the pitch ratio.
//!
//! Grain synthesis is transparent when consecutive grains realign after a few
//! periods, which happens exactly for low-denominator rational ratios. Ratios
//! sitting near, but not on, a simple rational drift slowly against the epoch
//! grid and beat audibly; famous irrational intervals (the tritone's sqrt 2
//! above all) never realign at all. Those cases go to the spectral path.
//! Classification runs at control rate only, never per sample.

/// Tolerance for treating a ratio as a low-denominator rational.
const RATIONAL_TOLERANCE: f64 = 1e-3;

/// Largest numerator and denominator still counted as a simple rational.
const MAX_SIMPLE_TERM: u32 = 4;

/// Tolerance for matching one of the known problematic irrational intervals.
const IRRATIONAL_TOLERANCE: f64 = 1e-2;

/// A continued-fraction term above this flags the ratio as drifting slowly
/// against a nearby rational.
const LARGE_CF_TERM: u64 = 20;

/// Bound on continued-fraction expansion length.
const MAX_CF_TERMS: usize = 16;

/// Intervals with audible grain-alignment beating under time-domain
/// synthesis: the tritone (sqrt 2) both ways, the equal-tempered semitone
/// both ways, and the golden ratio both ways.
const IRRATIONAL_INTERVALS: [f64; 6] = [
    std::f64::consts::SQRT_2,
    std::f64::consts::FRAC_1_SQRT_2,
    1.0594630943592953,
    0.9438743126816935,
    1.618033988749895,
    0.6180339887498949,
];

/// Synthesis path chosen for a pitch ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Epoch-synchronous grain synthesis.
    TimeDomain,
    /// Phase-vocoder synthesis.
    Spectral,
}

impl PathKind {
    /// Human-readable path name for diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            PathKind::TimeDomain => "time-domain",
            PathKind::Spectral => "spectral",
        }
    }
}

/// Numerical classification of a pitch ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioClass {
    /// Within tolerance of `numerator / denominator`, both terms small.
    SimpleRational { numerator: u32, denominator: u32 },
    /// Within tolerance of a known problematic irrational interval.
    KnownIrrational,
    /// Continued-fraction expansion contains a large term: the ratio hugs a
    /// rational it never quite reaches, so grain alignment beats slowly.
    NearRational,
    /// None of the above; alignment drift stays fast and unobtrusive.
    Compound,
}

impl RatioClass {
    /// The synthesis path this class routes to.
    #[inline]
    pub fn path(self) -> PathKind {
        match self {
            RatioClass::SimpleRational { .. } | RatioClass::Compound => PathKind::TimeDomain,
            RatioClass::KnownIrrational | RatioClass::NearRational => PathKind::Spectral,
        }
    }
}

/// Classifies a pitch ratio. Non-finite or non-positive input falls back to
/// unity (the engine clamps ratios well before this point).
pub fn classify(ratio: f64) -> RatioClass {
    let ratio = if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    };

    if let Some((numerator, denominator)) = simple_rational(ratio) {
        return RatioClass::SimpleRational {
            numerator,
            denominator,
        };
    }
    if IRRATIONAL_INTERVALS
        .iter()
        .any(|&interval| (ratio - interval).abs() < IRRATIONAL_TOLERANCE)
    {
        return RatioClass::KnownIrrational;
    }
    if has_large_cf_term(ratio) {
        return RatioClass::NearRational;
    }
    RatioClass::Compound
}

/// The synthesis path for a ratio; shorthand over [`classify`].
#[inline]
pub fn path_for_ratio(ratio: f64) -> PathKind {
    classify(ratio).path()
}

/// True when the spectral path should synthesize this ratio.
#[inline]
pub fn spectral_preferred(ratio: f64) -> bool {
    path_for_ratio(ratio) == PathKind::Spectral
}

/// Smallest-denominator rational within tolerance, with both terms bounded.
fn simple_rational(ratio: f64) -> Option<(u32, u32)> {
    for denominator in 1..=MAX_SIMPLE_TERM {
        let numerator = (ratio * denominator as f64).round();
        if numerator < 1.0 || numerator > MAX_SIMPLE_TERM as f64 {
            continue;
        }
        if (ratio - numerator / denominator as f64).abs() < RATIONAL_TOLERANCE {
            return Some((numerator as u32, denominator));
        }
    }
    None
}

/// Expands the continued fraction of `ratio` until a convergent lands within
/// the rational tolerance, reporting whether a large term showed up first.
fn has_large_cf_term(ratio: f64) -> bool {
    let mut x = ratio;
    // Convergent recurrence seeds: h(-2)/k(-2) = 0/1, h(-1)/k(-1) = 1/0.
    let (mut h_prev2, mut k_prev2) = (0u64, 1u64);
    let (mut h_prev1, mut k_prev1) = (1u64, 0u64);

    for _ in 0..MAX_CF_TERMS {
        let floor = x.floor();
        if !(0.0..=1e12).contains(&floor) {
            return true;
        }
        let term = floor as u64;
        if term > LARGE_CF_TERM {
            return true;
        }

        let h = term.saturating_mul(h_prev1).saturating_add(h_prev2);
        let k = term.saturating_mul(k_prev1).saturating_add(k_prev2);
        if k > 0 && (ratio - h as f64 / k as f64).abs() < RATIONAL_TOLERANCE {
            return false;
        }

        let frac = x - floor;
        if frac < 1e-9 {
            // Terminated as an exact rational without any large term.
            return false;
        }
        x = 1.0 / frac;
        h_prev2 = h_prev1;
        k_prev2 = k_prev1;
        h_prev1 = h;
        k_prev1 = k;
    }
    false
}
