pub mod envelope;
pub mod phase_vocoder;
pub mod psola;
pub mod selector;

pub use phase_vocoder::SpectralShifter;
pub use psola::GrainSynthesizer;
pub use selector::{classify, path_for_ratio, spectral_preferred, PathKind, RatioClass};
