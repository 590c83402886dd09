//! Input-side analysis: fundamental-period estimation and the epoch timeline.

pub mod epoch;
pub mod pitch;

pub use epoch::{Epoch, EpochTracker};
pub use pitch::{PitchEstimate, PitchEstimator};
