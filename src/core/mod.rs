//! Core types, buffers, windows, and smoothing utilities.

pub mod history;
pub mod resample;
pub mod smoothing;
pub mod types;
pub mod window;

pub use history::HistoryBuffer;
pub use smoothing::SmoothedParam;
pub use types::*;
pub use window::{cola_weight, hann_window};
