//! Pitch Tracker - Real-Time Tone Detection Core
//!
//! Turns a stream of microphone samples into a stable set of tones
//! (frequency, level, persistence) for singing games and tuners.

pub mod audio;
pub mod error;
pub mod pitch;
pub mod spectrum;

pub use error::AnalyzerError;
pub use pitch::{Analyzer, AnalyzerConfig, AnalyzerInput, Tone};
