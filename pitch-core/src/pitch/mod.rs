//! Tone detection and tracking

pub mod analyzer;
pub mod harmonics;
pub mod tone;

pub use analyzer::{Analyzer, AnalyzerConfig, AnalyzerInput, FFT_N};
pub use tone::Tone;
