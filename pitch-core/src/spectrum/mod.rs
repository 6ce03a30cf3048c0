//! Spectral front end: window, FFT and peak extraction

pub mod fft;
pub mod window;
pub mod peaks;

pub use fft::FftEngine;
pub use peaks::{Peak, PeakDetector};
