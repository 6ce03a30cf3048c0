//! Error types for analyzer construction and device capture

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Analyzer step must be between 1 and {max} samples (got {step}); ideally less than a fourth of the FFT size")]
    InvalidStep { step: usize, max: usize },

    #[error("Sample rate must be a positive number of Hz (got {0})")]
    InvalidSampleRate(f64),

    #[error("Invalid analysis frequency range {min} Hz - {max} Hz")]
    InvalidFrequencyRange { min: f64, max: f64 },

    #[error("FFT processing failed: {0}")]
    Fft(#[from] realfft::FftError),

    // Device errors, raised by the capture adapter
    #[error("No audio input device found")]
    NoDevice,

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to get default config: {0}")]
    DefaultConfig(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
