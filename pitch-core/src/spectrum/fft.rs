//! FFT engine using realfft for real-valued signals
//!
//! Fixed-size, power-of-two transform applied to one windowed analysis frame.

use crate::error::Result;
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// FFT engine for windowed real-valued frames
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable input buffer
    input_buffer: Vec<f64>,

    /// Reusable output buffer (complex spectrum)
    output_buffer: Vec<Complex64>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Panics
    /// If `fft_size` is not a power of two
    pub fn new(fft_size: usize) -> Self {
        assert!(
            fft_size.is_power_of_two(),
            "FFT size must be a power of two (got {})",
            fft_size
        );
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let input_buffer = r2c.make_input_vec();
        let output_buffer = r2c.make_output_vec();

        Self {
            fft_size,
            r2c,
            input_buffer,
            output_buffer,
        }
    }

    /// Window a frame and transform it
    ///
    /// # Arguments
    /// * `frame` - Exactly `fft_size` samples
    /// * `window` - Window coefficients, `fft_size` long
    ///
    /// # Returns
    /// Bins 0..=fft_size/2 (DC through Nyquist)
    pub fn process(&mut self, frame: &[f32], window: &[f64]) -> Result<&[Complex64]> {
        for ((dst, &s), &w) in self.input_buffer.iter_mut().zip(frame).zip(window) {
            *dst = s as f64 * w;
        }
        self.r2c
            .process(&mut self.input_buffer, &mut self.output_buffer)?;
        Ok(&self.output_buffer)
    }

    /// Last computed spectrum
    pub fn spectrum(&self) -> &[Complex64] {
        &self.output_buffer
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Get number of frequency bins (fft_size/2 + 1 for real FFT)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}
