//! Analysis window for the pitch FFT
//!
//! The window carries the FFT normalization so that squared bin magnitudes
//! read directly as signal power.

use std::f64::consts::PI;

/// Hamming window: w[n] = 0.53836 - 0.46164*cos(2πn/(M-1))
///
/// Uses the optimal (equiripple) coefficients rather than the rounded 0.54/0.46.
pub fn hamming(length: usize) -> Vec<f64> {
    let m = length as f64;
    (0..length)
        .map(|n| {
            let angle = 2.0 * PI * n as f64 / (m - 1.0);
            0.53836 - 0.46164 * angle.cos()
        })
        .collect()
}

/// Power-normalized Hamming window for an FFT of size `length`
///
/// Scaled to unit RMS (constant-amplitude input keeps its power after
/// windowing) and by `sqrt(2)/N`, so the squared magnitudes of one partial's
/// bins over the positive half spectrum add up to that partial's mean power.
/// A full-scale sine thus reads -3 dB.
pub fn analysis_window(length: usize) -> Vec<f64> {
    let mut window = hamming(length);
    let sum_sq: f64 = window.iter().map(|&w| w * w).sum();
    let rms = (sum_sq / length as f64).sqrt();
    let scale = std::f64::consts::SQRT_2 / length as f64 / rms;
    for w in window.iter_mut() {
        *w *= scale;
    }
    window
}
