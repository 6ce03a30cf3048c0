//! Spectral peak extraction
//!
//! Bin frequencies are refined from the phase advance between consecutive,
//! overlapping frames, then adjacent bins describing the same partial are
//! merged into one power-weighted peak.
//!
//! Window leakage bins also refine to a frequency, offset from the partial by
//! a multiple of the frame rate. The sidelobes fall off away from the main
//! lobe, so a peak is only kept if one of its bins is a local maximum of the
//! magnitude spectrum.

use num_complex::Complex64;
use std::f64::consts::TAU;

/// Bins quieter than this (dB) are ignored
pub const NOISE_FLOOR_DB: f64 = -80.0;
/// A refined frequency further than this many bins from the bin center is unreliable
const MAX_BIN_OFFSET: f64 = 0.7;
/// Candidates further than this (Hz) from the running centroid start a new peak
const PEAK_SPREAD_HZ: f64 = 10.0;

/// One spectral partial
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Power-weighted centroid frequency (Hz)
    pub freq: f64,
    /// Summed power of the bins (linear)
    pub power: f64,
}

/// A bin whose refined frequency was accepted
#[derive(Debug, Clone, Copy)]
struct Candidate {
    freq: f64,
    power: f64,
    /// At least as strong as both neighbouring bins
    local_max: bool,
}

/// Turns consecutive spectra into peak lists
///
/// Keeps the per-bin phase of the previous frame, so frames must be fed in
/// order and `step` samples apart.
pub struct PeakDetector {
    last_phase: Vec<f64>,
    freq_per_bin: f64,
    /// Frames per second
    step_rate: f64,
    /// Expected phase advance (cycles) per bin index between frames
    phase_step: f64,
    min_magnitude: f64,
    k_min: usize,
    k_max: usize,
    candidates: Vec<Candidate>,
}

impl PeakDetector {
    /// # Arguments
    /// * `fft_size` - FFT size the spectra come from
    /// * `rate` - Sample rate in Hz
    /// * `step` - Samples between consecutive frames
    /// * `min_freq`, `max_freq` - Analysed band in Hz
    pub fn new(fft_size: usize, rate: f64, step: usize, min_freq: f64, max_freq: f64) -> Self {
        let freq_per_bin = rate / fft_size as f64;
        let k_min = ((min_freq / freq_per_bin) as usize).max(1);
        let k_max = ((max_freq / freq_per_bin) as usize).min(fft_size / 2);
        Self {
            last_phase: vec![0.0; fft_size / 2 + 1],
            freq_per_bin,
            step_rate: rate / step as f64,
            phase_step: step as f64 / fft_size as f64,
            min_magnitude: 10f64.powf(NOISE_FLOOR_DB / 20.0),
            k_min,
            k_max,
            candidates: Vec::with_capacity(k_max + 1),
        }
    }

    /// Analysed bin range (inclusive)
    pub fn bin_range(&self) -> (usize, usize) {
        (self.k_min, self.k_max)
    }

    pub fn freq_per_bin(&self) -> f64 {
        self.freq_per_bin
    }

    /// Extract the peaks of one frame's spectrum (bins 0..=N/2)
    pub fn detect(&mut self, spectrum: &[Complex64]) -> Vec<Peak> {
        self.refine_bins(spectrum);
        self.group_peaks()
    }

    fn refine_bins(&mut self, spectrum: &[Complex64]) {
        self.candidates.clear();
        let k_max = self.k_max.min(spectrum.len().saturating_sub(1));
        for k in self.k_min..=k_max {
            let magnitude = spectrum[k].norm();
            let below = spectrum[k - 1].norm();
            let above = spectrum.get(k + 1).map_or(0.0, |c| c.norm());
            let phase = spectrum[k].arg() / TAU;
            let delta = phase - self.last_phase[k];
            self.last_phase[k] = phase;
            // Whole cycles are lost to wrapping; take the count closest to the bin center
            let cycles = (k as f64 * self.phase_step - delta).round() + delta;
            let freq = self.step_rate * cycles;
            // NaN fails both comparisons
            if magnitude > self.min_magnitude
                && (freq / self.freq_per_bin - k as f64).abs() < MAX_BIN_OFFSET
            {
                self.candidates.push(Candidate {
                    freq,
                    power: magnitude * magnitude,
                    local_max: magnitude >= below && magnitude >= above,
                });
            }
        }
    }

    fn group_peaks(&mut self) -> Vec<Peak> {
        self.candidates.sort_by(|a, b| a.freq.total_cmp(&b.freq));
        let mut peaks = Vec::new();
        let mut weighted = 0.0;
        let mut power = 0.0;
        let mut local_max = false;
        for c in &self.candidates {
            if power > 0.0 && (c.freq - weighted / power).abs() > PEAK_SPREAD_HZ {
                if local_max {
                    self.close_peak(weighted, power, &mut peaks);
                }
                weighted = 0.0;
                power = 0.0;
                local_max = false;
            }
            weighted += c.freq * c.power;
            power += c.power;
            local_max |= c.local_max;
        }
        if power > 0.0 && local_max {
            self.close_peak(weighted, power, &mut peaks);
        }
        peaks
    }

    fn close_peak(&self, weighted: f64, power: f64, peaks: &mut Vec<Peak>) {
        let freq = weighted / power;
        let bin = freq / self.freq_per_bin;
        if bin >= self.k_min as f64 && bin <= self.k_max as f64 {
            peaks.push(Peak { freq, power });
        }
    }
}
