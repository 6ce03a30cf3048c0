//! Harmonic combination: explains the peak list as a few fundamentals
//!
//! Greedy: the fundamental that accounts for the most peak power is taken
//! first, its harmonics are removed from the pool, and the search repeats.
//!
//! Only peaks within 30 dB of the loudest remaining peak propose fundamentals.
//! Weaker peaks still count towards a fundamental's score, but a leakage
//! residue at half a partial's frequency must not claim that partial as its
//! second harmonic.

use super::tone::Tone;
use crate::spectrum::Peak;

/// Divisors tried when guessing which harmonic a peak is
const MAX_DIVISOR: usize = 5;
/// Lowest fundamental considered (Hz)
const MIN_FUNDAMENTAL: f64 = 60.0;
/// Relative error allowed between a harmonic and its implied fundamental
const HARMONIC_TOLERANCE: f64 = 0.05;
/// Tones quieter than this (dB) are dropped
const MIN_TONE_DB: f64 = -40.0;
/// Peaks further below the loudest one (dB) may not propose a fundamental
const PROPOSER_RANGE_DB: f64 = 30.0;

/// Harmonic number of `peak` relative to `fundamental`, if it is a harmonic
fn harmonic_number(peak: &Peak, fundamental: f64) -> Option<f64> {
    let n = (peak.freq / fundamental).round();
    if n >= 1.0 && (peak.freq / n / fundamental - 1.0).abs() < HARMONIC_TOLERANCE {
        Some(n)
    } else {
        None
    }
}

/// Best (fundamental, score) explaining the peaks, if any candidate scores
fn best_fundamental(peaks: &[Peak]) -> Option<(f64, f64)> {
    let loudest = peaks.iter().map(|p| p.power).fold(0.0, f64::max);
    let min_power = loudest * 10f64.powf(-PROPOSER_RANGE_DB / 10.0);
    let mut best: Option<(f64, f64)> = None;
    for p in peaks.iter().filter(|p| p.power >= min_power) {
        for den in 1..=MAX_DIVISOR {
            let freq = p.freq / den as f64;
            if freq < MIN_FUNDAMENTAL {
                break;
            }
            let score: f64 = peaks
                .iter()
                .filter(|p2| harmonic_number(p2, freq).is_some())
                .map(|p2| p2.power)
                .sum::<f64>()
                / (den as f64).sqrt();
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((freq, score));
            }
        }
    }
    best
}

/// Combine peaks into candidate tones, sorted by frequency
///
/// Consumes the peak list. Each returned tone is new (age 0).
pub fn combine(mut peaks: Vec<Peak>) -> Vec<Tone> {
    let mut tones = Vec::new();
    while let Some((fundamental, _)) = best_fundamental(&peaks) {
        let mut weighted = 0.0;
        let mut power = 0.0;
        peaks.retain(|p| match harmonic_number(p, fundamental) {
            Some(n) => {
                weighted += p.freq / n * p.power;
                power += p.power;
                false
            }
            None => true,
        });
        let db = 10.0 * power.log10();
        if db >= MIN_TONE_DB {
            tones.push(Tone::new(weighted / power, db));
        }
    }
    tones.sort_by(|a, b| a.freq.total_cmp(&b.freq));
    tones
}
