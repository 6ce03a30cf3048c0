//! Real-time tone tracker
//!
//! Combines the sample ring, FFT engine, peak detector and harmonic
//! combination, and smooths the resulting tones from frame to frame.
//!
//! Construction yields two halves: [`AnalyzerInput`] goes to the audio
//! callback thread, [`Analyzer`] stays on the thread that calls
//! [`Analyzer::process`] and the queries.

use super::harmonics;
use super::tone::Tone;
use crate::audio::passthrough::{passthrough, Passthrough, PassthroughSender};
use crate::audio::ring_buffer::{RingBuffer, SampleConsumer, SampleProducer};
use crate::error::{AnalyzerError, Result};
use crate::spectrum::window::analysis_window;
use crate::spectrum::{FftEngine, PeakDetector};
use num_complex::Complex64;

pub const FFT_P: u32 = 10;
/// Analysis window size (samples)
pub const FFT_N: usize = 1 << FFT_P;
/// Twice the window leaves room for the sliding window and for processing delays
pub const BUF_N: usize = 2 * FFT_N;
/// About 4 ms at 48 kHz
pub const DEFAULT_STEP: usize = 200;

/// Default `find_tone` range: the singing range
pub const SINGING_MIN_FREQ: f64 = 65.0;
pub const SINGING_MAX_FREQ: f64 = 1000.0;

/// Old tones at or below this level (dB) are dropped instead of kept as ghosts
const GHOST_FLOOR_DB: f64 = -80.0;
const GHOST_DECAY_DB: f64 = 5.0;
const GHOST_STABLE_DECAY_DB: f64 = 0.1;
/// Weight of the previous stable level when a tone persists
const STABLE_SMOOTHING: f64 = 0.8;
/// Weight of the previous frequency when a tone persists
const FREQ_SMOOTHING: f64 = 0.5;

/// Tones this far below the loudest one (dB) are assumed to be harmonics
const FIND_DB_RANGE: f64 = 20.0;
/// Preferred singing frequency (Hz)
const FIND_CENTER_FREQ: f64 = 300.0;
/// Distance from the center (Hz) within which no penalty grows
const FIND_FLAT_DISTANCE: f64 = 180.0;
const FIND_CONTINUITY_BONUS: f64 = 10.0;

/// Analyzer configuration
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Input sample rate in Hz
    pub sample_rate: f64,

    /// New samples consumed per analysis frame (at most FFT_N)
    pub step: usize,

    /// Lowest frequency analysed (Hz)
    pub min_freq: f64,

    /// Highest frequency analysed (Hz)
    pub max_freq: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            step: DEFAULT_STEP,
            min_freq: 45.0,
            max_freq: 5000.0,
        }
    }
}

impl AnalyzerConfig {
    /// Check the configuration for logic errors
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 || self.step > FFT_N {
            return Err(AnalyzerError::InvalidStep {
                step: self.step,
                max: FFT_N,
            });
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(AnalyzerError::InvalidSampleRate(self.sample_rate));
        }
        if !(self.min_freq >= 0.0 && self.min_freq < self.max_freq) {
            return Err(AnalyzerError::InvalidFrequencyRange {
                min: self.min_freq,
                max: self.max_freq,
            });
        }
        Ok(())
    }
}

/// Capture half of an analyzer, fed from the audio callback
pub struct AnalyzerInput {
    samples: SampleProducer<BUF_N>,
    passthrough: PassthroughSender,
}

impl AnalyzerInput {
    /// Add mono samples (nominally -1..1)
    ///
    /// Lock-free and allocation-free. If `process` falls behind, the oldest
    /// unprocessed samples are discarded.
    pub fn input(&mut self, samples: &[f32]) {
        self.samples.insert(samples);
        self.passthrough.send(samples);
    }
}

/// Tone tracker for one input channel
pub struct Analyzer {
    config: AnalyzerConfig,
    id: String,
    samples: SampleConsumer<BUF_N>,
    passthrough: Option<Passthrough>,
    window: Vec<f64>,
    fft: FftEngine,
    peaks: PeakDetector,
    /// Scratch for the current frame
    frame: Vec<f32>,
    /// Peak power, decaying
    peak: f64,
    tones: Vec<Tone>,
    /// Frequency returned by the previous `find_tone`, 0 if none
    old_freq: f64,
}

impl Analyzer {
    /// Create an analyzer with the default frequency range
    ///
    /// # Arguments
    /// * `sample_rate` - Input sample rate in Hz
    /// * `id` - Opaque channel identifier
    /// * `step` - Samples consumed per frame, see [`DEFAULT_STEP`]
    ///
    /// # Panics
    /// If `step` is zero or larger than [`FFT_N`], or the rate is not positive
    pub fn new(sample_rate: f64, id: impl Into<String>, step: usize) -> (AnalyzerInput, Analyzer) {
        let config = AnalyzerConfig {
            sample_rate,
            step,
            ..AnalyzerConfig::default()
        };
        Self::try_new(config, id).unwrap_or_else(|e| panic!("Invalid analyzer configuration: {}", e))
    }

    /// Create an analyzer, reporting configuration errors
    pub fn try_new(config: AnalyzerConfig, id: impl Into<String>) -> Result<(AnalyzerInput, Analyzer)> {
        config.validate()?;
        let id = id.into();

        let (producer, consumer) = RingBuffer::<BUF_N>::new().split();
        let (sender, monitor) = passthrough(config.sample_rate);
        let peaks = PeakDetector::new(
            FFT_N,
            config.sample_rate,
            config.step,
            config.min_freq,
            config.max_freq,
        );

        log::debug!(
            "Analyzer '{}': {} Hz, step {}, bins {:?}",
            id,
            config.sample_rate,
            config.step,
            peaks.bin_range()
        );

        let input = AnalyzerInput {
            samples: producer,
            passthrough: sender,
        };
        let analyzer = Analyzer {
            config,
            id,
            samples: consumer,
            passthrough: Some(monitor),
            window: analysis_window(FFT_N),
            fft: FftEngine::new(FFT_N),
            peaks,
            frame: vec![0.0; FFT_N],
            peak: 0.0,
            tones: Vec::new(),
            old_freq: 0.0,
        };
        Ok((input, analyzer))
    }

    /// Analyse everything buffered so far
    ///
    /// Runs one frame per `step` samples while a full window is available.
    /// Does nothing if less than a window is buffered.
    pub fn process(&mut self) {
        loop {
            match self.calc_fft() {
                Ok(true) => self.calc_tones(),
                Ok(false) => break,
                Err(e) => {
                    log::error!("Analyzer '{}': {}", self.id, e);
                    break;
                }
            }
        }
    }

    /// Read one window, advance by `step`, and transform it
    fn calc_fft(&mut self) -> Result<bool> {
        if !self.samples.read(&mut self.frame) {
            return Ok(false);
        }
        let step = self.config.step;
        self.samples.pop(step);

        // Only the newest `step` samples are new; the rest is overlap
        for &s in &self.frame[FFT_N - step..] {
            let p = s as f64 * s as f64;
            if p > self.peak {
                self.peak = p;
            } else {
                self.peak *= 0.999;
            }
        }

        self.fft.process(&self.frame, &self.window)?;
        Ok(true)
    }

    fn calc_tones(&mut self) {
        let peaks = self.peaks.detect(self.fft.spectrum());
        let mut tones = harmonics::combine(peaks);
        // Keep the list free of tones that would compare equal
        tones.dedup_by(|later, kept| {
            if later == kept {
                if later.db > kept.db {
                    *kept = *later;
                }
                true
            } else {
                false
            }
        });
        let tones = self.merge_with_old(tones);
        for t in tones.iter().filter(|t| t.age == Tone::MINAGE) {
            log::debug!("Analyzer '{}': tone {}", self.id, t);
        }
        log::trace!("Analyzer '{}': {} tones", self.id, tones.len());
        self.tones = tones;
    }

    /// Merge this frame's tones (sorted) with the previous frame's
    ///
    /// Persisting tones are aged and smoothed; vanished tones fade out as
    /// ghosts until they drop below the floor.
    fn merge_with_old(&self, tones: Vec<Tone>) -> Vec<Tone> {
        let mut merged = Vec::with_capacity(tones.len() + self.tones.len());
        let mut fresh = tones.into_iter().peekable();
        for old in &self.tones {
            while let Some(t) = fresh.next_if(|t| t < old) {
                merged.push(t);
            }
            match fresh.peek_mut() {
                Some(t) if *t == *old => {
                    t.age = old.age + 1;
                    t.stabledb = STABLE_SMOOTHING * old.stabledb + (1.0 - STABLE_SMOOTHING) * t.db;
                    t.freq = FREQ_SMOOTHING * old.freq + (1.0 - FREQ_SMOOTHING) * t.freq;
                }
                _ if old.db > GHOST_FLOOR_DB => {
                    let mut ghost = *old;
                    ghost.db -= GHOST_DECAY_DB;
                    ghost.stabledb -= GHOST_STABLE_DECAY_DB;
                    merged.push(ghost);
                }
                _ => {}
            }
        }
        merged.extend(fresh);
        merged
    }

    /// All tracked tones, ascending by frequency
    pub fn tones(&self) -> &[Tone] {
        &self.tones
    }

    /// Best tone in the singing range, see [`Analyzer::find_tone_in`]
    pub fn find_tone(&mut self) -> Option<Tone> {
        self.find_tone_in(SINGING_MIN_FREQ, SINGING_MAX_FREQ)
    }

    /// Pick the tone most likely to be the sung note within a range
    ///
    /// Prefers loud, established tones around 300 Hz and the frequency picked
    /// by the previous call. Tones more than 20 dB below the loudest tone
    /// (anywhere in the spectrum) are ignored.
    pub fn find_tone_in(&mut self, min_freq: f64, max_freq: f64) -> Option<Tone> {
        let max_db = match self.tones.iter().max_by(|a, b| a.db_cmp(b)) {
            Some(loudest) => loudest.db,
            None => {
                self.old_freq = 0.0;
                return None;
            }
        };

        let mut best: Option<(Tone, f64)> = None;
        for t in &self.tones {
            if t.db < max_db - FIND_DB_RANGE || t.freq < min_freq || t.age < Tone::MINAGE {
                continue;
            }
            if t.freq > max_freq {
                break;
            }
            let distance = (t.freq - FIND_CENTER_FREQ).abs().max(FIND_FLAT_DISTANCE);
            let mut score = t.db - distance / 10.0;
            if t.matches(self.old_freq) {
                score += FIND_CONTINUITY_BONUS;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((*t, score));
            }
        }

        self.old_freq = best.map_or(0.0, |(t, _)| t.freq);
        best.map(|(t, _)| t)
    }

    /// Peak level in dB (0 = clipping, -inf on silence)
    pub fn peak(&self) -> f64 {
        10.0 * self.peak.log10()
    }

    /// Raw spectrum of the last frame (bins 0..=FFT_N/2)
    pub fn fft(&self) -> &[Complex64] {
        self.fft.spectrum()
    }

    /// Channel identifier given at construction
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Samples consumed per frame
    pub fn step(&self) -> usize {
        self.config.step
    }

    /// Samples waiting to be processed
    pub fn buffered(&self) -> usize {
        self.samples.size()
    }

    /// Hand over the monitoring output (available once)
    pub fn take_passthrough(&mut self) -> Option<Passthrough> {
        self.passthrough.take()
    }
}
