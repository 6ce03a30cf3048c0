//! Microphone passthrough (monitoring)
//!
//! Captured samples are forwarded to the playback thread through a lock-free
//! SPSC queue and mixed into the output at the playback rate. The playback
//! clock never matches the capture clock exactly, so the resampling factor
//! slowly adapts to keep a small backlog buffered.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Samples buffered between capture and playback
pub const PASSTHROUGH_CAPACITY: usize = 4096;

/// Lanczos kernel size
const LANCZOS_A: usize = 2;
const GAIN: f64 = 5.0;
/// Backlog the adaptive resampler steers towards
const TARGET_BACKLOG: usize = 700;
/// Backlog above which the queue is flushed down to the target
const MAX_BACKLOG: usize = 3000;

/// Create a connected sender/receiver pair for audio captured at `input_rate`
pub fn passthrough(input_rate: f64) -> (PassthroughSender, Passthrough) {
    let rb = HeapRb::<f32>::new(PASSTHROUGH_CAPACITY);
    let (producer, consumer) = rb.split();
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        PassthroughSender {
            producer,
            dropped: Arc::clone(&dropped),
        },
        Passthrough {
            consumer,
            dropped,
            input_rate,
            resample_factor: 1.0,
            resample_pos: 0.0,
            scratch: Vec::with_capacity(PASSTHROUGH_CAPACITY),
        },
    )
}

/// Capture side of the passthrough
pub struct PassthroughSender {
    producer: HeapProducer<f32>,
    /// Samples that did not fit, reported by the playback side
    dropped: Arc<AtomicUsize>,
}

impl PassthroughSender {
    /// Queue samples for playback; samples that do not fit are dropped
    ///
    /// Returns the number of samples queued. Runs on the audio callback, so
    /// drops are only counted here and logged by [`Passthrough::output`].
    pub fn send(&mut self, samples: &[f32]) -> usize {
        let sent = self.producer.push_slice(samples);
        if sent < samples.len() {
            self.dropped.fetch_add(samples.len() - sent, Ordering::Relaxed);
        }
        sent
    }
}

/// Playback side of the passthrough
pub struct Passthrough {
    consumer: HeapConsumer<f32>,
    dropped: Arc<AtomicUsize>,
    input_rate: f64,
    resample_factor: f64,
    /// Fractional read position into the queued samples
    resample_pos: f64,
    scratch: Vec<f32>,
}

impl Passthrough {
    /// Mix queued audio into an interleaved stereo buffer
    ///
    /// # Arguments
    /// * `out` - Interleaved stereo output, added to (not overwritten)
    /// * `rate` - Output sample rate in Hz
    pub fn output(&mut self, out: &mut [f32], rate: f64) {
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            log::warn!("Passthrough queue full, {} samples dropped", dropped);
        }

        let frames = out.len() / 2;
        if frames == 0 {
            return;
        }
        let backlog = self.consumer.len();
        let step = self.resample_factor * self.input_rate / rate;
        let needed = (step * frames as f64) as usize + 2 * LANCZOS_A + 5 + 4;

        // Missing input plays back as silence
        self.scratch.clear();
        self.scratch
            .extend(self.consumer.iter().take(needed).copied());
        self.scratch.resize(needed, 0.0);

        for frame in out.chunks_exact_mut(2) {
            let k = self.resample_pos as usize;
            let x = self.resample_pos - k as f64;
            let mut s = 0.0;
            for j in 0..=2 * LANCZOS_A {
                let sample = self.scratch.get(k + j).copied().unwrap_or(0.0);
                s += sample as f64 * lanczos(x - j as f64 + LANCZOS_A as f64);
            }
            let s = (s * GAIN) as f32;
            frame[0] += s;
            frame[1] += s;
            self.resample_pos += step;
        }

        let consumed = self.resample_pos as usize;
        self.resample_pos -= consumed as f64;

        if backlog > MAX_BACKLOG {
            log::warn!("Passthrough backlog of {} samples flushed", backlog);
            self.consumer.skip(backlog - TARGET_BACKLOG);
            self.resample_factor = 1.0;
        } else {
            self.consumer.skip(consumed);
            let target = if backlog > TARGET_BACKLOG { 1.02 } else { 0.98 };
            self.resample_factor = 0.99 * self.resample_factor + 0.01 * target;
        }
    }

    /// Samples queued and not yet played
    pub fn backlog(&self) -> usize {
        self.consumer.len()
    }

    /// Samples dropped on a full queue since the last `output` call
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn resample_factor(&self) -> f64 {
        self.resample_factor
    }
}

/// Normalized sinc
fn sinc(x: f64) -> f64 {
    let x = PI * x;
    if x.abs() < 1e-10 {
        1.0
    } else {
        x.sin() / x
    }
}

fn lanczos(x: f64) -> f64 {
    let a = LANCZOS_A as f64;
    if x.abs() < a {
        sinc(x) * sinc(x / a)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanczos_kernel() {
        assert!((lanczos(0.0) - 1.0).abs() < 1e-12);
        assert!(lanczos(1.0).abs() < 1e-12);
        assert_eq!(lanczos(2.0), 0.0);
        assert_eq!(lanczos(-2.5), 0.0);
    }

    #[test]
    fn test_silence_without_input() {
        let (_sender, mut monitor) = passthrough(48000.0);
        let mut out = vec![0.0f32; 512];
        monitor.output(&mut out, 48000.0);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mixes_into_output() {
        let (mut sender, mut monitor) = passthrough(48000.0);
        assert_eq!(sender.send(&[0.1; 2000]), 2000);

        let mut out = vec![0.25f32; 512];
        monitor.output(&mut out, 48000.0);

        // Unity resampling at integer positions reproduces the input, times the gain
        for s in &out {
            assert!((s - 0.75).abs() < 1e-4, "got {}", s);
        }
        assert_eq!(monitor.backlog(), 2000 - 256);
    }

    #[test]
    fn test_resample_factor_tracks_backlog() {
        let (mut sender, mut monitor) = passthrough(48000.0);
        sender.send(&[0.0; 2000]);
        let mut out = vec![0.0f32; 64];
        monitor.output(&mut out, 48000.0);
        // Backlog above target speeds playback up
        assert!(monitor.resample_factor() > 1.0);

        let (_sender, mut idle) = passthrough(48000.0);
        idle.output(&mut out, 48000.0);
        assert!(idle.resample_factor() < 1.0);
    }

    #[test]
    fn test_large_backlog_is_flushed() {
        let (mut sender, mut monitor) = passthrough(44100.0);
        sender.send(&[0.0; 4000]);
        let mut out = vec![0.0f32; 32];
        monitor.output(&mut out, 48000.0);
        assert_eq!(monitor.backlog(), TARGET_BACKLOG);
        assert_eq!(monitor.resample_factor(), 1.0);
    }

    #[test]
    fn test_overfull_queue_drops_excess() {
        let (mut sender, monitor) = passthrough(48000.0);
        let sent = sender.send(&[0.0; PASSTHROUGH_CAPACITY + 100]);
        assert_eq!(sent, PASSTHROUGH_CAPACITY);
        assert_eq!(monitor.backlog(), PASSTHROUGH_CAPACITY);
    }

    #[test]
    fn test_drops_are_counted_until_output() {
        let (mut sender, mut monitor) = passthrough(48000.0);
        sender.send(&[0.0; PASSTHROUGH_CAPACITY - 10]);
        assert_eq!(monitor.dropped(), 0);

        sender.send(&[0.0; 30]);
        sender.send(&[0.0; 5]);
        assert_eq!(monitor.dropped(), 25);

        let mut out = vec![0.0f32; 64];
        monitor.output(&mut out, 48000.0);
        assert_eq!(monitor.dropped(), 0);
    }
}
