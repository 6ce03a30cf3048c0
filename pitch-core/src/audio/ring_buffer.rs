//! Fixed-capacity sample ring shared between the capture and analysis threads
//!
//! Unlike a plain SPSC queue, writing past the unread region silently drops
//! the oldest samples: the analyzer only cares about the most recent signal.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Circular `f32` buffer holding up to `N` unread samples
///
/// Samples are stored as their bit patterns in atomics so that a producer
/// overwriting old data while the consumer reads it is well-defined (the
/// consumer just sees a mix of old and new samples).
pub struct RingBuffer<const N: usize> {
    /// `N + 1` slots; `read == write` means empty
    slots: Box<[AtomicU32]>,
    read: AtomicUsize,
    write: AtomicUsize,
}

impl<const N: usize> RingBuffer<N> {
    /// Number of samples the buffer can hold
    pub const CAPACITY: usize = N;

    /// Create an empty buffer
    pub fn new() -> Self {
        let slots = (0..N + 1).map(|_| AtomicU32::new(0)).collect();
        Self {
            slots,
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    fn modulo(idx: usize) -> usize {
        idx % (N + 1)
    }

    /// Append samples, discarding the oldest unread data on overflow
    pub fn insert(&self, samples: &[f32]) {
        let r = self.read.load(Ordering::Acquire);
        let mut w = self.write.load(Ordering::Relaxed);
        let mut overflow = false;
        for &s in samples {
            self.slots[w].store(s.to_bits(), Ordering::Relaxed);
            w = Self::modulo(w + 1);
            if w == r {
                overflow = true;
            }
        }
        self.write.store(w, Ordering::Release);
        if overflow {
            self.read.store(Self::modulo(w + 1), Ordering::Release);
        }
    }

    /// Copy `dst.len()` samples from the read position without consuming them
    ///
    /// Returns false and leaves `dst` untouched if not enough data is buffered.
    pub fn read(&self, dst: &mut [f32]) -> bool {
        if self.size() < dst.len() {
            return false;
        }
        let r = self.read.load(Ordering::Acquire);
        for (i, out) in dst.iter_mut().enumerate() {
            *out = f32::from_bits(self.slots[Self::modulo(r + i)].load(Ordering::Relaxed));
        }
        true
    }

    /// Consume `n` samples, or everything buffered if fewer are available
    pub fn pop(&self, n: usize) {
        let n = n.min(self.size());
        let r = self.read.load(Ordering::Acquire);
        self.read.store(Self::modulo(r + n), Ordering::Release);
    }

    /// Number of unread samples
    pub fn size(&self) -> usize {
        let w = self.write.load(Ordering::Acquire);
        let r = self.read.load(Ordering::Acquire);
        Self::modulo(w + N + 1 - r)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (SampleProducer<N>, SampleConsumer<N>) {
        let shared = Arc::new(self);
        (
            SampleProducer {
                ring: Arc::clone(&shared),
            },
            SampleConsumer { ring: shared },
        )
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing end, owned by the capture callback
pub struct SampleProducer<const N: usize> {
    ring: Arc<RingBuffer<N>>,
}

impl<const N: usize> SampleProducer<N> {
    /// Append samples (never blocks, never allocates)
    pub fn insert(&mut self, samples: &[f32]) {
        self.ring.insert(samples);
    }

    pub fn capacity(&self) -> usize {
        N
    }
}

/// Reading end, owned by the analysis thread
pub struct SampleConsumer<const N: usize> {
    ring: Arc<RingBuffer<N>>,
}

impl<const N: usize> SampleConsumer<N> {
    /// Peek at the oldest `dst.len()` samples, see [`RingBuffer::read`]
    pub fn read(&self, dst: &mut [f32]) -> bool {
        self.ring.read(dst)
    }

    /// Consume `n` samples
    pub fn pop(&mut self, n: usize) {
        self.ring.pop(n);
    }

    pub fn size(&self) -> usize {
        self.ring.size()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let rb = RingBuffer::<16>::new();
        assert_eq!(rb.size(), 0);
        assert_eq!(rb.capacity(), 16);
        assert_eq!(RingBuffer::<16>::CAPACITY, 16);
    }

    #[test]
    fn test_insert_accumulates() {
        let rb = RingBuffer::<16>::new();
        let data = [1.0, 2.0, 3.0];
        rb.insert(&data);
        rb.insert(&data);
        assert_eq!(rb.size(), 6);
    }

    #[test]
    fn test_insert_fill() {
        let rb = RingBuffer::<4>::new();
        rb.insert(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(rb.size(), 4);
    }

    #[test]
    fn test_read_does_not_consume() {
        let rb = RingBuffer::<16>::new();
        rb.insert(&[1.0, 2.0, 3.0]);

        let mut out = [0.0; 2];
        assert!(rb.read(&mut out));
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(rb.size(), 3);

        let mut empty: [f32; 0] = [];
        assert!(rb.read(&mut empty));
    }

    #[test]
    fn test_read_underflow() {
        let rb = RingBuffer::<16>::new();
        rb.insert(&[1.0, 2.0, 3.0]);

        let mut out = [0.0; 4];
        assert!(!rb.read(&mut out));
        assert_eq!(out, [0.0; 4]);
        assert_eq!(rb.size(), 3);
    }

    #[test]
    fn test_pop_advances() {
        let rb = RingBuffer::<8>::new();
        rb.insert(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        rb.pop(2);
        assert_eq!(rb.size(), 3);

        let mut out = [0.0; 3];
        assert!(rb.read(&mut out));
        assert_eq!(out, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_pop_past_end_empties() {
        let rb = RingBuffer::<8>::new();
        rb.insert(&[1.0, 2.0, 3.0]);
        rb.pop(5);
        assert_eq!(rb.size(), 0);
        assert!(rb.is_empty());

        // Still usable afterwards
        rb.insert(&[4.0, 5.0]);
        let mut out = [0.0; 2];
        assert!(rb.read(&mut out));
        assert_eq!(out, [4.0, 5.0]);
        assert_eq!(rb.size(), 2);
    }

    #[test]
    fn test_overflow_single_insert() {
        let rb = RingBuffer::<4>::new();
        rb.insert(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(rb.size(), 4);

        let mut out = [0.0; 4];
        assert!(rb.read(&mut out));
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_overflow_across_inserts() {
        let rb = RingBuffer::<4>::new();
        rb.insert(&[1.0, 2.0, 3.0]);
        rb.insert(&[4.0, 5.0, 6.0]);
        assert_eq!(rb.size(), 4);

        let mut out = [0.0; 4];
        assert!(rb.read(&mut out));
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_repeated_overflow_keeps_newest() {
        let rb = RingBuffer::<32>::new();
        let mut next = 0.0f32;
        for _ in 0..50 {
            let chunk: Vec<f32> = (0..45)
                .map(|_| {
                    next += 1.0;
                    next
                })
                .collect();
            rb.insert(&chunk);
            assert!(rb.size() <= rb.capacity());
        }

        let mut out = [0.0; 32];
        assert!(rb.read(&mut out));
        assert_eq!(out[31], next);
        assert!(out.windows(2).all(|w| w[1] - w[0] == 1.0));
    }

    #[test]
    fn test_split_across_threads() {
        let (mut producer, mut consumer) = RingBuffer::<4096>::new().split();

        let handle = std::thread::spawn(move || {
            for i in 0..8 {
                producer.insert(&[i as f32; 256]);
            }
        });
        handle.join().unwrap();

        assert_eq!(consumer.size(), 2048);
        let mut out = [0.0; 256];
        assert!(consumer.read(&mut out));
        assert!(out.iter().all(|&s| s == 0.0));
        consumer.pop(256);
        assert!(consumer.read(&mut out));
        assert!(out.iter().all(|&s| s == 1.0));
    }
}
