//! Sample transport between the audio threads and the analyzer

pub mod ring_buffer;
pub mod passthrough;
#[cfg(feature = "capture")]
pub mod capture;

pub use ring_buffer::RingBuffer;
pub use passthrough::Passthrough;
#[cfg(feature = "capture")]
pub use capture::Capture;
