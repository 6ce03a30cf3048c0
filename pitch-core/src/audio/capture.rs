//! Audio capture using cpal
//!
//! Feeds an analyzer from a microphone or line-in, downmixing to mono in the
//! audio callback.

use crate::error::{AnalyzerError, Result};
use crate::pitch::AnalyzerInput;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};

/// Audio input device information
#[derive(Debug, Clone)]
pub struct CaptureDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Input stream driving an [`AnalyzerInput`]
pub struct Capture {
    stream: Stream,
    device_info: CaptureDeviceInfo,
}

impl Capture {
    /// Capture from the default input device
    ///
    /// The analyzer should be created with the device's sample rate, see
    /// [`default_input_rate`].
    pub fn from_default_device(input: AnalyzerInput) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AnalyzerError::NoDevice)?;

        Self::from_device(device, input)
    }

    /// Capture from a specific device
    pub fn from_device(device: Device, mut input: AnalyzerInput) -> Result<Self> {
        let name = device
            .name()
            .map_err(|e| AnalyzerError::DeviceName(e.to_string()))?;

        let config = device
            .default_input_config()
            .map_err(|e| AnalyzerError::DefaultConfig(e.to_string()))?;

        let device_info = CaptureDeviceInfo {
            name,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        };
        log::debug!(
            "Capturing from '{}' at {} Hz, {} channels",
            device_info.name,
            device_info.sample_rate,
            device_info.channels
        );

        let channels = device_info.channels as usize;
        let stream_config: StreamConfig = config.into();

        // Reused across callbacks; only grows if the backend delivers bigger blocks
        let mut mono = Vec::with_capacity(4096);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if channels <= 1 {
                        input.input(data);
                        return;
                    }
                    mono.clear();
                    mono.extend(
                        data.chunks_exact(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                    );
                    input.input(&mono);
                },
                move |err| {
                    log::warn!("Audio input error: {}", err);
                },
                None,
            )
            .map_err(|e| AnalyzerError::BuildStream(e.to_string()))?;

        Ok(Self {
            stream,
            device_info,
        })
    }

    /// Start capturing audio
    pub fn start(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| AnalyzerError::PlayStream(e.to_string()))
    }

    /// Pause audio capture
    pub fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| AnalyzerError::PlayStream(e.to_string()))
    }

    /// Get device information
    pub fn device_info(&self) -> &CaptureDeviceInfo {
        &self.device_info
    }
}

/// Sample rate of the default input device
pub fn default_input_rate() -> Result<u32> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(AnalyzerError::NoDevice)?;
    let config = device
        .default_input_config()
        .map_err(|e| AnalyzerError::DefaultConfig(e.to_string()))?;
    Ok(config.sample_rate().0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_input_rate() {
        // Machines without an input device report NoDevice or a config error
        match default_input_rate() {
            Ok(rate) => assert!(rate > 0),
            Err(e) => assert!(matches!(
                e,
                AnalyzerError::NoDevice | AnalyzerError::DefaultConfig(_)
            )),
        }
    }
}
