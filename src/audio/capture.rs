//! Microphone capture into a signal handle.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use log::{error, info};

use super::signal::SignalHandle;
use crate::error::{EngineError, Result};

/// Open the default input device and stream its mono mix into a new signal
pub fn start_microphone(ring_capacity: usize) -> Result<(SignalHandle, cpal::Stream)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| EngineError::AudioDevice("No audio input device found".to_string()))?;

    let supported = device
        .default_input_config()
        .map_err(|e| EngineError::AudioDevice(format!("Failed to get input config: {}", e)))?;

    info!(
        "Microphone: {} @ {}Hz ({:?})",
        device.name().unwrap_or_else(|_| "Unknown".to_string()),
        supported.sample_rate().0,
        supported.sample_format()
    );

    let signal = SignalHandle::new(supported.sample_rate().0, ring_capacity);
    let config: cpal::StreamConfig = supported.config();

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_input::<f32>(&device, &config, signal.clone()),
        cpal::SampleFormat::I16 => build_input::<i16>(&device, &config, signal.clone()),
        cpal::SampleFormat::U16 => build_input::<u16>(&device, &config, signal.clone()),
        other => Err(EngineError::AudioDevice(format!(
            "Unsupported input sample format {:?}",
            other
        ))),
    }?;

    stream
        .play()
        .map_err(|e| EngineError::AudioDevice(format!("Failed to start input stream: {}", e)))?;

    Ok((signal, stream))
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    signal: SignalHandle,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let error_signal = signal.clone();
    let mut mono = Vec::<f32>::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                mono.clear();
                mono.extend(data.chunks(channels).map(|frame| {
                    frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32
                }));
                signal.push_samples(&mono);
            },
            move |err| {
                error!("Input stream error: {}", err);
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    error_signal.close();
                }
            },
            None,
        )
        .map_err(|e| EngineError::AudioDevice(format!("Failed to build input stream: {}", e)))
}
