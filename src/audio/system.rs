//! Audio system: output voice playback plus microphone capture.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use log::{error, info, warn};

use super::capture::start_microphone;
use super::signal::SignalHandle;
use super::synthesis::Voice;
use crate::error::{EngineError, Result};
use crate::params::{AudioConfig, VoiceSource};

/// The two streams the engine analyses. Either may be missing.
#[derive(Debug, Clone, Default)]
pub struct AudioSignals {
    pub input: Option<SignalHandle>,
    pub output: Option<SignalHandle>,
}

/// Audio system owning the cpal streams behind both signals
pub struct AudioSystem {
    signals: AudioSignals,

    /// Audio streams (kept alive)
    _output_stream: cpal::Stream,
    _input_stream: Option<cpal::Stream>,
}

impl AudioSystem {
    /// Start voice playback and, if configured, microphone capture
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::AudioDevice("No audio output device found".to_string()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| EngineError::AudioDevice(format!("Failed to get audio config: {}", e)))?;

        info!(
            "Audio: {} @ {}Hz",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            supported.sample_rate().0
        );

        let voice = match &config.voice {
            VoiceSource::Synth => Voice::synth(supported.sample_rate().0)?,
            VoiceSource::Clip(path) => Voice::clip(path, supported.sample_rate().0)?,
        };

        let output = SignalHandle::new(supported.sample_rate().0, config.ring_capacity);
        let stream_config: cpal::StreamConfig = supported.config();

        let output_stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_output::<f32>(&device, &stream_config, voice, output.clone())
            }
            cpal::SampleFormat::I16 => {
                build_output::<i16>(&device, &stream_config, voice, output.clone())
            }
            cpal::SampleFormat::U16 => {
                build_output::<u16>(&device, &stream_config, voice, output.clone())
            }
            other => Err(EngineError::AudioDevice(format!(
                "Unsupported output sample format {:?}",
                other
            ))),
        }?;

        output_stream
            .play()
            .map_err(|e| EngineError::AudioDevice(format!("Failed to start audio stream: {}", e)))?;

        // A missing microphone only silences the input stream
        let (input, input_stream) = if config.capture_microphone {
            match start_microphone(config.ring_capacity) {
                Ok((signal, stream)) => (Some(signal), Some(stream)),
                Err(e) => {
                    warn!("Microphone unavailable, input stream will be silent: {}", e);
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        Ok(Self {
            signals: AudioSignals {
                input,
                output: Some(output),
            },
            _output_stream: output_stream,
            _input_stream: input_stream,
        })
    }

    /// Handles for the analysers
    pub fn signals(&self) -> AudioSignals {
        self.signals.clone()
    }
}

fn build_output<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut voice: Voice,
    signal: SignalHandle,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let error_signal = signal.clone();
    let mut tap = Vec::<f32>::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                tap.clear();
                for frame in data.chunks_mut(channels) {
                    let sample = voice.next_sample();
                    for slot in frame.iter_mut() {
                        *slot = T::from_sample(sample);
                    }
                    tap.push(sample); // Accumulate for analysis
                }
                signal.push_samples(&tap);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                    error_signal.close();
                }
            },
            None,
        )
        .map_err(|e| EngineError::AudioDevice(format!("Failed to build audio stream: {}", e)))
}
