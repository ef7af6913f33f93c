//! Audio analysis and capture configuration.

use std::path::PathBuf;

/// Spectrum analysis configuration for one analyser
#[derive(Debug, Clone)]
pub struct AnalyserConfig {
    /// FFT window size in samples (power of 2, 32..=32768)
    /// Snapshot length is half of this
    pub fft_size: usize,

    /// Temporal smoothing between updates (0 = none, 1 = frozen)
    pub smoothing_time_constant: f32,

    /// Magnitude mapped to byte 0 (dBFS)
    pub min_decibels: f32,

    /// Magnitude mapped to byte 255 (dBFS)
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 64, // 32 bins
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserConfig {
    /// Number of frequency bins in a snapshot
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(format!(
                "FFT size must be a power of 2 in 32..=32768, got {}",
                self.fft_size
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(format!(
                "Smoothing time constant must be in [0, 1], got {}",
                self.smoothing_time_constant
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            ));
        }
        Ok(())
    }
}

/// Where the spoken/synthesized output stream comes from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VoiceSource {
    /// Procedural Glicol voice
    #[default]
    Synth,

    /// Looping WAV clip
    Clip(PathBuf),
}

/// Audio device configuration for the native host
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Output voice played through the default output device
    pub voice: VoiceSource,

    /// Capture the default input device as the input stream
    pub capture_microphone: bool,

    /// Samples retained per signal ring (must cover the largest FFT window)
    pub ring_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            voice: VoiceSource::Synth,
            capture_microphone: true,
            ring_capacity: 4096,
        }
    }
}

/// Audio constants (compile-time, match Glicol engine setup)
pub mod audio_constants {
    /// Glicol block size (samples per buffer)
    pub const BLOCK_SIZE: usize = 128;
}
