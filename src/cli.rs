//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::error::Result;
use crate::params::{EngineConfig, VoiceSource};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "vibeorb")]
#[command(about = "Audio-reactive orb driven by microphone and voice", long_about = None)]
pub struct Args {
    /// Equirectangular environment map (EXR or any decodable image)
    #[arg(long, value_name = "PATH")]
    pub env_map: Option<PathBuf>,

    /// Speak a WAV clip instead of the synthesized voice
    #[arg(long, value_name = "WAV")]
    pub voice_file: Option<PathBuf>,

    /// Leave the microphone closed (input stream stays silent)
    #[arg(long)]
    pub no_mic: bool,

    /// Window width (logical pixels)
    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    /// Window height (logical pixels)
    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    /// Bloom strength multiplier
    #[arg(long, value_name = "STRENGTH")]
    pub bloom_strength: Option<f32>,

    /// Analyser FFT size (power of 2, 32..=32768)
    #[arg(long, value_name = "SAMPLES")]
    pub fft_size: Option<usize>,
}

impl Args {
    /// Apply overrides to the defaults and validate the result
    pub fn into_config(self) -> Result<EngineConfig> {
        let mut config = EngineConfig::default();

        if let Some(path) = self.env_map {
            config.scene.env_map.path = Some(path);
        }
        if let Some(path) = self.voice_file {
            config.audio.voice = VoiceSource::Clip(path);
        }
        config.audio.capture_microphone = !self.no_mic;
        if let Some(width) = self.width {
            config.render.window_width = width;
        }
        if let Some(height) = self.height {
            config.render.window_height = height;
        }
        if let Some(strength) = self.bloom_strength {
            config.render.bloom.strength = strength;
        }
        if let Some(fft_size) = self.fft_size {
            config.analyser.fft_size = fft_size;
            config.audio.ring_capacity = config.audio.ring_capacity.max(fft_size);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("vibeorb").chain(args.iter().copied()))
    }

    #[test]
    fn test_no_flags_gives_defaults() {
        let config = parse(&[]).into_config().expect("defaults are valid");
        assert!(config.audio.capture_microphone);
        assert_eq!(config.audio.voice, VoiceSource::Synth);
        assert_eq!(config.analyser.fft_size, 64);
    }

    #[test]
    fn test_overrides_apply() {
        let config = parse(&[
            "--env-map",
            "studio.exr",
            "--voice-file",
            "hello.wav",
            "--no-mic",
            "--width",
            "800",
            "--bloom-strength",
            "2.5",
            "--fft-size",
            "8192",
        ])
        .into_config()
        .expect("valid overrides");

        assert_eq!(config.scene.env_map.path, Some(PathBuf::from("studio.exr")));
        assert_eq!(config.audio.voice, VoiceSource::Clip(PathBuf::from("hello.wav")));
        assert!(!config.audio.capture_microphone);
        assert_eq!(config.render.window_width, 800);
        assert_eq!(config.render.bloom.strength, 2.5);
        assert_eq!(config.analyser.fft_size, 8192);
        assert!(config.audio.ring_capacity >= 8192);
    }

    #[test]
    fn test_bad_fft_size_is_config_error() {
        let result = parse(&["--fft-size", "1000"]).into_config();
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
