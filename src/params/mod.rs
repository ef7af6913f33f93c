//! Parameter definitions with units and documented semantics.
//!
//! All tuning constants live here with:
//! - Units (degrees, Hz, dBFS, world units)
//! - Documented ranges and meanings
//! - `validate()` where a bad value would break an invariant

mod audio;
mod reactive;
mod render;
mod scene;

// Re-export all types
pub use audio::{audio_constants, AnalyserConfig, AudioConfig, VoiceSource};
pub use reactive::{sum_taps, BinTap, ReactiveMapping, Stream};
pub use render::{BloomConfig, RenderConfig};
pub use scene::{
    srgb_hex, BackdropConfig, CameraConfig, EnvMapSettings, SceneConfig, SphereConfig,
};

use crate::error::{EngineError, Result};

/// Everything the engine needs to start
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub analyser: AnalyserConfig,
    pub audio: AudioConfig,
    pub scene: SceneConfig,
    pub reactive: ReactiveMapping,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Validate every section, reporting the first failure
    pub fn validate(&self) -> Result<()> {
        self.analyser
            .validate()
            .and_then(|_| self.scene.env_map.validate())
            .and_then(|_| self.reactive.validate())
            .and_then(|_| self.render.bloom.validate())
            .map_err(EngineError::Config)?;

        if self.audio.ring_capacity < self.analyser.fft_size {
            return Err(EngineError::Config(format!(
                "Signal ring ({} samples) is smaller than the FFT window ({})",
                self.audio.ring_capacity, self.analyser.fft_size
            )));
        }
        Ok(())
    }
}
