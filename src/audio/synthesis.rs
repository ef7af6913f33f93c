//! Output voice generators: procedural Glicol voice or a looping WAV clip.

use std::path::Path;

use glicol::Engine;
use log::info;

use crate::error::{EngineError, Result};
use crate::params::audio_constants::BLOCK_SIZE;

/// Glicol composition: a slow, speech-like formant babble
pub const GLICOL_VOICE: &str = r#"
~gate: speed 3.0 >> seq 60 _ 64 _~b _ 67 _
~b: choose 60 62 64 67 0 0
~amp: ~gate >> envperc 0.02 0.25
~pit: ~gate >> mul 174.61
~voice: saw ~pit >> mul ~amp >> lpf ~formant 4.0 >> mul 0.12
~formant: sin 0.7 >> mul 700 >> add 1100
o: ~voice >> plate 0.15
"#;

/// Mono sample generator feeding the output device
pub enum Voice {
    Synth {
        engine: Box<Engine<BLOCK_SIZE>>,
        block: [f32; BLOCK_SIZE],
        cursor: usize,
    },
    Clip {
        samples: Vec<f32>,
        cursor: usize,
    },
}

impl Voice {
    /// Compile the Glicol voice at the device sample rate
    pub fn synth(sample_rate_hz: u32) -> Result<Self> {
        let mut engine = Engine::<BLOCK_SIZE>::new();
        engine.set_sr(sample_rate_hz as usize);
        engine.update_with_code(GLICOL_VOICE);
        engine
            .update()
            .map_err(|e| EngineError::AudioDevice(format!("Glicol engine init failed: {:?}", e)))?;

        Ok(Self::Synth {
            engine: Box::new(engine),
            block: [0.0; BLOCK_SIZE],
            cursor: BLOCK_SIZE,
        })
    }

    /// Load a WAV file as a looping mono clip at the device sample rate
    pub fn clip(path: &Path, sample_rate_hz: u32) -> Result<Self> {
        let load_err = |reason: String| EngineError::ResourceLoad {
            path: path.to_path_buf(),
            reason,
        };

        let mut reader = hound::WavReader::open(path).map_err(|e| load_err(e.to_string()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| load_err(e.to_string()))?,
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| load_err(e.to_string()))?
            }
        };

        let samples = resample(
            &downmix(&interleaved, channels),
            spec.sample_rate,
            sample_rate_hz,
        );
        if samples.is_empty() {
            return Err(load_err("clip contains no samples".to_string()));
        }

        info!(
            "Voice clip: {} ({}Hz, {} samples @ {}Hz)",
            path.display(),
            spec.sample_rate,
            samples.len(),
            sample_rate_hz
        );

        Ok(Self::Clip { samples, cursor: 0 })
    }

    /// Next mono sample, clipped to a safe range
    pub fn next_sample(&mut self) -> f32 {
        let sample = match self {
            Self::Synth {
                engine,
                block,
                cursor,
            } => {
                if *cursor >= BLOCK_SIZE {
                    let (buffers, _) = engine.next_block(vec![]);
                    for (i, slot) in block.iter_mut().enumerate() {
                        *slot = buffers[0][i];
                    }
                    *cursor = 0;
                }
                let s = block[*cursor];
                *cursor += 1;
                s
            }
            Self::Clip { samples, cursor } => {
                let s = samples[*cursor];
                *cursor = (*cursor + 1) % samples.len();
                s
            }
        };

        // Safety limiter: hard clip to ±0.5 to prevent ear damage
        sample.clamp(-0.5, 0.5)
    }
}

/// Average interleaved frames down to mono
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    let channels = channels.max(1);
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resample from `from_hz` to `to_hz`
pub fn resample(samples: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if from_hz == to_hz || from_hz == 0 || to_hz == 0 || samples.len() < 2 {
        return samples.to_vec();
    }

    let len = (samples.len() as u64 * to_hz as u64 / from_hz as u64).max(1) as usize;
    let last = samples.len() - 1;
    (0..len)
        .map(|i| {
            let pos = i as f64 * from_hz as f64 / to_hz as f64;
            let index = (pos as usize).min(last);
            let next = (index + 1).min(last);
            let frac = (pos - index as f64) as f32;
            samples[index] + (samples[next] - samples[index]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_clip_loops_and_limits() {
        let mut voice = Voice::Clip {
            samples: vec![0.1, 0.9, -0.9],
            cursor: 0,
        };
        let out: Vec<f32> = (0..4).map(|_| voice.next_sample()).collect();
        assert_eq!(out, vec![0.1, 0.5, -0.5, 0.1]);
    }

    #[test]
    fn test_missing_clip_is_resource_error() {
        let result = Voice::clip(Path::new("no/such/voice.wav"), 48_000);
        assert!(matches!(result, Err(EngineError::ResourceLoad { .. })));
    }

    #[test]
    fn test_resample_matches_device_rate() {
        // one second at 22.05 kHz lasts one second at 48 kHz
        let clip = vec![0.25; 22_050];
        let out = resample(&clip, 22_050, 48_000);
        assert_eq!(out.len(), 48_000);
        assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-6));

        let down = resample(&vec![0.0; 48_000], 48_000, 16_000);
        assert_eq!(down.len(), 16_000);
    }

    #[test]
    fn test_resample_interpolates_between_samples() {
        let out = resample(&[0.0, 1.0, 0.0], 1, 2);
        assert_eq!(out.len(), 6);
        assert_eq!(&out[..4], &[0.0, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_clip_from_slow_wav_plays_at_device_rate() {
        let path = std::env::temp_dir().join(format!("vibeorb-voice-{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..2_205 {
            writer.write_sample(8_192i16).unwrap();
        }
        writer.finalize().unwrap();

        let voice = Voice::clip(&path, 48_000).unwrap();
        let _ = std::fs::remove_file(&path);
        match voice {
            Voice::Clip { samples, .. } => assert_eq!(samples.len(), 4_800),
            Voice::Synth { .. } => panic!("expected a clip"),
        }
    }
}
