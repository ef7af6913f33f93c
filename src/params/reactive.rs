//! Mapping from frequency bins to motion and shader inputs.
//!
//! Every constant here is a tuning knob. The bins and weights were chosen by
//! eye: low bins drive scale and shader time, bins 1 and 2 steer the orbit,
//! and the shader vectors scale each bin differently so that color shift,
//! displacement strength and fine detail respond to different energy.

use glam::Vec3;

use crate::audio::FrequencySnapshot;

/// Which analysed stream a bin is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Microphone
    Input,
    /// Spoken/synthesized voice
    Output,
}

/// One weighted frequency bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinTap {
    pub stream: Stream,
    pub bin: usize,
    pub weight: f32,
}

impl BinTap {
    pub const fn new(stream: Stream, bin: usize, weight: f32) -> Self {
        Self {
            stream,
            bin,
            weight,
        }
    }

    /// Weighted bin magnitude normalized to [0, 1] before weighting
    pub fn sample(&self, input: &FrequencySnapshot, output: &FrequencySnapshot) -> f32 {
        let snapshot = match self.stream {
            Stream::Input => input,
            Stream::Output => output,
        };
        self.weight * snapshot.normalized(self.bin)
    }
}

/// Sum of several taps
pub fn sum_taps(taps: &[BinTap], input: &FrequencySnapshot, output: &FrequencySnapshot) -> f32 {
    taps.iter().map(|tap| tap.sample(input, output)).sum()
}

/// Audio-reactive animation mapping
#[derive(Debug, Clone)]
pub struct ReactiveMapping {
    /// Baseline update rate that `dt = 1.0` corresponds to (Hz)
    pub target_frame_rate_hz: f32,

    /// Sphere scale = 1 + scale_tap
    pub scale_tap: BinTap,

    /// Global multiplier for orbit angular velocity (radians per nominal frame)
    pub rotation_rate: f32,

    /// Orbit angle contributions per axis
    pub rotation_x: Vec<BinTap>,
    pub rotation_y: Vec<BinTap>,
    pub rotation_z: Vec<BinTap>,

    /// Shader time advance per nominal frame
    pub time_tap: BinTap,

    /// Shader `inputData` xyz (w is always 0)
    pub input_data: [BinTap; 3],

    /// Shader `outputData` xyz (w is always 0)
    pub output_data: [BinTap; 3],

    /// Camera offset from the sphere before orbit rotation
    pub camera_offset: Vec3,

    /// Backdrop noise seed range [0, max)
    pub rand_seed_max: f32,
}

impl Default for ReactiveMapping {
    fn default() -> Self {
        Self {
            target_frame_rate_hz: 60.0,
            scale_tap: BinTap::new(Stream::Output, 1, 0.2),
            rotation_rate: 0.001,
            rotation_x: vec![BinTap::new(Stream::Output, 1, 0.5)],
            rotation_y: vec![
                BinTap::new(Stream::Input, 2, 0.25),
                BinTap::new(Stream::Output, 2, 0.25),
            ],
            rotation_z: vec![BinTap::new(Stream::Input, 1, 0.5)],
            time_tap: BinTap::new(Stream::Output, 0, 0.1),
            input_data: [
                BinTap::new(Stream::Input, 0, 1.0),
                BinTap::new(Stream::Input, 1, 0.1),
                BinTap::new(Stream::Input, 2, 10.0),
            ],
            output_data: [
                BinTap::new(Stream::Output, 0, 2.0),
                BinTap::new(Stream::Output, 1, 0.1),
                BinTap::new(Stream::Output, 2, 10.0),
            ],
            camera_offset: Vec3::new(0.0, 0.0, 5.0),
            rand_seed_max: 10000.0,
        }
    }
}

impl ReactiveMapping {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.target_frame_rate_hz > 0.0) {
            return Err(format!(
                "Target frame rate must be > 0, got {}",
                self.target_frame_rate_hz
            ));
        }
        if self.camera_offset.length_squared() == 0.0 {
            return Err("Camera offset must be non-zero".to_string());
        }
        if !(self.rand_seed_max > 0.0) {
            return Err("Random seed range must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_reads_selected_stream() {
        let mut input = FrequencySnapshot::new(4);
        let mut output = FrequencySnapshot::new(4);
        input.as_mut_slice()[1] = 255;
        output.as_mut_slice()[1] = 51;

        let tap_in = BinTap::new(Stream::Input, 1, 0.5);
        let tap_out = BinTap::new(Stream::Output, 1, 1.0);

        assert_eq!(tap_in.sample(&input, &output), 0.5);
        assert!((tap_out.sample(&input, &output) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_tap_out_of_range_is_silent() {
        let mut input = FrequencySnapshot::new(4);
        input.as_mut_slice().fill(255);
        let output = FrequencySnapshot::new(4);

        let tap = BinTap::new(Stream::Input, 9, 1.0);
        assert_eq!(tap.sample(&input, &output), 0.0);
    }

    #[test]
    fn test_default_mapping_is_valid() {
        assert!(ReactiveMapping::default().validate().is_ok());
    }
}
