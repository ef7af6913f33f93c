//! Per-frame audio-reactive animation.
//!
//! The driver turns two frequency snapshots and a timestamp into sphere scale,
//! orbit rotation, camera pose and shader uniforms. Increments are scaled by
//! `dt`, the elapsed time in units of the nominal frame interval, so motion
//! speed is independent of the display refresh rate.

use std::time::Duration;

use glam::{EulerRot, Quat, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::audio::{Analyser, FrequencySnapshot};
use crate::params::{sum_taps, BinTap, ReactiveMapping};
use crate::scene::SceneHandles;

/// State carried between frames. Rotation only ever accumulates.
#[derive(Debug, Clone, Default)]
pub struct AnimationState {
    rotation: Vec3,
    previous_timestamp: Option<Duration>,
}

impl AnimationState {
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    /// Elapsed time since the previous call in nominal frames.
    /// The first frame counts as exactly one nominal frame.
    pub fn frame_delta(&mut self, now: Duration, target_frame_rate_hz: f32) -> f32 {
        let dt = match self.previous_timestamp {
            Some(previous) => now.saturating_sub(previous).as_secs_f32() * target_frame_rate_hz,
            None => 1.0,
        };
        self.previous_timestamp = Some(now);
        dt
    }
}

/// Values derived from one pair of snapshots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactiveFrame {
    pub scale: f32,
    pub rotation_delta: Vec3,
    pub time_delta: f32,
    pub input_data: Vec4,
    pub output_data: Vec4,
}

fn vector(taps: &[BinTap; 3], input: &FrequencySnapshot, output: &FrequencySnapshot) -> Vec4 {
    Vec4::new(
        taps[0].sample(input, output),
        taps[1].sample(input, output),
        taps[2].sample(input, output),
        0.0,
    )
}

/// Map snapshots to this frame's targets and increments
pub fn evaluate(
    mapping: &ReactiveMapping,
    input: &FrequencySnapshot,
    output: &FrequencySnapshot,
    dt: f32,
) -> ReactiveFrame {
    let rate = dt * mapping.rotation_rate;
    ReactiveFrame {
        scale: 1.0 + mapping.scale_tap.sample(input, output),
        rotation_delta: Vec3::new(
            rate * sum_taps(&mapping.rotation_x, input, output),
            rate * sum_taps(&mapping.rotation_y, input, output),
            rate * sum_taps(&mapping.rotation_z, input, output),
        ),
        time_delta: dt * mapping.time_tap.sample(input, output),
        input_data: vector(&mapping.input_data, input, output),
        output_data: vector(&mapping.output_data, input, output),
    }
}

/// Rotate `offset` by XYZ Euler angles
pub fn orbit_position(rotation: Vec3, offset: Vec3) -> Vec3 {
    Quat::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z) * offset
}

pub struct AnimationDriver {
    state: AnimationState,
    mapping: ReactiveMapping,
    rng: StdRng,
}

impl AnimationDriver {
    pub fn new(mapping: ReactiveMapping) -> Self {
        Self::with_rng(mapping, StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic backdrop noise, for tests and captures
    pub fn with_seed(mapping: ReactiveMapping, seed: u64) -> Self {
        Self::with_rng(mapping, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mapping: ReactiveMapping, rng: StdRng) -> Self {
        Self {
            state: AnimationState::default(),
            mapping,
            rng,
        }
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    /// Refresh both analysers, then advance the scene
    pub fn step(
        &mut self,
        now: Duration,
        input: &mut Analyser,
        output: &mut Analyser,
        scene: &mut SceneHandles,
    ) -> Option<ReactiveFrame> {
        input.update();
        output.update();
        self.advance(now, input.snapshot(), output.snapshot(), scene)
    }

    /// Advance the scene from already-updated snapshots.
    /// Returns the applied frame, or None while the sphere's uniforms are unbound.
    pub fn advance(
        &mut self,
        now: Duration,
        input: &FrequencySnapshot,
        output: &FrequencySnapshot,
        scene: &mut SceneHandles,
    ) -> Option<ReactiveFrame> {
        let dt = self
            .state
            .frame_delta(now, self.mapping.target_frame_rate_hz);

        scene.backdrop.material.uniforms.rand =
            self.rng.random_range(0.0..self.mapping.rand_seed_max);

        let uniforms = scene.sphere.material.uniforms_mut()?;
        let frame = evaluate(&self.mapping, input, output, dt);

        uniforms.time += frame.time_delta;
        uniforms.input_data = frame.input_data;
        uniforms.output_data = frame.output_data;

        self.state.rotation += frame.rotation_delta;
        scene.sphere.scale = frame.scale;
        scene.camera.position =
            scene.sphere.position + orbit_position(self.state.rotation, self.mapping.camera_offset);
        scene.camera.look_at(scene.sphere.position);

        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SceneConfig;
    use crate::scene::{EnvMapLoad, SceneBuilder};

    const FRAME: Duration = Duration::from_micros(16_667);

    fn compiled_scene() -> SceneHandles {
        let mut scene = SceneBuilder::new(&SceneConfig::default())
            .with_env_map(EnvMapLoad::never())
            .build();
        scene.sphere.material.compile();
        scene
    }

    fn snapshot(values: &[u8]) -> FrequencySnapshot {
        let mut snapshot = FrequencySnapshot::new(32);
        snapshot.as_mut_slice()[..values.len()].copy_from_slice(values);
        snapshot
    }

    #[test]
    fn test_first_frame_is_one_nominal_frame() {
        let mut state = AnimationState::default();
        assert_eq!(state.frame_delta(Duration::from_secs(3), 60.0), 1.0);
        let dt = state.frame_delta(Duration::from_secs(3) + Duration::from_millis(50), 60.0);
        assert!((dt - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotation_is_sum_of_increments() {
        let mapping = ReactiveMapping::default();
        let mut driver = AnimationDriver::with_seed(mapping.clone(), 7);
        let mut scene = compiled_scene();
        let mut expected = Vec3::ZERO;
        let mut now = Duration::ZERO;

        for i in 0..50u8 {
            let input = snapshot(&[i, 200 - i, i * 3]);
            let output = snapshot(&[10, i * 2, 90]);
            let frame = driver
                .advance(now, &input, &output, &mut scene)
                .expect("uniforms bound");
            expected += frame.rotation_delta;
            now += FRAME * (1 + (i as u32 % 3));
        }

        assert!((driver.state().rotation() - expected).length() < 1e-6);
    }

    #[test]
    fn test_silence_leaves_scale_and_rotation() {
        let mut driver = AnimationDriver::with_seed(ReactiveMapping::default(), 1);
        let mut scene = compiled_scene();
        let silent = FrequencySnapshot::new(32);

        for i in 0..100u32 {
            driver.advance(FRAME * i, &silent, &silent, &mut scene);
            assert_eq!(scene.sphere.scale, 1.0);
        }
        assert_eq!(driver.state().rotation(), Vec3::ZERO);
        let uniforms = scene.sphere.material.uniforms().copied().unwrap_or_default();
        assert_eq!(uniforms.time, 0.0);
        assert_eq!(uniforms.input_data, Vec4::ZERO);
    }

    #[test]
    fn test_constant_energy_rotates_monotonically() {
        let mut driver = AnimationDriver::with_seed(ReactiveMapping::default(), 2);
        let mut scene = compiled_scene();
        let input = snapshot(&[128, 128, 128]);
        let output = snapshot(&[128, 128, 128]);

        let mut previous = Vec3::ZERO;
        for i in 0..200u32 {
            driver.advance(FRAME * i, &input, &output, &mut scene);
            let rotation = driver.state().rotation();
            assert!(rotation.x > previous.x);
            assert!(rotation.y > previous.y);
            assert!(rotation.z > previous.z);
            previous = rotation;
        }
    }

    #[test]
    fn test_negative_weight_rotates_backwards() {
        let mut mapping = ReactiveMapping::default();
        mapping.rotation_x = vec![BinTap::new(crate::params::Stream::Output, 1, -0.5)];
        let mut driver = AnimationDriver::with_seed(mapping, 3);
        let mut scene = compiled_scene();
        let loud = snapshot(&[255, 255, 255]);

        for i in 0..20u32 {
            driver.advance(FRAME * i, &loud, &loud, &mut scene);
        }
        assert!(driver.state().rotation().x < 0.0);
    }

    #[test]
    fn test_camera_stays_on_orbit() {
        let mut driver = AnimationDriver::with_seed(ReactiveMapping::default(), 4);
        let mut scene = compiled_scene();
        let loud = snapshot(&[255, 255, 255]);

        for i in 0..500u32 {
            driver.advance(FRAME * i, &loud, &loud, &mut scene);
            let radius = (scene.camera.position - scene.sphere.position).length();
            assert!((radius - 5.0).abs() < 1e-4);
            assert_eq!(scene.camera.target(), scene.sphere.position);
        }
    }

    #[test]
    fn test_unbound_uniforms_skip_reactive_updates() {
        let mut driver = AnimationDriver::with_seed(ReactiveMapping::default(), 5);
        let mut scene = SceneBuilder::new(&SceneConfig::default())
            .with_env_map(EnvMapLoad::never())
            .build();
        let loud = snapshot(&[255, 255, 255]);
        let start = scene.camera.position;

        assert!(driver.advance(FRAME, &loud, &loud, &mut scene).is_none());
        assert_eq!(scene.camera.position, start);
        assert_eq!(driver.state().rotation(), Vec3::ZERO);
        // backdrop seed still advances
        let seed = scene.backdrop.material.uniforms.rand;
        assert!((0.0..10000.0).contains(&seed));
    }

    #[test]
    fn test_evaluate_matches_reference_weights() {
        let mapping = ReactiveMapping::default();
        let input = snapshot(&[255, 51, 102]);
        let output = snapshot(&[51, 255, 0]);
        let frame = evaluate(&mapping, &input, &output, 2.0);

        assert!((frame.scale - 1.2).abs() < 1e-6);
        assert!((frame.rotation_delta.x - 2.0 * 0.001 * 0.5).abs() < 1e-7);
        assert!((frame.rotation_delta.z - 2.0 * 0.001 * 0.5 * 0.2).abs() < 1e-7);
        assert!((frame.time_delta - 2.0 * 0.1 * 0.2).abs() < 1e-6);
        assert!((frame.input_data - Vec4::new(1.0, 0.02, 4.0, 0.0)).length() < 1e-5);
        assert!((frame.output_data - Vec4::new(0.4, 0.1, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_orbit_at_zero_rotation_is_offset() {
        let offset = Vec3::new(0.0, 0.0, 5.0);
        assert!((orbit_position(Vec3::ZERO, offset) - offset).length() < 1e-6);
    }
}
