//! Frame loop orchestration.
//!
//! The host calls [`Engine::frame`] on every redraw. Each call applies a
//! finished environment map, steps the animation, renders, and asks the
//! scheduler for the next redraw. Per-frame failures are logged and counted;
//! only setup errors escape.

use std::time::Duration;

use log::{info, warn};

use crate::animation::AnimationDriver;
use crate::audio::{Analyser, AudioSignals, SignalHandle};
use crate::error::Result;
use crate::params::{AnalyserConfig, EngineConfig};
use crate::pipeline::RenderPipeline;
use crate::scene::{SceneBuilder, SceneHandles};
use crate::viewport::{ViewportManager, ViewportSize};

/// Something that can wake the loop for another frame
pub trait FrameScheduler {
    fn schedule_next_frame(&self);
}

impl FrameScheduler for winit::window::Window {
    fn schedule_next_frame(&self) {
        self.request_redraw();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub failed_frames: u64,
}

fn connect_or_silent(signal: Option<&SignalHandle>, config: &AnalyserConfig, name: &str) -> Analyser {
    match Analyser::connect(signal, config) {
        Ok(analyser) => analyser,
        Err(e) => {
            warn!("{} analyser silent: {}", name, e);
            Analyser::silent(config)
        }
    }
}

pub struct Engine<P: RenderPipeline> {
    scene: SceneHandles,
    driver: AnimationDriver,
    input: Analyser,
    output: Analyser,
    viewport: ViewportManager,
    pipeline: P,
    state: EngineState,
    stats: FrameStats,
}

impl<P: RenderPipeline> Engine<P> {
    /// Build the scene, start the environment map load and compile materials
    pub fn start(
        config: &EngineConfig,
        signals: &AudioSignals,
        pipeline: P,
        size: ViewportSize,
    ) -> Result<Self> {
        // before the env map loader sees the settings
        config.validate()?;
        let scene = SceneBuilder::new(&config.scene).build();
        Self::with_scene(config, signals, scene, pipeline, size)
    }

    /// Start with an already-built scene
    pub fn with_scene(
        config: &EngineConfig,
        signals: &AudioSignals,
        mut scene: SceneHandles,
        mut pipeline: P,
        size: ViewportSize,
    ) -> Result<Self> {
        config.validate()?;
        let input = connect_or_silent(signals.input.as_ref(), &config.analyser, "Input");
        let output = connect_or_silent(signals.output.as_ref(), &config.analyser, "Output");

        pipeline.compile(&mut scene)?;

        let mut viewport = ViewportManager::new();
        if !viewport.resize(size, &mut scene, &mut pipeline) {
            warn!(
                "Initial viewport {}x{} is empty; waiting for a resize",
                size.width, size.height
            );
        }

        info!("Engine running");
        Ok(Self {
            scene,
            driver: AnimationDriver::new(config.reactive.clone()),
            input,
            output,
            viewport,
            pipeline,
            state: EngineState::Running,
            stats: FrameStats::default(),
        })
    }

    /// Run one iteration. Returns false once the engine is stopped.
    pub fn frame(&mut self, now: Duration, scheduler: &dyn FrameScheduler) -> bool {
        if self.state == EngineState::Stopped {
            return false;
        }

        self.scene.apply_pending_env_map();
        self.driver
            .step(now, &mut self.input, &mut self.output, &mut self.scene);

        if let Err(e) = self.pipeline.render(&self.scene) {
            self.stats.failed_frames += 1;
            // throttled
            if self.stats.failed_frames.is_power_of_two() {
                warn!("Frame dropped ({} so far): {}", self.stats.failed_frames, e);
            }
        }
        self.stats.frames += 1;

        scheduler.schedule_next_frame();
        true
    }

    pub fn resize(&mut self, size: ViewportSize) -> bool {
        if self.state == EngineState::Stopped {
            return false;
        }
        self.viewport
            .resize(size, &mut self.scene, &mut self.pipeline)
    }

    /// Stop the loop. Later frames are no-ops and schedule nothing.
    pub fn teardown(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.state = EngineState::Stopped;
        info!(
            "Engine stopped after {} frames ({} dropped)",
            self.stats.frames, self.stats.failed_frames
        );
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn scene(&self) -> &SceneHandles {
        &self.scene
    }

    pub fn driver(&self) -> &AnimationDriver {
        &self.driver
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn viewport(&self) -> Option<ViewportSize> {
        self.viewport.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::error::EngineError;
    use crate::params::{EnvMapSettings, SceneConfig};
    use crate::pipeline::PASS_ORDER;
    use crate::scene::{prefilter, EnvMapLoad, UniformBinding};

    const FRAME: Duration = Duration::from_micros(16_667);

    #[derive(Default)]
    struct RecordingPipeline {
        compiled: u32,
        sizes: Vec<ViewportSize>,
        passes: Vec<crate::pipeline::PassKind>,
        sphere_visible: Vec<bool>,
        fail: bool,
    }

    impl RenderPipeline for RecordingPipeline {
        fn compile(&mut self, scene: &mut SceneHandles) -> Result<()> {
            self.compiled += 1;
            scene.sphere.material.compile();
            Ok(())
        }

        fn set_size(&mut self, size: ViewportSize) {
            self.sizes.push(size);
        }

        fn render(&mut self, scene: &SceneHandles) -> Result<()> {
            self.sphere_visible.push(scene.sphere.visible);
            if self.fail {
                return Err(EngineError::RenderPass("surface lost".to_string()));
            }
            self.passes.extend(PASS_ORDER);
            Ok(())
        }
    }

    #[derive(Default)]
    struct ManualScheduler {
        requests: Cell<u32>,
    }

    impl FrameScheduler for ManualScheduler {
        fn schedule_next_frame(&self) {
            self.requests.set(self.requests.get() + 1);
        }
    }

    fn engine_with(load: EnvMapLoad, pipeline: RecordingPipeline) -> Engine<RecordingPipeline> {
        let config = EngineConfig::default();
        let scene = SceneBuilder::new(&config.scene).with_env_map(load).build();
        Engine::with_scene(
            &config,
            &AudioSignals::default(),
            scene,
            pipeline,
            ViewportSize::new(1280, 720, 1.0),
        )
        .expect("engine starts")
    }

    #[test]
    fn test_compile_runs_before_first_frame() {
        let engine = engine_with(EnvMapLoad::never(), RecordingPipeline::default());
        assert_eq!(engine.pipeline().compiled, 1);
        assert!(matches!(
            engine.scene().sphere.material.binding(),
            UniformBinding::Bound(_)
        ));
        assert_eq!(engine.pipeline().sizes.len(), 1);
    }

    #[test]
    fn test_failed_env_map_runs_clean_for_1000_frames() {
        let settings = EnvMapSettings {
            path: Some("does/not/exist.exr".into()),
            ..Default::default()
        };
        let mut load = EnvMapLoad::spawn(&settings);
        load.wait();

        let mut engine = engine_with(load, RecordingPipeline::default());
        let scheduler = ManualScheduler::default();
        for i in 0..1000u32 {
            assert!(engine.frame(FRAME * i, &scheduler));
        }

        assert_eq!(engine.stats(), FrameStats { frames: 1000, failed_frames: 0 });
        assert!(!engine.scene().sphere.visible);
        assert_eq!(scheduler.requests.get(), 1000);
        assert_eq!(engine.pipeline().passes.len(), 2000);
    }

    #[test]
    fn test_env_map_reveals_sphere_before_render() {
        let settings = EnvMapSettings {
            path: None,
            base_width: 8,
            levels: 1,
        };
        let map = prefilter(&image::Rgba32FImage::new(8, 4), &settings);
        let mut engine = engine_with(EnvMapLoad::ready(map), RecordingPipeline::default());
        let scheduler = ManualScheduler::default();

        engine.frame(Duration::ZERO, &scheduler);
        engine.frame(FRAME, &scheduler);
        assert_eq!(engine.pipeline().sphere_visible, vec![true, true]);
    }

    #[test]
    fn test_render_failure_keeps_loop_alive() {
        let pipeline = RecordingPipeline {
            fail: true,
            ..Default::default()
        };
        let mut engine = engine_with(EnvMapLoad::never(), pipeline);
        let scheduler = ManualScheduler::default();

        for i in 0..10u32 {
            assert!(engine.frame(FRAME * i, &scheduler));
        }
        assert_eq!(engine.stats().failed_frames, 10);
        assert_eq!(scheduler.requests.get(), 10);
    }

    #[test]
    fn test_teardown_stops_scheduling() {
        let mut engine = engine_with(EnvMapLoad::never(), RecordingPipeline::default());
        let scheduler = ManualScheduler::default();

        engine.frame(Duration::ZERO, &scheduler);
        engine.teardown();

        assert!(!engine.frame(FRAME, &scheduler));
        assert!(!engine.resize(ViewportSize::new(640, 480, 1.0)));
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(scheduler.requests.get(), 1);
        assert_eq!(engine.stats().frames, 1);
    }

    #[test]
    fn test_missing_signals_fall_back_to_silence() {
        let mut engine = engine_with(EnvMapLoad::never(), RecordingPipeline::default());
        let scheduler = ManualScheduler::default();
        for i in 0..30u32 {
            engine.frame(FRAME * i, &scheduler);
        }
        assert_eq!(engine.scene().sphere.scale, 1.0);
        assert_eq!(engine.driver().state().rotation(), glam::Vec3::ZERO);
    }

    #[test]
    fn test_live_signal_moves_camera() {
        let config = EngineConfig::default();
        let output = SignalHandle::new(48_000, config.audio.ring_capacity);
        let signals = AudioSignals {
            input: None,
            output: Some(output.clone()),
        };
        let scene = SceneBuilder::new(&SceneConfig::default())
            .with_env_map(EnvMapLoad::never())
            .build();
        let mut engine = Engine::with_scene(
            &config,
            &signals,
            scene,
            RecordingPipeline::default(),
            ViewportSize::new(640, 480, 1.0),
        )
        .expect("engine starts");
        let scheduler = ManualScheduler::default();

        // loud tone landing in bin 1 (750 Hz at 48 kHz / 64)
        let tone: Vec<f32> = (0..4096)
            .map(|n| (2.0 * std::f32::consts::PI * 750.0 * n as f32 / 48_000.0).sin() * 0.5)
            .collect();
        output.push_samples(&tone);

        for i in 0..10u32 {
            engine.frame(FRAME * i, &scheduler);
        }
        assert!(engine.scene().sphere.scale > 1.0);
        assert!(engine.driver().state().rotation().x > 0.0);
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.analyser.fft_size = 100;
        let result = Engine::start(
            &config,
            &AudioSignals::default(),
            RecordingPipeline::default(),
            ViewportSize::new(640, 480, 1.0),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_with_scene_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.reactive.rand_seed_max = 0.0;
        let scene = SceneBuilder::new(&config.scene)
            .with_env_map(EnvMapLoad::never())
            .build();
        let pipeline = RecordingPipeline::default();

        let result = Engine::with_scene(
            &config,
            &AudioSignals::default(),
            scene,
            pipeline,
            ViewportSize::new(640, 480, 1.0),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));

        config = EngineConfig::default();
        config.analyser.fft_size = 100;
        let scene = SceneBuilder::new(&config.scene)
            .with_env_map(EnvMapLoad::never())
            .build();
        let result = Engine::with_scene(
            &config,
            &AudioSignals::default(),
            scene,
            RecordingPipeline::default(),
            ViewportSize::new(640, 480, 1.0),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
