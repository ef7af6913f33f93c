//! Vibeorb - an orb that listens
//!
//! A metallic sphere floats in a dark shell; the microphone and a spoken
//! voice push on its surface, swing the camera around it, and bloom into
//! light.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use log::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use vibeorb::audio::{AudioSignals, AudioSystem};
use vibeorb::cli::Args;
use vibeorb::engine::Engine;
use vibeorb::error::{EngineError, Result};
use vibeorb::params::EngineConfig;
use vibeorb::rendering::GpuRenderer;
use vibeorb::viewport::ViewportSize;

/// Main application state
struct App {
    config: EngineConfig,
    window: Option<Arc<Window>>,
    engine: Option<Engine<GpuRenderer>>,

    /// Keeps the cpal streams alive
    _audio: Option<AudioSystem>,

    start_time: Instant,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            engine: None,
            _audio: None,
            start_time: Instant::now(),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("Vibeorb")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.render.window_width,
                self.config.render.window_height,
            ));

        let window = Arc::new(event_loop.create_window(window_attributes).map_err(|e| {
            EngineError::GraphicsSetup(format!("Failed to create window: {}", e))
        })?);

        let renderer = GpuRenderer::create(Arc::clone(&window), &self.config.render)?;

        // No audio device just means two silent analysers
        let (audio, signals) = match AudioSystem::new(&self.config.audio) {
            Ok(audio) => {
                let signals = audio.signals();
                (Some(audio), signals)
            }
            Err(e) => {
                warn!("Audio unavailable, running silent: {}", e);
                (None, AudioSignals::default())
            }
        };

        let size = ViewportSize::from_physical(window.inner_size(), window.scale_factor());
        let engine = Engine::start(&self.config, &signals, renderer, size)?;

        info!("Vibeorb is running. Press ESC to quit");
        window.request_redraw();

        self.window = Some(window);
        self.engine = Some(engine);
        self._audio = audio;
        self.start_time = Instant::now();
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(engine) = &mut self.engine {
            engine.teardown();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }
        if let Err(e) = self.start(event_loop) {
            error!("Startup failed: {}", e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => self.shutdown(event_loop),
            WindowEvent::Resized(physical) => {
                if let (Some(engine), Some(window)) = (&mut self.engine, &self.window) {
                    engine.resize(ViewportSize::from_physical(physical, window.scale_factor()));
                }
            }
            WindowEvent::RedrawRequested => {
                if let (Some(engine), Some(window)) = (&mut self.engine, &self.window) {
                    engine.frame(self.start_time.elapsed(), &**window);
                }
            }
            _ => {}
        }
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;

    let mut app = App::new(config);
    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
