//! Environment reflection map: background loading and CPU prefiltering.
//!
//! The loader thread publishes its result through a single-assignment slot.
//! The frame loop only reads the slot and applies the map between frames, so
//! no lock is held across a render.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::thread;

use image::imageops::{self, FilterType};
use image::Rgba32FImage;
use log::{info, warn};

use crate::error::{EngineError, Result};
use crate::params::EnvMapSettings;

/// One prefiltered equirectangular level (RGBA f32, row-major)
#[derive(Debug, Clone)]
pub struct EnvLevel {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<f32>,
}

/// Mip chain of increasingly blurred equirectangular images.
/// Level 0 is mirror-sharp; the last level approximates full roughness.
#[derive(Debug, Clone)]
pub struct PrefilteredEnvMap {
    levels: Vec<EnvLevel>,
}

impl PrefilteredEnvMap {
    pub fn levels(&self) -> &[EnvLevel] {
        &self.levels
    }

    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn base_size(&self) -> (u32, u32) {
        (self.levels[0].width, self.levels[0].height)
    }
}

/// Resample `source` to a 2:1 power-of-two chain and blur each smaller level
pub fn prefilter(source: &Rgba32FImage, settings: &EnvMapSettings) -> PrefilteredEnvMap {
    let width = settings.base_width.max(2);
    let height = width / 2;
    let max_levels = height.ilog2() + 1;
    let count = settings.levels.clamp(1, max_levels);

    let mut current = imageops::resize(source, width, height, FilterType::Triangle);
    let mut levels = Vec::with_capacity(count as usize);

    for level in 0..count {
        if level > 0 {
            let w = (current.width() / 2).max(1);
            let h = (current.height() / 2).max(1);
            let down = imageops::resize(&current, w, h, FilterType::Triangle);
            current = imageops::blur(&down, 1.0);
        }
        levels.push(EnvLevel {
            width: current.width(),
            height: current.height(),
            texels: current.as_raw().clone(),
        });
    }

    PrefilteredEnvMap { levels }
}

/// Decode an image file and prefilter it
pub fn load_prefiltered(path: &Path, settings: &EnvMapSettings) -> Result<PrefilteredEnvMap> {
    let image = image::open(path).map_err(|e| EngineError::ResourceLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(prefilter(&image.into_rgba32f(), settings))
}

/// In-flight environment map load
pub struct EnvMapLoad {
    slot: Arc<OnceLock<Arc<PrefilteredEnvMap>>>,
    worker: Option<thread::JoinHandle<()>>,
    applied: bool,
}

impl EnvMapLoad {
    /// Start loading on a background thread. Failures are logged and leave
    /// the slot empty forever.
    pub fn spawn(settings: &EnvMapSettings) -> Self {
        let Some(path) = settings.path.clone() else {
            info!("No environment map configured; reactive sphere stays hidden");
            return Self::never();
        };

        let slot = Arc::new(OnceLock::new());
        let publish = Arc::clone(&slot);
        let settings = settings.clone();

        let worker = thread::Builder::new()
            .name("envmap-loader".to_string())
            .spawn(move || match load_prefiltered(&path, &settings) {
                Ok(map) => {
                    let (w, h) = map.base_size();
                    info!(
                        "Environment map ready: {} ({}x{}, {} levels)",
                        path.display(),
                        w,
                        h,
                        map.level_count()
                    );
                    let _ = publish.set(Arc::new(map));
                }
                Err(e) => warn!("{}; reactive sphere stays hidden", e),
            });

        match worker {
            Ok(handle) => Self {
                slot,
                worker: Some(handle),
                applied: false,
            },
            Err(e) => {
                warn!("Failed to start environment map loader: {}", e);
                Self::never()
            }
        }
    }

    /// A load that never completes
    pub fn never() -> Self {
        Self {
            slot: Arc::new(OnceLock::new()),
            worker: None,
            applied: false,
        }
    }

    /// A load that has already completed
    pub fn ready(map: PrefilteredEnvMap) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(Arc::new(map));
        Self {
            slot: Arc::new(slot),
            worker: None,
            applied: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The loaded map, returned exactly once
    pub fn take_ready(&mut self) -> Option<Arc<PrefilteredEnvMap>> {
        if self.applied {
            return None;
        }
        let map = self.slot.get().cloned()?;
        self.applied = true;
        Some(map)
    }

    /// Block until the loader thread has finished (success or failure)
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("Environment map loader panicked");
            }
        }
    }
}
