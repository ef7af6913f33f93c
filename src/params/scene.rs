//! Scene topology, camera and material parameters.

use std::path::PathBuf;

use glam::Vec3;

/// Convert an sRGB hex color (0xRRGGBB) to linear RGB
pub fn srgb_hex(hex: u32) -> Vec3 {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Vec3::new(channel(16), channel(8), channel(0))
}

/// Perspective camera parameters
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Vertical field of view (degrees)
    pub fov_degrees: f32,

    /// Near clipping plane (world units)
    pub near_plane: f32,

    /// Far clipping plane (world units)
    pub far_plane: f32,

    /// Position before the first animated frame
    pub initial_position: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near_plane: 0.1,
            far_plane: 1000.0,
            initial_position: Vec3::new(2.0, -2.0, 5.0),
        }
    }
}

/// Enclosing backdrop shell
#[derive(Debug, Clone)]
pub struct BackdropConfig {
    pub radius: f32,

    /// Icosphere subdivision level
    pub detail: u32,
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            detail: 5,
        }
    }
}

/// Reactive sphere geometry and physically-based material
#[derive(Debug, Clone)]
pub struct SphereConfig {
    pub radius: f32,

    /// Icosphere subdivision level
    pub detail: u32,

    /// Base color (linear RGB)
    pub color: Vec3,

    pub metalness: f32,
    pub roughness: f32,

    /// Emissive color (linear RGB)
    pub emissive: Vec3,
    pub emissive_intensity: f32,
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            detail: 10,
            color: srgb_hex(0x000010),
            metalness: 0.5,
            roughness: 0.1,
            emissive: srgb_hex(0x000010),
            emissive_intensity: 1.5,
        }
    }
}

/// Environment reflection map source and prefiltering
#[derive(Debug, Clone)]
pub struct EnvMapSettings {
    /// Equirectangular image to load (None = never loads)
    pub path: Option<PathBuf>,

    /// Width of the sharpest prefiltered level (power of 2, height is half)
    pub base_width: u32,

    /// Number of progressively blurred levels
    pub levels: u32,
}

impl Default for EnvMapSettings {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("piz_compressed.exr")),
            base_width: 512,
            levels: 6,
        }
    }
}

impl EnvMapSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.base_width.is_power_of_two() || self.base_width < 2 {
            return Err(format!(
                "Environment map width must be a power of 2, got {}",
                self.base_width
            ));
        }
        if self.levels == 0 {
            return Err("Environment map needs at least one level".to_string());
        }
        Ok(())
    }
}

/// Full scene configuration
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Background clear color (linear RGB)
    pub clear_color: Vec3,
    pub camera: CameraConfig,
    pub backdrop: BackdropConfig,
    pub sphere: SphereConfig,
    pub env_map: EnvMapSettings,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            clear_color: srgb_hex(0x100c14),
            camera: CameraConfig::default(),
            backdrop: BackdropConfig::default(),
            sphere: SphereConfig::default(),
            env_map: EnvMapSettings::default(),
        }
    }
}
